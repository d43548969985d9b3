//! Database-wide configuration and its on-disk serialization (component
//! C8): k-mer length, sample count and value types, the bin-selection
//! scheme, and the on-disk k-mer representation, plus which of that
//! representation's own parameters (e.g. the LUT prefix length) need
//! persisting alongside it.

use anyhow::{bail, ensure, Context, Result};

use super::error::DbError;
use super::serialization::{read_string, read_u64, write_string, write_u64};
use super::value::{ValueField, ValueSchema};

/// The format version this crate writes; also the minimum version it can
/// read (major must match exactly, see [`Version::is_compatible`]).
pub const CURRENT_VERSION: Version = Version {
    major: 1,
    minor: 0,
    patch: 0,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn serialize(&self, out: &mut Vec<u8>) {
        write_u64(out, self.major);
        write_u64(out, self.minor);
        write_u64(out, self.patch);
    }

    pub fn load(buf: &[u8], pos: &mut usize) -> Result<Version> {
        Ok(Version {
            major: read_u64(buf, pos)?,
            minor: read_u64(buf, pos)?,
            patch: read_u64(buf, pos)?,
        })
    }

    /// Only the major component gates compatibility; minor/patch bumps
    /// are expected to stay readable by older code.
    pub fn is_compatible(&self, library: Version) -> bool {
        self.major == library.major
    }
}

/// Which minimizer/signature scheme selects a k-mer's bin. `MinHash` is
/// the only implemented scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureSelectionScheme {
    MinHash,
}

impl SignatureSelectionScheme {
    fn name(self) -> &'static str {
        match self {
            SignatureSelectionScheme::MinHash => "MinHash",
        }
    }

    fn from_name(name: &str) -> Result<Self> {
        match name {
            "MinHash" => Ok(SignatureSelectionScheme::MinHash),
            other => bail!("unknown signature selection scheme {other:?}"),
        }
    }
}

/// How a signature maps to a bin index. `Modulo` is the only implemented
/// mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureToBinMapping {
    Modulo,
}

impl SignatureToBinMapping {
    fn name(self) -> &'static str {
        match self {
            SignatureToBinMapping::Modulo => "Modulo",
        }
    }

    fn from_name(name: &str) -> Result<Self> {
        match name {
            "Modulo" => Ok(SignatureToBinMapping::Modulo),
            other => bail!("unknown signature to bin mapping {other:?}"),
        }
    }
}

/// Which on-disk layout a bin's records use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KmersRepresentation {
    SortedPlain(ConfigSortedPlain),
    SortedWithLUT(ConfigSortedWithLUT),
}

impl KmersRepresentation {
    fn name(&self) -> &'static str {
        match self {
            KmersRepresentation::SortedPlain(_) => "SortedPlain",
            KmersRepresentation::SortedWithLUT(_) => "SortedWithLUT",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigSortedPlain;

impl ConfigSortedPlain {
    fn serialize(&self, _out: &mut Vec<u8>) {}

    fn load(_buf: &[u8], _pos: &mut usize) -> Result<Self> {
        Ok(ConfigSortedPlain)
    }
}

/// `SortedWithLUT`'s own parameter: how many leading symbols of each
/// k-mer are factored out into the shared prefix-sum LUT rather than
/// stored per-record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfigSortedWithLUT {
    pub lut_prefix_len: u64,
}

impl ConfigSortedWithLUT {
    fn serialize(&self, out: &mut Vec<u8>) {
        write_u64(out, self.lut_prefix_len);
    }

    fn load(buf: &[u8], pos: &mut usize) -> Result<Self> {
        Ok(ConfigSortedWithLUT {
            lut_prefix_len: read_u64(buf, pos)?,
        })
    }
}

/// Database-wide configuration, independent of any single bin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub kmer_len: u64,
    pub num_samples: u64,
    pub num_bins: u64,
    pub signature_len: u32,
    pub signature_selection_scheme: SignatureSelectionScheme,
    pub signature_to_bin_mapping: SignatureToBinMapping,
    pub value_types: Vec<ValueField>,
    pub kmers_representation: KmersRepresentation,
}

impl Config {
    pub fn value_schema(&self) -> ValueSchema {
        ValueSchema(self.value_types.clone())
    }
}

/// The full on-disk metadata record (component C8): version, [`Config`],
/// and (via `Config::kmers_representation`) the representation-specific
/// body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub version: Version,
    pub config: Config,
}

impl Metadata {
    pub fn new(config: Config) -> Metadata {
        Metadata {
            version: CURRENT_VERSION,
            config,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.version.serialize(&mut out);
        write_u64(&mut out, self.config.kmer_len);
        write_u64(&mut out, self.config.num_samples);
        write_u64(&mut out, self.config.num_bins);
        write_u64(&mut out, self.config.signature_len as u64);
        write_string(&mut out, self.config.signature_selection_scheme.name());
        write_string(&mut out, self.config.signature_to_bin_mapping.name());

        write_u64(&mut out, self.config.value_types.len() as u64);
        for field in &self.config.value_types {
            write_string(&mut out, field.name());
            write_u64(&mut out, field.num_bytes() as u64);
        }

        write_string(&mut out, self.config.kmers_representation.name());
        match &self.config.kmers_representation {
            KmersRepresentation::SortedPlain(c) => c.serialize(&mut out),
            KmersRepresentation::SortedWithLUT(c) => c.serialize(&mut out),
        }
        out
    }

    pub fn load(buf: &[u8]) -> Result<Metadata> {
        let mut pos = 0;
        let version = Version::load(buf, &mut pos).context("reading version")?;
        ensure!(
            version.is_compatible(CURRENT_VERSION),
            DbError::IncompatibleVersion {
                file_major: version.major,
                library_major: CURRENT_VERSION.major,
            }
        );

        let kmer_len = read_u64(buf, &mut pos)?;
        let num_samples = read_u64(buf, &mut pos)?;
        let num_bins = read_u64(buf, &mut pos)?;
        let signature_len = read_u64(buf, &mut pos)? as u32;
        let signature_selection_scheme =
            SignatureSelectionScheme::from_name(&read_string(buf, &mut pos)?)?;
        let signature_to_bin_mapping =
            SignatureToBinMapping::from_name(&read_string(buf, &mut pos)?)?;

        let n_value_types = read_u64(buf, &mut pos)? as usize;
        let mut value_types = Vec::with_capacity(n_value_types);
        for _ in 0..n_value_types {
            let name = read_string(buf, &mut pos)?;
            let field = ValueField::from_name(&name)?;
            let stored_width = read_u64(buf, &mut pos)? as usize;
            ensure!(
                stored_width == field.num_bytes(),
                "value type {name:?} declares width {stored_width}, expected {}",
                field.num_bytes()
            );
            value_types.push(field);
        }

        let representation_name = read_string(buf, &mut pos)?;
        let kmers_representation = match representation_name.as_str() {
            "SortedPlain" => {
                KmersRepresentation::SortedPlain(ConfigSortedPlain::load(buf, &mut pos)?)
            }
            "SortedWithLUT" => {
                KmersRepresentation::SortedWithLUT(ConfigSortedWithLUT::load(buf, &mut pos)?)
            }
            other => bail!("unknown k-mer representation {other:?}"),
        };

        Ok(Metadata {
            version,
            config: Config {
                kmer_len,
                num_samples,
                num_bins,
                signature_len,
                signature_selection_scheme,
                signature_to_bin_mapping,
                value_types,
                kmers_representation,
            },
        })
    }
}
