//! Top-level database reader (component C10): opens the archive, loads
//! metadata/sample names/history eagerly, and builds one bin reader per
//! bin so [`DatabaseReader::check_kmer`] only needs to route to the
//! right one.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use rayon::prelude::*;

use super::archive::ArchiveReader;
use super::bin_id::get_bin_id;
use super::bin_reader::{
    BinReaderSortedPlainForListing, BinReaderSortedPlainForRandomAccess,
    BinReaderSortedWithLUTForListing, BinReaderSortedWithLUTForRandomAccess,
};
use super::error::DbError;
use super::history::HistoryItem;
use super::kmer::Kmer;
use super::metadata::{Config, KmersRepresentation, Metadata};
use super::serialization::read_string;
use super::value::ValueRow;

const SAMPLE_NAMES_STREAM: &str = "samples_names";
const METADATA_STREAM: &str = "metadata";
const HISTORY_STREAM: &str = "history";

enum BinReaderKind {
    SortedPlain(BinReaderSortedPlainForRandomAccess),
    SortedWithLUT(BinReaderSortedWithLUTForRandomAccess),
}

impl BinReaderKind {
    fn check_kmer(&self, kmer: &Kmer) -> Result<Option<ValueRow>> {
        match self {
            BinReaderKind::SortedPlain(r) => r.check_kmer(kmer),
            BinReaderKind::SortedWithLUT(r) => r.check_kmer(kmer),
        }
    }
}

/// Opens a database file for random-access and listing reads.
pub struct DatabaseReader {
    path: PathBuf,
    metadata: Metadata,
    sample_names: Option<Vec<String>>,
    history: Vec<HistoryItem>,
    bins: Vec<BinReaderKind>,
}

impl DatabaseReader {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<DatabaseReader> {
        let path = path.as_ref().to_path_buf();
        let mut archive = ArchiveReader::open(&path).context("opening database archive")?;

        let metadata = load_metadata(&mut archive)?;
        let sample_names = load_sample_names(&mut archive, metadata.config.num_samples)?;
        let history = load_history(&mut archive)?;

        let schema = metadata.config.value_schema();
        let mut bins = Vec::with_capacity(metadata.config.num_bins as usize);
        for bin_id in 0..metadata.config.num_bins {
            let bin = match &metadata.config.kmers_representation {
                KmersRepresentation::SortedPlain(_) => BinReaderKind::SortedPlain(
                    BinReaderSortedPlainForRandomAccess::open(&mut archive, bin_id, metadata.config.kmer_len, schema.clone())?,
                ),
                KmersRepresentation::SortedWithLUT(c) => BinReaderKind::SortedWithLUT(
                    BinReaderSortedWithLUTForRandomAccess::open(
                        &mut archive,
                        bin_id,
                        metadata.config.kmer_len,
                        c.lut_prefix_len,
                        schema.clone(),
                    )?,
                ),
            };
            bins.push(bin);
        }

        Ok(DatabaseReader {
            path,
            metadata,
            sample_names,
            history,
            bins,
        })
    }

    pub fn config(&self) -> &Config {
        &self.metadata.config
    }

    pub fn sample_names(&self) -> Option<&[String]> {
        self.sample_names.as_deref()
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    /// Look up one k-mer's value row, if present.
    pub fn check_kmer(&self, kmer: &Kmer) -> Result<Option<ValueRow>> {
        let config = &self.metadata.config;
        let bin_id = get_bin_id(
            kmer,
            config.kmer_len,
            config.signature_len,
            config.num_bins,
            config.signature_selection_scheme,
            config.signature_to_bin_mapping,
        );
        self.bins[bin_id as usize].check_kmer(kmer)
    }

    /// Iterate every `(kmer, values)` record of one bin in stored
    /// (ascending) order. Unlike [`Self::check_kmer`], this opens a
    /// fresh, independent archive handle that only ever holds a small
    /// sliding window of the bin in memory, regardless of the bin's
    /// size.
    pub fn list_bin(&self, bin_id: u64) -> Result<Box<dyn Iterator<Item = Result<(Kmer, ValueRow)>>>> {
        ensure!(bin_id < self.metadata.config.num_bins, "bin id {bin_id} out of range");
        let schema = self.metadata.config.value_schema();
        match &self.metadata.config.kmers_representation {
            KmersRepresentation::SortedPlain(_) => Ok(Box::new(BinReaderSortedPlainForListing::open(
                &self.path,
                bin_id,
                self.metadata.config.kmer_len,
                schema,
            )?)),
            KmersRepresentation::SortedWithLUT(c) => Ok(Box::new(BinReaderSortedWithLUTForListing::open(
                &self.path,
                bin_id,
                self.metadata.config.kmer_len,
                c.lut_prefix_len,
                schema,
            )?)),
        }
    }

    /// Iterate every record in the database, bin by bin, each bin read
    /// through its own bounded-memory listing reader.
    pub fn list_all(&self) -> Result<impl Iterator<Item = Result<(Kmer, ValueRow)>>> {
        let mut bins = Vec::with_capacity(self.metadata.config.num_bins as usize);
        for bin_id in 0..self.metadata.config.num_bins {
            bins.push(self.list_bin(bin_id)?);
        }
        Ok(bins.into_iter().flatten())
    }

    /// Look up many k-mers at once, spread across the available cores.
    /// Each bin reader is read-only and `Sync`, so this is just
    /// `check_kmer` run in parallel; useful for bulk membership checks
    /// that would otherwise be single-threaded by nature.
    pub fn check_kmers_parallel(&self, kmers: &[Kmer]) -> Vec<Result<Option<ValueRow>>> {
        kmers.par_iter().map(|kmer| self.check_kmer(kmer)).collect()
    }
}

fn load_metadata(archive: &mut ArchiveReader) -> Result<Metadata> {
    let stream_id = archive
        .get_stream_id(METADATA_STREAM)
        .ok_or_else(|| anyhow::anyhow!(DbError::MissingStream { name: METADATA_STREAM.to_string() }))?;
    ensure!(
        archive.no_parts(stream_id) >= 1,
        DbError::EmptyStream { name: METADATA_STREAM.to_string() }
    );
    ensure!(
        archive.no_parts(stream_id) == 1,
        DbError::UnexpectedExtraPart { name: METADATA_STREAM.to_string() }
    );
    Metadata::load(&archive.get_part(stream_id, 0)?)
}

fn load_sample_names(archive: &mut ArchiveReader, num_samples: u64) -> Result<Option<Vec<String>>> {
    let Some(stream_id) = archive.get_stream_id(SAMPLE_NAMES_STREAM) else {
        return Ok(None);
    };
    let buf = archive.get_concatenated(stream_id)?;
    let mut pos = 0;
    let mut names = Vec::new();
    while pos < buf.len() {
        names.push(read_string(&buf, &mut pos)?);
    }
    ensure!(
        names.len() as u64 == num_samples,
        "samples_names stream has {} entries, metadata declares {num_samples} samples",
        names.len()
    );
    Ok(Some(names))
}

fn load_history(archive: &mut ArchiveReader) -> Result<Vec<HistoryItem>> {
    let Some(stream_id) = archive.get_stream_id(HISTORY_STREAM) else {
        return Ok(Vec::new());
    };
    let mut items = Vec::with_capacity(archive.no_parts(stream_id));
    for idx in 0..archive.no_parts(stream_id) {
        items.push(HistoryItem::load(&archive.get_part(stream_id, idx)?)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::metadata::{ConfigSortedPlain, ConfigSortedWithLUT, SignatureSelectionScheme, SignatureToBinMapping};
    use crate::db::value::{ValueField, ValueScalar};
    use crate::db::writer::DatabaseWriter;
    use tempfile::tempdir;

    fn config(num_bins: u64, representation: KmersRepresentation) -> Config {
        Config {
            kmer_len: 12,
            num_samples: 1,
            num_bins,
            signature_len: 4,
            signature_selection_scheme: SignatureSelectionScheme::MinHash,
            signature_to_bin_mapping: SignatureToBinMapping::Modulo,
            value_types: vec![ValueField::U32],
            kmers_representation: representation,
        }
    }

    fn write_and_reopen(path: &std::path::Path, cfg: Config, kmers: &[(&str, u32)], sample_names: &[String]) {
        let mut writer = DatabaseWriter::create(path, cfg, sample_names).unwrap();
        for (s, v) in kmers {
            let kmer = Kmer::from_ascii(s).unwrap();
            writer.add_kmer(&kmer, &[ValueScalar::U32(*v)]).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn round_trips_sorted_plain_lookups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.kmdb");
        let kmers = [
            ("ACGTACGTACGT", 1u32),
            ("AAAACCCCGGGG", 2),
            ("TTTTTTTTTTTT", 3),
            ("GGGGCCCCAAAA", 4),
        ];
        write_and_reopen(
            &path,
            config(4, KmersRepresentation::SortedPlain(ConfigSortedPlain)),
            &kmers,
            &["sample_a".to_string()],
        );

        let reader = DatabaseReader::open(&path).unwrap();
        assert_eq!(reader.sample_names(), Some(&["sample_a".to_string()][..]));
        assert_eq!(reader.history().len(), 1);

        for (s, v) in &kmers {
            let kmer = Kmer::from_ascii(s).unwrap();
            let row = reader.check_kmer(&kmer).unwrap().unwrap();
            assert_eq!(row[0], ValueScalar::U32(*v));
        }
        let missing = Kmer::from_ascii("CCCCCCCCCCCC").unwrap();
        assert!(reader.check_kmer(&missing).unwrap().is_none());

        let all: Vec<_> = reader.list_all().unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(all.len(), kmers.len());

        let queries: Vec<_> = kmers.iter().map(|(s, _)| Kmer::from_ascii(s).unwrap()).collect();
        let results = reader.check_kmers_parallel(&queries);
        for (result, (_, v)) in results.into_iter().zip(kmers.iter()) {
            assert_eq!(result.unwrap().unwrap()[0], ValueScalar::U32(*v));
        }
    }

    #[test]
    fn round_trips_sorted_with_lut_lookups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.kmdb");
        let kmers = [
            ("ACGTACGTACGT", 10u32),
            ("AAAACCCCGGGG", 20),
            ("TTTTTTTTTTTT", 30),
        ];
        write_and_reopen(
            &path,
            config(4, KmersRepresentation::SortedWithLUT(ConfigSortedWithLUT { lut_prefix_len: 3 })),
            &kmers,
            &[],
        );

        let reader = DatabaseReader::open(&path).unwrap();
        assert_eq!(reader.sample_names(), None);
        for (s, v) in &kmers {
            let kmer = Kmer::from_ascii(s).unwrap();
            let row = reader.check_kmer(&kmer).unwrap().unwrap();
            assert_eq!(row[0], ValueScalar::U32(*v));
        }

        let all: Vec<_> = reader.list_all().unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(all.len(), kmers.len());
        for w in all.windows(2) {
            assert!(w[0].0 < w[1].0);
        }
    }
}
