//! Per-bin record writers (component C6). Both layouts buffer records in
//! memory and flush everything to the archive as a single part on
//! `close`, which is simpler than the size-capped multi-part streaming
//! the format itself allows for and is fine at the bin granularity this
//! crate writes at.

use anyhow::{bail, ensure, Result};

use super::archive::ArchiveWriter;
use super::kmer::Kmer;
use super::serialization::{read_u64, write_u64};
use super::value::ValueSchema;

pub fn bin_stream_name(bin_id: u64) -> String {
    format!("bin_{bin_id:05}")
}
pub fn bin_metadata_stream_name(bin_id: u64) -> String {
    format!("bin_metadata_{bin_id:05}")
}
pub fn bin_suffix_stream_name(bin_id: u64) -> String {
    format!("{}_suf+data", bin_stream_name(bin_id))
}
pub fn bin_lut_stream_name(bin_id: u64) -> String {
    format!("{}_lut", bin_stream_name(bin_id))
}

/// Per-bin record count, the only field a bin's metadata part carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinMetadata {
    pub total_kmers: u64,
}

impl BinMetadata {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u64(&mut out, self.total_kmers);
        out
    }

    pub fn load(buf: &[u8]) -> Result<BinMetadata> {
        let mut pos = 0;
        let total_kmers = read_u64(buf, &mut pos)?;
        Ok(BinMetadata { total_kmers })
    }
}

/// Writes `k-mer bytes + value tuple` records in ascending k-mer order,
/// with no LUT.
pub struct BinWriterSortedPlain {
    bin_id: u64,
    kmer_len: u64,
    schema: ValueSchema,
    buffer: Vec<u8>,
    total_kmers: u64,
    last_kmer: Option<Kmer>,
    closed: bool,
}

impl BinWriterSortedPlain {
    pub fn new(bin_id: u64, kmer_len: u64, schema: ValueSchema) -> Self {
        BinWriterSortedPlain {
            bin_id,
            kmer_len,
            schema,
            buffer: Vec::new(),
            total_kmers: 0,
            last_kmer: None,
            closed: false,
        }
    }

    /// Append a k-mer. Callers must present k-mers in strictly ascending
    /// order with no duplicates.
    pub fn add_kmer(&mut self, kmer: &Kmer, values: &[super::value::ValueScalar]) -> Result<()> {
        ensure!(!self.closed, "cannot add a k-mer after the bin writer is closed");
        if let Some(last) = &self.last_kmer {
            ensure!(*last < *kmer, super::error::DbError::OutOfOrderWrite);
        }
        kmer.store_left_aligned(self.kmer_len, &mut self.buffer);
        self.schema.write_row(values, &mut self.buffer)?;
        self.total_kmers += 1;
        self.last_kmer = Some(kmer.clone());
        Ok(())
    }

    pub fn close(mut self, archive: &mut ArchiveWriter) -> Result<()> {
        self.close_impl(archive)
    }

    fn close_impl(&mut self, archive: &mut ArchiveWriter) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let stream_id = archive.register_stream(&bin_stream_name(self.bin_id));
        if !self.buffer.is_empty() {
            archive.add_part(stream_id, &self.buffer)?;
        }
        let metadata_stream = archive.register_stream(&bin_metadata_stream_name(self.bin_id));
        let metadata = BinMetadata {
            total_kmers: self.total_kmers,
        };
        archive.add_part(metadata_stream, &metadata.serialize())?;
        Ok(())
    }
}

/// Writes `k-mer suffix + value tuple` records plus a prefix-sum LUT
/// over the leading `lut_prefix_len` symbols.
pub struct BinWriterSortedWithLUT {
    bin_id: u64,
    kmer_len: u64,
    lut_prefix_len: u64,
    schema: ValueSchema,
    suffix_buffer: Vec<u8>,
    lut_counts: Vec<u64>,
    total_kmers: u64,
    last_kmer: Option<Kmer>,
    closed: bool,
}

impl BinWriterSortedWithLUT {
    pub fn new(bin_id: u64, kmer_len: u64, lut_prefix_len: u64, schema: ValueSchema) -> Self {
        let lut_recs = 1u64 << (2 * lut_prefix_len);
        BinWriterSortedWithLUT {
            bin_id,
            kmer_len,
            lut_prefix_len,
            schema,
            suffix_buffer: Vec::new(),
            lut_counts: vec![0u64; (lut_recs + 1) as usize],
            total_kmers: 0,
            last_kmer: None,
            closed: false,
        }
    }

    pub fn add_kmer(&mut self, kmer: &Kmer, values: &[super::value::ValueScalar]) -> Result<()> {
        ensure!(!self.closed, "cannot add a k-mer after the bin writer is closed");
        if let Some(last) = &self.last_kmer {
            ensure!(*last < *kmer, super::error::DbError::OutOfOrderWrite);
        }

        let prefix = if self.lut_prefix_len > 0 {
            kmer.remove_suffix((2 * (self.kmer_len - self.lut_prefix_len)) as u32)
        } else {
            0
        };
        if prefix as usize >= self.lut_counts.len() - 1 {
            bail!("k-mer's LUT prefix {prefix} is out of range for prefix length {}", self.lut_prefix_len);
        }
        self.lut_counts[prefix as usize] += 1;

        let suffix_len = self.kmer_len - self.lut_prefix_len;
        kmer.store_left_aligned(suffix_len, &mut self.suffix_buffer);
        self.schema.write_row(values, &mut self.suffix_buffer)?;

        self.total_kmers += 1;
        self.last_kmer = Some(kmer.clone());
        Ok(())
    }

    pub fn close(mut self, archive: &mut ArchiveWriter) -> Result<()> {
        self.close_impl(archive)
    }

    fn close_impl(&mut self, archive: &mut ArchiveWriter) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let suf_stream = archive.register_stream(&bin_suffix_stream_name(self.bin_id));
        if !self.suffix_buffer.is_empty() {
            archive.add_part(suf_stream, &self.suffix_buffer)?;
        }

        let mut prev = 0u64;
        let lut_recs = self.lut_counts.len() - 1;
        let mut lut = vec![0u64; self.lut_counts.len()];
        for i in 0..lut_recs {
            let count = self.lut_counts[i];
            lut[i] = prev;
            prev += count;
        }
        lut[lut_recs] = prev;
        debug_assert_eq!(prev, self.total_kmers);

        let mut lut_bytes = Vec::with_capacity(lut.len() * 8);
        for v in &lut {
            write_u64(&mut lut_bytes, *v);
        }
        let lut_stream = archive.register_stream(&bin_lut_stream_name(self.bin_id));
        archive.add_part(lut_stream, &lut_bytes)?;

        let metadata_stream = archive.register_stream(&bin_metadata_stream_name(self.bin_id));
        let metadata = BinMetadata {
            total_kmers: self.total_kmers,
        };
        archive.add_part(metadata_stream, &metadata.serialize())?;
        Ok(())
    }
}
