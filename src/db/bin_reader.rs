//! Per-bin record readers (component C7): random-access lookup via
//! binary search over packed, fixed-width records, and sequential
//! listing for full-bin iteration.
//!
//! Both representations store their keys left-aligned (MSB of byte 0 is
//! the first symbol), which makes byte-slice comparison equivalent to
//! k-mer order ([`crate::db::kmer`] tests this directly) — binary search
//! here just compares the leading key bytes of each fixed-width record,
//! rather than re-deriving a bit-level comparator.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{bail, ensure, Result};

use super::archive::ArchiveReader;
use super::bin_writer::{
    bin_lut_stream_name, bin_metadata_stream_name, bin_stream_name, bin_suffix_stream_name,
    BinMetadata,
};
use super::kmer::Kmer;
use super::serialization::read_u64;
use super::value::{ValueRow, ValueSchema};

/// Upper bound on how many bytes a listing reader's sliding window holds
/// at once, regardless of how large the underlying stream is.
const LISTING_WINDOW_BYTES: usize = 64 * 1024;

fn load_bin_metadata(archive: &mut ArchiveReader, bin_id: u64) -> Result<BinMetadata> {
    let name = bin_metadata_stream_name(bin_id);
    let stream_id = archive
        .get_stream_id(&name)
        .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name: name.clone() }))?;
    ensure!(archive.no_parts(stream_id) >= 1, super::error::DbError::EmptyStream { name });
    BinMetadata::load(&archive.get_concatenated(stream_id)?)
}

/// Binary search over an array of fixed-width records for the record
/// whose leading `key_bytes` match `key` exactly.
fn binary_search_record(data: &[u8], record_bytes: usize, key_bytes: usize, key: &[u8]) -> Option<usize> {
    if record_bytes == 0 || data.is_empty() {
        return None;
    }
    let n_records = data.len() / record_bytes;
    let mut lo: isize = 0;
    let mut hi: isize = n_records as isize - 1;
    while lo <= hi {
        let mid = (lo + hi) / 2;
        let start = mid as usize * record_bytes;
        let record_key = &data[start..start + key_bytes];
        match record_key.cmp(key) {
            std::cmp::Ordering::Equal => return Some(mid as usize),
            std::cmp::Ordering::Less => lo = mid + 1,
            std::cmp::Ordering::Greater => hi = mid - 1,
        }
    }
    None
}

/// Random-access reader over a `SortedPlain` bin: loads the whole bin
/// into memory once, then binary searches it per lookup.
pub struct BinReaderSortedPlainForRandomAccess {
    kmer_len: u64,
    schema: ValueSchema,
    bytes_for_kmer: usize,
    single_elem_bytes: usize,
    data: Vec<u8>,
}

impl BinReaderSortedPlainForRandomAccess {
    pub fn open(archive: &mut ArchiveReader, bin_id: u64, kmer_len: u64, schema: ValueSchema) -> Result<Self> {
        let metadata = load_bin_metadata(archive, bin_id)?;
        let name = bin_stream_name(bin_id);
        let stream_id = archive
            .get_stream_id(&name)
            .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name }))?;

        let bytes_for_kmer = ((kmer_len + 3) / 4) as usize;
        let single_elem_bytes = bytes_for_kmer + schema.total_bytes();
        let data = archive.get_concatenated(stream_id)?;
        ensure!(
            data.len() as u64 == metadata.total_kmers * single_elem_bytes as u64,
            "bin {bin_id} data length {} does not match {} records of {} bytes",
            data.len(),
            metadata.total_kmers,
            single_elem_bytes
        );

        Ok(BinReaderSortedPlainForRandomAccess {
            kmer_len,
            schema,
            bytes_for_kmer,
            single_elem_bytes,
            data,
        })
    }

    /// Look up `kmer`, returning its value row if present.
    pub fn check_kmer(&self, kmer: &Kmer) -> Result<Option<ValueRow>> {
        let mut key = Vec::with_capacity(self.bytes_for_kmer);
        kmer.store_left_aligned(self.kmer_len, &mut key);

        match binary_search_record(&self.data, self.single_elem_bytes, self.bytes_for_kmer, &key) {
            Some(idx) => {
                let start = idx * self.single_elem_bytes + self.bytes_for_kmer;
                let row = self.schema.read_row(&self.data[start..start + self.schema.total_bytes()])?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }
}

/// Random-access reader over a `SortedWithLUT` bin: the LUT gives the
/// `[start, end)` record range for a k-mer's prefix, and only that
/// (usually tiny) range needs a binary search.
pub struct BinReaderSortedWithLUTForRandomAccess {
    kmer_len: u64,
    lut_prefix_len: u64,
    schema: ValueSchema,
    bytes_for_suffix: usize,
    single_suf_elem_bytes: usize,
    suffix_data: Vec<u8>,
    lut: Vec<u64>,
}

impl BinReaderSortedWithLUTForRandomAccess {
    pub fn open(
        archive: &mut ArchiveReader,
        bin_id: u64,
        kmer_len: u64,
        lut_prefix_len: u64,
        schema: ValueSchema,
    ) -> Result<Self> {
        let metadata = load_bin_metadata(archive, bin_id)?;

        let suf_name = bin_suffix_stream_name(bin_id);
        let suf_stream = archive
            .get_stream_id(&suf_name)
            .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name: suf_name }))?;
        let lut_name = bin_lut_stream_name(bin_id);
        let lut_stream = archive
            .get_stream_id(&lut_name)
            .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name: lut_name }))?;

        let suffix_len = kmer_len - lut_prefix_len;
        let bytes_for_suffix = ((suffix_len + 3) / 4) as usize;
        let single_suf_elem_bytes = bytes_for_suffix + schema.total_bytes();

        let suffix_data = archive.get_concatenated(suf_stream)?;
        ensure!(
            suffix_data.len() as u64 == metadata.total_kmers * single_suf_elem_bytes as u64,
            "bin {bin_id} suffix data length {} does not match {} records of {} bytes",
            suffix_data.len(),
            metadata.total_kmers,
            single_suf_elem_bytes
        );

        let lut_bytes = archive.get_concatenated(lut_stream)?;
        let lut_recs = (1u64 << (2 * lut_prefix_len)) as usize + 1;
        ensure!(
            lut_bytes.len() == lut_recs * 8,
            "LUT for bin {bin_id} has {} bytes, expected {}",
            lut_bytes.len(),
            lut_recs * 8
        );
        let mut pos = 0;
        let mut lut = Vec::with_capacity(lut_recs);
        for _ in 0..lut_recs {
            lut.push(read_u64(&lut_bytes, &mut pos)?);
        }
        ensure!(
            *lut.last().unwrap() == metadata.total_kmers,
            "LUT guard for bin {bin_id} is {}, expected total_kmers {}",
            lut.last().unwrap(),
            metadata.total_kmers
        );
        for w in lut.windows(2) {
            ensure!(w[0] <= w[1], "LUT for bin {bin_id} is not monotonic non-decreasing");
        }

        Ok(BinReaderSortedWithLUTForRandomAccess {
            kmer_len,
            lut_prefix_len,
            schema,
            bytes_for_suffix,
            single_suf_elem_bytes,
            suffix_data,
            lut,
        })
    }

    pub fn check_kmer(&self, kmer: &Kmer) -> Result<Option<ValueRow>> {
        let prefix = if self.lut_prefix_len > 0 {
            kmer.remove_suffix((2 * (self.kmer_len - self.lut_prefix_len)) as u32)
        } else {
            0
        };
        let prefix = prefix as usize;
        if prefix + 1 >= self.lut.len() {
            return Ok(None);
        }
        let range_start = self.lut[prefix] as usize;
        let range_end = self.lut[prefix + 1] as usize;
        if range_start == range_end {
            return Ok(None);
        }

        if self.lut_prefix_len == self.kmer_len {
            let start = range_start * self.single_suf_elem_bytes + self.bytes_for_suffix;
            let row = self
                .schema
                .read_row(&self.suffix_data[start..start + self.schema.total_bytes()])?;
            return Ok(Some(row));
        }

        let suffix_len = self.kmer_len - self.lut_prefix_len;
        let mut key = Vec::with_capacity(self.bytes_for_suffix);
        kmer.store_left_aligned(suffix_len, &mut key);

        let window_start = range_start * self.single_suf_elem_bytes;
        let window_end = range_end * self.single_suf_elem_bytes;
        let window = &self.suffix_data[window_start..window_end];

        match binary_search_record(window, self.single_suf_elem_bytes, self.bytes_for_suffix, &key) {
            Some(idx) => {
                let start = idx * self.single_suf_elem_bytes + self.bytes_for_suffix;
                let row = self.schema.read_row(&window[start..start + self.schema.total_bytes()])?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }
}

/// Sequential, bounded-memory reader over a `SortedPlain` bin: pulls
/// fixed-size windows from its own [`ArchiveReader`] handle via
/// [`ArchiveReader::get_sub_part_sequential`] rather than loading the
/// whole bin up front, unlike [`BinReaderSortedPlainForRandomAccess`].
/// Each instance opens its own archive handle so listing a bin never
/// competes with, or depends on, the random-access readers' already
/// fully-loaded copy of the data.
pub struct BinReaderSortedPlainForListing {
    archive: ArchiveReader,
    stream_id: usize,
    kmer_len: u64,
    schema: ValueSchema,
    bytes_for_kmer: usize,
    single_elem_bytes: usize,
    window: VecDeque<u8>,
    exhausted: bool,
}

impl BinReaderSortedPlainForListing {
    pub fn open(path: impl AsRef<Path>, bin_id: u64, kmer_len: u64, schema: ValueSchema) -> Result<Self> {
        let mut archive = ArchiveReader::open(path)?;
        let name = bin_stream_name(bin_id);
        let stream_id = archive
            .get_stream_id(&name)
            .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name }))?;
        archive.rewind(stream_id);

        let bytes_for_kmer = ((kmer_len + 3) / 4) as usize;
        let single_elem_bytes = bytes_for_kmer + schema.total_bytes();

        Ok(BinReaderSortedPlainForListing {
            archive,
            stream_id,
            kmer_len,
            schema,
            bytes_for_kmer,
            single_elem_bytes,
            window: VecDeque::new(),
            exhausted: false,
        })
    }

    /// Read the next `(kmer, values)` record in ascending order, or
    /// `None` once the bin is exhausted. Never holds more than one
    /// window's worth of the stream in memory.
    pub fn next_record(&mut self) -> Result<Option<(Kmer, ValueRow)>> {
        if self.single_elem_bytes == 0 {
            return Ok(None);
        }
        while self.window.len() < self.single_elem_bytes {
            if self.exhausted {
                ensure!(self.window.is_empty(), "bin stream ended mid-record");
                return Ok(None);
            }
            let max_read = (LISTING_WINDOW_BYTES / self.single_elem_bytes).max(1) * self.single_elem_bytes;
            match self.archive.get_sub_part_sequential(self.stream_id, max_read)? {
                Some(chunk) => self.window.extend(chunk),
                None => self.exhausted = true,
            }
        }

        let record: Vec<u8> = self.window.drain(..self.single_elem_bytes).collect();
        let kmer = Kmer::load_from_left_aligned(&record[..self.bytes_for_kmer], self.kmer_len)?;
        let row = self.schema.read_row(&record[self.bytes_for_kmer..])?;
        Ok(Some((kmer, row)))
    }
}

impl Iterator for BinReaderSortedPlainForListing {
    type Item = Result<(Kmer, ValueRow)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Sequential, bounded-memory reader over a `SortedWithLUT` bin: walks
/// the LUT's prefix-sum counts and the suffix stream in lockstep,
/// tracking `current_prefix` and `already_read_kmers` and refilling a
/// small window of each stream as it goes, unlike
/// [`BinReaderSortedWithLUTForRandomAccess`], which loads both in full.
pub struct BinReaderSortedWithLUTForListing {
    archive: ArchiveReader,
    lut_stream_id: usize,
    suf_stream_id: usize,
    kmer_len: u64,
    lut_prefix_len: u64,
    schema: ValueSchema,
    bytes_for_suffix: usize,
    single_suf_elem_bytes: usize,
    total_kmers: u64,
    already_read_kmers: u64,
    current_prefix: u64,
    next_boundary: u64,
    lut_window: VecDeque<u64>,
    lut_exhausted: bool,
    suf_window: VecDeque<u8>,
    suf_exhausted: bool,
}

impl BinReaderSortedWithLUTForListing {
    pub fn open(
        path: impl AsRef<Path>,
        bin_id: u64,
        kmer_len: u64,
        lut_prefix_len: u64,
        schema: ValueSchema,
    ) -> Result<Self> {
        let mut archive = ArchiveReader::open(path)?;
        let metadata = load_bin_metadata(&mut archive, bin_id)?;

        let suf_name = bin_suffix_stream_name(bin_id);
        let suf_stream_id = archive
            .get_stream_id(&suf_name)
            .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name: suf_name }))?;
        let lut_name = bin_lut_stream_name(bin_id);
        let lut_stream_id = archive
            .get_stream_id(&lut_name)
            .ok_or_else(|| anyhow::anyhow!(super::error::DbError::MissingStream { name: lut_name }))?;
        archive.rewind(suf_stream_id);
        archive.rewind(lut_stream_id);

        let suffix_len = kmer_len - lut_prefix_len;
        let bytes_for_suffix = ((suffix_len + 3) / 4) as usize;
        let single_suf_elem_bytes = bytes_for_suffix + schema.total_bytes();

        let mut reader = BinReaderSortedWithLUTForListing {
            archive,
            lut_stream_id,
            suf_stream_id,
            kmer_len,
            lut_prefix_len,
            schema,
            bytes_for_suffix,
            single_suf_elem_bytes,
            total_kmers: metadata.total_kmers,
            already_read_kmers: 0,
            current_prefix: 0,
            next_boundary: 0,
            lut_window: VecDeque::new(),
            lut_exhausted: false,
            suf_window: VecDeque::new(),
            suf_exhausted: false,
        };

        let first = reader.next_lut_value()?;
        ensure!(first == 0, "LUT for bin {bin_id} does not start at 0");
        reader.next_boundary = reader.next_lut_value()?;
        Ok(reader)
    }

    fn next_lut_value(&mut self) -> Result<u64> {
        loop {
            if let Some(v) = self.lut_window.pop_front() {
                return Ok(v);
            }
            if self.lut_exhausted {
                bail!("LUT stream ended before its trailing guard entry");
            }
            match self.archive.get_sub_part_sequential(self.lut_stream_id, LISTING_WINDOW_BYTES)? {
                Some(chunk) => {
                    let mut pos = 0;
                    while pos + 8 <= chunk.len() {
                        self.lut_window.push_back(read_u64(&chunk, &mut pos)?);
                    }
                }
                None => self.lut_exhausted = true,
            }
        }
    }

    /// Read the next `(kmer, values)` record in ascending order, or
    /// `None` once every k-mer in the bin has been emitted.
    pub fn next_record(&mut self) -> Result<Option<(Kmer, ValueRow)>> {
        if self.already_read_kmers >= self.total_kmers {
            return Ok(None);
        }
        while self.already_read_kmers >= self.next_boundary {
            self.current_prefix += 1;
            self.next_boundary = self.next_lut_value()?;
        }

        while self.suf_window.len() < self.single_suf_elem_bytes {
            if self.suf_exhausted {
                bail!("suffix stream ended mid-record");
            }
            let max_read = (LISTING_WINDOW_BYTES / self.single_suf_elem_bytes.max(1)).max(1) * self.single_suf_elem_bytes.max(1);
            match self.archive.get_sub_part_sequential(self.suf_stream_id, max_read)? {
                Some(chunk) => self.suf_window.extend(chunk),
                None => self.suf_exhausted = true,
            }
        }

        let record: Vec<u8> = self.suf_window.drain(..self.single_suf_elem_bytes).collect();
        let suffix_len = self.kmer_len - self.lut_prefix_len;
        let mut kmer = Kmer::zero(self.kmer_len);
        kmer.load_left_aligned_into(&record[..self.bytes_for_suffix], suffix_len)?;
        if self.lut_prefix_len > 0 {
            kmer.set_prefix(self.current_prefix, (2 * suffix_len) as u32);
        }
        let row = self.schema.read_row(&record[self.bytes_for_suffix..])?;

        self.already_read_kmers += 1;
        Ok(Some((kmer, row)))
    }
}

impl Iterator for BinReaderSortedWithLUTForListing {
    type Item = Result<(Kmer, ValueRow)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::archive::ArchiveWriter;
    use crate::db::bin_writer::{BinWriterSortedPlain, BinWriterSortedWithLUT};
    use crate::db::value::{ValueField, ValueScalar};
    use tempfile::tempdir;

    #[test]
    fn sorted_plain_round_trips_and_misses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.kmdb");
        let schema = ValueSchema(vec![ValueField::U32]);

        let kmers: Vec<(&str, u32)> = vec![
            ("AAAAAAAA", 10),
            ("AAAAAAAC", 20),
            ("AAAAAACG", 30),
            ("ACGTACGT", 40),
            ("TTTTTTTT", 50),
        ];
        {
            let mut archive = ArchiveWriter::create(&path).unwrap();
            let mut writer = BinWriterSortedPlain::new(0, 8, schema.clone());
            for (s, v) in &kmers {
                let kmer = Kmer::from_ascii(s).unwrap();
                writer.add_kmer(&kmer, &[ValueScalar::U32(*v)]).unwrap();
            }
            writer.close(&mut archive).unwrap();
            archive.close().unwrap();
        }

        let mut archive = ArchiveReader::open(&path).unwrap();
        let reader = BinReaderSortedPlainForRandomAccess::open(&mut archive, 0, 8, schema).unwrap();

        for (s, v) in &kmers {
            let kmer = Kmer::from_ascii(s).unwrap();
            let row = reader.check_kmer(&kmer).unwrap().unwrap();
            assert_eq!(row[0], ValueScalar::U32(*v));
        }
        let missing = Kmer::from_ascii("GGGGGGGG").unwrap();
        assert!(reader.check_kmer(&missing).unwrap().is_none());
    }

    #[test]
    fn sorted_plain_listing_stays_bounded_and_matches_random_access() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.kmdb");
        let schema = ValueSchema(vec![ValueField::U32]);

        let kmers: Vec<(&str, u32)> = vec![
            ("AAAAAAAA", 10),
            ("AAAAAAAC", 20),
            ("AAAAAACG", 30),
            ("ACGTACGT", 40),
            ("TTTTTTTT", 50),
        ];
        {
            let mut archive = ArchiveWriter::create(&path).unwrap();
            let mut writer = BinWriterSortedPlain::new(0, 8, schema.clone());
            for (s, v) in &kmers {
                let kmer = Kmer::from_ascii(s).unwrap();
                writer.add_kmer(&kmer, &[ValueScalar::U32(*v)]).unwrap();
            }
            writer.close(&mut archive).unwrap();
            archive.close().unwrap();
        }

        let mut listing = BinReaderSortedPlainForListing::open(&path, 0, 8, schema).unwrap();
        let mut listed = Vec::new();
        while let Some((kmer, row)) = listing.next_record().unwrap() {
            listed.push((kmer, row));
        }
        assert_eq!(listed.len(), kmers.len());
        for ((kmer, row), (s, v)) in listed.iter().zip(&kmers) {
            assert_eq!(kmer, &Kmer::from_ascii(s).unwrap());
            assert_eq!(row[0], ValueScalar::U32(*v));
        }
        for w in listed.windows(2) {
            assert!(w[0].0 < w[1].0);
        }
        assert!(listing.next_record().unwrap().is_none());
    }

    #[test]
    fn sorted_with_lut_round_trips_and_misses() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.kmdb");
        let schema = ValueSchema(vec![ValueField::U16]);

        let kmers: Vec<(&str, u16)> = vec![
            ("AAAAAAAA", 1),
            ("AAAAAAAC", 2),
            ("AACCCCCC", 3),
            ("ACGTACGT", 4),
            ("TTTTTTTT", 5),
        ];
        {
            let mut archive = ArchiveWriter::create(&path).unwrap();
            let mut writer = BinWriterSortedWithLUT::new(0, 8, 2, schema.clone());
            for (s, v) in &kmers {
                let kmer = Kmer::from_ascii(s).unwrap();
                writer.add_kmer(&kmer, &[ValueScalar::U16(*v)]).unwrap();
            }
            writer.close(&mut archive).unwrap();
            archive.close().unwrap();
        }

        let mut archive = ArchiveReader::open(&path).unwrap();
        let reader = BinReaderSortedWithLUTForRandomAccess::open(&mut archive, 0, 8, 2, schema).unwrap();

        for (s, v) in &kmers {
            let kmer = Kmer::from_ascii(s).unwrap();
            let row = reader.check_kmer(&kmer).unwrap().unwrap();
            assert_eq!(row[0], ValueScalar::U16(*v));
        }
        let missing = Kmer::from_ascii("GGGGGGGG").unwrap();
        assert!(reader.check_kmer(&missing).unwrap().is_none());
    }

    #[test]
    fn sorted_with_lut_listing_stays_bounded_and_matches_random_access() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.kmdb");
        let schema = ValueSchema(vec![ValueField::U16]);

        let kmers: Vec<(&str, u16)> = vec![
            ("AAAAAAAA", 1),
            ("AAAAAAAC", 2),
            ("AACCCCCC", 3),
            ("ACGTACGT", 4),
            ("TTTTTTTT", 5),
        ];
        {
            let mut archive = ArchiveWriter::create(&path).unwrap();
            let mut writer = BinWriterSortedWithLUT::new(0, 8, 2, schema.clone());
            for (s, v) in &kmers {
                let kmer = Kmer::from_ascii(s).unwrap();
                writer.add_kmer(&kmer, &[ValueScalar::U16(*v)]).unwrap();
            }
            writer.close(&mut archive).unwrap();
            archive.close().unwrap();
        }

        let mut listing = BinReaderSortedWithLUTForListing::open(&path, 0, 8, 2, schema).unwrap();
        let mut listed = Vec::new();
        while let Some((kmer, row)) = listing.next_record().unwrap() {
            listed.push((kmer, row));
        }
        assert_eq!(listed.len(), kmers.len());
        for ((kmer, row), (s, v)) in listed.iter().zip(&kmers) {
            assert_eq!(kmer, &Kmer::from_ascii(s).unwrap());
            assert_eq!(row[0], ValueScalar::U16(*v));
        }
        for w in listed.windows(2) {
            assert!(w[0].0 < w[1].0);
        }
        assert!(listing.next_record().unwrap().is_none());
    }

    #[test]
    fn sorted_with_lut_listing_handles_degenerate_all_in_lut() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.kmdb");
        let schema = ValueSchema(vec![ValueField::U8]);

        {
            let mut archive = ArchiveWriter::create(&path).unwrap();
            let mut writer = BinWriterSortedWithLUT::new(0, 4, 4, schema.clone());
            writer.add_kmer(&Kmer::from_ascii("ACGT").unwrap(), &[ValueScalar::U8(7)]).unwrap();
            writer.add_kmer(&Kmer::from_ascii("TTTT").unwrap(), &[ValueScalar::U8(9)]).unwrap();
            writer.close(&mut archive).unwrap();
            archive.close().unwrap();
        }

        let mut listing = BinReaderSortedWithLUTForListing::open(&path, 0, 4, 4, schema).unwrap();
        let (k1, r1) = listing.next_record().unwrap().unwrap();
        assert_eq!(k1, Kmer::from_ascii("ACGT").unwrap());
        assert_eq!(r1[0], ValueScalar::U8(7));
        let (k2, r2) = listing.next_record().unwrap().unwrap();
        assert_eq!(k2, Kmer::from_ascii("TTTT").unwrap());
        assert_eq!(r2[0], ValueScalar::U8(9));
        assert!(listing.next_record().unwrap().is_none());
    }
}
