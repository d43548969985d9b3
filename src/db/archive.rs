//! File-backed archive container (component C4): a single file holding
//! several named streams, each a sequence of byte parts, with a footer
//! recorded at the very end so parts can be written as a pure append
//! without knowing the final layout up front.
//!
//! This is a reduced, synchronous, single-writer-until-close subset of
//! the named-stream/part/footer contract: good enough to carry a
//! database's bins, metadata, sample names and history, not a general
//! archive format.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{ensure, Result};
use fxhash::FxHashMap;

use super::error::DbError;
use super::serialization::{read_string, read_u64, read_u64_array, write_string, write_u64, write_u64_array};

/// Wrap a raw I/O failure as a [`DbError::ArchiveIoError`] so callers can
/// `downcast_ref` on it instead of matching on `io::Error` kinds.
fn io_err(context: &str, e: std::io::Error) -> anyhow::Error {
    DbError::ArchiveIoError(format!("{context}: {e}")).into()
}

#[derive(Clone, Debug, Default)]
struct StreamEntry {
    name: String,
    metadata: Vec<u8>,
    parts: Vec<(u64, u64)>,
}

/// A stream's position for the sequential/windowed reads the listing
/// readers use, as opposed to the random-access-by-index `get_part`.
#[derive(Clone, Copy, Debug, Default)]
struct StreamCursor {
    part_idx: usize,
    offset_in_part: u64,
}

/// Append-only writer: streams are registered up front (or on first use),
/// parts are appended in whatever order the caller likes, and `close`
/// freezes the stream table into a footer at the end of the file.
pub struct ArchiveWriter {
    file: BufWriter<File>,
    streams: Vec<StreamEntry>,
    name_to_id: FxHashMap<String, usize>,
    cursor: u64,
    closed: bool,
}

impl ArchiveWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<ArchiveWriter> {
        let file = File::create(path.as_ref())
            .map_err(|e| io_err(&format!("creating archive {:?}", path.as_ref()), e))?;
        Ok(ArchiveWriter {
            file: BufWriter::new(file),
            streams: Vec::new(),
            name_to_id: FxHashMap::default(),
            cursor: 0,
            closed: false,
        })
    }

    /// Register a named stream, or return its existing id if already
    /// registered.
    pub fn register_stream(&mut self, name: &str) -> usize {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.streams.len();
        self.streams.push(StreamEntry {
            name: name.to_string(),
            metadata: Vec::new(),
            parts: Vec::new(),
        });
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    pub fn set_stream_metadata(&mut self, stream_id: usize, metadata: Vec<u8>) {
        self.streams[stream_id].metadata = metadata;
    }

    /// Append one part to `stream_id`, at the file's current write
    /// cursor.
    pub fn add_part(&mut self, stream_id: usize, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes).map_err(|e| io_err("writing archive part", e))?;
        self.streams[stream_id].parts.push((self.cursor, bytes.len() as u64));
        self.cursor += bytes.len() as u64;
        Ok(())
    }

    pub fn no_parts(&self, stream_id: usize) -> usize {
        self.streams[stream_id].parts.len()
    }

    /// Flush remaining buffered data, write the footer, and consume the
    /// writer. Must be called for the archive to be readable; a writer
    /// dropped without `close` leaves a truncated, unreadable file.
    pub fn close(mut self) -> Result<()> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let footer = self.serialize_footer();
        self.file.write_all(&footer).map_err(|e| io_err("writing archive footer", e))?;
        write_u64_for_trailer(&mut self.file, footer.len() as u64)?;
        self.file.flush().map_err(|e| io_err("flushing archive", e))?;
        self.closed = true;
        Ok(())
    }

    fn serialize_footer(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u64(&mut out, self.streams.len() as u64);
        for stream in &self.streams {
            write_string(&mut out, &stream.name);
            write_u64(&mut out, stream.metadata.len() as u64);
            out.extend_from_slice(&stream.metadata);
            write_u64(&mut out, stream.parts.len() as u64);
            let flat: Vec<u64> = stream
                .parts
                .iter()
                .flat_map(|&(offset, len)| [offset, len])
                .collect();
            write_u64_array(&mut out, &flat);
        }
        out
    }
}

fn write_u64_for_trailer(w: &mut impl Write, value: u64) -> Result<()> {
    w.write_all(&value.to_le_bytes()).map_err(|e| io_err("writing archive trailer", e))?;
    Ok(())
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        let _ = self.close_impl();
    }
}

/// Random-access reader: opens the file, parses the footer from its
/// tail, and serves parts by stream name/index on demand via
/// seek-and-read (no memory mapping).
pub struct ArchiveReader {
    file: File,
    streams: Vec<StreamEntry>,
    name_to_id: FxHashMap<String, usize>,
    cursors: Vec<StreamCursor>,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<ArchiveReader> {
        let mut file =
            File::open(path.as_ref()).map_err(|e| io_err(&format!("opening archive {:?}", path.as_ref()), e))?;
        let file_len = file.metadata().map_err(|e| io_err("statting archive", e))?.len();
        ensure!(file_len >= 8, "archive file is too small to contain a footer");

        file.seek(SeekFrom::End(-8)).map_err(|e| io_err("seeking to archive trailer", e))?;
        let mut trailer = [0u8; 8];
        file.read_exact(&mut trailer).map_err(|e| io_err("reading archive trailer", e))?;
        let footer_len = u64::from_le_bytes(trailer);
        ensure!(
            footer_len + 8 <= file_len,
            "archive footer size {footer_len} is inconsistent with file length {file_len}"
        );

        file.seek(SeekFrom::End(-8 - footer_len as i64))
            .map_err(|e| io_err("seeking to archive footer", e))?;
        let mut footer_bytes = vec![0u8; footer_len as usize];
        file.read_exact(&mut footer_bytes).map_err(|e| io_err("reading archive footer", e))?;

        let (streams, name_to_id) = parse_footer(&footer_bytes)?;
        let cursors = vec![StreamCursor::default(); streams.len()];
        Ok(ArchiveReader {
            file,
            streams,
            name_to_id,
            cursors,
        })
    }

    pub fn get_stream_id(&self, name: &str) -> Option<usize> {
        self.name_to_id.get(name).copied()
    }

    pub fn no_parts(&self, stream_id: usize) -> usize {
        self.streams[stream_id].parts.len()
    }

    pub fn stream_metadata(&self, stream_id: usize) -> &[u8] {
        &self.streams[stream_id].metadata
    }

    /// Read one whole part, chosen by index (random access).
    pub fn get_part(&mut self, stream_id: usize, part_idx: usize) -> Result<Vec<u8>> {
        let (offset, len) = self.streams[stream_id].parts[part_idx];
        self.file.seek(SeekFrom::Start(offset)).map_err(|e| io_err("seeking to archive part", e))?;
        let mut buf = vec![0u8; len as usize];
        self.file.read_exact(&mut buf).map_err(|e| io_err("reading archive part", e))?;
        Ok(buf)
    }

    /// Read `len` bytes starting at `byte_offset` within one part,
    /// without materializing the whole part.
    pub fn get_sub_part(
        &mut self,
        stream_id: usize,
        part_idx: usize,
        byte_offset: u64,
        len: u64,
    ) -> Result<Vec<u8>> {
        let (offset, part_len) = self.streams[stream_id].parts[part_idx];
        ensure!(
            byte_offset + len <= part_len,
            "sub-part window [{byte_offset}, {}) exceeds part length {part_len}",
            byte_offset + len
        );
        self.file.seek(SeekFrom::Start(offset + byte_offset)).map_err(|e| io_err("seeking to archive sub-part", e))?;
        let mut buf = vec![0u8; len as usize];
        self.file.read_exact(&mut buf).map_err(|e| io_err("reading archive sub-part", e))?;
        Ok(buf)
    }

    /// Concatenate every part of a stream (used for the single-part
    /// metadata/LUT streams, and for multi-part captured-text streams).
    pub fn get_concatenated(&mut self, stream_id: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for idx in 0..self.no_parts(stream_id) {
            out.extend(self.get_part(stream_id, idx)?);
        }
        Ok(out)
    }

    /// Reset a stream's sequential read cursor back to its first part.
    pub fn rewind(&mut self, stream_id: usize) {
        self.cursors[stream_id] = StreamCursor::default();
    }

    /// Read the next whole part in sequence, or `None` once every part
    /// of the stream has been consumed. Advances the stream's cursor;
    /// unlike [`Self::get_part`], the caller never names a part index.
    pub fn get_part_sequential(&mut self, stream_id: usize) -> Result<Option<Vec<u8>>> {
        let cursor = self.cursors[stream_id];
        if cursor.part_idx >= self.streams[stream_id].parts.len() {
            return Ok(None);
        }
        let bytes = self.get_part(stream_id, cursor.part_idx)?;
        self.cursors[stream_id] = StreamCursor {
            part_idx: cursor.part_idx + 1,
            offset_in_part: 0,
        };
        Ok(Some(bytes))
    }

    /// Read up to `max_size` bytes from wherever the stream's cursor
    /// currently sits, never crossing a part boundary in a single call,
    /// or `None` once every part is exhausted. This is the primitive the
    /// listing readers build their bounded-memory sliding window on top
    /// of: each call only materializes the bytes it returns, regardless
    /// of how large the stream as a whole is.
    pub fn get_sub_part_sequential(&mut self, stream_id: usize, max_size: usize) -> Result<Option<Vec<u8>>> {
        loop {
            let cursor = self.cursors[stream_id];
            let parts = &self.streams[stream_id].parts;
            if cursor.part_idx >= parts.len() {
                return Ok(None);
            }
            let (_, part_len) = parts[cursor.part_idx];
            let remaining = part_len - cursor.offset_in_part;
            if remaining == 0 {
                self.cursors[stream_id] = StreamCursor {
                    part_idx: cursor.part_idx + 1,
                    offset_in_part: 0,
                };
                continue;
            }
            let take = remaining.min(max_size as u64);
            let buf = self.get_sub_part(stream_id, cursor.part_idx, cursor.offset_in_part, take)?;
            self.cursors[stream_id] = StreamCursor {
                part_idx: cursor.part_idx,
                offset_in_part: cursor.offset_in_part + take,
            };
            return Ok(Some(buf));
        }
    }
}

fn parse_footer(buf: &[u8]) -> Result<(Vec<StreamEntry>, FxHashMap<String, usize>)> {
    let mut pos = 0;
    let n_streams = read_u64(buf, &mut pos).context("reading stream count")? as usize;
    let mut streams = Vec::with_capacity(n_streams);
    let mut name_to_id = FxHashMap::default();

    for id in 0..n_streams {
        let name = read_string(buf, &mut pos)?;
        let metadata_len = read_u64(buf, &mut pos)? as usize;
        ensure!(pos + metadata_len <= buf.len(), "truncated stream metadata for {name:?}");
        let metadata = buf[pos..pos + metadata_len].to_vec();
        pos += metadata_len;

        let n_parts = read_u64(buf, &mut pos)? as usize;
        let flat = read_u64_array(buf, &mut pos, n_parts * 2)?;
        let parts = flat.chunks_exact(2).map(|c| (c[0], c[1])).collect();

        name_to_id.insert(name.clone(), id);
        streams.push(StreamEntry { name, metadata, parts });
    }
    Ok((streams, name_to_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_multiple_streams_and_parts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.kmdb");

        let mut writer = ArchiveWriter::create(&path).unwrap();
        let metadata_stream = writer.register_stream("metadata");
        let bin_stream = writer.register_stream("bin.0");

        writer.add_part(metadata_stream, b"hello metadata").unwrap();
        writer.add_part(bin_stream, b"first part").unwrap();
        writer.add_part(bin_stream, b"second part, longer").unwrap();
        writer.set_stream_metadata(bin_stream, vec![1, 2, 3]);
        writer.close().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let metadata_id = reader.get_stream_id("metadata").unwrap();
        let bin_id = reader.get_stream_id("bin.0").unwrap();
        assert_eq!(reader.get_stream_id("missing"), None);

        assert_eq!(reader.get_part(metadata_id, 0).unwrap(), b"hello metadata");
        assert_eq!(reader.no_parts(bin_id), 2);
        assert_eq!(reader.get_part(bin_id, 0).unwrap(), b"first part");
        assert_eq!(reader.get_part(bin_id, 1).unwrap(), b"second part, longer");
        assert_eq!(reader.stream_metadata(bin_id), &[1, 2, 3]);

        let sub = reader.get_sub_part(bin_id, 1, 7, 4).unwrap();
        assert_eq!(sub, b"art,");
    }

    #[test]
    fn rejects_part_window_past_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.kmdb");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let s = writer.register_stream("s");
        writer.add_part(s, b"0123456789").unwrap();
        writer.close().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let s = reader.get_stream_id("s").unwrap();
        assert!(reader.get_sub_part(s, 0, 5, 10).is_err());
    }

    #[test]
    fn sequential_get_part_walks_every_part_then_stops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.kmdb");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let s = writer.register_stream("s");
        writer.add_part(s, b"first").unwrap();
        writer.add_part(s, b"second").unwrap();
        writer.close().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let s = reader.get_stream_id("s").unwrap();
        assert_eq!(reader.get_part_sequential(s).unwrap().unwrap(), b"first");
        assert_eq!(reader.get_part_sequential(s).unwrap().unwrap(), b"second");
        assert!(reader.get_part_sequential(s).unwrap().is_none());
        assert!(reader.get_part_sequential(s).unwrap().is_none());

        reader.rewind(s);
        assert_eq!(reader.get_part_sequential(s).unwrap().unwrap(), b"first");
    }

    #[test]
    fn sequential_sub_part_windows_stay_bounded_and_cross_parts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.kmdb");
        let mut writer = ArchiveWriter::create(&path).unwrap();
        let s = writer.register_stream("s");
        writer.add_part(s, b"0123456789").unwrap();
        writer.add_part(s, b"abcde").unwrap();
        writer.close().unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let s = reader.get_stream_id("s").unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = reader.get_sub_part_sequential(s, 4).unwrap() {
            assert!(chunk.len() <= 4);
            collected.extend(chunk);
        }
        assert_eq!(collected, b"0123456789abcde");
    }

    #[test]
    fn open_missing_file_reports_archive_io_error() {
        let err = ArchiveReader::open("/nonexistent/path/does/not/exist.kmdb").unwrap_err();
        assert!(matches!(err.downcast_ref::<DbError>(), Some(DbError::ArchiveIoError(_))));
    }
}
