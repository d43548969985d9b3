//! Top-level database writer (component C9): owns the archive, routes
//! each incoming k-mer to its bin via [`crate::db::bin_id::get_bin_id`],
//! and on close serializes metadata, sample names and the history
//! record that make the file self-describing.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, ensure, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use super::archive::ArchiveWriter;
use super::bin_id::get_bin_id;
use super::bin_writer::{BinWriterSortedPlain, BinWriterSortedWithLUT};
use super::history::HistoryItem;
use super::kmer::Kmer;
use super::metadata::{Config, ConfigSortedPlain, KmersRepresentation, Metadata};
use super::serialization::write_string;
use super::value::ValueScalar;

const SAMPLE_NAMES_STREAM: &str = "samples_names";
const METADATA_STREAM: &str = "metadata";
const HISTORY_STREAM: &str = "history";

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn peak_rss_bytes() -> u64 {
    // Best-effort: /proc is the only portable-enough source without a
    // platform crate; anywhere else this just reports zero.
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status.lines().find_map(|line| {
                line.strip_prefix("VmHWM:")
                    .and_then(|rest| rest.trim().split_whitespace().next())
                    .and_then(|kb| kb.parse::<u64>().ok())
                    .map(|kb| kb * 1024)
            })
        })
        .unwrap_or(0)
}

fn system_info_summary() -> String {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    format!(
        "{{\"os\":\"{}\",\"arch\":\"{}\",\"logical_cores\":{}}}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        cores
    )
}

fn command_line_summary() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

enum BinWriterKind {
    SortedPlain(BinWriterSortedPlain),
    SortedWithLUT(BinWriterSortedWithLUT),
}

impl BinWriterKind {
    fn add_kmer(&mut self, kmer: &Kmer, values: &[ValueScalar]) -> Result<()> {
        match self {
            BinWriterKind::SortedPlain(b) => b.add_kmer(kmer, values),
            BinWriterKind::SortedWithLUT(b) => b.add_kmer(kmer, values),
        }
    }

    fn close(self, archive: &mut ArchiveWriter) -> Result<()> {
        match self {
            BinWriterKind::SortedPlain(b) => b.close(archive),
            BinWriterKind::SortedWithLUT(b) => b.close(archive),
        }
    }
}

/// Builds a new k-mer database file bin by bin, then seals it with
/// metadata, sample names, and a provenance record.
pub struct DatabaseWriter {
    archive: Option<ArchiveWriter>,
    config: Config,
    bins: Vec<BinWriterKind>,
    history: HistoryItem,
    closed: bool,
}

impl DatabaseWriter {
    /// `sample_names`, if non-empty, must have exactly `config.num_samples`
    /// entries.
    pub fn create(
        path: impl AsRef<std::path::Path>,
        config: Config,
        sample_names: &[String],
    ) -> Result<DatabaseWriter> {
        ensure!(
            sample_names.is_empty() || sample_names.len() as u64 == config.num_samples,
            "sample_names must be empty or have exactly {} entries, got {}",
            config.num_samples,
            sample_names.len()
        );

        let mut archive = ArchiveWriter::create(path).context("creating database archive")?;

        if !sample_names.is_empty() {
            let stream_id = archive.register_stream(SAMPLE_NAMES_STREAM);
            let mut buf = Vec::new();
            for name in sample_names {
                write_string(&mut buf, name);
            }
            archive.add_part(stream_id, &buf)?;
        }

        let schema = config.value_schema();
        let mut bins = Vec::with_capacity(config.num_bins as usize);
        for bin_id in 0..config.num_bins {
            let bin = match &config.kmers_representation {
                KmersRepresentation::SortedPlain(_) => {
                    BinWriterKind::SortedPlain(BinWriterSortedPlain::new(bin_id, config.kmer_len, schema.clone()))
                }
                KmersRepresentation::SortedWithLUT(c) => BinWriterKind::SortedWithLUT(
                    BinWriterSortedWithLUT::new(bin_id, config.kmer_len, c.lut_prefix_len, schema.clone()),
                ),
            };
            bins.push(bin);
        }

        let history = HistoryItem {
            open_time: now_millis(),
            command_line: command_line_summary(),
            system_info: system_info_summary(),
            ..Default::default()
        };

        Ok(DatabaseWriter {
            archive: Some(archive),
            config,
            bins,
            history,
            closed: false,
        })
    }

    pub fn num_bins(&self) -> u64 {
        self.config.num_bins
    }

    /// Append free-form text to this write's provenance record.
    pub fn append_additional_info(&mut self, info: &str) {
        self.history.info.push_str(info);
    }

    /// Route one k-mer to its bin by signature. Per bin, k-mers must
    /// arrive in strictly ascending order.
    pub fn add_kmer(&mut self, kmer: &Kmer, values: &[ValueScalar]) -> Result<()> {
        ensure!(!self.closed, "cannot add a k-mer after the database writer is closed");
        let bin_id = get_bin_id(
            kmer,
            self.config.kmer_len,
            self.config.signature_len,
            self.config.num_bins,
            self.config.signature_selection_scheme,
            self.config.signature_to_bin_mapping,
        );
        self.bins[bin_id as usize].add_kmer(kmer, values)
    }

    /// Ingest an already-sorted sequence of `(kmer, values)` pairs,
    /// reporting progress on a terminal if `show_progress` is set.
    pub fn ingest_sorted<I>(&mut self, items: I, show_progress: bool) -> Result<()>
    where
        I: IntoIterator<Item = (Kmer, Vec<ValueScalar>)>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = items.into_iter();
        let progress = if show_progress {
            let bar = ProgressBar::new(iter.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} k-mers ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(bar)
        } else {
            None
        };

        for (kmer, values) in iter {
            self.add_kmer(&kmer, &values)?;
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
        Ok(())
    }

    /// Flush every bin, write metadata and the history record, and seal
    /// the archive. Idempotent; a writer dropped without an explicit
    /// `close` does this automatically, swallowing any error.
    pub fn close(mut self) -> Result<()> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let Some(mut archive) = self.archive.take() else {
            return Ok(());
        };

        for bin in std::mem::take(&mut self.bins) {
            bin.close(&mut archive)?;
        }

        let metadata = Metadata::new(self.config.clone());
        let metadata_stream = archive.register_stream(METADATA_STREAM);
        archive.add_part(metadata_stream, &metadata.serialize())?;

        self.history.close_time = now_millis();
        self.history.mem_peak_bytes = peak_rss_bytes();
        let history_stream = archive.register_stream(HISTORY_STREAM);
        archive.add_part(history_stream, &self.history.serialize())?;

        archive.close()
    }
}

impl Drop for DatabaseWriter {
    fn drop(&mut self) {
        let _ = self.close_impl();
    }
}

#[allow(dead_code)]
fn default_sorted_plain_config(kmer_len: u64, num_bins: u64, signature_len: u32, value_types: Vec<super::value::ValueField>) -> Config {
    Config {
        kmer_len,
        num_samples: value_types.len() as u64,
        num_bins,
        signature_len,
        signature_selection_scheme: super::metadata::SignatureSelectionScheme::MinHash,
        signature_to_bin_mapping: super::metadata::SignatureToBinMapping::Modulo,
        value_types,
        kmers_representation: KmersRepresentation::SortedPlain(ConfigSortedPlain),
    }
}
