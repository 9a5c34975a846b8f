//! Partitioned export
//!
//! Splits the record table into contiguous index ranges, runs one worker
//! per range into a private shard file, then merges the shards into the
//! final artifact in partition order. With a single worker the final file
//! is the only shard and everything runs inline. Workers share nothing:
//! each opens its own table view and its own sink.

use crate::assemble::assemble_entry;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::logging;
use crate::output::{create_sink, OutputSink};
use crate::table::{MftFile, RecordTable};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

/// Entries get batched into one progress tick to keep channel traffic low
const PROGRESS_BATCH: u64 = 1024;

/// Totals for one finished export
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSummary {
    /// Entries scanned across all partitions
    pub entries_scanned: u64,
    /// Output records written
    pub records_written: u64,
}

/// Export an MFT dump file to `dest`
pub fn export_file(input: &Path, dest: &Path, config: &ExportConfig) -> Result<ExportSummary> {
    export(|| MftFile::open(input, config.apply_fixup), dest, config)
}

/// Export over any table source. `open_table` is called once up front for
/// the total count and once per worker, so every worker gets its own
/// independent view.
pub fn export<T, F>(open_table: F, dest: &Path, config: &ExportConfig) -> Result<ExportSummary>
where
    T: RecordTable,
    F: Fn() -> Result<T> + Sync,
{
    let table = open_table()?;
    let total = table.entry_count();
    let workers = config.workers.max(1);

    logging::separator("EXPORT START");
    logging::info(
        "EXPORT",
        &format!(
            "{} entries, {} worker(s), format={}",
            total,
            workers,
            config.format
        ),
    );

    let pb = if config.show_progress {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let summary = if workers == 1 {
        // The final file is the only shard; the header goes in first
        let mut sink = create_sink(dest, config)?;
        sink.pre_merge()?;
        let counts = run_partition(&table, 0, total, config, sink.as_mut(), &|n| {
            if let Some(ref pb) = pb {
                pb.inc(n);
            }
        })?;
        sink.close()?;
        counts
    } else {
        drop(table);
        export_partitioned(&open_table, dest, config, total, workers, pb.as_ref())?
    };

    if let Some(ref pb) = pb {
        pb.finish_with_message(format!(
            "{} records from {} entries",
            summary.records_written, summary.entries_scanned
        ));
    }

    logging::info(
        "EXPORT",
        &format!(
            "Export complete: {} records from {} entries",
            summary.records_written, summary.entries_scanned
        ),
    );
    logging::flush();

    Ok(summary)
}

/// Fan out over `workers` partitions, then merge shards in partition order
fn export_partitioned<T, F>(
    open_table: &F,
    dest: &Path,
    config: &ExportConfig,
    total: u64,
    workers: usize,
    pb: Option<&ProgressBar>,
) -> Result<ExportSummary>
where
    T: RecordTable,
    F: Fn() -> Result<T> + Sync,
{
    let ranges = partition_ranges(total, workers);
    let shard_paths = ranges
        .iter()
        .enumerate()
        .map(|(i, _)| shard_path(dest, i))
        .collect::<Result<Vec<_>>>()?;

    let (tx, rx) = crossbeam_channel::unbounded::<u64>();

    let worker_results: Vec<Result<ExportSummary>> = thread::scope(|scope| {
        let handles: Vec<_> = ranges
            .iter()
            .zip(&shard_paths)
            .map(|(&(start, end), path)| {
                let tx = tx.clone();
                scope.spawn(move || -> Result<ExportSummary> {
                    let table = open_table()?;
                    let mut sink = create_sink(path, config)?;
                    // No pre_merge here: shards carry records only
                    let counts =
                        run_partition(&table, start, end, config, sink.as_mut(), &|n| {
                            let _ = tx.send(n);
                        })?;
                    sink.close()?;
                    Ok(counts)
                })
            })
            .collect();
        drop(tx);

        // Drain progress ticks until every worker hangs up
        while let Ok(n) = rx.recv() {
            if let Some(pb) = pb {
                pb.inc(n);
            }
        }

        handles
            .into_iter()
            .enumerate()
            .map(|(i, handle)| {
                handle
                    .join()
                    .map_err(|_| ExportError::WorkerPanic(i))
                    .and_then(|r| r)
            })
            .collect()
    });

    let mut summary = ExportSummary::default();
    for (i, result) in worker_results.into_iter().enumerate() {
        match result {
            Ok(counts) => {
                summary.entries_scanned += counts.entries_scanned;
                summary.records_written += counts.records_written;
            }
            Err(e) => {
                // One failed partition poisons the whole artifact; never
                // merge what the others produced
                logging::error("EXPORT", &format!("Worker {} failed: {}", i, e));
                cleanup_shards(&shard_paths);
                return Err(e);
            }
        }
    }

    if let Err(e) = merge_shards(dest, &shard_paths, config) {
        cleanup_shards(&shard_paths);
        return Err(e);
    }
    cleanup_shards(&shard_paths);

    Ok(summary)
}

/// Scan one index range, assembling and writing every surviving entry
fn run_partition<T: RecordTable>(
    table: &T,
    start: u64,
    end: u64,
    config: &ExportConfig,
    sink: &mut dyn OutputSink,
    progress: &dyn Fn(u64),
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::default();
    let mut pending_ticks = 0u64;

    for (index, result) in table.iter_range(start, end) {
        match result {
            Ok(entry) => {
                for record in assemble_entry(table, &entry, config) {
                    sink.write_record(&record)?;
                    summary.records_written += 1;
                }
            }
            Err(e) if e.is_recoverable() => {
                // Unused slots decode as invalid records; that's normal
                logging::debug("EXPORT", &format!("Skipping record {}: {}", index, e));
            }
            Err(e) => return Err(e),
        }

        summary.entries_scanned += 1;
        pending_ticks += 1;
        if pending_ticks >= PROGRESS_BATCH {
            progress(pending_ticks);
            pending_ticks = 0;
        }
    }
    if pending_ticks > 0 {
        progress(pending_ticks);
    }

    Ok(summary)
}

/// Divide `[0, total)` into `workers` contiguous ranges; the last one
/// absorbs the remainder.
pub fn partition_ranges(total: u64, workers: usize) -> Vec<(u64, u64)> {
    let workers = workers.max(1) as u64;
    let size = total / workers;
    (0..workers)
        .map(|i| {
            let start = i * size;
            let end = if i == workers - 1 { total } else { (i + 1) * size };
            (start, end)
        })
        .collect()
}

/// Pick a shard filename next to the destination.
///
/// The existence check happens immediately before use and is best effort:
/// two concurrent runs can still race to the same name.
// TODO: create the shard with OpenOptions::create_new and hand the handle
// to the sink instead of checking for existence separately.
fn shard_path(dest: &Path, partition: usize) -> Result<PathBuf> {
    let stem = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    for attempt in 0..1000u32 {
        let name = if attempt == 0 {
            format!("{}.shard{}", stem, partition)
        } else {
            format!("{}.shard{}.{}", stem, partition, attempt)
        };
        let candidate = dest.with_file_name(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(ExportError::IoError(io::Error::other(format!(
        "no free shard name for partition {}",
        partition
    ))))
}

/// Write the header through a real sink, then append raw shard bytes in
/// ascending partition order.
fn merge_shards(dest: &Path, shard_paths: &[PathBuf], config: &ExportConfig) -> Result<()> {
    logging::info("EXPORT", &format!("Merging {} shards", shard_paths.len()));

    let mut sink = create_sink(dest, config)?;
    sink.pre_merge()?;
    sink.close()?;
    drop(sink);

    let mut out = OpenOptions::new().append(true).open(dest)?;
    for path in shard_paths {
        let mut shard = File::open(path)?;
        io::copy(&mut shard, &mut out)?;
    }

    Ok(())
}

/// Best-effort shard removal; a leftover shard is a nuisance, not a failure
fn cleanup_shards(shard_paths: &[PathBuf]) {
    for path in shard_paths {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                logging::warn(
                    "EXPORT",
                    &format!("Could not remove shard '{}': {}", path.display(), e),
                );
            }
        }
    }
}
