//! Format-polymorphic output sinks
//!
//! A sink is bound to one destination file and knows how to append one
//! record and how to emit its once-only header. `pre_merge` runs exactly
//! once, on the final destination, right before shard bytes are
//! concatenated into it; per-shard sinks never call it. Handles are
//! buffered writers released on drop, so every exit path closes the file.

use crate::assemble::{OutputRecord, TimeSet};
use crate::config::{ExportConfig, OutputFormat};
use crate::error::Result;
use chrono::{DateTime, FixedOffset};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// CSV column order, fixed
pub const CSV_COLUMNS: [&str; 19] = [
    "entry_n",
    "is_deleted",
    "is_directory",
    "is_ads",
    "path",
    "size",
    "alloc_size",
    "std_created",
    "std_changed",
    "std_mft_change",
    "std_accessed",
    "fn_created",
    "fn_changed",
    "fn_mft_change",
    "fn_accessed",
    "readonly",
    "hidden",
    "system",
    "encrypted",
];

/// Capability interface every output format implements
pub trait OutputSink {
    /// Append one formatted record
    fn write_record(&mut self, record: &OutputRecord) -> Result<()>;

    /// Emit the once-only header, if the format has one
    fn pre_merge(&mut self) -> Result<()>;

    /// Flush buffered bytes to the file
    fn close(&mut self) -> Result<()>;
}

/// Open a sink of the configured format over `path`
pub fn create_sink(path: &Path, config: &ExportConfig) -> Result<Box<dyn OutputSink>> {
    let writer = BufWriter::new(File::create(path)?);
    Ok(match config.format {
        OutputFormat::Csv => Box::new(CsvSink::new(writer, config.time_format.clone())),
        OutputFormat::Json => Box::new(JsonSink::new(writer, config.time_format.clone())),
        OutputFormat::Bodyfile => Box::new(BodyfileSink::new(writer, config.use_fn)),
    })
}

// ============================================================================
// CSV
// ============================================================================

pub struct CsvSink<W: Write> {
    writer: W,
    time_format: String,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, time_format: String) -> Self {
        Self { writer, time_format }
    }

    fn time_cell(&self, times: &Option<TimeSet>, pick: fn(&TimeSet) -> DateTime<FixedOffset>) -> String {
        match times {
            Some(set) => pick(set).format(&self.time_format).to_string(),
            None => String::new(),
        }
    }
}

/// Quote a CSV field when it contains the delimiter, a quote or a newline
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn flag_cell(value: Option<bool>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

impl<W: Write> OutputSink for CsvSink<W> {
    fn write_record(&mut self, record: &OutputRecord) -> Result<()> {
        let cells = [
            record.entry_n.to_string(),
            record.is_deleted.to_string(),
            record.is_directory.to_string(),
            record.is_ads.to_string(),
            csv_escape(&record.path),
            record.size.to_string(),
            record.alloc_size.to_string(),
            csv_escape(&self.time_cell(&record.std_times, |t| t.created)),
            csv_escape(&self.time_cell(&record.std_times, |t| t.changed)),
            csv_escape(&self.time_cell(&record.std_times, |t| t.mft_change)),
            csv_escape(&self.time_cell(&record.std_times, |t| t.accessed)),
            csv_escape(&self.time_cell(&record.fn_times, |t| t.created)),
            csv_escape(&self.time_cell(&record.fn_times, |t| t.changed)),
            csv_escape(&self.time_cell(&record.fn_times, |t| t.mft_change)),
            csv_escape(&self.time_cell(&record.fn_times, |t| t.accessed)),
            flag_cell(record.flags.map(|f| f.readonly)),
            flag_cell(record.flags.map(|f| f.hidden)),
            flag_cell(record.flags.map(|f| f.system)),
            flag_cell(record.flags.map(|f| f.encrypted)),
        ];
        writeln!(self.writer, "{}", cells.join(","))?;
        Ok(())
    }

    fn pre_merge(&mut self) -> Result<()> {
        writeln!(self.writer, "{}", CSV_COLUMNS.join(","))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Writes one JSON object per record, concatenated back to back: no
/// enclosing array and no separators. Consumers must split on object
/// boundaries themselves; this is the artifact's documented shape, not
/// something to silently change.
pub struct JsonSink<W: Write> {
    writer: W,
    time_format: String,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W, time_format: String) -> Self {
        Self { writer, time_format }
    }

    fn time_value(
        &self,
        times: &Option<TimeSet>,
        pick: fn(&TimeSet) -> DateTime<FixedOffset>,
    ) -> serde_json::Value {
        match times {
            Some(set) => {
                serde_json::Value::String(pick(set).format(&self.time_format).to_string())
            }
            None => serde_json::Value::Null,
        }
    }
}

impl<W: Write> OutputSink for JsonSink<W> {
    fn write_record(&mut self, record: &OutputRecord) -> Result<()> {
        let value = serde_json::json!({
            "entry_n": record.entry_n,
            "is_deleted": record.is_deleted,
            "is_directory": record.is_directory,
            "is_ads": record.is_ads,
            "path": record.path,
            "size": record.size,
            "alloc_size": record.alloc_size,
            "std_created": self.time_value(&record.std_times, |t| t.created),
            "std_changed": self.time_value(&record.std_times, |t| t.changed),
            "std_mft_change": self.time_value(&record.std_times, |t| t.mft_change),
            "std_accessed": self.time_value(&record.std_times, |t| t.accessed),
            "fn_created": self.time_value(&record.fn_times, |t| t.created),
            "fn_changed": self.time_value(&record.fn_times, |t| t.changed),
            "fn_mft_change": self.time_value(&record.fn_times, |t| t.mft_change),
            "fn_accessed": self.time_value(&record.fn_times, |t| t.accessed),
            "readonly": record.flags.map(|f| f.readonly),
            "hidden": record.flags.map(|f| f.hidden),
            "system": record.flags.map(|f| f.system),
            "encrypted": record.flags.map(|f| f.encrypted),
        });
        serde_json::to_writer(&mut self.writer, &value)
            .map_err(|e| std::io::Error::other(e))?;
        Ok(())
    }

    fn pre_merge(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Bodyfile
// ============================================================================

/// TSK 3.0+ bodyfile: `MD5|name|inode|mode_as_string|UID|GID|size|atime|
/// mtime|ctime|crtime`, one record per line, pipe-delimited, no quoting.
/// MD5, mode, UID and GID are not computed and stay `0`. Timestamps are
/// Unix epoch seconds; values before 1970 are written as 0, never negative.
pub struct BodyfileSink<W: Write> {
    writer: W,
    use_fn: bool,
}

impl<W: Write> BodyfileSink<W> {
    pub fn new(writer: W, use_fn: bool) -> Self {
        Self { writer, use_fn }
    }
}

fn epoch_or_zero(times: &Option<TimeSet>, pick: fn(&TimeSet) -> DateTime<FixedOffset>) -> i64 {
    match times {
        Some(set) => pick(set).timestamp().max(0),
        None => 0,
    }
}

impl<W: Write> OutputSink for BodyfileSink<W> {
    fn write_record(&mut self, record: &OutputRecord) -> Result<()> {
        let times = if self.use_fn {
            &record.fn_times
        } else {
            &record.std_times
        };
        writeln!(
            self.writer,
            "0|{}|{}|0|0|0|{}|{}|{}|{}|{}",
            record.path,
            record.entry_n,
            record.size,
            epoch_or_zero(times, |t| t.accessed),
            epoch_or_zero(times, |t| t.changed),
            epoch_or_zero(times, |t| t.mft_change),
            epoch_or_zero(times, |t| t.created),
        )?;
        Ok(())
    }

    fn pre_merge(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
