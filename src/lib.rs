//! mftexport - Parallel NTFS MFT metadata exporter
//!
//! Reads an extracted `$MFT` dump, reconstructs full paths by walking
//! parent references, and exports one normalized record per name/stream
//! pair to CSV, JSON or bodyfile timelines.
//!
//! # Features
//!
//! - **Path resolution**: parent-chain walking with orphan and cycle
//!   detection, sequence-number validation against reused slots
//! - **Hardlink and ADS aware**: one record per data stream plus one per
//!   additional distinct-parent name
//! - **Parallel export**: the table is partitioned across workers, each
//!   writing an isolated shard, merged in partition order
//! - **Forensic formats**: CSV with a fixed column set, concatenated JSON
//!   objects, TSK 3.0+ bodyfile
//!
//! # Example
//!
//! ```no_run
//! use mftexport::{export_file, ExportConfig};
//! use std::path::Path;
//!
//! fn main() -> mftexport::Result<()> {
//!     let config = ExportConfig::default();
//!     let summary = export_file(
//!         Path::new("MFT.bin"),
//!         Path::new("mft.csv"),
//!         &config,
//!     )?;
//!
//!     println!("{} records written", summary.records_written);
//!     Ok(())
//! }
//! ```

pub mod assemble;
pub mod config;
pub mod dump;
pub mod error;
pub mod export;
pub mod logging;
pub mod ntfs;
pub mod output;
pub mod resolve;
pub mod table;

#[cfg(test)]
mod testutil;

// Re-export main types
pub use assemble::{assemble_entry, EntryFlags, OutputRecord, TimeSet};
pub use config::{parse_timezone, ExportConfig, OutputFormat, DEFAULT_TIME_FORMAT};
pub use dump::dump_resident_stream;
pub use error::{ExportError, Result};
pub use export::{export, export_file, partition_ranges, ExportSummary};
pub use output::{create_sink, OutputSink, CSV_COLUMNS};
pub use resolve::{resolve_path, ORPHAN_SENTINEL, PATH_SEPARATOR, ROOT_INDEX};
pub use table::{MftFile, RecordTable};

// Re-export NTFS types that users might need
pub use ntfs::{Datastream, FileNameAttribute, MftEntry, StandardInformation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
