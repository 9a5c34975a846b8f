//! Error types for mftexport
//!
//! One enum covers every failure class; `is_recoverable` separates
//! per-record decode problems (skip and keep scanning) from structural
//! failures that abort the export.

use thiserror::Error;

/// Main error type for mftexport operations
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to open MFT file '{0}': {1}")]
    InputOpenError(String, std::io::Error),

    #[error("MFT file is too small to hold a single record ({0} bytes)")]
    InputTooSmall(u64),

    #[error("Entry {index} is out of range (table holds {count} entries)")]
    EntryOutOfRange { index: u64, count: u64 },

    #[error("Invalid MFT record at index {0}: {1}")]
    InvalidRecord(u64, String),

    #[error("MFT fixup verification failed at record {0}")]
    FixupMismatch(u64),

    #[error("Invalid attribute at offset {0}: {1}")]
    InvalidAttribute(u32, String),

    #[error("Entry {0} has no data stream")]
    NoDataStream(u64),

    #[error("Entry {0} is not resident. Can't be dumped.")]
    NonResidentStream(u64),

    #[error("Invalid timezone '{0}': expected 'UTC' or a fixed offset like '+02:00'")]
    InvalidTimezone(String),

    #[error("Worker for partition {0} panicked")]
    WorkerPanic(usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for mftexport operations
pub type Result<T> = std::result::Result<T, ExportError>;

impl ExportError {
    /// Check if this error is recoverable (the range scan can continue)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidRecord(_, _)
                | ExportError::FixupMismatch(_)
                | ExportError::InvalidAttribute(_, _)
                | ExportError::EntryOutOfRange { .. }
        )
    }
}
