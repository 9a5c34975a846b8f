//! NTFS record support
//!
//! On-disk structure decoding for MFT records: record header, fixup
//! verification, $STANDARD_INFORMATION, $FILE_NAME and $DATA attributes.

pub mod record;
pub mod structs;

// Re-export commonly used types
pub use record::{Datastream, MftEntry};
pub use structs::{
    filetime_to_datetime, filetime_to_unix, AttributeType, FileNameAttribute, FilenameNamespace,
    MftRecordHeader, StandardInformation,
};
