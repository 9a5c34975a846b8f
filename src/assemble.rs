//! Output record assembly
//!
//! Turns one decoded entry into its output rows: one per data stream (or a
//! single streamless row), plus one per additional hardlink name. Timezone
//! conversion happens here, once per record; rendering is the sink's job.

use crate::config::ExportConfig;
use crate::ntfs::record::{Datastream, MftEntry};
use crate::ntfs::structs::{
    file_attributes, filetime_to_datetime, FileNameAttribute, StandardInformation,
};
use crate::resolve::resolve_path;
use crate::table::RecordTable;
use chrono::{DateTime, FixedOffset};

/// Four timestamps of one attribute, already in the run's timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSet {
    pub created: DateTime<FixedOffset>,
    pub changed: DateTime<FixedOffset>,
    pub mft_change: DateTime<FixedOffset>,
    pub accessed: DateTime<FixedOffset>,
}

impl TimeSet {
    fn from_std_info(si: &StandardInformation, tz: &FixedOffset) -> Self {
        Self {
            created: filetime_to_datetime(si.creation_time).with_timezone(tz),
            changed: filetime_to_datetime(si.modification_time).with_timezone(tz),
            mft_change: filetime_to_datetime(si.mft_modification_time).with_timezone(tz),
            accessed: filetime_to_datetime(si.access_time).with_timezone(tz),
        }
    }

    fn from_name_attr(fn_attr: &FileNameAttribute, tz: &FixedOffset) -> Self {
        Self {
            created: filetime_to_datetime(fn_attr.creation_time).with_timezone(tz),
            changed: filetime_to_datetime(fn_attr.modification_time).with_timezone(tz),
            mft_change: filetime_to_datetime(fn_attr.mft_modification_time).with_timezone(tz),
            accessed: filetime_to_datetime(fn_attr.access_time).with_timezone(tz),
        }
    }
}

/// Boolean flags lifted from standard information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFlags {
    pub readonly: bool,
    pub hidden: bool,
    pub system: bool,
    pub encrypted: bool,
}

impl EntryFlags {
    fn from_bits(bits: u32) -> Self {
        Self {
            readonly: bits & file_attributes::READONLY != 0,
            hidden: bits & file_attributes::HIDDEN != 0,
            system: bits & file_attributes::SYSTEM != 0,
            encrypted: bits & file_attributes::ENCRYPTED != 0,
        }
    }
}

/// One output row, consumed by a sink right after assembly
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub entry_n: u64,
    pub is_deleted: bool,
    pub is_directory: bool,
    pub is_ads: bool,
    pub path: String,
    pub size: u64,
    pub alloc_size: u64,
    /// Standard-information timestamps; absent when the attribute is missing
    pub std_times: Option<TimeSet>,
    /// Name-attribute timestamps, kept distinct from the standard set
    pub fn_times: Option<TimeSet>,
    pub flags: Option<EntryFlags>,
}

/// Assemble every output record for one entry.
///
/// For an entry with `d ≥ 1` data streams and `h` additional
/// distinct-parent names this yields exactly `d + h` records; with no
/// streams, `1 + h`.
pub fn assemble_entry<T: RecordTable>(
    table: &T,
    entry: &MftEntry,
    config: &ExportConfig,
) -> Vec<OutputRecord> {
    // Deleted and nothing left to describe: no information there
    if entry.is_deleted && !entry.has_attributes() {
        return Vec::new();
    }
    // Allocated but missing the basic attributes (an entry that spilled
    // over several records and lost its first one): ignore as well
    if !entry.is_deleted && entry.std_info.is_none() {
        return Vec::new();
    }

    let tz = &config.timezone;
    let std_times = entry.std_info.as_ref().map(|si| TimeSet::from_std_info(si, tz));
    let flags = entry
        .std_info
        .as_ref()
        .map(|si| EntryFlags::from_bits(si.file_attributes));

    let primary = entry.primary_name();
    let primary_times = primary.map(|p| TimeSet::from_name_attr(p, tz));
    let primary_path = primary.map(|p| resolve_path(table, p));

    let base = OutputRecord {
        entry_n: entry.index,
        is_deleted: entry.is_deleted,
        is_directory: entry.is_directory,
        is_ads: false,
        path: String::new(),
        size: 0,
        alloc_size: 0,
        std_times,
        fn_times: primary_times,
        flags,
    };

    let mut records = Vec::new();

    let primary_record = |stream: Option<&Datastream>| {
        let mut record = base.clone();
        match (&primary_path, stream) {
            (Some((_, path)), Some(ds)) => {
                record.path = match &ds.name {
                    // A named stream is an alternate data stream
                    Some(stream_name) => {
                        record.is_ads = true;
                        format!("{}:{}", path, stream_name)
                    }
                    None => path.clone(),
                };
            }
            (Some((_, path)), None) => {
                record.path = path.clone();
            }
            // No name attribute: no path to resolve, stream name or not
            (None, _) => {}
        }
        if let Some(ds) = stream {
            record.size = ds.size;
            record.alloc_size = ds.alloc_size;
        }
        record
    };

    if entry.streams.is_empty() {
        records.push(primary_record(None));
    } else {
        for stream in &entry.streams {
            records.push(primary_record(Some(stream)));
        }
    }

    // Additional names under a different parent are hardlinks; they reuse
    // the entry's main stream but resolve their own path.
    if let Some(primary) = primary {
        let main_stream = entry.main_stream();
        for fn_attr in entry.unique_parent_names() {
            if fn_attr.parent_record_number() == primary.parent_record_number() {
                continue;
            }
            let (_, path) = resolve_path(table, fn_attr);
            let mut record = base.clone();
            record.path = path;
            record.fn_times = Some(TimeSet::from_name_attr(fn_attr, tz));
            if let Some(ds) = main_stream {
                record.size = ds.size;
                record.alloc_size = ds.alloc_size;
            }
            records.push(record);
        }
    }

    records
}
