//! MFT record table
//!
//! [`RecordTable`] is the lookup surface the pipeline runs against:
//! total count, entry by index, lazy range iteration. [`MftFile`] is the
//! file-backed implementation over a memory-mapped `$MFT` dump. Every
//! worker opens its own `MftFile`; views share nothing mutable.

use crate::error::{ExportError, Result};
use crate::logging;
use crate::ntfs::record::{parse_record, MftEntry};
use crate::ntfs::structs::{MftRecordHeader, DEFAULT_MFT_RECORD_SIZE};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Lookup interface over a table of MFT entries
pub trait RecordTable {
    /// Total number of record slots in the table
    fn entry_count(&self) -> u64;

    /// Decode the entry at `index`
    fn entry(&self, index: u64) -> Result<MftEntry>;

    /// Lazily iterate the half-open index range `[start, end)`
    fn iter_range(&self, start: u64, end: u64) -> RangeIter<'_, Self>
    where
        Self: Sized,
    {
        RangeIter {
            table: self,
            next: start,
            end: end.min(self.entry_count()),
        }
    }
}

/// One-shot iterator over a contiguous index range
pub struct RangeIter<'a, T: RecordTable> {
    table: &'a T,
    next: u64,
    end: u64,
}

impl<T: RecordTable> Iterator for RangeIter<'_, T> {
    type Item = (u64, Result<MftEntry>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some((index, self.table.entry(index)))
    }
}

/// Memory-mapped `$MFT` dump file
pub struct MftFile {
    mmap: Mmap,
    record_size: usize,
    count: u64,
    apply_fixup: bool,
}

impl MftFile {
    /// Open an MFT dump. `apply_fixup` should be disabled only for records
    /// carved from memory, where sector tails were never swapped out.
    pub fn open(path: &Path, apply_fixup: bool) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ExportError::InputOpenError(path.display().to_string(), e))?;
        // Safety: the mapping is read-only and the dump is not expected to
        // change underneath a run.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| ExportError::InputOpenError(path.display().to_string(), e))?;

        if mmap.len() < 48 {
            return Err(ExportError::InputTooSmall(mmap.len() as u64));
        }

        let record_size = detect_record_size(&mmap);
        let count = (mmap.len() / record_size) as u64;
        if mmap.len() % record_size != 0 {
            logging::warn(
                "TABLE",
                &format!(
                    "File size {} is not a multiple of the record size {}, trailing bytes ignored",
                    mmap.len(),
                    record_size
                ),
            );
        }

        logging::info(
            "TABLE",
            &format!(
                "Opened '{}': {} records of {} bytes",
                path.display(),
                count,
                record_size
            ),
        );

        Ok(Self {
            mmap,
            record_size,
            count,
            apply_fixup,
        })
    }

    /// Record size in bytes, autodetected from record 0
    pub fn record_size(&self) -> usize {
        self.record_size
    }
}

impl RecordTable for MftFile {
    fn entry_count(&self) -> u64 {
        self.count
    }

    fn entry(&self, index: u64) -> Result<MftEntry> {
        if index >= self.count {
            return Err(ExportError::EntryOutOfRange {
                index,
                count: self.count,
            });
        }

        let offset = index as usize * self.record_size;
        // Fixup application mutates the buffer, so each decode works on a
        // private copy of the record.
        let mut buf = self.mmap[offset..offset + self.record_size].to_vec();
        parse_record(index, &mut buf, self.apply_fixup)
    }
}

/// Read the record size from record 0's allocated-size field. A dump has no
/// boot sector to consult; fall back to the common 1024 when the first
/// record doesn't decode.
fn detect_record_size(data: &[u8]) -> usize {
    if let Some(header) = MftRecordHeader::from_bytes(data) {
        if header.is_valid() {
            let size = header.allocated_size;
            if size.is_power_of_two() && (256..=65536).contains(&size) {
                return size as usize;
            }
        }
    }
    DEFAULT_MFT_RECORD_SIZE as usize
}
