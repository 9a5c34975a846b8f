//! Synthetic MFT records and in-memory tables for tests

use crate::error::{ExportError, Result};
use crate::ntfs::record::MftEntry;
use crate::ntfs::structs::*;
use crate::table::RecordTable;
use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

// ============================================================================
// In-memory table
// ============================================================================

/// In-memory [`RecordTable`] backed by a map; absent slots fail lookup the
/// way an undecodable record would.
#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub entries: HashMap<u64, MftEntry>,
    pub count: u64,
}

impl FakeTable {
    pub fn with_count(count: u64) -> Self {
        Self {
            entries: HashMap::new(),
            count,
        }
    }

    pub fn insert(&mut self, entry: MftEntry) {
        self.count = self.count.max(entry.index + 1);
        self.entries.insert(entry.index, entry);
    }
}

impl RecordTable for FakeTable {
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
        self.entries
            .get(&index)
            .cloned()
            .ok_or_else(|| ExportError::InvalidRecord(index, "Invalid signature".to_string()))
    }
}

/// Table wrapper that injects a fatal error at one index
pub struct FailingTable {
    inner: FakeTable,
    fail_at: u64,
}

impl FailingTable {
    pub fn new(inner: FakeTable, fail_at: u64) -> Self {
        Self { inner, fail_at }
    }
}

impl RecordTable for FailingTable {
    fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    fn entry(&self, index: u64) -> Result<MftEntry> {
        if index == self.fail_at {
            return Err(ExportError::IoError(std::io::Error::other(
                "injected failure",
            )));
        }
        self.inner.entry(index)
    }
}

/// A Win32 name attribute with default timestamps
pub fn name_attr(parent_index: u64, parent_sequence: u16, name: &str) -> FileNameAttribute {
    name_attr_at(parent_index, parent_sequence, name, default_fn_time())
}

/// A Win32 name attribute with explicit timestamps
pub fn name_attr_at(
    parent_index: u64,
    parent_sequence: u16,
    name: &str,
    time: DateTime<Utc>,
) -> FileNameAttribute {
    let ft = datetime_to_filetime(time);
    FileNameAttribute {
        parent_reference: ((parent_sequence as u64) << 48) | parent_index,
        creation_time: ft,
        modification_time: ft,
        mft_modification_time: ft,
        access_time: ft,
        allocated_size: 0,
        data_size: 0,
        file_attributes: 0,
        reparse_value: 0,
        namespace: FilenameNamespace::Win32,
        name: name.to_string(),
    }
}

/// A standard-information attribute with all four timestamps equal
pub fn std_info_at(flags: u32, time: DateTime<Utc>) -> StandardInformation {
    let ft = datetime_to_filetime(time);
    StandardInformation {
        creation_time: ft,
        modification_time: ft,
        mft_modification_time: ft,
        access_time: ft,
        file_attributes: flags,
    }
}

/// An in-use directory entry with a single name attribute
pub fn dir_entry(
    index: u64,
    sequence: u16,
    parent_index: u64,
    parent_sequence: u16,
    name: &str,
) -> MftEntry {
    MftEntry {
        index,
        sequence_number: sequence,
        is_deleted: false,
        is_directory: true,
        std_info: Some(std_info_at(0, default_fn_time())),
        names: vec![name_attr(parent_index, parent_sequence, name)],
        streams: Vec::new(),
    }
}

/// Timestamp stamped into generated $FILE_NAME attributes
pub fn default_fn_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap()
}

/// Builds a single 1024-byte MFT record with a valid fixup array.
pub struct RecordBuilder {
    index: u64,
    sequence: u16,
    deleted: bool,
    directory: bool,
    base_reference: u64,
    attributes: Vec<Vec<u8>>,
}

impl RecordBuilder {
    pub fn new(index: u64, sequence: u16) -> Self {
        Self {
            index,
            sequence,
            deleted: false,
            directory: false,
            base_reference: 0,
            attributes: Vec::new(),
        }
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn directory(mut self) -> Self {
        self.directory = true;
        self
    }

    pub fn base_reference(mut self, base: u64) -> Self {
        self.base_reference = base;
        self
    }

    pub fn std_info(self, time: DateTime<Utc>, flags: u32) -> Self {
        self.std_info_times(time, time, time, time, flags)
    }

    pub fn std_info_times(
        mut self,
        created: DateTime<Utc>,
        changed: DateTime<Utc>,
        mft_changed: DateTime<Utc>,
        accessed: DateTime<Utc>,
        flags: u32,
    ) -> Self {
        let mut content = Vec::with_capacity(48);
        for t in [created, changed, mft_changed, accessed] {
            content
                .write_u64::<LittleEndian>(datetime_to_filetime(t))
                .unwrap();
        }
        content.write_u32::<LittleEndian>(flags).unwrap();
        content.write_u32::<LittleEndian>(0).unwrap(); // max versions
        content.write_u32::<LittleEndian>(0).unwrap(); // version
        content.write_u32::<LittleEndian>(0).unwrap(); // class id
        self.attributes.push(resident_attribute(
            AttributeType::StandardInformation as u32,
            None,
            &content,
        ));
        self
    }

    pub fn file_name(
        self,
        parent_index: u64,
        parent_sequence: u16,
        name: &str,
        namespace: FilenameNamespace,
    ) -> Self {
        self.file_name_times(parent_index, parent_sequence, name, namespace, default_fn_time())
    }

    pub fn file_name_times(
        mut self,
        parent_index: u64,
        parent_sequence: u16,
        name: &str,
        namespace: FilenameNamespace,
        time: DateTime<Utc>,
    ) -> Self {
        let units: Vec<u16> = name.encode_utf16().collect();
        let mut content = Vec::with_capacity(66 + units.len() * 2);
        content
            .write_u64::<LittleEndian>(((parent_sequence as u64) << 48) | parent_index)
            .unwrap();
        for _ in 0..4 {
            content
                .write_u64::<LittleEndian>(datetime_to_filetime(time))
                .unwrap();
        }
        content.write_u64::<LittleEndian>(0).unwrap(); // allocated size
        content.write_u64::<LittleEndian>(0).unwrap(); // data size
        content.write_u32::<LittleEndian>(0).unwrap(); // flags
        content.write_u32::<LittleEndian>(0).unwrap(); // reparse value
        content.push(units.len() as u8);
        content.push(namespace as u8);
        for unit in &units {
            content.write_u16::<LittleEndian>(*unit).unwrap();
        }
        self.attributes.push(resident_attribute(
            AttributeType::FileName as u32,
            None,
            &content,
        ));
        self
    }

    pub fn resident_data(mut self, name: Option<&str>, content: &[u8]) -> Self {
        self.attributes.push(resident_attribute(
            AttributeType::Data as u32,
            name,
            content,
        ));
        self
    }

    pub fn nonresident_data(mut self, name: Option<&str>, size: u64, alloc_size: u64) -> Self {
        self.attributes
            .push(nonresident_attribute(AttributeType::Data as u32, name, size, alloc_size));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let record_size = DEFAULT_MFT_RECORD_SIZE as usize;
        let mut buf = vec![0u8; record_size];

        let mut offset = 56usize;
        for attr in &self.attributes {
            buf[offset..offset + attr.len()].copy_from_slice(attr);
            offset += attr.len();
        }
        // End marker
        buf[offset..offset + 4].copy_from_slice(&ATTRIBUTE_END_MARKER.to_le_bytes());
        offset += 8;

        let mut flags = 0u16;
        if !self.deleted {
            flags |= MFT_RECORD_IN_USE;
        }
        if self.directory {
            flags |= MFT_RECORD_IS_DIRECTORY;
        }

        // Header
        buf[0..4].copy_from_slice(&MFT_RECORD_SIGNATURE.to_le_bytes());
        buf[4..6].copy_from_slice(&48u16.to_le_bytes()); // update sequence offset
        buf[6..8].copy_from_slice(&3u16.to_le_bytes()); // update sequence size
        buf[8..16].copy_from_slice(&0u64.to_le_bytes()); // log sequence number
        buf[16..18].copy_from_slice(&self.sequence.to_le_bytes());
        buf[18..20].copy_from_slice(&1u16.to_le_bytes()); // hard link count
        buf[20..22].copy_from_slice(&56u16.to_le_bytes()); // first attribute offset
        buf[22..24].copy_from_slice(&flags.to_le_bytes());
        buf[24..28].copy_from_slice(&(offset as u32).to_le_bytes()); // used size
        buf[28..32].copy_from_slice(&(record_size as u32).to_le_bytes()); // allocated size
        buf[32..40].copy_from_slice(&self.base_reference.to_le_bytes());
        buf[40..42].copy_from_slice(&0u16.to_le_bytes()); // next attribute id
        buf[44..48].copy_from_slice(&(self.index as u32).to_le_bytes());

        // Fixup array: check value followed by the original sector tails
        let check: u16 = 0x5AA5;
        buf[48..50].copy_from_slice(&check.to_le_bytes());
        let tails = [510usize, 1022usize];
        for (i, tail) in tails.iter().enumerate() {
            let slot = 50 + i * 2;
            let orig = [buf[*tail], buf[*tail + 1]];
            buf[slot..slot + 2].copy_from_slice(&orig);
            buf[*tail..*tail + 2].copy_from_slice(&check.to_le_bytes());
        }

        buf
    }
}

fn resident_attribute(attr_type: u32, name: Option<&str>, content: &[u8]) -> Vec<u8> {
    let name_units: Vec<u16> = name.unwrap_or("").encode_utf16().collect();
    let name_offset = 24u16;
    let value_offset = name_offset + (name_units.len() as u16) * 2;
    let raw_len = value_offset as usize + content.len();
    let total_len = (raw_len + 7) & !7;

    let mut buf = vec![0u8; total_len];
    buf[0..4].copy_from_slice(&attr_type.to_le_bytes());
    buf[4..8].copy_from_slice(&(total_len as u32).to_le_bytes());
    buf[8] = 0; // resident
    buf[9] = name_units.len() as u8;
    buf[10..12].copy_from_slice(&name_offset.to_le_bytes());
    // attribute flags + id stay zero
    buf[16..20].copy_from_slice(&(content.len() as u32).to_le_bytes());
    buf[20..22].copy_from_slice(&value_offset.to_le_bytes());
    for (i, unit) in name_units.iter().enumerate() {
        let at = name_offset as usize + i * 2;
        buf[at..at + 2].copy_from_slice(&unit.to_le_bytes());
    }
    buf[value_offset as usize..raw_len].copy_from_slice(content);
    buf
}

fn nonresident_attribute(attr_type: u32, name: Option<&str>, size: u64, alloc_size: u64) -> Vec<u8> {
    let name_units: Vec<u16> = name.unwrap_or("").encode_utf16().collect();
    let name_offset = 64u16;
    let runs_offset = name_offset + (name_units.len() as u16) * 2;
    let raw_len = runs_offset as usize + 1; // one end-of-runs byte
    let total_len = (raw_len + 7) & !7;

    let mut buf = vec![0u8; total_len];
    buf[0..4].copy_from_slice(&attr_type.to_le_bytes());
    buf[4..8].copy_from_slice(&(total_len as u32).to_le_bytes());
    buf[8] = 1; // non-resident
    buf[9] = name_units.len() as u8;
    buf[10..12].copy_from_slice(&name_offset.to_le_bytes());
    buf[16..24].copy_from_slice(&0u64.to_le_bytes()); // lowest vcn
    buf[24..32].copy_from_slice(&0u64.to_le_bytes()); // highest vcn
    buf[32..34].copy_from_slice(&runs_offset.to_le_bytes());
    buf[34..36].copy_from_slice(&0u16.to_le_bytes()); // compression unit
    buf[40..48].copy_from_slice(&alloc_size.to_le_bytes());
    buf[48..56].copy_from_slice(&size.to_le_bytes());
    buf[56..64].copy_from_slice(&size.to_le_bytes()); // initialized size
    for (i, unit) in name_units.iter().enumerate() {
        let at = name_offset as usize + i * 2;
        buf[at..at + 2].copy_from_slice(&unit.to_le_bytes());
    }
    buf
}
