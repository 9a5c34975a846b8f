//! Synthetic MFT dump construction for integration tests

use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;
use std::path::Path;

pub const RECORD_SIZE: usize = 1024;

const SIGNATURE: u32 = 0x454C4946; // "FILE"
const END_MARKER: u32 = 0xFFFFFFFF;
const IN_USE: u16 = 0x0001;
const IS_DIRECTORY: u16 = 0x0002;
const FILETIME_EPOCH_DIFF: i64 = 116444736000000000;

pub fn filetime(dt: DateTime<Utc>) -> u64 {
    (dt.timestamp() * 10_000_000 + FILETIME_EPOCH_DIFF).max(0) as u64
}

pub fn default_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 5, 17, 10, 0, 0).unwrap()
}

/// Builds one 1024-byte MFT record with a valid fixup array
pub struct RecordBuilder {
    index: u64,
    sequence: u16,
    deleted: bool,
    directory: bool,
    attributes: Vec<Vec<u8>>,
}

impl RecordBuilder {
    pub fn new(index: u64, sequence: u16) -> Self {
        Self {
            index,
            sequence,
            deleted: false,
            directory: false,
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
            content.extend_from_slice(&filetime(t).to_le_bytes());
        }
        content.extend_from_slice(&flags.to_le_bytes());
        content.extend_from_slice(&[0u8; 12]); // max versions, version, class id
        self.attributes.push(resident_attribute(0x10, None, &content));
        self
    }

    pub fn file_name(
        self,
        parent_index: u64,
        parent_sequence: u16,
        name: &str,
        namespace: u8,
    ) -> Self {
        self.file_name_times(parent_index, parent_sequence, name, namespace, default_time())
    }

    pub fn file_name_times(
        mut self,
        parent_index: u64,
        parent_sequence: u16,
        name: &str,
        namespace: u8,
        time: DateTime<Utc>,
    ) -> Self {
        let units: Vec<u16> = name.encode_utf16().collect();
        let mut content = Vec::with_capacity(66 + units.len() * 2);
        content.extend_from_slice(
            &(((parent_sequence as u64) << 48) | parent_index).to_le_bytes(),
        );
        for _ in 0..4 {
            content.extend_from_slice(&filetime(time).to_le_bytes());
        }
        content.extend_from_slice(&[0u8; 16]); // allocated + data size
        content.extend_from_slice(&[0u8; 8]); // flags + reparse value
        content.push(units.len() as u8);
        content.push(namespace);
        for unit in &units {
            content.extend_from_slice(&unit.to_le_bytes());
        }
        self.attributes.push(resident_attribute(0x30, None, &content));
        self
    }

    pub fn resident_data(mut self, name: Option<&str>, content: &[u8]) -> Self {
        self.attributes.push(resident_attribute(0x80, name, content));
        self
    }

    pub fn nonresident_data(mut self, name: Option<&str>, size: u64, alloc_size: u64) -> Self {
        self.attributes
            .push(nonresident_attribute(0x80, name, size, alloc_size));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut buf = vec![0u8; RECORD_SIZE];

        let mut offset = 56usize;
        for attr in &self.attributes {
            buf[offset..offset + attr.len()].copy_from_slice(attr);
            offset += attr.len();
        }
        buf[offset..offset + 4].copy_from_slice(&END_MARKER.to_le_bytes());
        offset += 8;

        let mut flags = 0u16;
        if !self.deleted {
            flags |= IN_USE;
        }
        if self.directory {
            flags |= IS_DIRECTORY;
        }

        buf[0..4].copy_from_slice(&SIGNATURE.to_le_bytes());
        buf[4..6].copy_from_slice(&48u16.to_le_bytes()); // update sequence offset
        buf[6..8].copy_from_slice(&3u16.to_le_bytes()); // update sequence size
        buf[16..18].copy_from_slice(&self.sequence.to_le_bytes());
        buf[18..20].copy_from_slice(&1u16.to_le_bytes()); // hard link count
        buf[20..22].copy_from_slice(&56u16.to_le_bytes()); // first attribute offset
        buf[22..24].copy_from_slice(&flags.to_le_bytes());
        buf[24..28].copy_from_slice(&(offset as u32).to_le_bytes()); // used size
        buf[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes()); // allocated size
        buf[44..48].copy_from_slice(&(self.index as u32).to_le_bytes());

        // Fixup: check value, then the original bytes of each sector tail
        let check: u16 = 0x5AA5;
        buf[48..50].copy_from_slice(&check.to_le_bytes());
        for (i, tail) in [510usize, 1022usize].iter().enumerate() {
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
    let raw_len = runs_offset as usize + 1;
    let total_len = (raw_len + 7) & !7;

    let mut buf = vec![0u8; total_len];
    buf[0..4].copy_from_slice(&attr_type.to_le_bytes());
    buf[4..8].copy_from_slice(&(total_len as u32).to_le_bytes());
    buf[8] = 1; // non-resident
    buf[9] = name_units.len() as u8;
    buf[10..12].copy_from_slice(&name_offset.to_le_bytes());
    buf[32..34].copy_from_slice(&runs_offset.to_le_bytes());
    buf[40..48].copy_from_slice(&alloc_size.to_le_bytes());
    buf[48..56].copy_from_slice(&size.to_le_bytes());
    buf[56..64].copy_from_slice(&size.to_le_bytes()); // initialized size
    for (i, unit) in name_units.iter().enumerate() {
        let at = name_offset as usize + i * 2;
        buf[at..at + 2].copy_from_slice(&unit.to_le_bytes());
    }
    buf
}

/// Write records into slot positions of a dump file; unset slots stay
/// zeroed and decode as invalid records.
pub fn write_dump(path: &Path, slots: u64, records: Vec<(u64, Vec<u8>)>) {
    let mut buf = vec![0u8; slots as usize * RECORD_SIZE];
    for (index, record) in records {
        let at = index as usize * RECORD_SIZE;
        buf[at..at + RECORD_SIZE].copy_from_slice(&record);
    }
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(&buf).unwrap();
}

/// Win32 filename namespace byte
pub const NS_WIN32: u8 = 1;
