//! MFT record decoding
//!
//! Turns one raw record buffer into a fixed-shape [`MftEntry`]: the
//! standard-information attribute (if any), every name attribute, and every
//! data stream. Fixup verification runs before any attribute is trusted.

use crate::error::{ExportError, Result};
use crate::ntfs::structs::*;

// ============================================================================
// Parsed Entry
// ============================================================================

/// A data stream belonging to an entry. `name` is `None` for the primary
/// stream; named streams are alternate data streams.
#[derive(Debug, Clone, Default)]
pub struct Datastream {
    pub name: Option<String>,
    pub size: u64,
    pub alloc_size: u64,
    /// Content bytes when the stream is resident in the record
    pub resident: Option<Vec<u8>>,
}

/// Complete parsed information for one MFT entry
#[derive(Debug, Clone, Default)]
pub struct MftEntry {
    /// MFT record number
    pub index: u64,
    /// Record sequence number, bumped each time the slot is reused
    pub sequence_number: u16,
    /// Record is no longer in use
    pub is_deleted: bool,
    /// Record describes a directory
    pub is_directory: bool,
    /// $STANDARD_INFORMATION content, at most one per entry
    pub std_info: Option<StandardInformation>,
    /// Every $FILE_NAME attribute, in on-disk order (several ⇒ hardlinks)
    pub names: Vec<FileNameAttribute>,
    /// Every $DATA stream, in on-disk order
    pub streams: Vec<Datastream>,
}

impl MftEntry {
    /// True when the record carries no attributes we decode
    pub fn has_attributes(&self) -> bool {
        self.std_info.is_some() || !self.names.is_empty() || !self.streams.is_empty()
    }

    /// The name attribute used for path resolution and primary output.
    ///
    /// Namespace preference: Win32 > Win32+DOS > POSIX > DOS, first wins on
    /// a tie.
    pub fn primary_name(&self) -> Option<&FileNameAttribute> {
        let mut best: Option<&FileNameAttribute> = None;
        for fn_attr in &self.names {
            let dominated = match best {
                None => true,
                Some(b) => namespace_rank(fn_attr.namespace) > namespace_rank(b.namespace),
            };
            if dominated {
                best = Some(fn_attr);
            }
        }
        best
    }

    /// One name attribute per distinct parent, best namespace within each
    /// parent, in first-seen order. Several entries here mean hardlinks;
    /// duplicate names under the same parent (Win32 + DOS pairs) collapse.
    pub fn unique_parent_names(&self) -> Vec<&FileNameAttribute> {
        let mut unique: Vec<&FileNameAttribute> = Vec::new();
        for fn_attr in &self.names {
            match unique
                .iter_mut()
                .find(|u| u.parent_record_number() == fn_attr.parent_record_number())
            {
                Some(existing) => {
                    if namespace_rank(fn_attr.namespace) > namespace_rank(existing.namespace) {
                        *existing = fn_attr;
                    }
                }
                None => unique.push(fn_attr),
            }
        }
        unique
    }

    /// The unnamed (primary) data stream, if the entry has one
    pub fn main_stream(&self) -> Option<&Datastream> {
        self.streams.iter().find(|ds| ds.name.is_none())
    }
}

fn namespace_rank(ns: FilenameNamespace) -> u8 {
    match ns {
        FilenameNamespace::Win32 => 3,
        FilenameNamespace::Win32AndDos => 2,
        FilenameNamespace::Posix => 1,
        FilenameNamespace::Dos => 0,
    }
}

// ============================================================================
// Record Parsing
// ============================================================================

/// Parse a raw MFT record buffer into an [`MftEntry`].
///
/// The buffer is mutated in place when the fixup array is applied.
pub fn parse_record(index: u64, data: &mut [u8], use_fixup: bool) -> Result<MftEntry> {
    let header = MftRecordHeader::from_bytes(data)
        .ok_or_else(|| ExportError::InvalidRecord(index, "Failed to parse header".to_string()))?;

    if !header.is_valid() {
        let reason = if header.signature == MFT_RECORD_BAD_SIGNATURE {
            "BAAD signature"
        } else {
            "Invalid signature"
        };
        return Err(ExportError::InvalidRecord(index, reason.to_string()));
    }

    if use_fixup {
        apply_fixup(index, data, &header)?;
    }

    let mut entry = MftEntry {
        index,
        sequence_number: header.sequence_number,
        is_deleted: !header.is_in_use(),
        is_directory: header.is_directory(),
        ..Default::default()
    };

    // Extension records hold continuation attributes for some base record;
    // they never stand for a file of their own.
    if !header.is_base_record() {
        return Ok(entry);
    }

    parse_attributes(index, data, &header, &mut entry)?;

    Ok(entry)
}

/// Apply fixup array to repair sector boundaries
///
/// NTFS stores the last 2 bytes of each sector in the fixup array
/// and replaces them with a sequence number for integrity verification.
fn apply_fixup(index: u64, data: &mut [u8], header: &MftRecordHeader) -> Result<()> {
    let sector_size = SECTOR_SIZE as usize;
    let update_seq_offset = header.update_sequence_offset as usize;
    let update_seq_count = header.update_sequence_size as usize;

    if update_seq_offset + 2 > data.len() {
        return Err(ExportError::FixupMismatch(index));
    }

    // First value in the update sequence array is the check value
    let seq_number = u16::from_le_bytes([data[update_seq_offset], data[update_seq_offset + 1]]);

    // Verify and restore each sector
    for i in 1..update_seq_count {
        let sector_end = i * sector_size - 2;
        let fixup_offset = update_seq_offset + i * 2;

        if sector_end + 2 > data.len() || fixup_offset + 2 > data.len() {
            break;
        }

        let stored_seq = u16::from_le_bytes([data[sector_end], data[sector_end + 1]]);
        if stored_seq != seq_number {
            return Err(ExportError::FixupMismatch(index));
        }

        data[sector_end] = data[fixup_offset];
        data[sector_end + 1] = data[fixup_offset + 1];
    }

    Ok(())
}

/// Walk all attributes in a record, filling the entry
fn parse_attributes(
    index: u64,
    data: &[u8],
    header: &MftRecordHeader,
    entry: &mut MftEntry,
) -> Result<()> {
    let mut offset = header.first_attribute_offset as usize;

    while offset + 16 <= data.len() {
        let attr_header = AttributeHeader::from_bytes(&data[offset..]).ok_or_else(|| {
            ExportError::InvalidAttribute(offset as u32, "Failed to parse header".to_string())
        })?;

        // End of attributes
        if attr_header.attribute_type == ATTRIBUTE_END_MARKER || attr_header.length == 0 {
            break;
        }

        // Bounds check
        if offset + attr_header.length as usize > data.len() {
            break;
        }

        let attr_data = &data[offset..offset + attr_header.length as usize];

        match AttributeType::from_u32(attr_header.attribute_type) {
            Some(AttributeType::StandardInformation) => {
                if entry.std_info.is_none() {
                    entry.std_info = parse_standard_information(attr_data);
                    if let Some(ref si) = entry.std_info {
                        entry.is_directory = entry.is_directory
                            || (si.file_attributes & file_attributes::DIRECTORY) != 0;
                    }
                }
            }
            Some(AttributeType::FileName) => {
                if let Some(fn_attr) = parse_filename(attr_data) {
                    entry.names.push(fn_attr);
                }
            }
            Some(AttributeType::Data) => {
                if let Some(stream) = parse_data_attribute(attr_data, &attr_header) {
                    // The unnamed stream may be split across several
                    // non-resident attributes; only the first chunk carries
                    // the sizes.
                    let duplicate = entry
                        .streams
                        .iter()
                        .any(|existing| existing.name == stream.name);
                    if !duplicate {
                        entry.streams.push(stream);
                    }
                }
            }
            Some(AttributeType::AttributeList) => {
                // Attribute lists are not followed: attributes resident in
                // extension records are unavailable to this decoder.
                crate::logging::debug(
                    "RECORD",
                    &format!("Record {} has an attribute list, not followed", index),
                );
            }
            _ => {
                // Skip other attributes
            }
        }

        offset += attr_header.length as usize;
    }

    Ok(())
}

/// Parse $STANDARD_INFORMATION attribute
fn parse_standard_information(attr_data: &[u8]) -> Option<StandardInformation> {
    let header = ResidentAttributeHeader::from_bytes(attr_data)?;
    StandardInformation::from_bytes(header.value(attr_data)?)
}

/// Parse $FILE_NAME attribute
fn parse_filename(attr_data: &[u8]) -> Option<FileNameAttribute> {
    let header = ResidentAttributeHeader::from_bytes(attr_data)?;
    FileNameAttribute::from_bytes(header.value(attr_data)?)
}

/// Parse $DATA attribute into a stream descriptor
fn parse_data_attribute(attr_data: &[u8], header: &AttributeHeader) -> Option<Datastream> {
    let stream_name = header.read_name(attr_data);

    if header.non_resident {
        let nr = NonResidentAttributeHeader::from_bytes(attr_data)?;
        // Continuation chunks of a split attribute start at a later VCN
        if nr.lowest_vcn != 0 {
            return None;
        }
        Some(Datastream {
            name: stream_name,
            size: nr.data_size,
            alloc_size: nr.allocated_size,
            resident: None,
        })
    } else {
        let r = ResidentAttributeHeader::from_bytes(attr_data)?;
        let value = r.value(attr_data)?;
        Some(Datastream {
            name: stream_name,
            size: r.value_length as u64,
            // Resident data doesn't use clusters
            alloc_size: 0,
            resident: Some(value.to_vec()),
        })
    }
}
