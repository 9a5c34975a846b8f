//! Resident file dumping
//!
//! Writes the content of an entry's primary data stream to a file. Only
//! resident streams can be dumped; everything else lives in clusters the
//! table does not carry.

use crate::error::{ExportError, Result};
use crate::logging;
use crate::table::RecordTable;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Dump the resident content of `entry_number`'s primary stream
pub fn dump_resident_stream<T: RecordTable>(
    table: &T,
    entry_number: u64,
    output: &Path,
) -> Result<()> {
    let entry = table.entry(entry_number)?;
    let stream = entry
        .main_stream()
        .ok_or(ExportError::NoDataStream(entry_number))?;
    let content = stream
        .resident
        .as_ref()
        .ok_or(ExportError::NonResidentStream(entry_number))?;

    let mut file = File::create(output)?;
    file.write_all(content)?;

    logging::info(
        "DUMP",
        &format!(
            "Dumped {} bytes from entry {} to '{}'",
            content.len(),
            entry_number,
            output.display()
        ),
    );

    Ok(())
}
