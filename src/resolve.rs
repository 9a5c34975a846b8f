//! Full path resolution
//!
//! Walks a name attribute's parent chain up to the root directory,
//! producing the root-to-leaf path. A missing parent, a reused parent slot
//! (sequence mismatch) or a cyclic chain makes the path an orphan: the
//! walk stops and the sentinel is prefixed to whatever was collected.

use crate::ntfs::structs::FileNameAttribute;
use crate::table::RecordTable;

/// MFT record number of the volume root directory
pub const ROOT_INDEX: u64 = 5;

/// Marker prefixed to paths whose parent chain could not be resolved
pub const ORPHAN_SENTINEL: &str = "__ORPHAN__";

/// NTFS path separator
pub const PATH_SEPARATOR: &str = "\\";

/// Resolve the full path for one name attribute.
///
/// Returns `(is_orphan, path)`. The path is root-to-leaf, separator
/// joined, without a root prefix. Orphan paths carry the sentinel exactly
/// once, at the front. Resolution never mutates the table; resolving the
/// same attribute twice yields the same result.
pub fn resolve_path<T: RecordTable>(table: &T, fn_attr: &FileNameAttribute) -> (bool, String) {
    let mut names = vec![fn_attr.name.clone()];
    let mut index = fn_attr.parent_record_number();
    let mut expected_seq = fn_attr.parent_sequence_number();
    let mut orphan = false;

    // A well-formed chain is shorter than the table itself; anything longer
    // is a cycle.
    let max_depth = table.entry_count();
    let mut depth = 0u64;

    while index != ROOT_INDEX {
        depth += 1;
        if depth > max_depth {
            orphan = true;
            break;
        }

        let parent = match table.entry(index) {
            Ok(parent) => parent,
            Err(_) => {
                orphan = true;
                break;
            }
        };

        // The slot was reused by a different file; the chain above it
        // belongs to someone else.
        if parent.sequence_number != expected_seq {
            orphan = true;
            break;
        }

        match parent.primary_name() {
            Some(parent_name) => {
                names.push(parent_name.name.clone());
                index = parent_name.parent_record_number();
                expected_seq = parent_name.parent_sequence_number();
            }
            None => {
                orphan = true;
                break;
            }
        }
    }

    names.reverse();
    let mut path = names.join(PATH_SEPARATOR);
    if orphan {
        path = format!("{}{}{}", ORPHAN_SENTINEL, PATH_SEPARATOR, path);
    }

    (orphan, path)
}
