//! Record invariants
//!
//! Runtime-checkable properties every record must satisfy before it is
//! handed to the control channel:
//!
//! 1. **Header present**: the buffer holds at least a header and a terminator
//! 2. **Non-empty size**: `size >= 1`, the terminator is always counted
//! 3. **Size agreement**: header + `size` is exactly the buffer length
//! 4. **Terminated**: the byte at text offset `size - 1` is NUL
//!
//! The logger asserts these in debug builds; tests run them on every
//! captured record.

use alloc::string::String;
use alloc::vec::Vec;

use crate::wire::{RecordHeader, HEADER_LEN};

/// An invariant violation with details
#[derive(Clone, Debug)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check all record invariants on an encoded record.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_record(bytes: &[u8]) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let header = match RecordHeader::read_from(bytes) {
        Ok(header) if bytes.len() > HEADER_LEN => header,
        _ => {
            violations.push(InvariantViolation {
                invariant: "header_present",
                description: alloc::format!("record is only {} bytes", bytes.len()),
            });
            return violations;
        }
    };

    if header.size == 0 {
        violations.push(InvariantViolation {
            invariant: "non_empty_size",
            description: String::from("size is 0; the terminator must be counted"),
        });
        return violations;
    }

    if header.wire_len() != bytes.len() {
        violations.push(InvariantViolation {
            invariant: "size_agreement",
            description: alloc::format!(
                "header declares {} text bytes, buffer holds {}",
                header.size,
                bytes.len() - HEADER_LEN
            ),
        });
    }

    let terminator = HEADER_LEN + header.size as usize - 1;
    if bytes.get(terminator) != Some(&0) {
        violations.push(InvariantViolation {
            invariant: "terminated",
            description: alloc::format!("no NUL at text offset {}", header.size - 1),
        });
    }

    violations
}
