//! Wire record layout
//!
//! Every record handed to the control channel is a fixed header followed
//! by NUL-terminated text:
//!
//! ```text
//! offset  size  field
//! 0       4     size       text length + 1 (terminator included)
//! 4       4     level
//! 8       4     flags      RecordFlags bits
//! 12      8     timestamp  monotonic ticks
//! 20      size  text       NUL-terminated
//! ```
//!
//! Fields use the host byte order: observers run on the same machine as
//! the kernel that produced the record. There is no version field.

use alloc::borrow::Cow;
use alloc::string::String;

use crate::error::DecodeError;
use crate::types::{Level, RecordFlags};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Header length in bytes
pub const HEADER_LEN: usize = 20;

const SIZE_OFFSET: usize = 0;
const LEVEL_OFFSET: usize = 4;
const FLAGS_OFFSET: usize = 8;
const TIMESTAMP_OFFSET: usize = 12;

/// Total record size for `text_len` bytes of text.
///
/// Header + text + terminator, checked at every addition. `None` when the
/// total does not fit the 32-bit size domain.
pub fn record_size(text_len: usize) -> Option<u32> {
    let text_len = u32::try_from(text_len).ok()?;
    (HEADER_LEN as u32).checked_add(text_len)?.checked_add(1)
}

/// Decoded record header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// Text length including the terminator
    pub size: u32,
    pub level: Level,
    pub flags: RecordFlags,
    pub timestamp: u64,
}

impl RecordHeader {
    /// Serialize into the first [`HEADER_LEN`] bytes of `buf`.
    ///
    /// Panics if `buf` is shorter than the header.
    pub fn write_to(&self, buf: &mut [u8]) {
        put_u32(buf, SIZE_OFFSET, self.size);
        put_u32(buf, LEVEL_OFFSET, self.level.as_u32());
        put_u32(buf, FLAGS_OFFSET, self.flags.bits());
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8].copy_from_slice(&self.timestamp.to_ne_bytes());
    }

    /// Parse the header at the start of `buf`.
    pub fn read_from(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::TooShort(buf.len()));
        }
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 8]);
        Ok(Self {
            size: get_u32(buf, SIZE_OFFSET),
            level: Level(get_u32(buf, LEVEL_OFFSET)),
            flags: RecordFlags::from_bits(get_u32(buf, FLAGS_OFFSET)),
            timestamp: u64::from_ne_bytes(ts),
        })
    }

    /// Total bytes on the wire for this header's text
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.size as usize
    }
}

/// OR `flags` into the flags field of an encoded record.
pub fn or_flags(buf: &mut [u8], flags: RecordFlags) {
    let current = get_u32(buf, FLAGS_OFFSET);
    put_u32(buf, FLAGS_OFFSET, current | flags.bits());
}

fn put_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
}

fn get_u32(buf: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_ne_bytes(raw)
}

/// A record borrowed from an observer's receive buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    pub header: RecordHeader,
    text: &'a [u8],
}

impl<'a> DecodedRecord<'a> {
    /// Text bytes without the terminator
    pub fn text(&self) -> &'a [u8] {
        self.text
    }

    /// Text as UTF-8; a truncated record may end mid-character
    pub fn text_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.text)
    }

    pub fn is_truncated(&self) -> bool {
        self.header.flags.contains(RecordFlags::TRUNCATED)
    }

    pub fn is_after_drop(&self) -> bool {
        self.header.flags.contains(RecordFlags::DROPPED)
    }

    /// Detach from the receive buffer
    pub fn to_owned_record(&self) -> OwnedRecord {
        OwnedRecord {
            level: self.header.level,
            flags: self.header.flags,
            timestamp: self.header.timestamp,
            text: self.text_lossy().into_owned(),
        }
    }
}

/// A decoded record that owns its text
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OwnedRecord {
    pub level: Level,
    pub flags: RecordFlags,
    pub timestamp: u64,
    pub text: String,
}

/// Decode exactly one record occupying all of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<DecodedRecord<'_>, DecodeError> {
    let (record, used) = decode_prefix(bytes)?;
    if used != bytes.len() {
        return Err(DecodeError::SizeMismatch {
            declared: record.header.size as usize,
            available: bytes.len() - HEADER_LEN,
        });
    }
    Ok(record)
}

/// Decode the record at the start of `bytes`, returning it with the
/// number of bytes it occupies.
pub fn decode_prefix(bytes: &[u8]) -> Result<(DecodedRecord<'_>, usize), DecodeError> {
    if bytes.len() < HEADER_LEN + 1 {
        return Err(DecodeError::TooShort(bytes.len()));
    }
    let header = RecordHeader::read_from(bytes)?;
    if header.size == 0 {
        return Err(DecodeError::ZeroSize);
    }

    let declared = header.size as usize;
    let available = bytes.len() - HEADER_LEN;
    if declared > available {
        return Err(DecodeError::SizeMismatch {
            declared,
            available,
        });
    }

    let body = &bytes[HEADER_LEN..HEADER_LEN + declared];
    let (text, terminator) = body.split_at(declared - 1);
    if terminator != [0] {
        return Err(DecodeError::MissingTerminator);
    }

    Ok((DecodedRecord { header, text }, HEADER_LEN + declared))
}

/// Iterate the records of a byte stream, as read from a stream-oriented
/// control socket. Iteration ends after the first malformed record.
pub fn records(stream: &[u8]) -> Records<'_> {
    Records {
        rest: stream,
        failed: false,
    }
}

/// Iterator returned by [`records`]
pub struct Records<'a> {
    rest: &'a [u8],
    failed: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<DecodedRecord<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match decode_prefix(self.rest) {
            Ok((record, used)) => {
                self.rest = &self.rest[used..];
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Kani Proofs for record sizing
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: a computed size always covers header and terminator
    #[kani::proof]
    fn size_covers_header_and_terminator() {
        let len: usize = kani::any();
        if let Some(size) = record_size(len) {
            kani::assert(size as usize == HEADER_LEN + len + 1, "size is exact");
        }
    }

    /// Proof: sizes beyond the 32-bit domain are rejected, never wrapped
    #[kani::proof]
    fn overflow_is_reported() {
        let len: usize = kani::any();
        kani::assume(len > u32::MAX as usize - HEADER_LEN - 1);
        kani::assert(record_size(len).is_none(), "overflow must be None");
    }
}
