//! Message builder
//!
//! Turns a log request into a wire-ready [`LogRecord`]. The common case
//! formats into a stack array and never allocates. Text that does not fit
//! is re-formatted into a heap region sized exactly from the length the
//! first pass reported; if that allocation is not available the stack copy
//! is sent marked [`RecordFlags::TRUNCATED`].
//!
//! Nothing is formatted while no observer is attached: the caller goes
//! straight to the console instead.

use core::fmt;

use kextlog_hal::HAL;
use kextlog_primitives::HeapBuffer;

use crate::config::MAX_BUILD_ATTEMPTS;
use crate::format::format_bounded;
use crate::registry::ConnectionRegistry;
use crate::types::{Level, RecordFlags};
use crate::wire::{self, record_size, RecordHeader, HEADER_LEN};

/// Storage behind a record: the stack array or an exact-size heap region.
pub enum RecordBuffer<'h, H: HAL, const N: usize> {
    Inline([u8; N]),
    Heap(HeapBuffer<'h, H>),
}

impl<H: HAL, const N: usize> RecordBuffer<'_, H, N> {
    fn bytes(&self) -> &[u8] {
        match self {
            RecordBuffer::Inline(buf) => &buf[..],
            RecordBuffer::Heap(buf) => buf.as_slice(),
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            RecordBuffer::Inline(buf) => &mut buf[..],
            RecordBuffer::Heap(buf) => buf.as_mut_slice(),
        }
    }
}

/// A fully initialized record, header already encoded.
///
/// A heap-backed record releases its allocation when dropped.
pub struct LogRecord<'h, H: HAL, const N: usize> {
    buffer: RecordBuffer<'h, H, N>,
    header: RecordHeader,
}

impl<'h, H: HAL, const N: usize> LogRecord<'h, H, N> {
    fn finish(
        hal: &H,
        mut buffer: RecordBuffer<'h, H, N>,
        text_len: usize,
        level: Level,
        flags: RecordFlags,
    ) -> Self {
        let header = RecordHeader {
            size: (text_len + 1) as u32,
            level,
            flags,
            timestamp: hal.now_ticks(),
        };
        header.write_to(buffer.bytes_mut());
        Self { buffer, header }
    }

    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Text without the terminator
    pub fn text(&self) -> &[u8] {
        &self.buffer.bytes()[HEADER_LEN..HEADER_LEN + self.header.size as usize - 1]
    }

    /// Exactly the bytes handed to the control channel
    pub fn as_wire(&self) -> &[u8] {
        &self.buffer.bytes()[..self.header.wire_len()]
    }

    /// True when the text lives in a heap allocation
    pub fn is_heap(&self) -> bool {
        matches!(self.buffer, RecordBuffer::Heap(_))
    }

    /// Set additional flags in both the header and the encoded bytes.
    pub fn add_flags(&mut self, flags: RecordFlags) {
        self.header.flags.insert(flags);
        wire::or_flags(self.buffer.bytes_mut(), flags);
    }
}

/// Result of the heap pass for an oversize message.
enum Oversize<'h, H: HAL> {
    /// Formatted completely; text length attached
    Fitted(HeapBuffer<'h, H>, usize),
    /// Arguments produced more text than the first pass measured
    Raced,
    /// No memory, or the size cannot be represented
    Unavailable,
}

/// Build a record for `args`, or `None` when no observer is attached.
///
/// `N` is the full stack record size; text capacity is `N - HEADER_LEN`
/// including the terminator. An `N` without room for the header, one text
/// byte and the terminator yields `None`, sending the caller to the console.
pub fn build<'h, H: HAL, const N: usize>(
    hal: &'h H,
    registry: &ConnectionRegistry,
    level: Level,
    args: fmt::Arguments<'_>,
) -> Option<LogRecord<'h, H, N>> {
    if N < HEADER_LEN + 2 {
        return None;
    }
    let text_cap = N - HEADER_LEN;
    let mut attempt = 0;

    loop {
        attempt += 1;

        // Re-checked on a restart: the observer may have left in between
        if !registry.is_attached() {
            return None;
        }

        let mut inline = [0u8; N];
        let len = format_bounded(&mut inline[HEADER_LEN..], args);

        if len < text_cap {
            return Some(LogRecord::finish(
                hal,
                RecordBuffer::Inline(inline),
                len,
                level,
                RecordFlags::empty(),
            ));
        }

        let oversize = match record_size(len) {
            Some(total) => format_oversize(hal, total as usize, len, args),
            None => {
                hal.console_write(format_args!(
                    "[kextlog] message size overflow  level: {} len: {}",
                    level.as_u32(),
                    len
                ));
                Oversize::Unavailable
            }
        };

        match oversize {
            Oversize::Fitted(heap, len) => {
                return Some(LogRecord::finish(
                    hal,
                    RecordBuffer::Heap(heap),
                    len,
                    level,
                    RecordFlags::empty(),
                ));
            }
            Oversize::Raced if attempt < MAX_BUILD_ATTEMPTS => continue,
            Oversize::Raced | Oversize::Unavailable => {
                return Some(LogRecord::finish(
                    hal,
                    RecordBuffer::Inline(inline),
                    text_cap - 1,
                    level,
                    RecordFlags::TRUNCATED,
                ));
            }
        }
    }
}

/// Second formatting pass into a heap region of `total` bytes.
fn format_oversize<'h, H: HAL>(
    hal: &'h H,
    total: usize,
    len: usize,
    args: fmt::Arguments<'_>,
) -> Oversize<'h, H> {
    let mut heap = match HeapBuffer::try_new(hal, total) {
        Ok(heap) => heap,
        Err(_) => return Oversize::Unavailable,
    };

    let len2 = format_bounded(&mut heap[HEADER_LEN..], args);
    if len2 > len {
        // `heap` is released on return
        return Oversize::Raced;
    }
    Oversize::Fitted(heap, len2)
}
