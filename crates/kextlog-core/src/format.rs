//! Bounded formatting
//!
//! Formats `core::fmt::Arguments` into a fixed buffer without allocating,
//! reporting how long the unbounded output would have been. The reported
//! length is what lets the builder size an oversize record exactly.

use core::fmt::{self, Write};

/// Writer that stores what fits and counts everything.
struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    /// Bytes stored (never more than `buf.len() - 1`)
    written: usize,
    /// Bytes the full output needs
    required: usize,
}

impl Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let limit = self.buf.len().saturating_sub(1);
        let room = limit.saturating_sub(self.written);
        let n = bytes.len().min(room);
        self.buf[self.written..self.written + n].copy_from_slice(&bytes[..n]);
        self.written += n;
        self.required = self.required.saturating_add(bytes.len());
        Ok(())
    }
}

/// Format `args` into `buf`, truncating to `buf.len() - 1` bytes.
///
/// A NUL terminator follows the stored text whenever `buf` is non-empty.
/// Returns the length the complete output needs, excluding the terminator;
/// a return value `>= buf.len()` means the text was truncated.
pub fn format_bounded(buf: &mut [u8], args: fmt::Arguments<'_>) -> usize {
    let mut writer = BoundedWriter {
        buf,
        written: 0,
        required: 0,
    };
    // A Display impl reporting an error still leaves valid partial text
    let _ = writer.write_fmt(args);

    if !writer.buf.is_empty() {
        writer.buf[writer.written] = 0;
    }
    writer.required
}
