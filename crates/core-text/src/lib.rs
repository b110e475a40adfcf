//! Rope-backed text buffer with range-safe reads and writes.
//!
//! Every range handed to [`RangeSafeBuffer`] is clamped against the current length before use.
//! Host selection state can race with programmatic text changes (an IME composition finishing
//! mid-edit, a streamed replacement landing), so a stale range degrades to the nearest valid one
//! instead of failing. Offsets are UTF-8 bytes and are floored to char boundaries, which keeps
//! slicing panic-free for multi-byte text.

use ropey::Rope;
use tracing::trace;

pub mod range;

pub use range::TextRange;

/// Mutable document text. All range-based access goes through [`RangeSafeBuffer::clamp`].
#[derive(Clone, Default)]
pub struct RangeSafeBuffer {
    rope: Rope,
}

impl RangeSafeBuffer {
    pub fn new(content: &str) -> Self {
        Self {
            rope: Rope::from_str(content),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.rope.len_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_bytes() == 0
    }

    /// Owned copy of the whole document.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Replace the whole document (host `onTextChange`).
    pub fn set_text(&mut self, content: &str) {
        self.rope = Rope::from_str(content);
        trace!(target: "text.buffer", len = content.len(), "set_text");
    }

    /// Floor a byte offset to the start of the char containing it, capped at the buffer length.
    pub fn floor_boundary(&self, byte: usize) -> usize {
        let total = self.rope.len_bytes();
        if byte >= total {
            return total;
        }
        let ch = self.rope.byte_to_char(byte);
        self.rope.char_to_byte(ch)
    }

    /// Clamp `range` so that `offset <= len` and `offset + length <= len`, both on char
    /// boundaries.
    pub fn clamp(&self, range: TextRange) -> TextRange {
        let total = self.len();
        let offset = range.offset.min(total);
        let length = range.length.min(total - offset);
        let start = self.floor_boundary(offset);
        let end = self.floor_boundary(offset + length);
        TextRange::new(start, end - start)
    }

    /// Text under the clamped range.
    pub fn substring(&self, range: TextRange) -> String {
        let r = self.clamp(range);
        if r.is_empty() {
            return String::new();
        }
        let start = self.rope.byte_to_char(r.offset);
        let end = self.rope.byte_to_char(r.end());
        self.rope.slice(start..end).to_string()
    }

    /// Splice `text` in place of the clamped range. Returns the new buffer length.
    pub fn replace(&mut self, range: TextRange, text: &str) -> usize {
        let r = self.clamp(range);
        if r != range {
            trace!(
                target: "text.buffer",
                requested_offset = range.offset,
                requested_length = range.length,
                offset = r.offset,
                length = r.length,
                "replace_range_clamped"
            );
        }
        let start = self.rope.byte_to_char(r.offset);
        let end = self.rope.byte_to_char(r.end());
        if start < end {
            self.rope.remove(start..end);
        }
        if !text.is_empty() {
            self.rope.insert(start, text);
        }
        trace!(
            target: "text.buffer",
            offset = r.offset,
            removed = r.length,
            inserted = text.len(),
            "replace"
        );
        self.len()
    }

    /// Char ending exactly at `offset` (i.e. immediately before a caret placed there).
    pub fn char_before(&self, offset: usize) -> Option<char> {
        if offset == 0 || offset > self.len() {
            return None;
        }
        let ch = self.rope.byte_to_char(offset);
        if self.rope.char_to_byte(ch) != offset {
            return None;
        }
        Some(self.rope.char(ch - 1))
    }

    /// Char starting exactly at `offset`.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        if offset >= self.len() {
            return None;
        }
        let ch = self.rope.byte_to_char(offset);
        if self.rope.char_to_byte(ch) != offset {
            return None;
        }
        Some(self.rope.char(ch))
    }
}

impl std::fmt::Debug for RangeSafeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Content is deliberately omitted; only its size is useful in logs.
        f.debug_struct("RangeSafeBuffer")
            .field("len", &self.len())
            .finish()
    }
}
