//! Offset/length ranges over a text buffer.
//!
//! Offsets are UTF-8 byte offsets. Hosts whose native selection model counts UTF-16 code units
//! translate through [`TextRange::from_utf16`] / [`TextRange::to_utf16`] at the boundary.

/// A `(offset, length)` pair. Only meaningful once clamped against a buffer via
/// [`crate::RangeSafeBuffer::clamp`]; producers never hand an unclamped range to an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
    pub offset: usize,
    pub length: usize,
}

impl TextRange {
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// Zero-length range (a plain caret).
    pub const fn caret(offset: usize) -> Self {
        Self { offset, length: 0 }
    }

    /// Range covering `[start, end)`; endpoints are reordered when reversed.
    pub fn from_bounds(start: usize, end: usize) -> Self {
        let (a, b) = if start <= end { (start, end) } else { (end, start) };
        Self {
            offset: a,
            length: b - a,
        }
    }

    /// Build from host-side signed values. Negative components describe no range at all.
    pub fn from_signed(offset: i64, length: i64) -> Option<Self> {
        if offset < 0 || length < 0 {
            return None;
        }
        Some(Self {
            offset: usize::try_from(offset).ok()?,
            length: usize::try_from(length).ok()?,
        })
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Convert a UTF-16 `(offset, length)` selection into byte offsets within `text`.
    /// Positions beyond the text, or inside a surrogate pair, snap down to the previous char.
    pub fn from_utf16(text: &str, offset16: usize, length16: usize) -> Self {
        let start = utf16_to_byte(text, offset16);
        let end = utf16_to_byte(text, offset16.saturating_add(length16));
        Self::from_bounds(start, end)
    }

    /// Inverse of [`TextRange::from_utf16`]. Byte offsets past the text clamp to its end.
    pub fn to_utf16(&self, text: &str) -> (usize, usize) {
        let start = byte_to_utf16(text, self.offset);
        let end = byte_to_utf16(text, self.end());
        (start, end.saturating_sub(start))
    }
}

fn utf16_to_byte(text: &str, target: usize) -> usize {
    let mut units = 0usize;
    for (byte, ch) in text.char_indices() {
        let next = units + ch.len_utf16();
        if next > target {
            return byte;
        }
        units = next;
    }
    text.len()
}

fn byte_to_utf16(text: &str, target: usize) -> usize {
    let mut units = 0usize;
    for (byte, ch) in text.char_indices() {
        if byte >= target {
            break;
        }
        units += ch.len_utf16();
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bounds_orders_endpoints() {
        assert_eq!(TextRange::from_bounds(7, 3), TextRange::new(3, 4));
        assert_eq!(TextRange::from_bounds(2, 2), TextRange::caret(2));
    }

    #[test]
    fn signed_negative_is_rejected() {
        assert_eq!(TextRange::from_signed(-1, 3), None);
        assert_eq!(TextRange::from_signed(2, -3), None);
        assert_eq!(TextRange::from_signed(2, 3), Some(TextRange::new(2, 3)));
    }

    #[test]
    fn utf16_bridge_handles_surrogate_pairs() {
        // 😀 is two UTF-16 units and four UTF-8 bytes.
        let text = "a😀b";
        let r = TextRange::from_utf16(text, 1, 2);
        assert_eq!(r, TextRange::new(1, 4));
        assert_eq!(r.to_utf16(text), (1, 2));
        // Offset inside the pair snaps to the char start.
        assert_eq!(TextRange::from_utf16(text, 2, 0), TextRange::caret(1));
        // Past the end clamps to the text length.
        assert_eq!(TextRange::from_utf16(text, 10, 5), TextRange::caret(text.len()));
    }
}
