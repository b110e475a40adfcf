//! Toggle round-trip properties for the symmetric formatting kinds.

use core_format::{FormatAction, FormatKind, MarkdownToggler, MemoryClipboard};
use core_text::{RangeSafeBuffer, TextRange};
use proptest::prelude::*;

const SYMMETRIC: [FormatKind; 6] = [
    FormatKind::Heading,
    FormatKind::Bold,
    FormatKind::Italic,
    FormatKind::Strikethrough,
    FormatKind::Code,
    FormatKind::CodeBlock,
];

proptest! {
    // Wrap followed by a second apply on the wrapped range restores the selection text.
    #[test]
    fn wrap_then_unwrap_restores(
        before in "[a-z ]{0,10}",
        selected in "[a-z0-9 ]{1,12}",
        after in "[a-z ]{0,10}",
        kind_idx in 0usize..SYMMETRIC.len(),
    ) {
        let kind = SYMMETRIC[kind_idx];
        let original = format!("{before}{selected}{after}");
        let mut buf = RangeSafeBuffer::new(&original);
        let mut clip = MemoryClipboard::new();
        let toggler = MarkdownToggler::new();

        let first = toggler.apply(kind, &mut buf, TextRange::new(before.len(), selected.len()), &mut clip);
        prop_assert_eq!(first.action, FormatAction::Wrapped);
        let second = toggler.apply(kind, &mut buf, first.formatted, &mut clip);
        prop_assert_eq!(second.action, FormatAction::Unwrapped);
        prop_assert_eq!(&buf.text(), &original);
        prop_assert_eq!(second.new_caret, before.len() + selected.len());
        prop_assert_eq!(clip.writes(), 0);
    }

    // Caret never escapes the buffer regardless of how stale the selection is.
    #[test]
    fn caret_is_clamped(text in "[a-z]{0,8}", o in 0usize..40, l in 0usize..40, kind_idx in 0usize..FormatKind::ALL.len()) {
        let kind = FormatKind::ALL[kind_idx];
        let mut buf = RangeSafeBuffer::new(&text);
        let mut clip = MemoryClipboard::new();
        let edit = MarkdownToggler::new().apply(kind, &mut buf, TextRange::new(o, l), &mut clip);
        prop_assert!(edit.new_caret <= buf.len());
        prop_assert!(edit.formatted.end() <= buf.len());
    }
}

#[test]
fn end_to_end_bold_round_trip() {
    let mut buf = RangeSafeBuffer::new("hello world");
    let mut clip = MemoryClipboard::new();
    let toggler = MarkdownToggler::new();
    let edit = toggler.apply(FormatKind::Bold, &mut buf, TextRange::new(0, 5), &mut clip);
    assert_eq!(edit.new_text, "**hello** world");
    assert_eq!(edit.new_caret, 9);
    let edit = toggler.apply(FormatKind::Bold, &mut buf, TextRange::new(0, 9), &mut clip);
    assert_eq!(edit.new_text, "hello world");
}
