//! Markdown formatting toggler.
//!
//! Turns a [`FormatKind`] plus the current selection into a buffer mutation:
//! * non-empty selection already carrying the kind's prefix and suffix: strip one of each;
//! * non-empty selection otherwise: wrap it;
//! * empty selection: insert the kind's placeholder token and park the caret inside it.
//!
//! Images and links never unwrap; the selection always becomes the label. Link formatting is
//! the single place that reads or writes the [`Clipboard`].

use core_text::{RangeSafeBuffer, TextRange};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub mod clipboard;

pub use clipboard::{Clipboard, MemoryClipboard, url_candidate};

/// Formatting commands a host toolbar/keymap can issue.
///
/// `Table`, `Blockquote`, `HorizontalRule` and `TaskList` exist on host toolbars but have no
/// toggle behavior here; they are accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Heading,
    Bold,
    Italic,
    Strikethrough,
    Code,
    CodeBlock,
    Image,
    Link,
    Table,
    Blockquote,
    HorizontalRule,
    TaskList,
}

/// Literal tokens for one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatTokens {
    pub prefix: &'static str,
    pub suffix: &'static str,
    /// Inserted verbatim when the selection is empty.
    pub insertion: &'static str,
    /// Caret position inside `insertion`.
    pub caret: usize,
    /// Whether an already-wrapped selection is unwrapped.
    pub toggles: bool,
}

impl FormatKind {
    pub const ALL: [FormatKind; 12] = [
        FormatKind::Heading,
        FormatKind::Bold,
        FormatKind::Italic,
        FormatKind::Strikethrough,
        FormatKind::Code,
        FormatKind::CodeBlock,
        FormatKind::Image,
        FormatKind::Link,
        FormatKind::Table,
        FormatKind::Blockquote,
        FormatKind::HorizontalRule,
        FormatKind::TaskList,
    ];

    /// Token table. `None` for kinds without toggle behavior.
    pub const fn tokens(self) -> Option<FormatTokens> {
        const fn sym(
            prefix: &'static str,
            suffix: &'static str,
            insertion: &'static str,
            caret: usize,
        ) -> Option<FormatTokens> {
            Some(FormatTokens {
                prefix,
                suffix,
                insertion,
                caret,
                toggles: true,
            })
        }
        match self {
            FormatKind::Heading => sym("# ", "", "# ", 2),
            FormatKind::Bold => sym("**", "**", "****", 2),
            FormatKind::Italic => sym("_", "_", "__", 1),
            FormatKind::Strikethrough => sym("~~", "~~", "~~~~", 2),
            FormatKind::Code => sym("`", "`", "``", 1),
            FormatKind::CodeBlock => sym("```\n", "\n```", "```\n\n```", 4),
            FormatKind::Image => Some(FormatTokens {
                prefix: "![",
                suffix: "]()",
                insertion: "![]()",
                caret: 2,
                toggles: false,
            }),
            FormatKind::Link => Some(FormatTokens {
                prefix: "[",
                suffix: "]()",
                insertion: "[]()",
                caret: 1,
                toggles: false,
            }),
            FormatKind::Table
            | FormatKind::Blockquote
            | FormatKind::HorizontalRule
            | FormatKind::TaskList => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FormatKind::Heading => "heading",
            FormatKind::Bold => "bold",
            FormatKind::Italic => "italic",
            FormatKind::Strikethrough => "strikethrough",
            FormatKind::Code => "code",
            FormatKind::CodeBlock => "code-block",
            FormatKind::Image => "image",
            FormatKind::Link => "link",
            FormatKind::Table => "table",
            FormatKind::Blockquote => "blockquote",
            FormatKind::HorizontalRule => "horizontal-rule",
            FormatKind::TaskList => "task-list",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormatKind(pub String);

impl fmt::Display for UnknownFormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown format kind `{}`", self.0)
    }
}

impl std::error::Error for UnknownFormatKind {}

impl FromStr for FormatKind {
    type Err = UnknownFormatKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase().replace('_', "-");
        FormatKind::ALL
            .into_iter()
            .find(|k| k.as_str() == norm || k.as_str().replace('-', "") == norm)
            .ok_or_else(|| UnknownFormatKind(s.to_string()))
    }
}

/// What the toggler did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatAction {
    Wrapped,
    Unwrapped,
    Inserted,
    Ignored,
}

/// Result of one format command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatEdit {
    pub new_text: String,
    pub new_caret: usize,
    /// Range now occupied by the formatted (or inserted) text.
    pub formatted: TextRange,
    pub action: FormatAction,
}

/// Stateless toggler; all state lives in the buffer, the selection and the clipboard.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownToggler;

impl MarkdownToggler {
    pub fn new() -> Self {
        Self
    }

    /// Apply `kind` to `selection`, mutating `buffer` in place.
    pub fn apply(
        &self,
        kind: FormatKind,
        buffer: &mut RangeSafeBuffer,
        selection: TextRange,
        clipboard: &mut dyn Clipboard,
    ) -> FormatEdit {
        let selection = buffer.clamp(selection);
        let Some(tokens) = kind.tokens() else {
            debug!(target: "format.toggle", kind = kind.as_str(), "format_kind_ignored");
            return FormatEdit {
                new_text: buffer.text(),
                new_caret: selection.end(),
                formatted: selection,
                action: FormatAction::Ignored,
            };
        };

        let (formatted, caret_in_formatted, action) = if selection.is_empty() {
            let (insertion, caret) = empty_insertion(kind, tokens, clipboard);
            (insertion, caret, FormatAction::Inserted)
        } else {
            let selected = buffer.substring(selection);
            let (text, action) = toggle_selected(kind, tokens, &selected, clipboard);
            let len = text.len();
            (text, len, action)
        };

        let new_len = buffer.replace(selection, &formatted);
        let new_caret = (selection.offset + caret_in_formatted).min(new_len);
        debug!(
            target: "format.toggle",
            kind = kind.as_str(),
            action = ?action,
            selection_offset = selection.offset,
            selection_len = selection.length,
            formatted_len = formatted.len(),
            new_caret,
            "format_applied"
        );
        FormatEdit {
            new_text: buffer.text(),
            new_caret,
            formatted: TextRange::new(selection.offset, formatted.len()),
            action,
        }
    }
}

fn empty_insertion(
    kind: FormatKind,
    tokens: FormatTokens,
    clipboard: &dyn Clipboard,
) -> (String, usize) {
    if kind == FormatKind::Link
        && let Some(url) = clipboard_url(clipboard)
    {
        let text = format!("[]({url})");
        let len = text.len();
        return (text, len);
    }
    (tokens.insertion.to_string(), tokens.caret)
}

fn toggle_selected(
    kind: FormatKind,
    tokens: FormatTokens,
    selected: &str,
    clipboard: &mut dyn Clipboard,
) -> (String, FormatAction) {
    match kind {
        FormatKind::Link => {
            let target = match clipboard_url(clipboard) {
                Some(url) => url,
                None => {
                    // Keep the label around so it can be pasted elsewhere.
                    clipboard.write_text(selected);
                    String::new()
                }
            };
            (format!("[{selected}]({target})"), FormatAction::Wrapped)
        }
        _ if tokens.toggles && is_wrapped(selected, tokens) => {
            let inner = &selected[tokens.prefix.len()..selected.len() - tokens.suffix.len()];
            (inner.to_string(), FormatAction::Unwrapped)
        }
        _ => (
            format!("{}{selected}{}", tokens.prefix, tokens.suffix),
            FormatAction::Wrapped,
        ),
    }
}

fn is_wrapped(selected: &str, tokens: FormatTokens) -> bool {
    selected.len() >= tokens.prefix.len() + tokens.suffix.len()
        && selected.starts_with(tokens.prefix)
        && selected.ends_with(tokens.suffix)
}

fn clipboard_url(clipboard: &dyn Clipboard) -> Option<String> {
    let text = clipboard.read_text()?;
    url_candidate(&text).map(str::to_string)
}
