//! Word-level review diff.
//!
//! This is not a minimal edit script. Both documents are tokenized on whitespace and walked in
//! lockstep; the first index where the words differ (the divergence index) splits each side into
//! an unchanged head and a single styled tail running to the end of that side. A change near the
//! top therefore highlights nearly the whole remainder even when later words match again.
//!
//! Each side's spans concatenate back to that side's text, so renderers can lay them out
//! verbatim.

use serde::Serialize;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Unchanged,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSpan {
    pub text: String,
    pub kind: SpanKind,
}

impl DiffSpan {
    pub fn new(text: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn unchanged(text: impl Into<String>) -> Self {
        Self::new(text, SpanKind::Unchanged)
    }
}

/// Which document a rendering describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Original,
    Proposed,
}

impl Side {
    /// Styling applied to this side's divergent tail.
    pub const fn styled_kind(self) -> SpanKind {
        match self {
            Side::Original => SpanKind::Removed,
            Side::Proposed => SpanKind::Added,
        }
    }
}

/// Spans for both renderings of one comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DiffResult {
    pub original: Vec<DiffSpan>,
    pub proposed: Vec<DiffSpan>,
    /// First differing word index; `None` when the texts are identical.
    pub divergence: Option<usize>,
}

impl DiffResult {
    pub fn side(&self, side: Side) -> &[DiffSpan] {
        match side {
            Side::Original => &self.original,
            Side::Proposed => &self.proposed,
        }
    }

    /// True when at least one span carries a change marker.
    pub fn has_changes(&self) -> bool {
        self.original
            .iter()
            .chain(&self.proposed)
            .any(|s| s.kind != SpanKind::Unchanged)
    }
}

/// Byte span `[start, end)` of one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordLoc {
    pub start: usize,
    pub end: usize,
}

/// Locate every whitespace-delimited word. Each word is searched for from the end of the
/// previous match, so repeated words resolve strictly left to right.
pub fn locate_words(text: &str) -> Vec<WordLoc> {
    let mut cursor = 0usize;
    let mut out = Vec::new();
    for word in text.split_whitespace() {
        let Some(rel) = text[cursor..].find(word) else {
            break;
        };
        let start = cursor + rel;
        let end = start + word.len();
        out.push(WordLoc { start, end });
        cursor = end;
    }
    out
}

/// First index at which the two word lists differ, or the shorter length when one is a prefix
/// of the other.
pub fn divergence_index(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .unwrap_or(a.len().min(b.len()))
}

/// Stateless engine; kept as a type so hosts can hold it alongside the other services.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordDiffEngine;

impl WordDiffEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn diff(&self, original: &str, proposed: &str) -> DiffResult {
        diff(original, proposed)
    }
}

/// Compute both renderings.
pub fn diff(original: &str, proposed: &str) -> DiffResult {
    if original == proposed {
        return DiffResult {
            original: vec![DiffSpan::unchanged(original)],
            proposed: vec![DiffSpan::unchanged(proposed)],
            divergence: None,
        };
    }

    let orig_locs = locate_words(original);
    let prop_locs = locate_words(proposed);
    let orig_words: Vec<&str> = orig_locs.iter().map(|l| &original[l.start..l.end]).collect();
    let prop_words: Vec<&str> = prop_locs.iter().map(|l| &proposed[l.start..l.end]).collect();
    let divergence = divergence_index(&orig_words, &prop_words);

    trace!(
        target: "diff.engine",
        original_words = orig_words.len(),
        proposed_words = prop_words.len(),
        divergence,
        "diff_computed"
    );

    DiffResult {
        original: render_side(original, &orig_locs, divergence, Side::Original),
        proposed: render_side(proposed, &prop_locs, divergence, Side::Proposed),
        divergence: Some(divergence),
    }
}

/// Render one side given its word locations and the divergence index.
///
/// Words before `divergence` are unchanged. The whitespace separating them from the first
/// divergent word is its own unchanged span, and the styled tail starts at that word and runs to
/// the end of the side. A side with no word at or past the divergence index has nothing to style
/// and renders fully unchanged.
pub fn render_side(text: &str, locs: &[WordLoc], divergence: usize, side: Side) -> Vec<DiffSpan> {
    if text.is_empty() {
        return Vec::new();
    }
    let Some(first_styled) = locs.get(divergence) else {
        return vec![DiffSpan::unchanged(text)];
    };
    let head_end = match divergence {
        0 => 0,
        n => locs[n - 1].end,
    };
    let mut spans = Vec::with_capacity(3);
    if head_end > 0 {
        spans.push(DiffSpan::unchanged(&text[..head_end]));
    }
    if first_styled.start > head_end {
        spans.push(DiffSpan::unchanged(&text[head_end..first_styled.start]));
    }
    spans.push(DiffSpan::new(&text[first_styled.start..], side.styled_kind()));
    spans
}
