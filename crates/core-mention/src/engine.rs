//! `@`-mention session state machine.
//!
//! ```text
//!   Idle --(char before caret is '@' at doc start or after whitespace)--> Composing
//!   Composing --(text/caret change, query still valid)--> Composing (query updated)
//!   Composing --(whitespace in query | '@' gone | caret before anchor)--> Idle
//!   Composing --(commit item)--> Idle   (buffer rewritten, recency updated)
//!   Composing --(cancel)--> Idle        (buffer untouched)
//! ```
//!
//! Query text is never logged; only offsets and lengths.

use crate::recency::{RecencyCache, SuggestionItem};
use core_text::{RangeSafeBuffer, TextRange};
use tracing::{debug, trace};

pub const MENTION_TRIGGER: char = '@';
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;
pub const DEFAULT_URL_TEMPLATE: &str = "https://example.com/posts/{slug}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSettings {
    pub suggestion_limit: usize,
    /// Canonical post URL; `{slug}` is substituted.
    pub url_template: String,
}

impl Default for MentionSettings {
    fn default() -> Self {
        Self {
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSession {
    /// Byte offset of the `@`.
    pub anchor_offset: usize,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MentionState {
    #[default]
    Idle,
    Composing(MentionSession),
}

/// Why a session ended without a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Whitespace,
    TriggerRemoved,
    InvalidRange,
}

impl DiscardReason {
    fn as_str(self) -> &'static str {
        match self {
            DiscardReason::Whitespace => "whitespace",
            DiscardReason::TriggerRemoved => "trigger_removed",
            DiscardReason::InvalidRange => "invalid_range",
        }
    }
}

/// Outcome of feeding one text/caret change to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionTransition {
    /// Idle before and after.
    None,
    Started,
    Updated,
    Discarded(DiscardReason),
}

/// Buffer rewrite produced by committing a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionCommit {
    pub new_text: String,
    pub new_caret: usize,
    pub inserted: TextRange,
}

#[derive(Debug, Default)]
pub struct MentionEngine {
    state: MentionState,
    settings: MentionSettings,
}

impl MentionEngine {
    pub fn new(settings: MentionSettings) -> Self {
        Self {
            state: MentionState::Idle,
            settings,
        }
    }

    pub fn settings(&self) -> &MentionSettings {
        &self.settings
    }

    pub fn state(&self) -> &MentionState {
        &self.state
    }

    pub fn session(&self) -> Option<&MentionSession> {
        match &self.state {
            MentionState::Composing(s) => Some(s),
            MentionState::Idle => None,
        }
    }

    pub fn is_composing(&self) -> bool {
        matches!(self.state, MentionState::Composing(_))
    }

    /// A character was typed; `cursor` is the caret after the buffer absorbed it.
    pub fn on_key(&mut self, ch: char, buffer: &RangeSafeBuffer, cursor: usize) -> MentionTransition {
        trace!(target: "mention.engine", is_trigger = ch == MENTION_TRIGGER, cursor, "mention_key");
        self.on_cursor_change(buffer, cursor)
    }

    /// Re-evaluate after any text or caret change.
    pub fn on_cursor_change(&mut self, buffer: &RangeSafeBuffer, cursor: usize) -> MentionTransition {
        if let MentionState::Composing(session) = &mut self.state {
            match query_for(buffer, session.anchor_offset, cursor) {
                Ok(query) => {
                    let changed = session.query != query;
                    session.query = query;
                    if changed {
                        trace!(
                            target: "mention.engine",
                            anchor = session.anchor_offset,
                            query_len = session.query.len(),
                            "mention_query_updated"
                        );
                    }
                    return MentionTransition::Updated;
                }
                Err(reason) => {
                    debug!(
                        target: "mention.engine",
                        anchor = session.anchor_offset,
                        reason = reason.as_str(),
                        "mention_discarded"
                    );
                    self.state = MentionState::Idle;
                    // The caret may already sit behind a fresh trigger.
                    if self.try_start(buffer, cursor) {
                        return MentionTransition::Started;
                    }
                    return MentionTransition::Discarded(reason);
                }
            }
        }
        if self.try_start(buffer, cursor) {
            MentionTransition::Started
        } else {
            MentionTransition::None
        }
    }

    fn try_start(&mut self, buffer: &RangeSafeBuffer, cursor: usize) -> bool {
        if buffer.char_before(cursor) != Some(MENTION_TRIGGER) {
            return false;
        }
        let anchor = cursor - MENTION_TRIGGER.len_utf8();
        let boundary_ok = anchor == 0 || buffer.char_before(anchor).is_some_and(char::is_whitespace);
        if !boundary_ok {
            return false;
        }
        self.state = MentionState::Composing(MentionSession {
            anchor_offset: anchor,
            query: String::new(),
        });
        debug!(target: "mention.engine", anchor, "mention_started");
        true
    }

    /// Explicit cancel (escape). Returns whether a session was active.
    pub fn cancel(&mut self) -> bool {
        let was = self.is_composing();
        if was {
            debug!(target: "mention.engine", "mention_cancelled");
        }
        self.state = MentionState::Idle;
        was
    }

    /// Replace `[anchor, cursor)` with a markdown link to `item` and remember the choice.
    /// Returns `None` (and drops the session) if the session no longer describes a valid range.
    pub fn commit(
        &mut self,
        item: &SuggestionItem,
        buffer: &mut RangeSafeBuffer,
        cursor: usize,
        recency: &mut RecencyCache,
    ) -> Option<MentionCommit> {
        let MentionState::Composing(session) = std::mem::take(&mut self.state) else {
            return None;
        };
        if let Err(reason) = query_for(buffer, session.anchor_offset, cursor) {
            debug!(
                target: "mention.engine",
                anchor = session.anchor_offset,
                reason = reason.as_str(),
                "mention_commit_rejected"
            );
            return None;
        }
        let reference = format!("[{}]({})", item.title, self.canonical_url(&item.slug));
        let range = TextRange::from_bounds(session.anchor_offset, cursor);
        let new_len = buffer.replace(range, &reference);
        let new_caret = (session.anchor_offset + reference.len()).min(new_len);
        recency.record_use(item.clone());
        debug!(
            target: "mention.engine",
            anchor = session.anchor_offset,
            replaced = range.length,
            inserted = reference.len(),
            item_id = item.id.as_str(),
            "mention_committed"
        );
        Some(MentionCommit {
            new_text: buffer.text(),
            new_caret,
            inserted: TextRange::new(session.anchor_offset, reference.len()),
        })
    }

    /// Up to `suggestion_limit` candidates for the active query, recency first.
    /// Empty when idle.
    pub fn candidates(&self, recency: &RecencyCache, all: &[SuggestionItem]) -> Vec<SuggestionItem> {
        let Some(session) = self.session() else {
            return Vec::new();
        };
        let merged = recency.merged(all);
        let limit = self.settings.suggestion_limit;
        if session.query.is_empty() {
            return merged.into_iter().take(limit).collect();
        }
        // Filtering only surfaces catalog items; recency entries missing from it are skipped.
        let needle = session.query.to_lowercase();
        merged
            .into_iter()
            .filter(|i| all.iter().any(|a| a.id == i.id) && i.matches(&needle))
            .take(limit)
            .collect()
    }

    pub fn canonical_url(&self, slug: &str) -> String {
        canonical_url(&self.settings.url_template, slug)
    }
}

/// Substitute `slug` into `template`; templates without a placeholder get the slug appended
/// as a final path segment.
pub fn canonical_url(template: &str, slug: &str) -> String {
    if template.contains("{slug}") {
        template.replace("{slug}", slug)
    } else {
        format!("{}/{slug}", template.trim_end_matches('/'))
    }
}

fn query_for(buffer: &RangeSafeBuffer, anchor: usize, cursor: usize) -> Result<String, DiscardReason> {
    if buffer.char_at(anchor) != Some(MENTION_TRIGGER) {
        return Err(DiscardReason::TriggerRemoved);
    }
    let start = anchor + MENTION_TRIGGER.len_utf8();
    if cursor < start {
        return Err(DiscardReason::InvalidRange);
    }
    let range = TextRange::from_bounds(start, cursor);
    if buffer.clamp(range) != range {
        return Err(DiscardReason::InvalidRange);
    }
    let query = buffer.substring(range);
    if query.chars().any(char::is_whitespace) {
        return Err(DiscardReason::Whitespace);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Type `text` one char at a time at the end of `buffer`, feeding the engine like a host.
    fn type_str(engine: &mut MentionEngine, buffer: &mut RangeSafeBuffer, text: &str) -> MentionTransition {
        let mut last = MentionTransition::None;
        for ch in text.chars() {
            let end = buffer.len();
            buffer.replace(TextRange::caret(end), ch.encode_utf8(&mut [0; 4]));
            last = engine.on_key(ch, buffer, buffer.len());
        }
        last
    }

    fn catalog() -> Vec<SuggestionItem> {
        vec![
            SuggestionItem::new("1", "Intro to Rust", "intro-rust"),
            SuggestionItem::new("2", "Async in Practice", "async-practice"),
            SuggestionItem::new("3", "Error Handling", "errors"),
            SuggestionItem::new("4", "Rust Lifetimes", "lifetimes"),
        ]
    }

    #[test]
    fn at_document_start_triggers() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        assert_eq!(type_str(&mut e, &mut b, "@"), MentionTransition::Started);
        assert_eq!(
            e.session(),
            Some(&MentionSession {
                anchor_offset: 0,
                query: String::new()
            })
        );
    }

    #[test]
    fn typing_query_then_space_returns_to_idle() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        type_str(&mut e, &mut b, "@foo");
        assert_eq!(e.session().map(|s| s.query.as_str()), Some("foo"));
        assert_eq!(
            type_str(&mut e, &mut b, " "),
            MentionTransition::Discarded(DiscardReason::Whitespace)
        );
        assert_eq!(e.state(), &MentionState::Idle);
    }

    #[test]
    fn at_after_letter_does_not_trigger() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        assert_eq!(type_str(&mut e, &mut b, "mail@"), MentionTransition::None);
        assert!(!e.is_composing());
    }

    #[test]
    fn at_after_newline_triggers() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("line\n");
        assert_eq!(type_str(&mut e, &mut b, "@"), MentionTransition::Started);
        assert_eq!(e.session().unwrap().anchor_offset, 5);
    }

    #[test]
    fn deleting_trigger_discards() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("hi ");
        type_str(&mut e, &mut b, "@ru");
        b.replace(TextRange::new(3, 1), "");
        assert_eq!(
            e.on_cursor_change(&b, 5),
            MentionTransition::Discarded(DiscardReason::TriggerRemoved)
        );
    }

    #[test]
    fn caret_before_anchor_discards() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("x ");
        type_str(&mut e, &mut b, "@ab");
        assert_eq!(
            e.on_cursor_change(&b, 1),
            MentionTransition::Discarded(DiscardReason::InvalidRange)
        );
    }

    #[test]
    fn cancel_clears_without_touching_buffer() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        type_str(&mut e, &mut b, "@ab");
        assert!(e.cancel());
        assert!(!e.cancel());
        assert_eq!(b.text(), "@ab");
    }

    #[test]
    fn commit_rewrites_range_and_records_use() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("See ");
        let mut recency = RecencyCache::new();
        type_str(&mut e, &mut b, "@asy");
        let item = &catalog()[1];
        let caret = b.len();
        let commit = e.commit(item, &mut b, caret, &mut recency).unwrap();
        let expected = "See [Async in Practice](https://example.com/posts/async-practice)";
        assert_eq!(commit.new_text, expected);
        assert_eq!(commit.new_caret, expected.len());
        assert_eq!(recency.items()[0].id, "2");
        assert!(recency.items()[0].last_used_at.is_some());
        assert!(!e.is_composing());
    }

    #[test]
    fn commit_while_idle_is_rejected() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("text");
        let mut recency = RecencyCache::new();
        assert!(e.commit(&catalog()[0], &mut b, 4, &mut recency).is_none());
        assert_eq!(b.text(), "text");
        assert!(recency.is_empty());
    }

    #[test]
    fn empty_query_lists_recent_first() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        let mut recency = RecencyCache::new();
        recency.record_use(catalog()[3].clone());
        type_str(&mut e, &mut b, "@");
        let ids: Vec<_> = e
            .candidates(&recency, &catalog())
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["4", "1", "2"]);
    }

    #[test]
    fn query_filters_title_and_slug_case_insensitively() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        let mut recency = RecencyCache::new();
        recency.record_use(catalog()[3].clone());
        type_str(&mut e, &mut b, "@RUST");
        let ids: Vec<_> = e
            .candidates(&recency, &catalog())
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["4", "1"]);
        type_str(&mut e, &mut b, "-");
        // No title or slug contains "rust-".
        assert!(e.candidates(&recency, &catalog()).is_empty());
    }

    #[test]
    fn query_skips_recent_items_missing_from_catalog() {
        let mut e = MentionEngine::default();
        let mut b = RangeSafeBuffer::new("");
        let mut recency = RecencyCache::new();
        recency.record_use(SuggestionItem::new("9", "Rust Retired Draft", "retired"));
        recency.record_use(catalog()[3].clone());
        type_str(&mut e, &mut b, "@rust");
        let ids: Vec<_> = e
            .candidates(&recency, &catalog())
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["4", "1"]);
    }

    #[test]
    fn candidates_empty_when_idle() {
        let e = MentionEngine::default();
        assert!(e.candidates(&RecencyCache::new(), &catalog()).is_empty());
    }

    #[test]
    fn url_template_substitution() {
        assert_eq!(canonical_url("https://b.log/{slug}/", "x"), "https://b.log/x/");
        assert_eq!(canonical_url("https://b.log/posts/", "x"), "https://b.log/posts/x");
    }
}
