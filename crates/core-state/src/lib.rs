//! Editor state: the document buffer, the selection, and the engines that act on them.
//!
//! [`EditorState`] is the single owner of every mutable piece of the editing core. It never
//! performs I/O on its own except through the injected collaborators (clipboard and recency
//! store), and it never blocks: each inbound [`Event`] is handled synchronously and answered
//! with zero or more [`EditorUpdate`]s for the host to apply.
//!
//! Caret tracking: the selection is the host's, expressed in byte offsets. Any edit the core
//! performs itself (formatting, mention commit, accepted review) collapses the selection to
//! the caret it produced.
//!
//! Logging: only offsets, lengths, counts and item ids are emitted. Document text, queries and
//! proposals stay out of the log.

use core_config::Config;
use core_diff::DiffResult;
use core_events::{EditorEvent, Event, GenerationEvent};
use core_format::{Clipboard, FormatAction, FormatKind, MarkdownToggler};
use core_mention::{
    MentionEngine, MentionSettings, MentionTransition, RECENCY_CAPACITY, RecencyCache,
    RecencyStore, SuggestionItem,
};
use core_review::{ReviewOutcome, ReviewSession};
use core_text::{RangeSafeBuffer, TextRange};
use std::time::Duration;
use tracing::{debug, trace, warn};

pub mod runtime;

pub use runtime::{EditorRuntime, ShutdownReason, run_event_loop};

/// Outbound notification for the host surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorUpdate {
    /// Replace the host document and place the caret.
    BufferChanged { text: String, caret: usize },
    /// Review diff (streaming or final).
    DiffChanged(DiffResult),
    ReviewClosed { accepted: bool },
    Suggestions {
        query: String,
        items: Vec<SuggestionItem>,
    },
    SuggestionsCleared,
}

/// Tunables resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSettings {
    pub mention: MentionSettings,
    pub recency_capacity: usize,
    pub min_token_interval: Duration,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            mention: MentionSettings::default(),
            recency_capacity: RECENCY_CAPACITY,
            min_token_interval: Duration::ZERO,
        }
    }
}

impl EditorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mention: MentionSettings {
                suggestion_limit: config.effective.suggestion_limit,
                url_template: config.file.mention.url_template.clone(),
            },
            recency_capacity: config.effective.recency_capacity,
            min_token_interval: config.effective.min_token_interval,
        }
    }
}

pub struct EditorState {
    buffer: RangeSafeBuffer,
    selection: TextRange,
    toggler: MarkdownToggler,
    mention: MentionEngine,
    recency: RecencyCache,
    catalog: Vec<SuggestionItem>,
    suggestions: Vec<SuggestionItem>,
    review: ReviewSession,
    clipboard: Box<dyn Clipboard + Send>,
    store: Box<dyn RecencyStore>,
}

impl EditorState {
    /// Build the state for `text`, seeding the recency cache from `store`. A store that fails
    /// to load is logged and treated as empty.
    pub fn new(
        text: &str,
        settings: EditorSettings,
        clipboard: Box<dyn Clipboard + Send>,
        store: Box<dyn RecencyStore>,
    ) -> Self {
        let seeded = match store.load() {
            Ok(items) => items,
            Err(e) => {
                warn!(target: "store", error = %e, "recency_store_load_failed");
                Vec::new()
            }
        };
        let buffer = RangeSafeBuffer::new(text);
        let caret = buffer.len();
        Self {
            buffer,
            selection: TextRange::caret(caret),
            toggler: MarkdownToggler::new(),
            mention: MentionEngine::new(settings.mention),
            recency: RecencyCache::from_items(seeded, settings.recency_capacity),
            catalog: Vec::new(),
            suggestions: Vec::new(),
            review: ReviewSession::new(settings.min_token_interval),
            clipboard,
            store,
        }
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn buffer(&self) -> &RangeSafeBuffer {
        &self.buffer
    }

    pub fn selection(&self) -> TextRange {
        self.selection
    }

    pub fn mention(&self) -> &MentionEngine {
        &self.mention
    }

    pub fn recency(&self) -> &RecencyCache {
        &self.recency
    }

    pub fn review(&self) -> &ReviewSession {
        &self.review
    }

    pub fn catalog(&self) -> &[SuggestionItem] {
        &self.catalog
    }

    /// Candidates last published to the host.
    pub fn suggestions(&self) -> &[SuggestionItem] {
        &self.suggestions
    }

    /// Handle one event. `Shutdown` is the loop's concern and produces nothing here.
    pub fn handle(&mut self, event: &Event) -> Vec<EditorUpdate> {
        match event {
            Event::Editor(ev) => self.handle_editor(ev),
            Event::Generation(ev) => self.handle_generation(ev),
            Event::Shutdown => Vec::new(),
        }
    }

    fn handle_editor(&mut self, event: &EditorEvent) -> Vec<EditorUpdate> {
        match event {
            EditorEvent::SelectionChanged(range) => self.select(*range),
            EditorEvent::TextChanged(text) => self.replace_text(text),
            EditorEvent::FormatCommand(kind) => self.format(*kind),
            EditorEvent::MentionKey { ch, cursor } => self.mention_key(*ch, *cursor),
            EditorEvent::MentionSelect(index) => self.mention_select(*index),
            EditorEvent::MentionCancel => self.mention_cancel(),
            EditorEvent::CatalogLoaded(items) => self.load_catalog(items),
            EditorEvent::AcceptReview => self.accept_review(),
            EditorEvent::RejectReview => self.reject_review(),
        }
    }

    fn select(&mut self, range: TextRange) -> Vec<EditorUpdate> {
        self.selection = self.buffer.clamp(range);
        trace!(
            target: "runtime.events",
            offset = self.selection.offset,
            length = self.selection.length,
            "selection_changed"
        );
        if !self.mention.is_composing() {
            return Vec::new();
        }
        let transition = self.mention.on_cursor_change(&self.buffer, self.selection.end());
        self.publish_suggestions(transition)
    }

    fn replace_text(&mut self, text: &str) -> Vec<EditorUpdate> {
        self.buffer.set_text(text);
        self.selection = self.buffer.clamp(self.selection);
        if !self.mention.is_composing() {
            return Vec::new();
        }
        let transition = self.mention.on_cursor_change(&self.buffer, self.selection.end());
        self.publish_suggestions(transition)
    }

    fn format(&mut self, kind: FormatKind) -> Vec<EditorUpdate> {
        let edit = self.toggler.apply(
            kind,
            &mut self.buffer,
            self.selection,
            self.clipboard.as_mut(),
        );
        if edit.action == FormatAction::Ignored {
            return Vec::new();
        }
        self.selection = TextRange::caret(edit.new_caret);
        let mut out = vec![EditorUpdate::BufferChanged {
            text: edit.new_text,
            caret: edit.new_caret,
        }];
        if self.mention.is_composing() {
            let transition = self.mention.on_cursor_change(&self.buffer, edit.new_caret);
            out.extend(self.publish_suggestions(transition));
        }
        out
    }

    fn mention_key(&mut self, ch: char, cursor: usize) -> Vec<EditorUpdate> {
        self.selection = self.buffer.clamp(TextRange::caret(cursor));
        let transition = self.mention.on_key(ch, &self.buffer, self.selection.offset);
        self.publish_suggestions(transition)
    }

    fn mention_select(&mut self, index: usize) -> Vec<EditorUpdate> {
        let Some(item) = self.suggestions.get(index).cloned() else {
            debug!(target: "runtime.events", index, available = self.suggestions.len(), "mention_select_out_of_range");
            return Vec::new();
        };
        let commit = self.mention.commit(
            &item,
            &mut self.buffer,
            self.selection.end(),
            &mut self.recency,
        );
        let mut out = Vec::new();
        if let Some(commit) = commit {
            self.selection = TextRange::caret(commit.new_caret);
            self.persist_recency();
            out.push(EditorUpdate::BufferChanged {
                text: commit.new_text,
                caret: commit.new_caret,
            });
        }
        // A rejected commit also ends the session.
        self.suggestions.clear();
        out.push(EditorUpdate::SuggestionsCleared);
        out
    }

    fn mention_cancel(&mut self) -> Vec<EditorUpdate> {
        if !self.mention.cancel() {
            return Vec::new();
        }
        self.suggestions.clear();
        vec![EditorUpdate::SuggestionsCleared]
    }

    fn load_catalog(&mut self, items: &[SuggestionItem]) -> Vec<EditorUpdate> {
        self.catalog = items.to_vec();
        debug!(target: "runtime.events", count = self.catalog.len(), "catalog_loaded");
        if self.mention.is_composing() {
            vec![self.refresh_suggestions()]
        } else {
            Vec::new()
        }
    }

    fn publish_suggestions(&mut self, transition: MentionTransition) -> Vec<EditorUpdate> {
        match transition {
            MentionTransition::None => Vec::new(),
            MentionTransition::Started | MentionTransition::Updated => {
                vec![self.refresh_suggestions()]
            }
            MentionTransition::Discarded(_) => {
                self.suggestions.clear();
                vec![EditorUpdate::SuggestionsCleared]
            }
        }
    }

    fn refresh_suggestions(&mut self) -> EditorUpdate {
        self.suggestions = self.mention.candidates(&self.recency, &self.catalog);
        let query = self
            .mention
            .session()
            .map(|s| s.query.clone())
            .unwrap_or_default();
        trace!(
            target: "runtime.events",
            query_len = query.len(),
            count = self.suggestions.len(),
            "suggestions_refreshed"
        );
        EditorUpdate::Suggestions {
            query,
            items: self.suggestions.clone(),
        }
    }

    fn persist_recency(&mut self) {
        if let Err(e) = self.store.save(self.recency.items()) {
            warn!(target: "store", error = %e, "recency_store_save_failed");
        }
    }

    fn handle_generation(&mut self, event: &GenerationEvent) -> Vec<EditorUpdate> {
        match event {
            GenerationEvent::Started { id } => {
                let original = self.buffer.text();
                if self.review.begin(*id, &original) {
                    vec![EditorUpdate::ReviewClosed { accepted: false }]
                } else {
                    Vec::new()
                }
            }
            GenerationEvent::Token { id, partial } => self
                .review
                .on_token(*id, partial)
                .map(|d| vec![EditorUpdate::DiffChanged(d.clone())])
                .unwrap_or_default(),
            GenerationEvent::Finished { id } => {
                let outcome = self.review.finish(*id);
                Self::settled(outcome)
            }
            GenerationEvent::Cancelled { id } => {
                let outcome = self.review.cancel(*id);
                Self::settled(outcome)
            }
        }
    }

    fn settled(outcome: ReviewOutcome) -> Vec<EditorUpdate> {
        match outcome {
            ReviewOutcome::Opened(diff) => vec![EditorUpdate::DiffChanged(diff)],
            ReviewOutcome::Suppressed => vec![EditorUpdate::ReviewClosed { accepted: false }],
            ReviewOutcome::Ignored => Vec::new(),
        }
    }

    fn accept_review(&mut self) -> Vec<EditorUpdate> {
        let Some(proposed) = self.review.accept() else {
            return Vec::new();
        };
        self.buffer.set_text(&proposed);
        let caret = self.buffer.len();
        self.selection = TextRange::caret(caret);
        let mut out = Vec::new();
        if self.mention.cancel() {
            self.suggestions.clear();
            out.push(EditorUpdate::SuggestionsCleared);
        }
        out.push(EditorUpdate::BufferChanged {
            text: proposed,
            caret,
        });
        out.push(EditorUpdate::ReviewClosed { accepted: true });
        out
    }

    fn reject_review(&mut self) -> Vec<EditorUpdate> {
        if self.review.reject() {
            vec![EditorUpdate::ReviewClosed { accepted: false }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_format::MemoryClipboard;
    use core_mention::{MemoryStore, StoreError};
    use pretty_assertions::assert_eq;

    struct FailingStore;

    impl RecencyStore for FailingStore {
        fn load(&self) -> Result<Vec<SuggestionItem>, StoreError> {
            Err(StoreError::Io {
                path: "unreadable.json".into(),
                source: std::io::Error::other("denied"),
            })
        }

        fn save(&mut self, _items: &[SuggestionItem]) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "unreadable.json".into(),
                source: std::io::Error::other("denied"),
            })
        }
    }

    fn state(text: &str) -> EditorState {
        EditorState::new(
            text,
            EditorSettings::default(),
            Box::new(MemoryClipboard::new()),
            Box::new(MemoryStore::default()),
        )
    }

    #[test]
    fn caret_starts_at_document_end() {
        let s = state("héllo");
        assert_eq!(s.selection(), TextRange::caret(6));
    }

    #[test]
    fn selection_is_clamped_to_buffer() {
        let mut s = state("abc");
        s.handle(&EditorEvent::SelectionChanged(TextRange::new(2, 40)).into());
        assert_eq!(s.selection(), TextRange::new(2, 1));
    }

    #[test]
    fn ignored_format_kind_produces_no_update() {
        let mut s = state("abc");
        let out = s.handle(&EditorEvent::FormatCommand(FormatKind::Table).into());
        assert!(out.is_empty());
        assert_eq!(s.text(), "abc");
    }

    #[test]
    fn failing_store_degrades_to_empty_recency() {
        let mut s = EditorState::new(
            "",
            EditorSettings::default(),
            Box::new(MemoryClipboard::new()),
            Box::new(FailingStore),
        );
        assert!(s.recency().is_empty());
        s.handle(
            &EditorEvent::CatalogLoaded(vec![SuggestionItem::new("1", "One", "one")]).into(),
        );
        s.handle(&EditorEvent::TextChanged("@".into()).into());
        s.handle(&EditorEvent::MentionKey { ch: '@', cursor: 1 }.into());
        let out = s.handle(&EditorEvent::MentionSelect(0).into());
        // Save failure is logged; the edit still lands.
        assert!(matches!(out[0], EditorUpdate::BufferChanged { .. }));
        assert_eq!(s.recency().len(), 1);
    }

    #[test]
    fn select_out_of_range_index_is_noop() {
        let mut s = state("");
        assert!(s.handle(&EditorEvent::MentionSelect(3).into()).is_empty());
    }

    #[test]
    fn settings_follow_effective_config() {
        let mut config = Config::default();
        config.file.mention.suggestion_limit = 50;
        config.file.mention.url_template = "https://n.io/{slug}".into();
        config.sanitize();
        let settings = EditorSettings::from_config(&config);
        assert_eq!(settings.mention.suggestion_limit, core_config::SUGGESTION_LIMIT_MAX);
        assert_eq!(settings.mention.url_template, "https://n.io/{slug}");
        assert_eq!(settings.recency_capacity, 10);
    }
}
