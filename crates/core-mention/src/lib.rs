//! `@`-mention autocomplete: the session state machine, the recency cache that orders its
//! candidates, and the storage seam the cache is persisted through.

pub mod engine;
pub mod recency;
pub mod store;

pub use engine::{
    DEFAULT_SUGGESTION_LIMIT, DEFAULT_URL_TEMPLATE, DiscardReason, MENTION_TRIGGER, MentionCommit,
    MentionEngine, MentionSession, MentionSettings, MentionState, MentionTransition, canonical_url,
};
pub use recency::{RECENCY_CAPACITY, RecencyCache, SuggestionItem};
pub use store::{JsonFileStore, MemoryStore, RecencyStore, StoreError};
