//! Typed event channel between the host editor surface and the editing core.
//!
//! The host pushes [`Event`]s into a bounded tokio mpsc channel; a single consumer (the
//! `core-state` event loop) drains it. No global listener registration is involved: whoever
//! holds a `Sender<Event>` can drive the core, nobody else can.

use anyhow::Context;
use core_format::FormatKind;
use core_mention::SuggestionItem;
use core_review::GenerationId;
use core_text::TextRange;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

pub mod generation;

pub use generation::{GenerationCancel, StreamGenerationSource};

// -------------------------------------------------------------------------------------------------
// Channel Policy
// -------------------------------------------------------------------------------------------------
// Bounded so a runaway producer (a generation stream emitting faster than diffs are computed)
// gets backpressure instead of growing memory. Producers await `send`; nothing is dropped.
// -------------------------------------------------------------------------------------------------
pub const EVENT_CHANNEL_CAP: usize = 1024;

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Editor(EditorEvent),
    Generation(GenerationEvent),
    Shutdown,
}

/// Inbound notifications from the editor surface.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// Native selection already translated into byte offsets.
    SelectionChanged(TextRange),
    /// Full document text after an edit the host applied itself.
    TextChanged(String),
    FormatCommand(FormatKind),
    /// A character was typed; `cursor` is the caret after insertion.
    MentionKey { ch: char, cursor: usize },
    /// Pick the candidate at this index of the current suggestion list.
    MentionSelect(usize),
    MentionCancel,
    /// Replace the full list of referenceable items.
    CatalogLoaded(Vec<SuggestionItem>),
    AcceptReview,
    RejectReview,
}

/// Items emitted by a text-generation collaborator. Each carries the id of its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    Started { id: GenerationId },
    /// Partial *full-document* text; each one supersedes the previous.
    Token { id: GenerationId, partial: String },
    Finished { id: GenerationId },
    Cancelled { id: GenerationId },
}

impl GenerationEvent {
    pub fn id(&self) -> GenerationId {
        match self {
            GenerationEvent::Started { id }
            | GenerationEvent::Token { id, .. }
            | GenerationEvent::Finished { id }
            | GenerationEvent::Cancelled { id } => *id,
        }
    }
}

impl From<EditorEvent> for Event {
    fn from(ev: EditorEvent) -> Self {
        Event::Editor(ev)
    }
}

impl From<GenerationEvent> for Event {
    fn from(ev: GenerationEvent) -> Self {
        Event::Generation(ev)
    }
}

// -------------------------------------------------------------------------------------------------
// Event Transform Hooks
// -------------------------------------------------------------------------------------------------
/// Optional hooks that observe events at the loop boundary. These should not block.
pub trait EventHooks: Send + Sync + 'static {
    fn pre_handle(&self, _event: &Event) {}
    fn post_handle(&self, _event: &Event) {}
}

/// Default no-op hooks implementation.
pub struct NoopEventHooks;

impl EventHooks for NoopEventHooks {}

// -------------------------------------------------------------------------------------------------
// Async Event Sources
// -------------------------------------------------------------------------------------------------
// Producers that live outside the editing thread (generation streams today) register uniformly.
// Each source owns its task lifecycle and must stop promptly once `send` fails (consumer gone).

/// Trait implemented by any async event producer. Implementors usually hold configuration and
/// spawn one background task that pushes `Event`s into the shared channel.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle. Implementors should
    /// stop when `tx.send(..).await` returns Err (channel closed) or on their own internal stop
    /// condition.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned together once the channel exists.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source receives its own
    /// clone of `tx`; the caller keeps ownership of the original.
    ///
    /// During shutdown the caller should drop its final `Sender` clone before awaiting the
    /// returned handles so the sources observe the closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Drain so duplicate spawns are impossible if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Helper result type for channel plumbing.
pub type EventResult<T> = anyhow::Result<T>;

/// Send one event, converting a closed channel into an error the host can report.
pub async fn forward(tx: &Sender<Event>, event: impl Into<Event>) -> EventResult<()> {
    tx.send(event.into())
        .await
        .ok()
        .context("event channel closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockOnceSource;

    impl AsyncEventSource for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(EditorEvent::MentionCancel.into()).await;
            })
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource);
        assert_eq!(reg.len(), 1);
        let handles = reg.spawn_all(&tx);
        assert!(reg.is_empty(), "spawn_all drains the registry");
        let ev = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("source should emit promptly");
        assert!(matches!(ev, Some(Event::Editor(EditorEvent::MentionCancel))));
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn forward_reports_closed_channel() {
        let (tx, rx) = mpsc::channel::<Event>(1);
        drop(rx);
        let err = forward(&tx, Event::Shutdown).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn generation_event_id() {
        let ev = GenerationEvent::Token {
            id: 7,
            partial: "x".into(),
        };
        assert_eq!(ev.id(), 7);
        assert_eq!(GenerationEvent::Cancelled { id: 3 }.id(), 3);
    }
}
