//! Single-consumer event loop driving [`EditorState`].
//!
//! Every mutation of the editing core happens here, one event at a time, in arrival order.
//! Updates are pushed to the host over a second bounded channel; the loop awaits capacity
//! rather than dropping them.

use crate::{EditorState, EditorUpdate};
use anyhow::Result;
use core_events::{Event, EventHooks, NoopEventHooks};
use std::fmt;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{Instrument, info, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    ShutdownEvent,
    /// Every event sender was dropped.
    ChannelClosed,
    /// The host stopped listening for updates.
    UpdatesClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
            ShutdownReason::UpdatesClosed => "updates_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct EditorRuntime {
    state: EditorState,
    rx: Receiver<Event>,
    updates: Sender<EditorUpdate>,
    hooks: Box<dyn EventHooks>,
}

impl EditorRuntime {
    pub fn new(state: EditorState, rx: Receiver<Event>, updates: Sender<EditorUpdate>) -> Self {
        Self {
            state,
            rx,
            updates,
            hooks: Box::new(NoopEventHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn EventHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Drain events until shutdown. Returns the final state and why the loop stopped.
    pub async fn run(self) -> Result<(EditorState, ShutdownReason)> {
        let span = tracing::debug_span!(target: "runtime", "event_loop");
        self.drain().instrument(span).await
    }

    async fn drain(mut self) -> Result<(EditorState, ShutdownReason)> {
        let mut reason = ShutdownReason::ChannelClosed;
        'events: while let Some(event) = self.rx.recv().await {
            self.hooks.pre_handle(&event);
            if matches!(event, Event::Shutdown) {
                reason = ShutdownReason::ShutdownEvent;
                break;
            }

            let updates = self.state.handle(&event);
            trace!(target: "runtime.events", updates = updates.len(), "event_handled");
            for update in updates {
                if self.updates.send(update).await.is_err() {
                    reason = ShutdownReason::UpdatesClosed;
                    break 'events;
                }
            }
            self.hooks.post_handle(&event);
        }

        self.rx.close();
        info!(target: "runtime.shutdown", reason = reason.as_str(), "event_loop_stopped");
        Ok((self.state, reason))
    }
}

/// Run `state` against `rx` with no hooks installed.
pub async fn run_event_loop(
    state: EditorState,
    rx: Receiver<Event>,
    updates: Sender<EditorUpdate>,
) -> Result<(EditorState, ShutdownReason)> {
    EditorRuntime::new(state, rx, updates).run().await
}
