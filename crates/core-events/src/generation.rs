//! Adapter turning a stream of partial documents into generation events.
//!
//! The text-generation collaborator is anything that yields successive full-document strings.
//! [`StreamGenerationSource`] forwards them as `GenerationEvent::Token`s bracketed by `Started`
//! and `Finished`. A [`GenerationCancel`] handle stops the stream cooperatively; the task then
//! emits `Cancelled` instead of `Finished` and drops the stream.

use crate::{AsyncEventSource, Event, GenerationEvent};
use core_review::GenerationId;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, trace};

/// Cancels one generation stream. Cloneable; signalling more than once is harmless.
#[derive(Clone, Debug)]
pub struct GenerationCancel {
    notify: Arc<Notify>,
}

impl GenerationCancel {
    pub fn signal(&self) {
        // `notify_one` stores a permit, so a signal sent before the task polls is not lost.
        self.notify.notify_one();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    StreamEnded,
    Cancelled,
    ChannelClosed,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::Cancelled => "cancelled",
            ExitReason::ChannelClosed => "channel_closed",
        }
    }
}

pub struct StreamGenerationSource<S> {
    id: GenerationId,
    stream: S,
    cancel: Arc<Notify>,
}

impl<S> StreamGenerationSource<S>
where
    S: Stream<Item = String> + Send + Unpin + 'static,
{
    pub fn new(id: GenerationId, stream: S) -> (Self, GenerationCancel) {
        let notify = Arc::new(Notify::new());
        (
            Self {
                id,
                stream,
                cancel: notify.clone(),
            },
            GenerationCancel { notify },
        )
    }

    async fn run(mut self, tx: Sender<Event>) {
        let id = self.id;
        if tx.send(GenerationEvent::Started { id }.into()).await.is_err() {
            debug!(target: "runtime.events", id, reason = ExitReason::ChannelClosed.as_str(), "generation_stopped");
            return;
        }
        let mut tokens = 0usize;
        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.notified() => break ExitReason::Cancelled,
                item = self.stream.next() => item,
            };
            let Some(partial) = next else {
                break ExitReason::StreamEnded;
            };
            tokens += 1;
            trace!(target: "runtime.events", id, partial_len = partial.len(), "generation_token");
            if tx
                .send(GenerationEvent::Token { id, partial }.into())
                .await
                .is_err()
            {
                break ExitReason::ChannelClosed;
            }
        };

        let closing = match reason {
            ExitReason::StreamEnded => Some(GenerationEvent::Finished { id }),
            ExitReason::Cancelled => Some(GenerationEvent::Cancelled { id }),
            ExitReason::ChannelClosed => None,
        };
        if let Some(ev) = closing {
            let _ = tx.send(ev.into()).await;
        }
        debug!(target: "runtime.events", id, tokens, reason = reason.as_str(), "generation_stopped");
    }
}

impl<S> AsyncEventSource for StreamGenerationSource<S>
where
    S: Stream<Item = String> + Send + Unpin + 'static,
{
    fn name(&self) -> &'static str {
        "generation"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        tokio::spawn((*self).run(tx))
    }
}
