//! Review of AI-proposed rewrites.
//!
//! A generation streams partial full-document strings. Each one replaces the held proposed text
//! and (subject to an optional throttle) recomputes the word diff against the document snapshot
//! taken when the generation began. When the stream finishes or is cancelled the session either
//! opens a review (there is something to show) or quietly returns to idle (empty or unchanged
//! result). Accept hands back the proposed text for a single atomic buffer replace; reject drops
//! it.
//!
//! Every token carries the id of the generation that produced it. Tokens for any other id are
//! ignored, which keeps a late producer from leaking into a newer session.
//!
//! Phase transitions:
//! * `Idle | Pending` --begin--> `Streaming` (a pending review is invalidated first)
//! * `Streaming` --token--> `Streaming`
//! * `Streaming` --finish/cancel--> `Pending` | `Idle`
//! * `Pending` --accept/reject--> `Idle`

use core_diff::{DiffResult, WordDiffEngine};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub type GenerationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    Idle,
    Streaming(GenerationId),
    /// Review open; waiting for accept or reject.
    Pending(GenerationId),
}

/// How a stream ended, as far as the review surface is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Review is open with these spans.
    Opened(DiffResult),
    /// Nothing usable was produced; no review is shown.
    Suppressed,
    /// The event did not apply to the current generation.
    Ignored,
}

#[derive(Debug)]
pub struct ReviewSession {
    phase: ReviewPhase,
    original: String,
    proposed: Option<String>,
    diff: Option<DiffResult>,
    diff_stale: bool,
    engine: WordDiffEngine,
    min_interval: Duration,
    last_diff_at: Option<Instant>,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl ReviewSession {
    /// `min_interval` throttles diff recomputation during streaming; zero recomputes on every
    /// token. Completion and cancellation always bring the diff up to date.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            phase: ReviewPhase::Idle,
            original: String::new(),
            proposed: None,
            diff: None,
            diff_stale: false,
            engine: WordDiffEngine::new(),
            min_interval,
            last_diff_at: None,
        }
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, ReviewPhase::Pending(_))
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.phase, ReviewPhase::Streaming(_))
    }

    /// Snapshot the proposal is compared against.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Last streamed proposal, if any.
    pub fn proposed(&self) -> Option<&str> {
        self.proposed.as_deref()
    }

    pub fn diff(&self) -> Option<&DiffResult> {
        self.diff.as_ref()
    }

    /// Start tracking generation `id` against `original`. Any open review or older stream is
    /// invalidated. Returns whether something was invalidated.
    pub fn begin(&mut self, id: GenerationId, original: &str) -> bool {
        let invalidated = self.phase != ReviewPhase::Idle;
        if invalidated {
            debug!(target: "review.session", previous = ?self.phase, id, "review_invalidated_by_new_generation");
        }
        self.phase = ReviewPhase::Streaming(id);
        self.original = original.to_string();
        self.proposed = None;
        self.diff = None;
        self.diff_stale = false;
        self.last_diff_at = None;
        debug!(target: "review.session", id, original_len = original.len(), "generation_begin");
        invalidated
    }

    pub fn on_token(&mut self, id: GenerationId, partial: &str) -> Option<&DiffResult> {
        self.on_token_at(id, partial, Instant::now())
    }

    /// Replace the held proposal. Returns the recomputed diff, or `None` when the token was
    /// stale or the recomputation was throttled.
    pub fn on_token_at(&mut self, id: GenerationId, partial: &str, now: Instant) -> Option<&DiffResult> {
        if self.phase != ReviewPhase::Streaming(id) {
            trace!(target: "review.session", id, phase = ?self.phase, "token_ignored");
            return None;
        }
        self.proposed = Some(partial.to_string());
        let throttled = self
            .last_diff_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.min_interval);
        if throttled {
            self.diff_stale = true;
            trace!(target: "review.session", id, proposed_len = partial.len(), "diff_throttled");
            return None;
        }
        self.last_diff_at = Some(now);
        self.recompute();
        trace!(target: "review.session", id, proposed_len = partial.len(), "diff_recomputed");
        self.diff.as_ref()
    }

    /// Stream completed normally.
    pub fn finish(&mut self, id: GenerationId) -> ReviewOutcome {
        self.settle(id, "generation_finished")
    }

    /// Stream cancelled. Later tokens are ignored, but the last proposal stays reviewable.
    pub fn cancel(&mut self, id: GenerationId) -> ReviewOutcome {
        self.settle(id, "generation_cancelled")
    }

    fn settle(&mut self, id: GenerationId, event: &'static str) -> ReviewOutcome {
        if self.phase != ReviewPhase::Streaming(id) {
            trace!(target: "review.session", id, phase = ?self.phase, event, "settle_ignored");
            return ReviewOutcome::Ignored;
        }
        if self.proposed.as_deref().is_none_or(str::is_empty) {
            return self.suppress(id, event);
        }
        if self.diff_stale || self.diff.is_none() {
            self.recompute();
        }
        // Identical and whitespace-only rewrites mark no change.
        let diff = match &self.diff {
            Some(diff) if diff.has_changes() => diff.clone(),
            _ => return self.suppress(id, event),
        };
        self.phase = ReviewPhase::Pending(id);
        debug!(target: "review.session", id, event, "review_opened");
        ReviewOutcome::Opened(diff)
    }

    fn suppress(&mut self, id: GenerationId, event: &'static str) -> ReviewOutcome {
        debug!(target: "review.session", id, event, "review_suppressed");
        self.clear();
        ReviewOutcome::Suppressed
    }

    /// Close the open review and hand back the proposal for the buffer.
    pub fn accept(&mut self) -> Option<String> {
        let ReviewPhase::Pending(id) = self.phase else {
            trace!(target: "review.session", phase = ?self.phase, "accept_ignored");
            return None;
        };
        let proposed = self.proposed.take();
        debug!(target: "review.session", id, proposed_len = proposed.as_ref().map(String::len), "review_accepted");
        self.clear();
        proposed
    }

    /// Close the open review, discarding the proposal.
    pub fn reject(&mut self) -> bool {
        let ReviewPhase::Pending(id) = self.phase else {
            trace!(target: "review.session", phase = ?self.phase, "reject_ignored");
            return false;
        };
        debug!(target: "review.session", id, "review_rejected");
        self.clear();
        true
    }

    fn recompute(&mut self) {
        if let Some(p) = &self.proposed {
            self.diff = Some(self.engine.diff(&self.original, p));
            self.diff_stale = false;
        }
    }

    fn clear(&mut self) {
        self.phase = ReviewPhase::Idle;
        self.original.clear();
        self.proposed = None;
        self.diff = None;
        self.diff_stale = false;
        self.last_diff_at = None;
    }
}
