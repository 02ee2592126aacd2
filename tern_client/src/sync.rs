//! Tracking which buffers the server has an outdated copy of.
//!
//! Edits mark a buffer dirty and schedule a delayed push of its full text.
//! Bursts of edits share one push: a new push is only scheduled once the
//! previous one is older than the minimum interval, and a push only runs if
//! no newer one superseded it and the buffer is still dirty.

use std::time::{Duration, Instant};
use tern_bridge_core::BufferState;

/// Decides when buffers need to be pushed to the server.
#[derive(Debug, Clone, Copy)]
pub struct BufferSyncTracker {
    delay: Duration,
    min_interval: Duration,
}

impl BufferSyncTracker {
    pub fn new(delay: Duration, min_interval: Duration) -> Self {
        Self { delay, min_interval }
    }

    /// Delay between scheduling a push and running it.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records an edit at `edit_pos`.
    ///
    /// Returns the stamp of a push to schedule, if this edit starts a new
    /// burst. Cached results anchored after the edit are dropped.
    pub fn on_modified(&self, state: &mut BufferState, edit_pos: usize, now: Instant) -> Option<Instant> {
        state.dirty = true;

        let starts_burst = state
            .last_scheduled
            .map_or(true, |last| now.saturating_duration_since(last) > self.min_interval);
        let stamp = if starts_burst {
            state.last_scheduled = Some(now);
            Some(now)
        } else {
            None
        };

        state.invalidate_before(edit_pos);
        stamp
    }
}
