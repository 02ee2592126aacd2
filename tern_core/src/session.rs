//! Per-buffer analysis state.

use crate::cache::{CachedArguments, CachedCompletions};
use std::time::Instant;

/// Analysis state of one open editor buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferState {
    /// Whether the buffer differs from what the server last received.
    pub dirty: bool,
    /// When the last delayed push was scheduled.
    pub last_scheduled: Option<Instant>,
    pub completions: Option<CachedCompletions>,
    pub arguments: Option<CachedArguments>,
    /// Whether argument hints are currently rendered for this buffer.
    pub showing_arguments: bool,
}

impl BufferState {
    /// Creates state for a buffer, dirty if it has unsaved edits.
    pub fn new(dirty: bool) -> Self {
        Self {
            dirty,
            ..Self::default()
        }
    }

    /// Drops cached results anchored after an edit at `edit_pos`.
    pub fn invalidate_before(&mut self, edit_pos: usize) {
        if self
            .completions
            .as_ref()
            .is_some_and(|c| c.invalidated_by(edit_pos))
        {
            log::debug!("Dropping cached completions after edit at {}", edit_pos);
            self.completions = None;
        }
        if self
            .arguments
            .as_ref()
            .is_some_and(|a| a.invalidated_by(edit_pos))
        {
            log::debug!("Dropping cached argument hints after edit at {}", edit_pos);
            self.arguments = None;
        }
    }

    /// Returns true if a push stamped `stamp` is still the latest and needed.
    pub fn push_is_current(&self, stamp: Instant) -> bool {
        self.dirty && self.last_scheduled == Some(stamp)
    }
}
