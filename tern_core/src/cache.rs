//! Memoized completion and argument-hint results.
//!
//! Both caches are anchored at a buffer offset. An edit before the anchor
//! drops the entry, since the text the result was computed for may have
//! shifted.

use crate::completion::CompletionEntry;
use crate::signature::ParsedSignature;

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// The last completion response for a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCompletions {
    /// Offset where the completed token starts.
    pub anchor: usize,
    /// Token text between the anchor and the cursor when the query ran.
    pub prefix: String,
    /// Entries returned for that token.
    pub entries: Vec<CompletionEntry>,
}

impl CachedCompletions {
    pub fn new(anchor: usize, prefix: impl Into<String>, entries: Vec<CompletionEntry>) -> Self {
        Self {
            anchor,
            prefix: prefix.into(),
            entries,
        }
    }

    /// Returns true if these entries still answer a query at `cursor`.
    ///
    /// `typed` is the buffer text between the anchor and the cursor. The
    /// cache holds while the user keeps typing inside the same identifier:
    /// the cursor has not moved before the anchor, the typed text extends
    /// the cached prefix, and it contains only word characters.
    pub fn reusable(&self, cursor: usize, typed: &str) -> bool {
        cursor >= self.anchor && typed.starts_with(&self.prefix) && typed.chars().all(is_word_char)
    }

    /// Returns true if an edit at `edit_pos` invalidates this entry.
    pub fn invalidated_by(&self, edit_pos: usize) -> bool {
        edit_pos < self.anchor
    }
}

/// The last argument-hint response for a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArguments {
    /// Offset of the call the signature belongs to.
    pub call_start: usize,
    pub signature: ParsedSignature,
}

impl CachedArguments {
    pub fn new(call_start: usize, signature: ParsedSignature) -> Self {
        Self {
            call_start,
            signature,
        }
    }

    /// Hints are only reused for the exact same call.
    pub fn matches(&self, call_start: usize) -> bool {
        self.call_start == call_start
    }

    /// Returns true if an edit at `edit_pos` invalidates this entry.
    pub fn invalidated_by(&self, edit_pos: usize) -> bool {
        edit_pos < self.call_start
    }
}

/// Completions handed to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSet {
    pub entries: Vec<CompletionEntry>,
    /// True when the entries come straight from the server for the current
    /// prefix. Reused entries still need filtering by the editor's prefix.
    pub fresh: bool,
}

impl CompletionSet {
    /// Returns the entries to show for `prefix`.
    pub fn visible(&self, prefix: &str) -> Vec<CompletionEntry> {
        if self.fresh {
            return self.entries.clone();
        }
        self.entries
            .iter()
            .filter(|entry| entry.matches_prefix(prefix))
            .cloned()
            .collect()
    }
}
