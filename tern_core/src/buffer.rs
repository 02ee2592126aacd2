//! Text buffer implementation using ropey.
//!
//! Offsets are character indices, which is also what the server expects in
//! the `end` field of a query.

use ropey::Rope;
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;

/// A snapshot of an editor buffer's text.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    rope: Rope,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// Creates a new empty text buffer.
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Creates a text buffer from a string.
    pub fn from_str(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Loads a text buffer from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        let rope = Rope::from_reader(BufReader::new(file))?;
        Ok(Self { rope })
    }

    /// Returns the total number of characters in the buffer.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Inserts a string at the given character index.
    pub fn insert(&mut self, char_idx: usize, text: &str) {
        let idx = char_idx.min(self.len_chars());
        self.rope.insert(idx, text);
    }

    /// Removes text in the given character range.
    pub fn remove(&mut self, start: usize, end: usize) {
        let start = start.min(self.len_chars());
        let end = end.min(self.len_chars());
        if start < end {
            self.rope.remove(start..end);
        }
    }

    /// Returns the text between two character offsets.
    ///
    /// Offsets are clamped to the buffer; an inverted range yields an empty string.
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.len_chars());
        let start = start.min(end);
        self.rope.slice(start..end).to_string()
    }

    /// Returns the character at `char_idx`, if any.
    pub fn char_at(&self, char_idx: usize) -> Option<char> {
        (char_idx < self.len_chars()).then(|| self.rope.char(char_idx))
    }

    /// Returns the offset where the identifier touching `char_idx` starts.
    pub fn word_start(&self, char_idx: usize) -> usize {
        let mut idx = char_idx.min(self.len_chars());
        while idx > 0 && is_word_char(self.rope.char(idx - 1)) {
            idx -= 1;
        }
        idx
    }

    /// Returns the offset just past the identifier touching `char_idx`.
    pub fn word_end(&self, char_idx: usize) -> usize {
        let mut idx = char_idx.min(self.len_chars());
        while self.char_at(idx).is_some_and(is_word_char) {
            idx += 1;
        }
        idx
    }

    /// Converts a character index to a (line, column) position.
    /// Both line and column are 0-indexed.
    pub fn char_to_line_col(&self, char_idx: usize) -> (usize, usize) {
        let char_idx = char_idx.min(self.len_chars());
        let line = self.rope.char_to_line(char_idx);
        (line, char_idx - self.rope.line_to_char(line))
    }

    /// Converts a (line, column) position to a character index.
    /// Both line and column are 0-indexed; the column is clamped to the line.
    pub fn line_col_to_char(&self, line: usize, col: usize) -> usize {
        if line >= self.rope.len_lines() {
            return self.len_chars();
        }
        let line_slice = self.rope.line(line);
        let mut line_len = line_slice.len_chars();
        if line_len > 0 && line_slice.char(line_len - 1) == '\n' {
            line_len -= 1;
        }
        self.rope.line_to_char(line) + col.min(line_len)
    }

    /// Returns the entire buffer as a string.
    pub fn to_string(&self) -> String {
        self.rope.to_string()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
