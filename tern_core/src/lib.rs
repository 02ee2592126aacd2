//! Tern Bridge Core - Pure analysis-client logic.
//!
//! This crate contains the type grammar parser, completion entries, result
//! caches and per-buffer state, without any process or network code.

pub mod buffer;
pub mod cache;
pub mod completion;
pub mod session;
pub mod signature;

pub use buffer::TextBuffer;
pub use cache::{CachedArguments, CachedCompletions, CompletionSet};
pub use completion::{argument_snippet, completion_icon, CompletionEntry};
pub use session::BufferState;
pub use signature::{extract_argument_names, parse_function_type, Argument, ParsedSignature};
