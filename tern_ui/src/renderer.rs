//! Argument hint rendering.
//!
//! The editor supplies a [`Renderer`] for wherever hints are shown. The
//! [`ArgumentHints`] presenter formats signatures and keeps the buffer's
//! `showing_arguments` flag in step with what is on screen.

use tern_bridge_core::{BufferState, ParsedSignature, TextBuffer};

/// Somewhere hint text can be shown.
pub trait Renderer {
    /// Shows `message`, replacing what was shown before.
    fn render(&mut self, message: &str);

    /// Removes whatever is shown.
    fn clear(&mut self);
}

/// An output panel holding the last rendered message.
#[derive(Debug, Default)]
pub struct PanelRenderer {
    name: String,
    contents: String,
}

impl PanelRenderer {
    /// Creates an empty panel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the panel text.
    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl Renderer for PanelRenderer {
    fn render(&mut self, message: &str) {
        self.contents.clear();
        self.contents.push_str(message);
    }

    fn clear(&mut self) {
        self.contents.clear();
    }
}

/// Shows and hides argument hints through a renderer.
pub struct ArgumentHints<R: Renderer> {
    renderer: R,
}

impl<R: Renderer> ArgumentHints<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Renders `signature`, marking the argument at `argpos`.
    pub fn show(&mut self, state: &mut BufferState, signature: &ParsedSignature, argpos: Option<usize>) {
        self.renderer.render(&signature.message(argpos));
        state.showing_arguments = true;
    }

    /// Removes shown hints. Does nothing if none are shown.
    pub fn hide(&mut self, state: &mut BufferState) {
        if state.showing_arguments {
            self.renderer.clear();
        }
        state.showing_arguments = false;
    }
}

/// Returns the offset the server treats as the call of the identifier
/// under `cursor`: the end of that identifier.
pub fn locate_call(buffer: &TextBuffer, cursor: usize) -> usize {
    buffer.word_end(cursor)
}
