//! Tern state management for the editor UI.
//!
//! [`TernManager`] is what the editor talks to: it forwards buffer events to
//! the session registry, renders argument hints and turns bridge events into
//! notifications.

use crate::notifications::NotificationManager;
use crate::renderer::{locate_call, ArgumentHints, Renderer};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tern_bridge_client::{is_javascript, BridgeConfig, DefinitionTarget, HintLookup, SessionRegistry};
use tern_bridge_core::{CompletionEntry, TextBuffer};

const DOCUMENTATION_TEXT_MISSING: &str = "TERN: COULD NOT FIND DOCUMENTATION TEXT";

/// Result of asking for documentation at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentationOutcome {
    /// The signature was rendered.
    Shown,
    /// Nothing is known about the expression.
    NotFound,
    /// No signature, but the server knows a page documenting it.
    OnWeb { url: String },
}

/// Connects editor buffers to Tern.
pub struct TernManager<R: Renderer> {
    registry: SessionRegistry,
    hints: ArgumentHints<R>,
    notifications: NotificationManager,
    enabled: bool,
}

impl<R: Renderer> TernManager<R> {
    /// Creates a manager starting real Tern servers as needed.
    pub fn new(config: BridgeConfig, renderer: R) -> io::Result<Self> {
        Ok(Self::with_registry(SessionRegistry::new(config)?, renderer))
    }

    pub fn with_registry(registry: SessionRegistry, renderer: R) -> Self {
        Self {
            registry,
            hints: ArgumentHints::new(renderer),
            notifications: NotificationManager::new(),
            enabled: true,
        }
    }

    /// Returns true if Tern is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables Tern. Disabling stops every server.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.shutdown_all();
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    pub fn hints(&self) -> &ArgumentHints<R> {
        &self.hints
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    // === Buffer events ===

    /// Starts tracking a buffer. Saved buffers must be JavaScript files.
    pub fn did_open(&mut self, path: Option<&Path>, dirty: bool) -> Option<PathBuf> {
        if !self.enabled || path.is_some_and(|p| !is_javascript(p)) {
            return None;
        }
        self.registry.open_buffer(path, dirty)
    }

    /// Records an edit at `edit_pos`.
    pub fn did_change(&mut self, key: &Path, edit_pos: usize) {
        self.registry.on_modified(key, edit_pos, Instant::now());
    }

    /// The buffer lost focus.
    pub fn did_deactivate(&mut self, key: &Path, text: &str) {
        self.registry.on_deactivated(key, text);
        self.collect_events();
    }

    pub fn did_close(&mut self, key: &Path) {
        self.registry.close_buffer(key);
    }

    // === Requests ===

    /// Returns the completions to offer at `cursor`.
    pub fn completions(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> Vec<CompletionEntry> {
        let set = self.registry.completions(key, buffer, cursor);
        self.collect_events();

        let Some(set) = set else {
            return Vec::new();
        };
        let prefix = buffer.slice(buffer.word_start(cursor), cursor);
        set.visible(&prefix)
    }

    /// Shows the signature of the call the cursor is on.
    pub fn show_documentation(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> DocumentationOutcome {
        let call_start = locate_call(buffer, cursor);
        let lookup = self.registry.argument_hints(key, buffer, call_start);
        self.collect_events();

        match lookup {
            HintLookup::Found(signature) => {
                if let Some(session) = self.registry.session_mut(key) {
                    self.hints.show(&mut session.state, &signature, Some(0));
                }
                DocumentationOutcome::Shown
            }
            HintLookup::Missing { url: Some(url) } => DocumentationOutcome::OnWeb { url },
            HintLookup::Missing { url: None } => {
                self.notifications.status(DOCUMENTATION_TEXT_MISSING);
                DocumentationOutcome::NotFound
            }
        }
    }

    /// Removes argument hints shown for the buffer.
    pub fn hide_documentation(&mut self, key: &Path) {
        if let Some(session) = self.registry.session_mut(key) {
            self.hints.hide(&mut session.state);
        }
    }

    /// Finds where the expression at `cursor` is defined.
    pub fn jump_to_definition(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> Option<DefinitionTarget> {
        let target = self.registry.definition(key, buffer, cursor);
        self.collect_events();
        target
    }

    /// Returns the type of the expression at `cursor`.
    pub fn show_type(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> Option<String> {
        let ty = self.registry.show_type(key, buffer, cursor);
        self.collect_events();
        ty
    }

    /// Polls for updates (call this in the event loop).
    ///
    /// Runs due buffer pushes and returns whether any notification is
    /// visible.
    pub fn poll(&mut self, text_of: impl FnMut(&Path) -> Option<String>) -> bool {
        let events = self.registry.poll(text_of);
        self.notifications.extend(events);
        self.notifications.update()
    }

    fn collect_events(&mut self) {
        let events = self.registry.poll_events();
        self.notifications.extend(events);
    }

    /// Stops every server and forgets all buffers.
    pub fn shutdown_all(&mut self) {
        log::info!("Shutting down Tern servers");
        self.registry.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::PanelRenderer;
    use serde_json::{json, Value};
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tern_bridge_client::{BridgeError, Launcher, ServerProcess, Transport};

    struct FakeServer {
        announced: bool,
    }

    impl ServerProcess for FakeServer {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            if self.announced {
                return Ok(None);
            }
            self.announced = true;
            Ok(Some("Listening on port 4100\n".to_string()))
        }

        fn terminate(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FakeLauncher;

    impl Launcher for FakeLauncher {
        fn launch(&self, _root: &Path) -> io::Result<Box<dyn ServerProcess>> {
            Ok(Box::new(FakeServer { announced: false }))
        }
    }

    struct BrokenLauncher;

    impl Launcher for BrokenLauncher {
        fn launch(&self, _root: &Path) -> io::Result<Box<dyn ServerProcess>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "tern: not found"))
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        reply: Mutex<Value>,
    }

    impl Transport for FakeTransport {
        fn request(&self, _port: u16, _document: &Value) -> Result<Value, BridgeError> {
            Ok(self.reply.lock().unwrap().clone())
        }
    }

    struct Fixture {
        manager: TernManager<PanelRenderer>,
        transport: Arc<FakeTransport>,
        root: PathBuf,
        _dir: TempDir,
    }

    impl Fixture {
        fn reply(&self, reply: Value) {
            *self.transport.reply.lock().unwrap() = reply;
        }

        fn open(&mut self, name: &str) -> PathBuf {
            self.manager.did_open(Some(&self.root.join(name)), false).unwrap()
        }
    }

    fn fixture_with(launcher: Arc<dyn Launcher>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::write(root.join(".tern-project"), "{}").unwrap();

        let transport = Arc::new(FakeTransport::default());
        let registry = SessionRegistry::with_parts(BridgeConfig::default(), launcher, transport.clone()).unwrap();
        Fixture {
            manager: TernManager::with_registry(registry, PanelRenderer::new("tern_arghint")),
            transport,
            root,
            _dir: dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(FakeLauncher))
    }

    #[test]
    fn test_only_javascript_is_tracked() {
        let mut fx = fixture();
        assert!(fx.manager.did_open(Some(&fx.root.join("style.css")), false).is_none());
        assert!(fx.manager.did_open(Some(&fx.root.join("app.js")), false).is_some());
        assert!(fx.manager.did_open(None, false).is_some());

        fx.manager.set_enabled(false);
        assert!(fx.manager.did_open(Some(&fx.root.join("app.js")), false).is_none());
        assert!(fx.manager.registry().is_empty());
    }

    #[test]
    fn test_show_and_hide_documentation() {
        let mut fx = fixture();
        fx.reply(json!({"type": "fn(selector: string) -> Element", "exprName": "query", "doc": "Finds one."}));
        let key = fx.open("app.js");
        let buffer = TextBuffer::from_str("query('#main')");

        assert_eq!(fx.manager.show_documentation(&key, &buffer, 2), DocumentationOutcome::Shown);
        assert_eq!(
            fx.manager.hints().renderer().contents(),
            "query(*selector: string) -> Element\n\nFinds one."
        );
        assert!(fx.manager.registry().session(&key).unwrap().state.showing_arguments);

        fx.manager.hide_documentation(&key);
        assert_eq!(fx.manager.hints().renderer().contents(), "");
        assert!(!fx.manager.registry().session(&key).unwrap().state.showing_arguments);
    }

    #[test]
    fn test_documentation_on_web() {
        let mut fx = fixture();
        fx.reply(json!({"type": "Math", "url": "https://developer.mozilla.org/Math"}));
        let key = fx.open("app.js");

        let outcome = fx.manager.show_documentation(&key, &TextBuffer::from_str("Math"), 0);
        assert_eq!(
            outcome,
            DocumentationOutcome::OnWeb {
                url: "https://developer.mozilla.org/Math".to_string()
            }
        );
    }

    #[test]
    fn test_documentation_not_found() {
        let mut fx = fixture();
        fx.reply(json!({"type": "?"}));
        let key = fx.open("app.js");

        let outcome = fx.manager.show_documentation(&key, &TextBuffer::from_str("x"), 0);
        assert_eq!(outcome, DocumentationOutcome::NotFound);
        assert_eq!(fx.manager.notifications().status_line(), Some(DOCUMENTATION_TEXT_MISSING));
    }

    #[test]
    fn test_completions_filtered_when_reused() {
        let mut fx = fixture();
        fx.reply(json!({
            "start": 4,
            "completions": [{"name": "push"}, {"name": "pop"}, {"name": "pushAll"}]
        }));
        let key = fx.open("app.js");
        let mut buffer = TextBuffer::from_str("arr.p");

        assert_eq!(fx.manager.completions(&key, &buffer, 5).len(), 3);

        buffer.insert(5, "us");
        let names: Vec<String> = fx
            .manager
            .completions(&key, &buffer, 7)
            .into_iter()
            .map(|e| e.replacement)
            .collect();
        assert_eq!(names, vec!["push", "pushAll"]);
    }

    #[test]
    fn test_spawn_failure_becomes_error_notification() {
        let mut fx = fixture_with(Arc::new(BrokenLauncher));
        let key = fx.open("app.js");

        assert!(fx.manager.show_type(&key, &TextBuffer::from_str("x"), 0).is_none());
        let errors = fx.manager.notifications_mut().take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Failed to start server:\ntern: not found");
    }

    #[test]
    fn test_jump_to_definition() {
        let mut fx = fixture();
        fx.reply(json!({"file": "app.js", "start": {"line": 0, "ch": 9}}));
        let key = fx.open("app.js");

        let target = fx
            .manager
            .jump_to_definition(&key, &TextBuffer::from_str("function f() {}; f()"), 17)
            .unwrap();
        assert_eq!(target.encoded(), format!("{}:1:10", fx.root.join("app.js").display()));
    }
}
