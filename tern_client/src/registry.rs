//! Buffer sessions and the requests made on their behalf.
//!
//! The registry maps editor buffers to projects, sends queries with the
//! buffer's full text, retries once against a fresh server when a cached
//! port fails, and keeps the per-buffer caches and push schedule. Failures
//! never escape it: they are queued as [`BridgeEvent`]s for the editor.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::process::{CommandLauncher, Launcher, ProcessSupervisor, ServerPort};
use crate::project::{find_project_root, Project};
use crate::protocol::{
    CompletionsResponse, DefinitionResponse, Document, FileEntry, QueryKind, TypeResponse,
};
use crate::scheduler::PushScheduler;
use crate::sync::BufferSyncTracker;
use crate::transport::{HttpTransport, Transport};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tern_bridge_core::{
    BufferState, CachedArguments, CachedCompletions, CompletionEntry, CompletionSet,
    ParsedSignature, TextBuffer,
};

const DOCUMENTATION_MISSING: &str = "TERN: CAN'T FIND DOCUMENTATION";
const DEFINITION_MISSING: &str = "TERN: COULD NOT FIND DEFINITION";

/// Something the editor should show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// One-line status message.
    Status(String),
    /// Failure that needs acknowledging, such as a server that won't start.
    Error(String),
}

/// Outcome of an argument hint lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintLookup {
    Found(ParsedSignature),
    /// No function type at the call; the server may still know a URL.
    Missing { url: Option<String> },
}

/// Where a definition lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionTarget {
    pub path: PathBuf,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
}

impl DefinitionTarget {
    /// Returns the `path:line:col` form editors open files with.
    pub fn encoded(&self) -> String {
        format!("{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// An open buffer and the project it belongs to.
pub struct BufferSession {
    name: PathBuf,
    project: Arc<Mutex<Project>>,
    pub state: BufferState,
}

impl BufferSession {
    /// Returns the buffer's identity.
    pub fn name(&self) -> &Path {
        &self.name
    }

    pub fn project(&self) -> &Arc<Mutex<Project>> {
        &self.project
    }
}

/// Returns true if `path` names a JavaScript source file.
pub fn is_javascript(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("js" | "mjs" | "cjs")
    )
}

fn lock(project: &Mutex<Project>) -> MutexGuard<'_, Project> {
    project.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All open buffer sessions of one editor.
pub struct SessionRegistry {
    config: BridgeConfig,
    supervisor: ProcessSupervisor,
    transport: Arc<dyn Transport>,
    tracker: BufferSyncTracker,
    scheduler: PushScheduler,
    sessions: HashMap<PathBuf, BufferSession>,
    events: Vec<BridgeEvent>,
    unsaved_count: u64,
}

impl SessionRegistry {
    /// Creates a registry launching real servers and talking HTTP to them.
    pub fn new(config: BridgeConfig) -> io::Result<Self> {
        let launcher = Arc::new(CommandLauncher::new(config.server.clone()));
        let transport = Arc::new(HttpTransport::new(config.request_timeout));
        Self::with_parts(config, launcher, transport)
    }

    /// Creates a registry over the given launcher and transport.
    pub fn with_parts(
        config: BridgeConfig,
        launcher: Arc<dyn Launcher>,
        transport: Arc<dyn Transport>,
    ) -> io::Result<Self> {
        let supervisor =
            ProcessSupervisor::new(launcher, config.spawn_cooldown, config.port_file.clone());
        let tracker = BufferSyncTracker::new(config.push_delay, config.push_min_interval);
        Ok(Self {
            supervisor,
            transport,
            tracker,
            scheduler: PushScheduler::start()?,
            sessions: HashMap::new(),
            events: Vec::new(),
            unsaved_count: 0,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Registers a buffer and returns the key it is known by.
    ///
    /// Unsaved buffers (`path` is `None`) get a synthetic identity in the
    /// temporary directory. Returns `None` if no project can own the buffer.
    pub fn open_buffer(&mut self, path: Option<&Path>, dirty: bool) -> Option<PathBuf> {
        let name = match path {
            Some(path) => path.to_path_buf(),
            None => self.unsaved_identity(),
        };
        if self.sessions.contains_key(&name) {
            return Some(name);
        }

        let project = self.resolve_project(&name)?;
        self.sessions.insert(
            name.clone(),
            BufferSession {
                name: name.clone(),
                project,
                state: BufferState::new(dirty),
            },
        );
        Some(name)
    }

    fn unsaved_identity(&mut self) -> PathBuf {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.unsaved_count += 1;
        let suffix = if self.unsaved_count > 1 {
            format!("_{}", self.unsaved_count)
        } else {
            String::new()
        };
        std::env::temp_dir().join(format!("tfs_{}{}", secs, suffix))
    }

    /// Finds the project owning `path`, reusing an existing one for the
    /// same root.
    pub fn resolve_project(&self, path: &Path) -> Option<Arc<Mutex<Project>>> {
        let root = find_project_root(path, &self.config.project_marker)?;
        if let Some(session) = self
            .sessions
            .values()
            .find(|s| lock(&s.project).root() == root)
        {
            return Some(session.project.clone());
        }

        log::info!("New project at {}", root.display());
        Some(Arc::new(Mutex::new(Project::new(root))))
    }

    pub fn session(&self, key: &Path) -> Option<&BufferSession> {
        self.sessions.get(key)
    }

    pub fn session_mut(&mut self, key: &Path) -> Option<&mut BufferSession> {
        self.sessions.get_mut(key)
    }

    /// Returns the number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // === Requests ===

    /// Sends `query` at `position` along with the buffer's full text.
    ///
    /// A failure on a port that was merely remembered restarts the server
    /// and resends once. Clears the dirty flag only on success.
    pub fn dispatch(&mut self, key: &Path, text: &str, query: QueryKind, position: usize) -> Option<Value> {
        let project = self.sessions.get(key)?.project.clone();
        let name = lock(&project).relative_name(key);
        log::debug!("Sending {} query for {}", query.name(), name);

        let document = Document::query(query, position, FileEntry::full(name, text)).to_value();
        let response = self.send_with_retry(&project, &document)?;
        self.mark_clean(key);
        Some(response)
    }

    fn send_with_retry(&mut self, project: &Mutex<Project>, document: &Value) -> Option<Value> {
        let server = self.server_port(project, None)?;
        match self.transport.request(server.port, document) {
            Ok(response) => return Some(response),
            Err(e) if server.cached => {
                log::warn!("Request to port {} failed, restarting server: {}", server.port, e);
            }
            Err(e) => {
                self.report(e);
                return None;
            }
        }

        let server = self.server_port(project, Some(server.port))?;
        match self.transport.request(server.port, document) {
            Ok(response) => Some(response),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    fn server_port(&mut self, project: &Mutex<Project>, invalidate: Option<u16>) -> Option<ServerPort> {
        let result = {
            let mut project = lock(project);
            self.supervisor.ensure_port(&mut project, invalidate)
        };
        result.map_err(|e| self.report(e)).ok()
    }

    fn report(&mut self, error: BridgeError) {
        match error {
            BridgeError::SpawnFailed { .. } => {
                log::error!("{}", error);
                self.events.push(BridgeEvent::Error(error.to_string()));
            }
            BridgeError::CoolingDown { .. } => log::debug!("{}", error),
            _ => {
                log::warn!("Request failed: {}", error);
                self.events.push(BridgeEvent::Status(format!("TERN ERROR: {}", error)));
            }
        }
    }

    fn mark_clean(&mut self, key: &Path) {
        if let Some(session) = self.sessions.get_mut(key) {
            session.state.dirty = false;
        }
    }

    fn parse_response<T: serde::de::DeserializeOwned>(&mut self, response: Value) -> Option<T> {
        serde_json::from_value(response)
            .map_err(|e| self.report(BridgeError::Protocol(e.to_string())))
            .ok()
    }

    /// Returns completions at `cursor`, reusing the cached ones while the
    /// user keeps typing the same word.
    pub fn completions(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> Option<CompletionSet> {
        if let Some(cached) = &self.sessions.get(key)?.state.completions {
            if cursor >= cached.anchor && cached.reusable(cursor, &buffer.slice(cached.anchor, cursor)) {
                log::debug!("Reusing {} cached completions", cached.entries.len());
                return Some(CompletionSet {
                    entries: cached.entries.clone(),
                    fresh: false,
                });
            }
        }

        let response = self.dispatch(key, &buffer.to_string(), QueryKind::completions(), cursor)?;
        let response: CompletionsResponse = self.parse_response(response)?;
        let entries: Vec<CompletionEntry> = response
            .completions
            .iter()
            .map(|c| CompletionEntry::from_record(&c.name, c.ty.as_deref()))
            .collect();

        let prefix = buffer.slice(response.start, cursor);
        if let Some(session) = self.sessions.get_mut(key) {
            session.state.completions = Some(CachedCompletions::new(response.start, prefix, entries.clone()));
        }
        Some(CompletionSet { entries, fresh: true })
    }

    /// Looks up the signature of the call starting at `call_start`.
    pub fn argument_hints(&mut self, key: &Path, buffer: &TextBuffer, call_start: usize) -> HintLookup {
        let cached = self
            .sessions
            .get(key)
            .and_then(|s| s.state.arguments.as_ref())
            .filter(|a| a.matches(call_start));
        if let Some(cached) = cached {
            log::debug!("Reusing cached signature of {}", cached.signature.name);
            return HintLookup::Found(cached.signature.clone());
        }

        let mut url = None;
        let response = self.dispatch(key, &buffer.to_string(), QueryKind::function_type(), call_start);
        if let Some(response) = response.and_then(|r| self.parse_response::<TypeResponse>(r)) {
            if let Some(signature) = response.signature() {
                if let Some(session) = self.sessions.get_mut(key) {
                    session.state.arguments = Some(CachedArguments::new(call_start, signature.clone()));
                }
                return HintLookup::Found(signature);
            }
            url = response.url;
        }

        self.events.push(BridgeEvent::Status(DOCUMENTATION_MISSING.to_string()));
        HintLookup::Missing { url }
    }

    /// Finds the definition of the expression at `cursor`.
    pub fn definition(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> Option<DefinitionTarget> {
        let response = self.dispatch(key, &buffer.to_string(), QueryKind::definition(), cursor)?;
        let response: DefinitionResponse = self.parse_response(response)?;

        let (Some(file), Some(start)) = (response.file.filter(|f| !f.is_empty()), response.start) else {
            self.events.push(BridgeEvent::Status(DEFINITION_MISSING.to_string()));
            return None;
        };
        let root = lock(&self.sessions.get(key)?.project).root().to_path_buf();
        Some(DefinitionTarget {
            path: root.join(file),
            line: start.line + 1,
            column: start.ch + 1,
        })
    }

    /// Returns the type of the expression at `cursor`.
    pub fn show_type(&mut self, key: &Path, buffer: &TextBuffer, cursor: usize) -> Option<String> {
        let response = self.dispatch(key, &buffer.to_string(), QueryKind::Documentation, cursor)?;
        self.parse_response::<TypeResponse>(response)?.ty
    }

    /// Pushes the buffer's text without a query. Never retries.
    pub fn send_buffer(&mut self, key: &Path, text: &str) -> bool {
        let Some(project) = self.sessions.get(key).map(|s| s.project.clone()) else {
            return false;
        };
        let Some(server) = self.server_port(&project, None) else {
            return false;
        };

        let name = lock(&project).relative_name(key);
        let document = Document::push(FileEntry::full(name, text)).to_value();
        match self.transport.request(server.port, &document) {
            Ok(_) => {
                log::debug!("Pushed {}", key.display());
                self.mark_clean(key);
                true
            }
            Err(e) => {
                log::warn!("Failed to push {}: {}", key.display(), e);
                false
            }
        }
    }

    // === Buffer sync ===

    /// Records an edit at `edit_pos` and schedules a push if one is due.
    pub fn on_modified(&mut self, key: &Path, edit_pos: usize, now: Instant) {
        let Some(session) = self.sessions.get_mut(key) else {
            return;
        };
        if let Some(stamp) = self.tracker.on_modified(&mut session.state, edit_pos, now) {
            self.scheduler.schedule(key.to_path_buf(), stamp, self.tracker.delay());
        }
    }

    /// Pushes the buffer right away if the server's copy is stale.
    pub fn on_deactivated(&mut self, key: &Path, text: &str) {
        if self.sessions.get(key).is_some_and(|s| s.state.dirty) {
            self.send_buffer(key, text);
        }
    }

    /// Runs the pushes that came due and are still current.
    ///
    /// `text_of` supplies the current text of a buffer. Returns the number
    /// of buffers pushed.
    pub fn run_due_pushes(&mut self, mut text_of: impl FnMut(&Path) -> Option<String>) -> usize {
        let mut pushed = 0;
        while let Some(due) = self.scheduler.try_recv() {
            let current = self
                .sessions
                .get(&due.key)
                .is_some_and(|s| s.state.push_is_current(due.stamp));
            if !current {
                log::debug!("Skipping superseded push of {}", due.key.display());
                continue;
            }
            if let Some(text) = text_of(&due.key) {
                if self.send_buffer(&due.key, &text) {
                    pushed += 1;
                }
            }
        }
        pushed
    }

    /// Drains the events queued for the user.
    pub fn poll_events(&mut self) -> Vec<BridgeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Runs due pushes, then drains queued events.
    pub fn poll(&mut self, text_of: impl FnMut(&Path) -> Option<String>) -> Vec<BridgeEvent> {
        self.run_due_pushes(text_of);
        self.poll_events()
    }

    // === Teardown ===

    /// Forgets a buffer. Its project's server stops once no buffer uses it.
    pub fn close_buffer(&mut self, key: &Path) {
        self.scheduler.cancel(key);
        if self.sessions.remove(key).is_some() {
            log::debug!("Closed {}", key.display());
        }
    }

    /// Stops the server of the project owning `key`; the next request
    /// starts a fresh one.
    pub fn invalidate_project(&mut self, key: &Path) {
        if let Some(session) = self.sessions.get(key) {
            self.supervisor.terminate(&mut lock(&session.project));
        }
    }

    /// Stops every server and forgets all buffers.
    pub fn shutdown(&mut self) {
        for session in self.sessions.values() {
            self.supervisor.terminate(&mut lock(&session.project));
        }
        for key in self.sessions.keys() {
            self.scheduler.cancel(key);
        }
        self.sessions.clear();
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::process::testing::{Counters, ScriptedLauncher};
    use serde_json::json;
    use std::fs;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeTransport {
        reply: Mutex<Value>,
        dead_ports: Mutex<Vec<u16>>,
        requests: Mutex<Vec<(u16, Value)>>,
    }

    impl FakeTransport {
        fn reply(&self, reply: Value) {
            *self.reply.lock().unwrap() = reply;
        }

        fn kill(&self, port: u16) {
            self.dead_ports.lock().unwrap().push(port);
        }

        fn requests(&self) -> Vec<(u16, Value)> {
            self.requests.lock().unwrap().clone()
        }

        fn ports(&self) -> Vec<u16> {
            self.requests().into_iter().map(|(port, _)| port).collect()
        }
    }

    impl Transport for FakeTransport {
        fn request(&self, port: u16, document: &Value) -> Result<Value> {
            self.requests.lock().unwrap().push((port, document.clone()));
            if self.dead_ports.lock().unwrap().contains(&port) {
                return Err(BridgeError::Connection("connection refused".to_string()));
            }
            Ok(self.reply.lock().unwrap().clone())
        }
    }

    struct Fixture {
        registry: SessionRegistry,
        transport: Arc<FakeTransport>,
        counters: Arc<Counters>,
        root: PathBuf,
        _dir: TempDir,
    }

    impl Fixture {
        fn open(&mut self, relative: &str) -> PathBuf {
            self.registry.open_buffer(Some(&self.root.join(relative)), true).unwrap()
        }
    }

    fn fixture_with(launcher: ScriptedLauncher) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join(".tern-project"), "{}").unwrap();

        let counters = launcher.counters.clone();
        let transport = Arc::new(FakeTransport::default());
        let config = BridgeConfig::default()
            .with_push_timing(Duration::from_millis(20), Duration::from_millis(500));
        let registry = SessionRegistry::with_parts(config, Arc::new(launcher), transport.clone()).unwrap();

        Fixture {
            registry,
            transport,
            counters,
            root,
            _dir: dir,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ScriptedLauncher::listening(4100))
    }

    #[test]
    fn test_is_javascript() {
        assert!(is_javascript(Path::new("/p/app.js")));
        assert!(is_javascript(Path::new("lib.mjs")));
        assert!(!is_javascript(Path::new("/p/style.css")));
        assert!(!is_javascript(Path::new("/p/Makefile")));
    }

    #[test]
    fn test_definition_target_encoding() {
        let target = DefinitionTarget {
            path: PathBuf::from("/p/lib/x.js"),
            line: 3,
            column: 5,
        };
        assert_eq!(target.encoded(), "/p/lib/x.js:3:5");
    }

    #[test]
    fn test_buffers_under_one_root_share_project() {
        let mut fx = fixture();
        let a = fx.open("a.js");
        let b = fx.open("src/b.js");

        let pa = fx.registry.session(&a).unwrap().project().clone();
        let pb = fx.registry.session(&b).unwrap().project().clone();
        assert!(Arc::ptr_eq(&pa, &pb));
        assert_eq!(lock(&pa).root(), fx.root.as_path());
    }

    #[test]
    fn test_reopening_buffer_keeps_session() {
        let mut fx = fixture();
        let key = fx.open("a.js");
        fx.registry.session_mut(&key).unwrap().state.dirty = false;

        assert_eq!(fx.open("a.js"), key);
        assert!(!fx.registry.session(&key).unwrap().state.dirty);
        assert_eq!(fx.registry.len(), 1);
    }

    #[test]
    fn test_unsaved_buffers_get_distinct_identities() {
        let mut fx = fixture();
        let first = fx.registry.open_buffer(None, false).unwrap();
        let second = fx.registry.open_buffer(None, false).unwrap();

        assert_ne!(first, second);
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("tfs_"));
    }

    #[test]
    fn test_dispatch_sends_full_text_as_in_flight_file() {
        let mut fx = fixture();
        fx.transport.reply(json!({"type": "number"}));
        let key = fx.open("src/a.js");

        let response = fx.registry.dispatch(&key, "var x = 1;", QueryKind::Documentation, 4);
        assert_eq!(response, Some(json!({"type": "number"})));

        let (port, document) = fx.transport.requests().remove(0);
        assert_eq!(port, 4100);
        assert_eq!(document["query"]["file"], json!("#0"));
        assert_eq!(document["query"]["end"], json!(4));
        assert_eq!(document["files"][0]["name"], json!("src/a.js"));
        assert_eq!(document["files"][0]["text"], json!("var x = 1;"));
    }

    #[test]
    fn test_cached_port_failure_retries_once() {
        let mut fx = fixture();
        fs::write(fx.root.join(".tern-port"), "4321\n").unwrap();
        fx.transport.kill(4321);
        let key = fx.open("a.js");

        let response = fx.registry.dispatch(&key, "x", QueryKind::completions(), 1);
        assert!(response.is_some());
        assert_eq!(fx.transport.ports(), vec![4321, 4100]);
        assert_eq!(fx.counters.launches(), 1);
        assert!(fx.registry.poll_events().is_empty());
    }

    #[test]
    fn test_failed_retry_becomes_status() {
        let mut fx = fixture();
        fs::write(fx.root.join(".tern-port"), "4321").unwrap();
        fx.transport.kill(4321);
        fx.transport.kill(4100);
        let key = fx.open("a.js");

        assert!(fx.registry.dispatch(&key, "x", QueryKind::completions(), 1).is_none());
        assert_eq!(fx.transport.ports(), vec![4321, 4100]);

        let events = fx.registry.poll_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], BridgeEvent::Status(msg) if msg.starts_with("TERN ERROR")));
        assert!(fx.registry.session(&key).unwrap().state.dirty);
    }

    #[test]
    fn test_fresh_server_failure_is_not_retried() {
        let mut fx = fixture();
        fx.transport.kill(4100);
        let key = fx.open("a.js");

        assert!(fx.registry.dispatch(&key, "x", QueryKind::completions(), 1).is_none());
        assert_eq!(fx.transport.ports(), vec![4100]);
        assert_eq!(fx.counters.launches(), 1);
    }

    #[test]
    fn test_spawn_failure_is_reported_once() {
        let mut fx = fixture_with(ScriptedLauncher::new(&["Error: Cannot find module 'tern'"]));
        let key = fx.open("a.js");

        assert!(fx.registry.dispatch(&key, "x", QueryKind::completions(), 1).is_none());
        assert_eq!(
            fx.registry.poll_events(),
            vec![BridgeEvent::Error(
                "Failed to start server:\nError: Cannot find module 'tern'".to_string()
            )]
        );

        // Cooling down: no launch, nothing to show.
        assert!(fx.registry.dispatch(&key, "x", QueryKind::completions(), 1).is_none());
        assert!(fx.registry.poll_events().is_empty());
        assert_eq!(fx.counters.launches(), 1);
        assert!(fx.transport.requests().is_empty());
    }

    #[test]
    fn test_dirty_cleared_after_success() {
        let mut fx = fixture();
        fx.transport.reply(json!({}));
        let key = fx.open("a.js");
        assert!(fx.registry.session(&key).unwrap().state.dirty);

        fx.registry.dispatch(&key, "x", QueryKind::Documentation, 0);
        assert!(!fx.registry.session(&key).unwrap().state.dirty);
    }

    #[test]
    fn test_completions_reused_while_typing() {
        let mut fx = fixture();
        fx.transport.reply(json!({
            "start": 10,
            "end": 12,
            "completions": [
                {"name": "foo", "type": "number"},
                {"name": "foobar", "type": "fn(a) -> bool"}
            ]
        }));
        let key = fx.open("a.js");
        let mut buffer = TextBuffer::from_str("var a = 1;fo");

        let fresh = fx.registry.completions(&key, &buffer, 12).unwrap();
        assert!(fresh.fresh);
        assert_eq!(fresh.entries.len(), 2);

        buffer.insert(12, "o");
        let reused = fx.registry.completions(&key, &buffer, 13).unwrap();
        assert!(!reused.fresh);
        assert_eq!(reused.visible("foo").len(), 2);
        assert_eq!(fx.transport.requests().len(), 1);

        buffer.insert(13, ".");
        fx.registry.completions(&key, &buffer, 14).unwrap();
        assert_eq!(fx.transport.requests().len(), 2);
    }

    #[test]
    fn test_edit_before_anchor_refetches_completions() {
        let mut fx = fixture();
        fx.transport.reply(json!({"start": 10, "completions": [{"name": "foo"}]}));
        let key = fx.open("a.js");
        let buffer = TextBuffer::from_str("var a = 1;fo");

        fx.registry.completions(&key, &buffer, 12).unwrap();
        fx.registry.on_modified(&key, 5, Instant::now());
        assert!(fx.registry.session(&key).unwrap().state.completions.is_none());

        fx.registry.completions(&key, &buffer, 12).unwrap();
        assert_eq!(fx.transport.requests().len(), 2);
    }

    #[test]
    fn test_argument_hints_cached_per_call() {
        let mut fx = fixture();
        fx.transport.reply(json!({"type": "fn(a: number, b?: string) -> bool", "exprName": "calc"}));
        let key = fx.open("a.js");
        let buffer = TextBuffer::from_str("calc(1, 'x')");

        let HintLookup::Found(signature) = fx.registry.argument_hints(&key, &buffer, 4) else {
            panic!("expected a signature");
        };
        assert_eq!(signature.name, "calc");
        assert_eq!(signature.args.len(), 2);
        assert_eq!(signature.retval.as_deref(), Some("bool"));

        assert!(matches!(fx.registry.argument_hints(&key, &buffer, 4), HintLookup::Found(_)));
        assert_eq!(fx.transport.requests().len(), 1);

        fx.registry.argument_hints(&key, &buffer, 7);
        assert_eq!(fx.transport.requests().len(), 2);
        assert_eq!(
            fx.transport.requests()[1].1["query"]["preferFunction"],
            json!(true)
        );
    }

    #[test]
    fn test_argument_hints_missing_keeps_url() {
        let mut fx = fixture();
        fx.transport.reply(json!({"type": "number", "url": "https://example.com/doc"}));
        let key = fx.open("a.js");
        let buffer = TextBuffer::from_str("x(");

        let lookup = fx.registry.argument_hints(&key, &buffer, 1);
        assert_eq!(
            lookup,
            HintLookup::Missing {
                url: Some("https://example.com/doc".to_string())
            }
        );
        assert_eq!(
            fx.registry.poll_events(),
            vec![BridgeEvent::Status(DOCUMENTATION_MISSING.to_string())]
        );
    }

    #[test]
    fn test_definition_resolves_under_root() {
        let mut fx = fixture();
        fx.transport.reply(json!({"file": "lib/x.js", "start": {"line": 2, "ch": 4}}));
        let key = fx.open("a.js");
        let buffer = TextBuffer::from_str("helper()");

        let target = fx.registry.definition(&key, &buffer, 3).unwrap();
        assert_eq!(target.path, fx.root.join("lib/x.js"));
        assert_eq!((target.line, target.column), (3, 5));
        assert_eq!(
            fx.transport.requests()[0].1["query"]["lineCharPositions"],
            json!(true)
        );
    }

    #[test]
    fn test_definition_not_found() {
        let mut fx = fixture();
        fx.transport.reply(json!({}));
        let key = fx.open("a.js");

        assert!(fx.registry.definition(&key, &TextBuffer::from_str("x"), 0).is_none());
        assert_eq!(
            fx.registry.poll_events(),
            vec![BridgeEvent::Status(DEFINITION_MISSING.to_string())]
        );
    }

    #[test]
    fn test_show_type() {
        let mut fx = fixture();
        fx.transport.reply(json!({"type": "fn(a: number)", "doc": "Adds."}));
        let key = fx.open("a.js");

        let ty = fx.registry.show_type(&key, &TextBuffer::from_str("add"), 1);
        assert_eq!(ty.as_deref(), Some("fn(a: number)"));
        assert_eq!(fx.transport.requests()[0].1["query"]["type"], json!("documentation"));
    }

    #[test]
    fn test_send_buffer_has_no_query() {
        let mut fx = fixture();
        fx.transport.reply(json!(null));
        let key = fx.open("a.js");

        assert!(fx.registry.send_buffer(&key, "var y;"));
        let (_, document) = fx.transport.requests().remove(0);
        assert!(document.get("query").is_none());
        assert_eq!(document["files"][0]["text"], json!("var y;"));
        assert!(!fx.registry.session(&key).unwrap().state.dirty);
    }

    #[test]
    fn test_deactivation_pushes_only_dirty_buffers() {
        let mut fx = fixture();
        fx.transport.reply(json!(null));
        let key = fx.open("a.js");

        fx.registry.on_deactivated(&key, "a");
        fx.registry.on_deactivated(&key, "a");
        assert_eq!(fx.transport.requests().len(), 1);
    }

    #[test]
    fn test_debounced_push_runs_after_delay() {
        let mut fx = fixture();
        fx.transport.reply(json!(null));
        let key = fx.open("a.js");

        fx.registry.on_modified(&key, 0, Instant::now());
        let mut pushed = 0;
        for _ in 0..100 {
            thread::sleep(Duration::from_millis(20));
            pushed = fx.registry.run_due_pushes(|_| Some("var x;".to_string()));
            if pushed > 0 {
                break;
            }
        }

        assert_eq!(pushed, 1);
        assert_eq!(fx.transport.requests()[0].1["files"][0]["text"], json!("var x;"));
        assert!(!fx.registry.session(&key).unwrap().state.dirty);
    }

    #[test]
    fn test_push_skipped_once_buffer_is_clean() {
        let mut fx = fixture();
        let key = fx.open("a.js");

        fx.registry.on_modified(&key, 0, Instant::now());
        fx.registry.session_mut(&key).unwrap().state.dirty = false;
        thread::sleep(Duration::from_millis(200));

        assert_eq!(fx.registry.run_due_pushes(|_| Some(String::new())), 0);
        assert!(fx.transport.requests().is_empty());
    }

    #[test]
    fn test_closing_last_buffer_stops_server() {
        let mut fx = fixture();
        fx.transport.reply(json!({}));
        let a = fx.open("a.js");
        let b = fx.open("b.js");
        fx.registry.dispatch(&a, "", QueryKind::Documentation, 0);
        assert_eq!(fx.counters.launches(), 1);

        fx.registry.close_buffer(&a);
        assert_eq!(fx.counters.terminations(), 0);
        fx.registry.close_buffer(&b);
        assert_eq!(fx.counters.terminations(), 1);
        assert!(fx.registry.is_empty());
    }

    #[test]
    fn test_invalidated_project_restarts_server() {
        let mut fx = fixture();
        fx.transport.reply(json!({}));
        let key = fx.open("a.js");
        fx.registry.dispatch(&key, "", QueryKind::Documentation, 0);

        fx.registry.invalidate_project(&key);
        assert_eq!(fx.counters.terminations(), 1);

        fx.registry.dispatch(&key, "", QueryKind::Documentation, 0);
        assert_eq!(fx.counters.launches(), 2);
    }

    #[test]
    fn test_shutdown_stops_every_server() {
        let mut fx = fixture();
        fx.transport.reply(json!({}));
        let key = fx.open("a.js");
        fx.registry.dispatch(&key, "", QueryKind::Documentation, 0);

        fx.registry.shutdown();
        assert_eq!(fx.counters.terminations(), 1);
        assert!(fx.registry.is_empty());
    }
}
