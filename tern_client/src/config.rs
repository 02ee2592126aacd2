//! Bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Analysis server launch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Command to start the server.
    pub command: String,
    /// Arguments to the command.
    pub args: Vec<String>,
    /// Working directory. Defaults to the project root.
    pub working_dir: Option<PathBuf>,
}

impl ServerConfig {
    /// Creates the configuration for a `tern` binary on the `PATH`.
    ///
    /// The server is told not to write its own port file; this client reads
    /// `.tern-port` files left by other editor sessions but never writes one.
    pub fn tern() -> Self {
        Self::new("tern", vec!["--no-port-file".to_string()])
    }

    /// Creates a configuration for an arbitrary server command.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::tern()
    }
}

/// Tunables of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    /// How long a single request may take.
    pub request_timeout: Duration,
    /// How long launching is refused after a failed launch.
    pub spawn_cooldown: Duration,
    /// Delay between an edit and the push of the buffer it schedules.
    pub push_delay: Duration,
    /// Edits closer together than this share one scheduled push.
    pub push_min_interval: Duration,
    /// File whose presence marks a project root.
    pub project_marker: String,
    /// File another session may leave with the port of a running server.
    pub port_file: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::tern(),
            request_timeout: Duration::from_secs(1),
            spawn_cooldown: Duration::from_secs(30),
            push_delay: Duration::from_millis(5000),
            push_min_interval: Duration::from_millis(500),
            project_marker: ".tern-project".to_string(),
            port_file: ".tern-port".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Replaces the server launch configuration.
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_spawn_cooldown(mut self, cooldown: Duration) -> Self {
        self.spawn_cooldown = cooldown;
        self
    }

    pub fn with_push_timing(mut self, delay: Duration, min_interval: Duration) -> Self {
        self.push_delay = delay;
        self.push_min_interval = min_interval;
        self
    }
}
