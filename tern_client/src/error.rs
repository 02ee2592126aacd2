//! Error types for talking to the Tern server.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures of the server process or of a request to it.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The server exited or could not be launched before reporting a port.
    #[error("Failed to start server{}", captured(.output))]
    SpawnFailed { output: String },

    /// A recent launch failed; launching again is refused for a while.
    #[error("Server launch refused for another {}s after a failure", .remaining.as_secs())]
    CoolingDown { remaining: Duration },

    /// The port is not accepting connections.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server answered with an error status.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The response body was not valid JSON of the expected shape.
    #[error("Invalid response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn captured(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(":\n{}", output)
    }
}

impl BridgeError {
    /// Returns true if the failure should be shown to the user as a dialog.
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, BridgeError::SpawnFailed { .. })
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
