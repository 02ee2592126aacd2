//! HTTP transport to the Tern server.
//!
//! Each request is one blocking POST of a JSON document to the server's
//! root path. Retrying is left to the caller, which knows whether a failed
//! port is worth a respawn.

use crate::error::{BridgeError, Result};
use serde_json::Value;
use std::time::Duration;

/// Sends request documents to a server listening on a local port.
pub trait Transport: Send + Sync {
    /// Posts `document` and returns the parsed response body.
    fn request(&self, port: u16, document: &Value) -> Result<Value>;
}

/// Host name the server is reached on.
pub fn local_host() -> &'static str {
    if cfg!(windows) {
        "127.0.0.1"
    } else {
        "localhost"
    }
}

/// Transport over plain HTTP.
pub struct HttpTransport {
    agent: ureq::Agent,
    host: String,
}

impl HttpTransport {
    /// Creates a transport that gives up on a request after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            host: local_host().to_string(),
        }
    }

    /// Overrides the host name requests are sent to.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    fn url(&self, port: u16) -> String {
        format!("http://{}:{}/", self.host, port)
    }
}

impl Transport for HttpTransport {
    fn request(&self, port: u16, document: &Value) -> Result<Value> {
        let body = serde_json::to_string(document)
            .map_err(|e| BridgeError::Protocol(format!("Unencodable request: {}", e)))?;
        log::trace!("Sending to port {}: {}", port, body);

        let response = self
            .agent
            .post(&self.url(port))
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(|e| match e {
                ureq::Error::Status(status, response) => BridgeError::Server {
                    status,
                    message: response.into_string().unwrap_or_default(),
                },
                ureq::Error::Transport(transport) => BridgeError::Connection(transport.to_string()),
            })?;

        let text = response
            .into_string()
            .map_err(|e| BridgeError::Connection(format!("Failed to read response: {}", e)))?;
        log::trace!("Received from port {}: {}", port, text);

        serde_json::from_str(&text).map_err(|e| BridgeError::Protocol(format!("Invalid JSON: {}", e)))
    }
}
