//! Tern client - talks to the Tern JavaScript analysis server.
//!
//! This crate owns the server processes (one per project root), sends query
//! documents over HTTP and keeps each editor buffer's server copy in sync.
//! Delayed pushes run on a separate timer thread, communicating with the
//! editor via channels.

pub mod config;
pub mod error;
pub mod process;
pub mod project;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod transport;

pub use config::{BridgeConfig, ServerConfig};
pub use error::{BridgeError, Result};
pub use process::{CommandLauncher, Launcher, ProcessSupervisor, ServerPort, ServerProcess};
pub use project::{find_project_root, Project};
pub use protocol::{Document, FileEntry, QueryKind};
pub use registry::{
    is_javascript, BridgeEvent, BufferSession, DefinitionTarget, HintLookup, SessionRegistry,
};
pub use scheduler::{DuePush, PushScheduler};
pub use sync::BufferSyncTracker;
pub use transport::{HttpTransport, Transport};
