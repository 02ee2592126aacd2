//! Tern UI - Editor-facing presentation of the Tern bridge.
//!
//! This crate connects editor buffer events to the session registry and
//! presents results: argument hints through a pluggable renderer, status
//! messages and error dialogs through notifications.

pub mod bridge;
pub mod notifications;
pub mod renderer;

pub use bridge::{DocumentationOutcome, TernManager};
pub use notifications::{Notification, NotificationManager, NotificationType};
pub use renderer::{locate_call, ArgumentHints, PanelRenderer, Renderer};
