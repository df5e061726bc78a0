//! Domain error taxonomy at the coordinator boundary (§7).
//!
//! One variant per kind; each carries what it needs to render both a log
//! line and, where applicable, the UI-facing `message` string.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("a {peer} is already connected")]
    ConcurrencyConflict { peer: &'static str },

    #[error("no run found for id {0}")]
    NotFound(Uuid),

    #[error("imported run's server_version is incompatible with this coordinator")]
    IncompatibleVersion,

    #[error("cannot delete the active run")]
    CannotDeleteActive,

    #[error("summarizer unavailable")]
    SummarizerUnavailable,
}

impl CoordinatorError {
    /// The message string sent to the UI in an `error` envelope (§7).
    pub fn ui_message(&self) -> String {
        self.to_string()
    }
}
