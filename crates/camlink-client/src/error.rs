use camlink_transport::TransportError;
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    /// Rejected before any socket was opened.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("session already running")]
    AlreadyRunning,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to spawn receive worker: {0}")]
    Spawn(std::io::Error),
}

impl SessionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        SessionError::InvalidConfiguration(msg.into())
    }
}
