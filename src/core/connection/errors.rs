//! Connection manager error taxonomy

/// Errors surfaced to callers of the connection manager.
///
/// Registry and settings mutations fail synchronously with one of the first five variants.
/// Probe failures never appear here; they degrade the probed connection instead.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection already registered: {0}")]
    DuplicateEndpoint(String),
    #[error("connection not registered: {0}")]
    NotFound(String),
    #[error("connection URI is required")]
    MissingUri,
    #[error("timeout must be greater than 0ms")]
    InvalidTimeout,
    /// Polling needs a tokio runtime to spawn its loop on
    #[error("no tokio runtime available to start polling")]
    NoRuntime,
    /// The concurrent fan-out itself failed (a probe task panicked or was cancelled)
    #[error("{operation} failed to join probe tasks: {source}")]
    BatchOrchestration {
        operation: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Failure of a single probe. Absorbed by the manager and recorded as offline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid connection URI: {0}")]
    InvalidUri(String),
    #[error("probe timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),
}
