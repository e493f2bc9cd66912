//! Error types for the Spotify session client.

use thiserror::Error;

/// Errors that can occur when using the session client.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to reach the backend proxy (connection, DNS, request build).
    #[error("proxy request error: {0}")]
    Request(String),

    /// The backend proxy answered with a non-success HTTP status.
    #[error("proxy returned status {status}: {message}")]
    Status {
        /// HTTP status code returned by the proxy.
        status: u16,
        /// Response body, truncated to a reasonable length.
        message: String,
    },

    /// The proxy acknowledged a transport command but reported failure,
    /// commonly "no active device" or a missing premium entitlement.
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// Failed to serialize or deserialize a proxy payload.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Attempted an operation on a session that has been shut down.
    #[error("session closed")]
    Closed,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for session client operations.
pub type Result<T> = std::result::Result<T, SessionError>;
