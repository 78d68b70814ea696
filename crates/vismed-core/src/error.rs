// Error types for the relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while publishing to the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Publish body was missing, unparseable, or JSON null
    #[error("empty request body")]
    EmptyPayload,
}
