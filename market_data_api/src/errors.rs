//! Error types for the API client.

/// Errors that can occur when making API requests.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request never produced a response (connect error, timeout, bad URL).
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },
    /// The API returned a non-success status with a body snippet.
    #[error("Request to {endpoint} failed with status {status}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The response body could not be deserialized.
    #[error("Failed to parse response from {endpoint}: {reason}")]
    ParseFailed { endpoint: String, reason: String },
}

impl Error {
    /// Whether repeating the same request may succeed.
    ///
    /// Network failures, 429 and 5xx responses are transient. Everything else
    /// (404 for unknown symbols, malformed bodies) fails the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::ParseFailed { .. } => false,
        }
    }

    /// True for the 404 Yahoo returns for unknown or delisted symbols.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }

    /// The endpoint (path plus symbol) the failing request was sent to.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::RequestFailed { endpoint, .. }
            | Self::HttpStatus { endpoint, .. }
            | Self::ParseFailed { endpoint, .. } => endpoint,
        }
    }
}
