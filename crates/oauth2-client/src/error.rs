//! Error types for token acquisition and API dispatch.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`crate::TokenManager`] and [`crate::ApiClient`].
///
/// Every failure is handed back to the immediate caller. The only failure
/// the client recovers from on its own is a single 401 response, which
/// triggers one forced token refresh and one retried request.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The token endpoint could not be reached.
    #[error("Token acquisition failed: {reason}")]
    TokenAcquisition { reason: String },

    /// The token endpoint answered with a non-success status.
    #[error("Token request rejected with status {status}: {body}")]
    TokenRejected { status: u16, body: String },

    /// The token endpoint answered 2xx with a body that is not a token response.
    #[error("Invalid token response: {0}")]
    TokenDecode(String),

    /// The request body could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response claimed `Content-Encoding: gzip` but was not valid gzip.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The HTTP exchange completed with a status the operation does not accept.
    #[error("API call failed with status {status}: {body}")]
    ApiCall { status: u16, body: String },

    /// The download destination could not be opened for writing.
    #[error("Failed to create {}: {source}", path.display())]
    FileCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying the response stream to disk failed partway.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The call's deadline (or the client's HTTP timeout) elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The call's cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    /// The request could not be built (bad URL, header name or value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The client could not be constructed.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// True for failures that happened while obtaining a bearer token.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::TokenAcquisition { .. } | Self::TokenRejected { .. } | Self::TokenDecode(_)
        )
    }

    /// HTTP status carried by the error, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiCall { status, .. } | Self::TokenRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map a `reqwest` send/read failure, keeping timeouts distinguishable.
    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result type alias using [`ClientError`].
pub type Result<T> = std::result::Result<T, ClientError>;
