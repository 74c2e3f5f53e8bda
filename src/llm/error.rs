//! Model API error types.

use thiserror::Error;

/// Errors from upstream model completion calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned a non-2xx response.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The streaming response ended without a terminal signal.
    #[error("stream ended without terminal signal")]
    Truncated,

    /// No model configuration matches the requested name.
    #[error("model '{0}' is not configured")]
    UnknownModel(String),
}
