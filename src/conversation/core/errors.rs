//! Error types for the conversation subsystem.

use thiserror::Error;

use crate::conversation::core::ids::SessionId;

/// Failure talking to the language model, or output that cannot be used.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP transport error.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The model endpoint answered with a non-success status.
    #[error("model api returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// Completion error from Rig.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// The response was received but is not usable.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
    /// The request could not be assembled from the given turns.
    #[error("invalid model request: {0}")]
    InvalidRequest(String),
}

/// Failure reading from or writing to the conversation store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// HTTP transport error.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The store endpoint answered with a non-success status.
    #[error("store returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored row could not be decoded.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Conversation subsystem error type.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The call is not legal in the session's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The caller supplied unusable input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The language model call failed.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    /// The store call failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// No live session with this id.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    /// The registry already holds its maximum number of live sessions.
    #[error("session limit reached: {0} live sessions")]
    SessionLimit(usize),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience result alias for conversation operations.
pub type ConversationResult<T> = Result<T, ConversationError>;
/// Result alias for language model calls.
pub type UpstreamResult<T> = Result<T, UpstreamError>;
/// Result alias for store calls.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<url::ParseError> for ConversationError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidConfig(format!("invalid url: {value}"))
    }
}
