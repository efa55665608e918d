//! Error types.
//!
//! Two layers live here. [`ApiError`] is what a [`Transport`](crate::Transport)
//! raises for a single Bot API request; the retry loop consumes these and never
//! lets them escape to callers. [`Error`] covers everything else the crate can
//! fail at: configuration, storage, logging setup and client construction.

use std::time::Duration;

/// A failure reported by the Bot API (or the network underneath it) for one request.
///
/// The variants follow the error families Telegram clients usually expose. The
/// human-readable message is what ends up in a failed
/// [`CallOutcome`](crate::CallOutcome)'s response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request could not be completed at the network or server level.
    #[error("{0}")]
    Network(String),

    /// The request did not complete within the transport timeout.
    #[error("Timed out")]
    TimedOut,

    /// Flood control: the server asks to wait before the next request.
    #[error("Flood control exceeded. Retry in {} seconds", retry_after.as_secs())]
    RetryAfter {
        /// How long the server asked to wait.
        retry_after: Duration,
    },

    /// The group was upgraded to a supergroup and now has a new identifier.
    #[error("Group migrated to supergroup. New chat id: {new_chat_id}")]
    ChatMigrated {
        /// The identifier to use from now on.
        new_chat_id: i64,
    },

    /// The bot is not allowed to perform the request (HTTP 401/403).
    #[error("{0}")]
    Unauthorized(String),

    /// The request was malformed or refers to something that does not exist (HTTP 400).
    #[error("{0}")]
    BadRequest(String),

    /// The bot token was rejected (HTTP 404 on the bot endpoint).
    #[error("Invalid token")]
    InvalidToken,

    /// Another consumer is already polling updates for this bot (HTTP 409).
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    /// Returns the error message as reported to callers.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// The main error type for everything outside a single API call.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The document storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An API call the framework depends on did not succeed.
    #[error("API call {method} failed: {response}")]
    ApiCall {
        /// The operation that was called.
        method: &'static str,
        /// The last response or error message.
        response: String,
    },

    /// Logging could not be set up.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A value could not be converted to or from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error, e.g. while preparing the log directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
