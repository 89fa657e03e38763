//! Error types for Quillbase
//!
//! This module defines all error types used throughout the library,
//! using `thiserror` for ergonomic error handling.
//!
//! The variants follow the failure taxonomy of the persistence layer:
//! configuration problems, missing records, upstream authentication
//! failures (whose messages are passed through verbatim), transient
//! network failures, and unexpected backend statuses. Recoverable
//! degradations (skipped writes, recovered reads) never surface here;
//! they go to the [`WarningChannel`](crate::warnings::WarningChannel)
//! instead.

use thiserror::Error;

/// Main error type for Quillbase operations
#[derive(Error, Debug)]
pub enum QuillbaseError {
    /// The backend is not configured; persistence is disabled.
    #[error("Backend not configured")]
    NotConfigured,

    /// Caller-side misuse of a tree reference (e.g. resolving the parent
    /// of the root). Indicates a bug in the caller, not a runtime
    /// condition, so it is allowed to fail loudly.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Input validation failures ("Template name and sections are
    /// required", "Missing refresh token.", ...). The message is shown to
    /// the user as-is.
    #[error("{0}")]
    Validation(String),

    /// A record required by a write-adjacent lookup does not exist
    /// ("Session not found.", "Template not found"). Absent records on
    /// plain reads are *not* errors; they normalize to missing data.
    #[error("{0}")]
    NotFound(String),

    /// Upstream-reported authentication/credential failures. The message
    /// is the provider's own and is passed through verbatim.
    #[error("{0}")]
    Auth(String),

    /// A request timed out. Timeouts are classified distinctly from other
    /// transport failures and are never retried automatically.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The tree backend returned an HTTP status that is neither a
    /// success nor one of the silently-skipped permission statuses.
    #[error("Backend returned HTTP {status} for {path}")]
    Backend {
        /// HTTP status code returned by the backend
        status: u16,
        /// Tree path the request addressed
        path: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL in configuration or path construction
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Quillbase operations
///
/// Unlike a boxed dynamic error, the typed error lets callers match on
/// the failure class (not-found vs auth vs transient) and recover the
/// upstream message without string parsing.
pub type Result<T> = std::result::Result<T, QuillbaseError>;
