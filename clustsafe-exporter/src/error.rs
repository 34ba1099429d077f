//! Error types for the ClustSafe exporter.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Maximum number of characters of a raw payload kept for diagnostics.
pub const RAW_SNIPPET_LIMIT: usize = 512;

/// Failure to obtain a payload from the administration tool.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The tool could not be started at all.
    #[error("Failed to spawn ClustSafe command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The tool did not finish before the scrape deadline.
    #[error("ClustSafe command timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The tool exited with a non-zero status.
    #[error("ClustSafe command exited with {}: {stderr}", exit_code(.code))]
    Status { code: Option<i32>, stderr: String },

    /// The tool exited successfully but reported problems on stderr.
    #[error("ClustSafe command wrote to stderr: {0}")]
    Stderr(String),
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Failure to decode a payload into a report.
#[derive(Debug, Error)]
#[error("Failed to parse ClustSafe output: {cause}")]
pub struct ParseError {
    /// What the decoder complained about.
    pub cause: String,
    /// Leading part of the offending payload, for debug logging only.
    pub raw_snippet: String,
}

impl ParseError {
    /// Create a parse error, keeping a bounded snippet of the payload.
    pub fn new(cause: impl Into<String>, raw: &[u8]) -> Self {
        let raw_snippet = String::from_utf8_lossy(raw)
            .chars()
            .take(RAW_SNIPPET_LIMIT)
            .collect();

        Self {
            cause: cause.into(),
            raw_snippet,
        }
    }
}

/// Any failure that degrades a scrape to `clustsafe_up 0`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No credentials given, please set {user_var} and {password_var} environment variables")]
    MissingCredentials {
        user_var: &'static str,
        password_var: &'static str,
    },
}

/// Rejected scrape requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("'target' parameter must be specified")]
    MissingTarget,
    #[error("'target' must not start with '-'")]
    InvalidTarget,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, format!("{}\n", self)).into_response()
    }
}
