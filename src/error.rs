//! Error types for the any-parser client.
//!
//! Two error types reflect two distinct failure points:
//!
//! * [`ValidationError`]: the caller's input was rejected locally, before
//!   any byte went over the wire (missing file, unsupported type, ...).
//!
//! * [`AnyParserError`]: everything else: HTTP failures, undecodable
//!   responses, poll timeouts, failed jobs. Validation errors are wrapped in
//!   [`AnyParserError::Validation`] so every public call returns one type.
//!
//! The `Display` text of each variant mirrors the messages the hosted API's
//! other clients print, so logs stay comparable across languages.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = AnyParserError> = std::result::Result<T, E>;

/// Input rejected before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither a path nor base64 content was supplied.
    #[error("Either file_content or file_path must be provided")]
    MissingInputs,

    /// Both a path and base64 content were supplied.
    #[error("Only one of file_content or file_path may be provided")]
    ConflictingInputs,

    /// Base64 content was supplied without saying what it is.
    #[error("file_type must be provided when using file_content")]
    MissingFileType,

    #[error("File does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File is empty: {}", .0.display())]
    FileEmpty(PathBuf),

    /// The file type is not on the service's allow-list.
    #[error("Unsupported file type: {file_type}. Supported file types: {supported}")]
    UnsupportedFileType { file_type: String, supported: String },
}

/// All errors returned by the any-parser client.
#[derive(Debug, Error)]
pub enum AnyParserError {
    // ── Input errors ──────────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Operation arguments are malformed (e.g. key-value extraction without
    /// an instruction).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reading a local input file failed.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caller-supplied file content is not valid base64.
    #[error("Invalid base64 file content: {0}")]
    Base64(#[from] base64::DecodeError),

    // ── HTTP errors ───────────────────────────────────────────────────────
    /// The API rejected the key (401/403).
    #[error("Invalid API key ({status}): {body}")]
    AuthError { status: u16, body: String },

    /// The API key's quota or rate limit is exhausted (429).
    #[error("API key limit exceeded ({status}): {body}")]
    RateLimitExceeded { status: u16, body: String },

    /// Any other non-success status from an API endpoint.
    #[error("{status} {body}")]
    Api { status: u16, body: String },

    /// The presigned storage upload did not answer 204.
    #[error("Upload to presigned URL failed: {status} {body}")]
    UploadFailed { status: u16, body: String },

    /// Network-level failure (connect, TLS, timeout of a single request).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // ── Decode errors ─────────────────────────────────────────────────────
    #[error("Invalid JSON response: {body}")]
    InvalidJson {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response parsed as JSON but carried none of the expected keys.
    #[error("Unrecognized response shape: {body}")]
    UnrecognizedResponse { body: String },

    /// HTML table conversion could not find a table.
    #[error("No table found in the provided HTML string.")]
    NoTableFound,

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    // ── Job life cycle ────────────────────────────────────────────────────
    /// No terminal response arrived before the caller's deadline.
    #[error("timeout, no terminal response for job '{job_id}' after {secs:.1}s")]
    Timeout { job_id: String, secs: f64 },

    /// The server reported the job as failed.
    #[error("Job '{job_id}' failed: {message}")]
    JobFailed { job_id: String, message: String },

    // ── Batch ─────────────────────────────────────────────────────────────
    /// A batch endpoint answered non-200.
    #[error("{action} failed: {status} {body}")]
    BatchFailed {
        action: &'static str,
        status: u16,
        body: String,
    },

    // ── Config ────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnyParserError {
    /// Classify a non-success API response by status code.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => AnyParserError::AuthError { status, body },
            429 => AnyParserError::RateLimitExceeded { status, body },
            _ => AnyParserError::Api { status, body },
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AnyParserError::AuthError { status, .. }
            | AnyParserError::RateLimitExceeded { status, .. }
            | AnyParserError::Api { status, .. }
            | AnyParserError::UploadFailed { status, .. }
            | AnyParserError::BatchFailed { status, .. } => Some(*status),
            AnyParserError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_embeds_status_and_body() {
        let e = AnyParserError::from_status(500, "internal boom");
        let msg = e.to_string();
        assert!(msg.contains("500"), "got: {msg}");
        assert!(msg.contains("internal boom"), "got: {msg}");
        assert_eq!(e.status(), Some(500));
    }

    #[test]
    fn from_status_classifies_auth_and_rate_limit() {
        assert!(matches!(
            AnyParserError::from_status(403, "nope"),
            AnyParserError::AuthError { status: 403, .. }
        ));
        assert!(matches!(
            AnyParserError::from_status(401, ""),
            AnyParserError::AuthError { .. }
        ));
        assert!(matches!(
            AnyParserError::from_status(429, "slow down"),
            AnyParserError::RateLimitExceeded { .. }
        ));
        assert!(matches!(
            AnyParserError::from_status(404, ""),
            AnyParserError::Api { status: 404, .. }
        ));
    }

    #[test]
    fn validation_display_is_transparent() {
        let e: AnyParserError = ValidationError::NotFound(PathBuf::from("nonexistent.docx")).into();
        assert_eq!(e.to_string(), "File does not exist: nonexistent.docx");
    }

    #[test]
    fn batch_failed_display() {
        let e = AnyParserError::BatchFailed {
            action: "Usage check",
            status: 401,
            body: "unauthorized".into(),
        };
        assert_eq!(e.to_string(), "Usage check failed: 401 unauthorized");
    }

    #[test]
    fn timeout_display_names_job() {
        let e = AnyParserError::Timeout {
            job_id: "abc".into(),
            secs: 2.0,
        };
        assert!(e.to_string().contains("abc"));
        assert!(e.to_string().starts_with("timeout"));
    }
}
