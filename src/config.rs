//! Client configuration.
//!
//! Every knob lives in [`ClientConfig`], built via [`ClientConfigBuilder`].
//! A client copies its config at construction and never mutates it, so one
//! config can be shared freely across threads and clients.

use crate::error::AnyParserError;
use crate::progress::BatchProgress;
use std::fmt;
use std::time::Duration;

/// Public hosted endpoint for sync and async extraction.
pub const PUBLIC_SHARED_BASE_URL: &str = "https://public-api.cambio-ai.com";

/// Public hosted endpoint for the batch API.
pub const PUBLIC_BATCH_BASE_URL: &str = "http://batch-api.cambio-ai.com";

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Configuration for an [`crate::AnyParser`] client.
///
/// # Example
/// ```rust
/// use any_parser::ClientConfig;
///
/// let config = ClientConfig::builder("my-api-key")
///     .request_timeout_secs(120)
///     .batch_concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// API key sent as `x-api-key`. Required.
    pub api_key: String,

    /// Base URL for sync, async and job-status endpoints.
    /// Default: [`PUBLIC_SHARED_BASE_URL`].
    pub base_url: String,

    /// Base URL for the batch endpoints. Default: [`PUBLIC_BATCH_BASE_URL`].
    pub batch_url: String,

    /// Per-request timeout in seconds for API calls. Default: 60.
    ///
    /// Sync extraction of a long document can take minutes server side;
    /// raise this for large files.
    pub request_timeout_secs: u64,

    /// Timeout in seconds for the presigned storage upload. Default: 10.
    pub upload_timeout_secs: u64,

    /// Default interval between async fetch attempts, in milliseconds. Default: 5000.
    pub poll_interval_ms: u64,

    /// Default time budget for polling an async job, in seconds. Default: 60.
    pub poll_timeout_secs: u64,

    /// Worker count for batch folder uploads and retrievals. Default: 10.
    pub batch_concurrency: usize,

    /// Optional observer for batch upload events.
    pub progress_callback: Option<BatchProgress>,
}

impl ClientConfig {
    /// Create a builder seeded with defaults and the given API key.
    pub fn builder(api_key: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                api_key: api_key.into(),
                base_url: PUBLIC_SHARED_BASE_URL.to_string(),
                batch_url: PUBLIC_BATCH_BASE_URL.to_string(),
                request_timeout_secs: 60,
                upload_timeout_secs: 10,
                poll_interval_ms: 5_000,
                poll_timeout_secs: 60,
                batch_concurrency: 10,
                progress_callback: None,
            },
        }
    }

    /// Defaults with only the API key set; shorthand for `builder(key).build()`.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AnyParserError> {
        Self::builder(api_key).build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("batch_url", &self.batch_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("batch_concurrency", &self.batch_concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

fn redact(key: &str) -> String {
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", key.chars().take(4).collect::<String>())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn batch_url(mut self, url: impl Into<String>) -> Self {
        self.config.batch_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn poll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.poll_timeout_secs = secs;
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: BatchProgress) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Trailing slashes are trimmed from both URLs so endpoint paths can be
    /// appended with a single `/`.
    pub fn build(mut self) -> Result<ClientConfig, AnyParserError> {
        let c = &mut self.config;
        if c.api_key.trim().is_empty() {
            return Err(AnyParserError::InvalidConfig(
                "API key must not be empty".into(),
            ));
        }
        for (name, url) in [("base_url", &mut c.base_url), ("batch_url", &mut c.batch_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AnyParserError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }
        if c.request_timeout_secs == 0 {
            return Err(AnyParserError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        if c.upload_timeout_secs == 0 {
            return Err(AnyParserError::InvalidConfig(
                "upload timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_service() {
        let c = ClientConfig::builder("k3y").build().unwrap();
        assert_eq!(c.base_url, PUBLIC_SHARED_BASE_URL);
        assert_eq!(c.batch_url, PUBLIC_BATCH_BASE_URL);
        assert_eq!(c.request_timeout_secs, 60);
        assert_eq!(c.poll_interval_ms, 5_000);
        assert_eq!(c.poll_timeout_secs, 60);
        assert_eq!(c.batch_concurrency, 10);
    }

    #[test]
    fn empty_api_key_rejected() {
        let err = ClientConfig::builder("  ").build().unwrap_err();
        assert!(matches!(err, AnyParserError::InvalidConfig(_)));
    }

    #[test]
    fn non_http_base_url_rejected() {
        let err = ClientConfig::builder("key")
            .base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let c = ClientConfig::builder("key")
            .base_url("http://localhost:1234/")
            .batch_url("http://localhost:5678//")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "http://localhost:1234");
        assert_eq!(c.batch_url, "http://localhost:5678");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ClientConfig::new("supersecretkey").unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("supersecretkey"));
        assert!(dbg.contains("supe****"));
    }

    #[test]
    fn zero_timeouts_rejected() {
        let err = ClientConfig::builder("key")
            .upload_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("upload timeout"));

        let err = ClientConfig::builder("key")
            .request_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("request timeout"));
    }

    #[test]
    fn new_validates_like_build() {
        assert!(ClientConfig::new("").is_err());
        assert_eq!(ClientConfig::new("key").unwrap().upload_timeout_secs, 10);
    }

    #[test]
    fn concurrency_clamped_to_one() {
        let c = ClientConfig::builder("key").batch_concurrency(0).build().unwrap();
        assert_eq!(c.batch_concurrency, 1);
    }
}
