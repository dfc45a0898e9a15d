//! The [`AnyParser`] client and the synchronous extraction path.
//!
//! A sync call is a single POST carrying the whole document as base64; the
//! server answers once extraction is finished. There is no retry: one failed
//! call is a terminal error for that call. For long documents prefer the
//! async job API in [`crate::jobs`].

use crate::batch::BatchClient;
use crate::config::{ClientConfig, API_KEY_HEADER};
use crate::error::AnyParserError;
use crate::operation::{ExtractArgs, ExtractionRequest, Operation};
use crate::output::ExtractionOutput;
use crate::pipeline::{decode, encode, input::FileInput};
use reqwest::{Response, Url};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Client for the AnyParser extraction API.
///
/// Cheap to clone; clones share one connection pool and one immutable
/// [`ClientConfig`].
///
/// # Example
/// ```rust,no_run
/// use any_parser::{AnyParser, FileInput};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), any_parser::AnyParserError> {
/// let client = AnyParser::new("my-api-key")?;
/// let output = client.parse(FileInput::path("report.pdf")).await?;
/// println!("{}", output.result.to_text());
/// eprintln!("{}", output.elapsed_display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AnyParser {
    pub(crate) http: reqwest::Client,
    pub(crate) config: Arc<ClientConfig>,
}

impl AnyParser {
    /// Client for the public hosted service with default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self, AnyParserError> {
        Self::with_config(ClientConfig::builder(api_key).build()?)
    }

    /// Client with an explicit configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self, AnyParserError> {
        let http = build_http_client(&config)?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Batch API client sharing this client's connection pool and config.
    pub fn batches(&self) -> BatchClient {
        BatchClient::from_parts(self.http.clone(), Arc::clone(&self.config))
    }

    // ── Sync operations ──────────────────────────────────────────────────

    /// Run one extraction request synchronously.
    ///
    /// # Errors
    /// - [`AnyParserError::Validation`] / [`AnyParserError::InvalidArgument`]
    ///   before any request is made
    /// - [`AnyParserError::Api`] (and the auth / rate-limit variants) on a
    ///   non-200 answer, carrying the status and body
    /// - [`AnyParserError::InvalidJson`] / [`AnyParserError::UnrecognizedResponse`]
    ///   when the body cannot be decoded
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionOutput, AnyParserError> {
        let file_type = validate_request(request)?;
        let operation = request.operation;
        let content = encode::file_content_base64(&request.input).await?;
        let payload = encode::sync_payload(content, &file_type, operation, &request.args)?;
        let url = self.api_url(&format!("anyparser/{}", operation.sync_endpoint()));

        info!("Starting sync {} ({})", operation, file_type);
        let start = Instant::now();
        let response = self.post_json(&url, &payload).await?;
        let body = expect_status(response, 200).await?;
        let elapsed = start.elapsed();
        debug!("Sync {} answered {} bytes in {:?}", operation, body.len(), elapsed);

        let result = decode::decode_response(operation, &body)?;
        info!("Sync {} complete in {}ms", operation, elapsed.as_millis());
        Ok(ExtractionOutput::new(result, elapsed))
    }

    /// Blocking wrapper around [`AnyParser::extract`].
    ///
    /// Creates a temporary tokio runtime; do not call from async code.
    pub fn extract_blocking(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionOutput, AnyParserError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| AnyParserError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.extract(request))
    }

    /// Convert a document to markdown.
    pub async fn parse(&self, input: FileInput) -> Result<ExtractionOutput, AnyParserError> {
        self.extract(&ExtractionRequest::new(input, Operation::Parse))
            .await
    }

    /// Layout-aware, multi-language markdown conversion.
    pub async fn parse_pro(&self, input: FileInput) -> Result<ExtractionOutput, AnyParserError> {
        self.extract(&ExtractionRequest::new(input, Operation::ParsePro))
            .await
    }

    /// OCR-based markdown conversion.
    pub async fn parse_with_ocr(
        &self,
        input: FileInput,
        extract_tables: bool,
    ) -> Result<ExtractionOutput, AnyParserError> {
        let args = ExtractArgs {
            extract_tables: Some(extract_tables),
            ..Default::default()
        };
        self.extract(&ExtractionRequest::new(input, Operation::ParseWithOcr).with_args(args))
            .await
    }

    pub async fn extract_pii(&self, input: FileInput) -> Result<ExtractionOutput, AnyParserError> {
        self.extract(&ExtractionRequest::new(input, Operation::ExtractPii))
            .await
    }

    /// Extract tables; the result holds one HTML string per table.
    pub async fn extract_tables(
        &self,
        input: FileInput,
    ) -> Result<ExtractionOutput, AnyParserError> {
        self.extract(&ExtractionRequest::new(input, Operation::ExtractTables))
            .await
    }

    /// Extract the keys described by `instruction` (key → description).
    pub async fn extract_key_value(
        &self,
        input: FileInput,
        instruction: BTreeMap<String, String>,
    ) -> Result<ExtractionOutput, AnyParserError> {
        let args = ExtractArgs {
            extract_instruction: Some(instruction),
            ..Default::default()
        };
        self.extract(&ExtractionRequest::new(input, Operation::ExtractKeyValue).with_args(args))
            .await
    }

    pub async fn extract_resume_key_value(
        &self,
        input: FileInput,
    ) -> Result<ExtractionOutput, AnyParserError> {
        self.extract(&ExtractionRequest::new(input, Operation::ExtractResume))
            .await
    }

    // ── HTTP helpers ─────────────────────────────────────────────────────

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    pub(crate) async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Response, AnyParserError> {
        Ok(self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await?)
    }

    pub(crate) async fn get_api(&self, url: &str) -> Result<Response, AnyParserError> {
        Ok(self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?)
    }
}

/// Validate input and operation arguments; returns the normalised file type.
pub(crate) fn validate_request(request: &ExtractionRequest) -> Result<String, AnyParserError> {
    let file_type = request.input.validate()?;
    request.args.payload_fields(request.operation)?;
    Ok(file_type)
}

/// `base` with each of `segments` appended as one percent-encoded path segment.
pub(crate) fn segment_url(base: &str, segments: &[&str]) -> Result<Url, AnyParserError> {
    let mut url = Url::parse(base)
        .map_err(|e| AnyParserError::InvalidConfig(format!("invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| {
            AnyParserError::InvalidConfig(format!("base URL '{base}' cannot take a path"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, AnyParserError> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("any-parser-rust/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Read the body; any status other than `expected` becomes an error
/// carrying the status and body.
pub(crate) async fn expect_status(
    response: Response,
    expected: u16,
) -> Result<String, AnyParserError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    if status != expected {
        return Err(AnyParserError::from_status(status, body));
    }
    Ok(body)
}
