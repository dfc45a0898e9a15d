//! Asynchronous extraction jobs.
//!
//! ```text
//! submit ──▶ POST /async/upload ──▶ presigned multipart POST (204)
//!                │
//!                └── fileId ──▶ fetch: POST /async/fetch  (202 … 202, 200)
//!                          └──▶ wait_for_job: GET /anyparser/job_status/{id}
//! ```
//!
//! Polling sleeps between attempts and checks the caller's deadline before
//! each one. Nothing else is retried.

use crate::client::{expect_status, segment_url, validate_request, AnyParser};
use crate::config::ClientConfig;
use crate::error::AnyParserError;
use crate::operation::{ExtractionRequest, Operation};
use crate::output::ExtractionResult;
use crate::pipeline::{decode, encode};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-call polling behaviour for [`AnyParser::fetch`] and
/// [`AnyParser::wait_for_job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Keep polling while the job is still running. When `false` a single
    /// attempt is made and an unfinished job yields `Ok(None)`.
    pub wait: bool,
    /// Overall polling budget.
    pub timeout: Duration,
    /// Sleep between attempts.
    pub interval: Duration,
}

impl FetchOptions {
    /// Poll with the client's configured interval and timeout.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            wait: true,
            timeout: Duration::from_secs(config.poll_timeout_secs),
            interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    pub fn no_wait(mut self) -> Self {
        self.wait = false;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Server-side state of an async job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Completed and failed jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Body of `GET /anyparser/job_status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadIntent {
    #[serde(rename = "fileId", alias = "file_id", alias = "jobId", alias = "job_id")]
    file_id: String,
    #[serde(rename = "presignedUrl", alias = "presigned_url")]
    presigned_url: PresignedUpload,
}

#[derive(Debug, Deserialize)]
struct PresignedUpload {
    url: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl AnyParser {
    /// Default [`FetchOptions`] for this client.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::from_config(&self.config)
    }

    /// Submit a document for asynchronous extraction; returns the job id.
    ///
    /// Content inputs upload their decoded bytes as `file.<type>`.
    pub async fn submit(&self, request: &ExtractionRequest) -> Result<String, AnyParserError> {
        let file_type = validate_request(request)?;
        let operation = request.operation;
        let file_name = request.input.file_name(&file_type);
        let payload = encode::upload_intent_payload(&file_name, operation, &request.args)?;
        // Input bytes must be in hand before an upload intent exists.
        let bytes = encode::file_bytes(&request.input).await?;

        info!("Submitting async {} for {}", operation, file_name);
        let response = self.post_json(&self.api_url("async/upload"), &payload).await?;
        let body = expect_status(response, 200).await?;
        let intent: UploadIntent =
            serde_json::from_str(&body).map_err(|source| AnyParserError::InvalidJson {
                body: body.clone(),
                source,
            })?;

        self.upload_presigned(&intent.presigned_url, file_name, bytes)
            .await?;

        info!(job_id = %intent.file_id, "Submitted async {}", operation);
        Ok(intent.file_id)
    }

    /// Multipart POST to storage: every presigned field as text, then the file.
    async fn upload_presigned(
        &self,
        presigned: &PresignedUpload,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), AnyParserError> {
        debug!("Uploading {} bytes to presigned URL", bytes.len());
        let mut form = Form::new();
        for (name, value) in &presigned.fields {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(name.clone(), text);
        }
        form = form.part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(&presigned.url)
            .timeout(self.config.upload_timeout())
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 204 {
            let body = response.text().await.unwrap_or_default();
            return Err(AnyParserError::UploadFailed { status, body });
        }
        Ok(())
    }

    /// Fetch the result of a submitted job.
    ///
    /// `operation` selects the decoder; `None` falls back to the generic
    /// probe order. Returns `Ok(None)` only in no-wait mode while the job is
    /// still running.
    pub async fn fetch(
        &self,
        job_id: &str,
        operation: Option<Operation>,
        options: FetchOptions,
    ) -> Result<Option<ExtractionResult>, AnyParserError> {
        let url = self.api_url("async/fetch");
        let payload = json!({ "file_id": job_id });
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            if options.wait && start.elapsed() >= options.timeout {
                return Err(AnyParserError::Timeout {
                    job_id: job_id.to_string(),
                    secs: options.timeout.as_secs_f64(),
                });
            }
            attempt += 1;

            let response = self.post_json(&url, &payload).await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            match status {
                200 => {
                    info!(job_id, attempt, "Async job complete");
                    let value = decode::parse_body(&body)?;
                    return decode::decode_value(operation, &value).map(Some);
                }
                202 if !options.wait => return Ok(None),
                202 => {
                    debug!(job_id, attempt, "Job still processing, retrying in {:?}", options.interval);
                    tokio::time::sleep(options.interval).await;
                }
                _ => return Err(AnyParserError::from_status(status, body)),
            }
        }
    }

    /// Submit and then fetch with `options`.
    pub async fn extract_async(
        &self,
        request: &ExtractionRequest,
        options: FetchOptions,
    ) -> Result<Option<ExtractionResult>, AnyParserError> {
        let job_id = self.submit(request).await?;
        self.fetch(&job_id, Some(request.operation), options).await
    }

    /// Blocking wrapper around [`AnyParser::extract_async`].
    pub fn extract_async_blocking(
        &self,
        request: &ExtractionRequest,
        options: FetchOptions,
    ) -> Result<Option<ExtractionResult>, AnyParserError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| AnyParserError::Internal(format!("Failed to create tokio runtime: {e}")))?
            .block_on(self.extract_async(request, options))
    }

    /// Query the job-status resource once.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatus, AnyParserError> {
        let url = segment_url(&self.config.base_url, &["anyparser", "job_status", job_id])?;
        let response = self.get_api(url.as_str()).await?;
        let body = expect_status(response, 200).await?;
        serde_json::from_str(&body).map_err(|source| AnyParserError::InvalidJson { body, source })
    }

    /// Poll the job-status resource until the job completes or fails.
    ///
    /// A completed job's `result_url` is followed first; when that download
    /// fails the inline `result` is used instead.
    pub async fn wait_for_job(
        &self,
        job_id: &str,
        operation: Option<Operation>,
        options: FetchOptions,
    ) -> Result<Option<ExtractionResult>, AnyParserError> {
        let start = Instant::now();
        loop {
            if options.wait && start.elapsed() >= options.timeout {
                return Err(AnyParserError::Timeout {
                    job_id: job_id.to_string(),
                    secs: options.timeout.as_secs_f64(),
                });
            }

            let status = self.job_status(job_id).await?;
            match status.status {
                JobState::Completed => {
                    return self.completed_result(job_id, operation, status).await.map(Some)
                }
                JobState::Failed => {
                    return Err(AnyParserError::JobFailed {
                        job_id: job_id.to_string(),
                        message: status.error.unwrap_or_else(|| "unknown error".to_string()),
                    })
                }
                _ if !options.wait => return Ok(None),
                state => {
                    debug!(job_id, ?state, "Job not finished, retrying in {:?}", options.interval);
                    tokio::time::sleep(options.interval).await;
                }
            }
        }
    }

    async fn completed_result(
        &self,
        job_id: &str,
        operation: Option<Operation>,
        status: JobStatus,
    ) -> Result<ExtractionResult, AnyParserError> {
        if let Some(url) = status.result_url.as_deref() {
            match self.download_result(url).await {
                Ok(value) => return decode::decode_value(operation, &value),
                Err(e) if status.result.is_some() => {
                    warn!(job_id, "result_url fetch failed, using inline result: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        match status.result {
            Some(value) => decode::decode_value(operation, &value),
            None => Err(AnyParserError::UnrecognizedResponse {
                body: format!("job {job_id} completed without result or result_url"),
            }),
        }
    }

    /// GET a result document from storage. The API key is not sent.
    async fn download_result(&self, url: &str) -> Result<Value, AnyParserError> {
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if status != 200 {
            return Err(AnyParserError::Api { status, body });
        }
        decode::parse_body(&body)
    }
}
