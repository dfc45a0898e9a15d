//! Batch API: queue files for offline extraction and poll their status.
//!
//! Uploads go to a separate host ([`ClientConfig::batch_url`]). A folder is
//! walked recursively and its files are uploaded `batch_concurrency` at a
//! time; a failed file is logged and left out of the result, it never aborts
//! the batch.

use crate::client::segment_url;
use crate::config::{ClientConfig, API_KEY_HEADER};
use crate::error::{AnyParserError, ValidationError};
use crate::progress::{BatchProgress, NoopProgressCallback};
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Acknowledgement for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    pub request_id: String,
    pub request_status: String,
}

/// Processing status of one batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatusResponse {
    pub file_name: String,
    pub file_type: String,
    pub request_id: String,
    pub request_status: String,
    pub upload_time: String,
    #[serde(default)]
    pub completion_time: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub result: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error: Vec<String>,
}

/// Page quota of the current API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub page_limit: i64,
    pub page_remaining: i64,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Client for the batch endpoints. Obtain one with
/// [`crate::AnyParser::batches`] or [`BatchClient::new`].
#[derive(Debug, Clone)]
pub struct BatchClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl BatchClient {
    pub fn new(config: ClientConfig) -> Result<Self, AnyParserError> {
        let http = crate::client::build_http_client(&config)?;
        Ok(Self::from_parts(http, Arc::new(config)))
    }

    pub(crate) fn from_parts(http: reqwest::Client, config: Arc<ClientConfig>) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.batch_url, path)
    }

    fn progress(&self) -> BatchProgress {
        self.config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }

    /// Upload a file, or every file under a folder.
    ///
    /// A single file's failure is returned as an error. For a folder, each
    /// failed file is logged with `warn!` and skipped; the returned list only
    /// holds accepted uploads, in completion order.
    pub async fn create(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<UploadResponse>, AnyParserError> {
        let path = path.as_ref();
        if path.is_file() {
            return Ok(vec![self.create_file(path).await?]);
        }
        if !path.is_dir() {
            return Err(ValidationError::NotFound(path.to_path_buf()).into());
        }

        let root = path.to_path_buf();
        let files = tokio::task::spawn_blocking(move || collect_files(&root))
            .await
            .map_err(|e| AnyParserError::Internal(format!("folder walk panicked: {e}")))?;
        Ok(self.upload_all(files).await)
    }

    async fn upload_all(&self, files: Vec<PathBuf>) -> Vec<UploadResponse> {
        let total = files.len();
        let concurrency = self.config.batch_concurrency.max(1);
        let progress = self.progress();
        info!("Uploading {} files ({} concurrent)", total, concurrency);
        progress.on_batch_start(total);

        let outcomes: Vec<(PathBuf, Result<UploadResponse, AnyParserError>)> =
            stream::iter(files.into_iter().map(|path| {
                let progress = Arc::clone(&progress);
                async move {
                    progress.on_file_start(&path);
                    let result = self.create_file(&path).await;
                    match &result {
                        Ok(response) => progress.on_file_complete(&path, response),
                        Err(e) => progress.on_file_error(&path, &e.to_string()),
                    }
                    (path, result)
                }
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut uploaded = Vec::with_capacity(outcomes.len());
        for (path, result) in outcomes {
            match result {
                Ok(response) => uploaded.push(response),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        progress.on_batch_complete(total, uploaded.len());
        info!("Batch upload done: {}/{} accepted", uploaded.len(), total);
        uploaded
    }

    /// Upload one file as multipart part `file`.
    pub async fn create_file(&self, path: &Path) -> Result<UploadResponse, AnyParserError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AnyParserError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        debug!("Batch upload {} ({} bytes)", file_name, bytes.len());

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let response = self
            .http
            .post(self.url("files/"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        read_json(response, "Upload").await
    }

    /// Status of one batch request.
    pub async fn retrieve(&self, request_id: &str) -> Result<FileStatusResponse, AnyParserError> {
        let response = self
            .http
            .get(segment_url(&self.config.batch_url, &["files", request_id])?)
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        read_json(response, "Status check").await
    }

    /// Retrieve several requests concurrently; results keep input order.
    pub async fn retrieve_many(
        &self,
        request_ids: &[String],
    ) -> Vec<(String, Result<FileStatusResponse, AnyParserError>)> {
        stream::iter(request_ids.iter().map(|id| async move {
            let result = self.retrieve(id).await;
            (id.clone(), result)
        }))
        .buffered(self.config.batch_concurrency.max(1))
        .collect()
        .await
    }

    /// Page quota for the API key.
    pub async fn get_usage(&self) -> Result<UsageResponse, AnyParserError> {
        let response = self
            .http
            .get(self.url("users/current/usage"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await?;
        read_json(response, "Usage check").await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    action: &'static str,
) -> Result<T, AnyParserError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    if status != 200 {
        return Err(AnyParserError::BatchFailed {
            action,
            status,
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| AnyParserError::InvalidJson { body, source })
}

/// Regular files under `root`, recursively, in path order.
fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(e.into_path()),
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .collect();
    files.sort();
    files
}
