//! Progress-callback trait for batch upload events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to receive
//! events while [`crate::batch::BatchClient::create`] uploads a folder.
//! Callers can forward events to a terminal progress bar, a channel or a
//! log without the library knowing how the host application reports.
//!
//! # Example
//!
//! ```rust
//! use any_parser::{BatchProgressCallback, ClientConfig, UploadResponse};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     uploaded: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, path: &Path, response: &UploadResponse) {
//!         let n = self.uploaded.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: {} -> {}", path.display(), response.request_id);
//!     }
//! }
//!
//! let config = ClientConfig::builder("api-key")
//!     .progress_callback(Arc::new(CountingCallback { uploaded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::batch::UploadResponse;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch uploader as it processes each file.
///
/// Uploads run concurrently, so `on_file_start`, `on_file_complete` and
/// `on_file_error` may be called from several tasks at once and in any
/// order. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after the folder walk, before any upload starts.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file's upload request is sent.
    fn on_file_start(&self, path: &Path) {
        let _ = path;
    }

    /// Called when the service accepted a file.
    fn on_file_complete(&self, path: &Path, response: &UploadResponse) {
        let _ = (path, response);
    }

    /// Called when a file's upload failed; the file is left out of the result.
    fn on_file_error(&self, path: &Path, error: &str) {
        let _ = (path, error);
    }

    /// Called once after every file has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type BatchProgress = Arc<dyn BatchProgressCallback>;
