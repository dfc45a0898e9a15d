//! # any-parser
//!
//! Client for the AnyParser document-extraction API.
//!
//! The service turns PDFs, Office documents and images into markdown, and
//! extracts PII, tables, caller-described key-values and resume sections.
//! All extraction runs server side; this crate validates inputs, encodes
//! requests, drives the async job life cycle and decodes the responses.
//!
//! ## Request Flow
//!
//! ```text
//! FileInput + Operation + ExtractArgs
//!  │
//!  ├─ 1. Validate  exactly one source, file exists, type on the allow-list
//!  ├─ 2. Encode    base64 (sync) or raw bytes (async / batch upload)
//!  ├─ 3. Transport sync POST │ async upload → presigned POST → poll │ batch
//!  ├─ 4. Decode    probe the operation's result keys in order
//!  └─ 5. Tables    optional HTML → JSON / CSV conversion
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use any_parser::{AnyParser, ExtractionRequest, FileInput, Operation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnyParser::new(std::env::var("CAMBIO_API_KEY")?)?;
//!
//!     // Sync: one request, result inline.
//!     let output = client.parse(FileInput::path("invoice.pdf")).await?;
//!     println!("{}", output.result.to_text());
//!     eprintln!("{}", output.elapsed_display());
//!
//!     // Async: submit, then poll until done.
//!     let request = ExtractionRequest::new(FileInput::path("resume.docx"), Operation::ExtractResume);
//!     let job_id = client.submit(&request).await?;
//!     let result = client.fetch(&job_id, Some(Operation::ExtractResume), client.fetch_options()).await?;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `any-parser` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! any-parser = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod operation;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{BatchClient, FileStatusResponse, UploadResponse, UsageResponse};
pub use client::AnyParser;
pub use config::{ClientConfig, ClientConfigBuilder, PUBLIC_BATCH_BASE_URL, PUBLIC_SHARED_BASE_URL};
pub use error::{AnyParserError, Result, ValidationError};
pub use jobs::{FetchOptions, JobState, JobStatus};
pub use operation::{ExtractArgs, ExtractionRequest, Operation};
pub use output::{ExtractionOutput, ExtractionResult};
pub use pipeline::input::{validate_file_inputs, FileInput, SUPPORTED_FILE_EXTENSIONS};
pub use pipeline::tables::{convert_tables, ConvertedTable, TableFormat};
pub use progress::{BatchProgress, BatchProgressCallback, NoopProgressCallback};
