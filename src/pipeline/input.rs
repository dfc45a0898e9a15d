//! Input validation: normalise a path or base64 payload into a [`FileInput`].
//!
//! Validation is local and read-only (one `stat` per path). It runs before
//! any request so that a typo in a path never costs a round trip.

use crate::error::ValidationError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File types accepted by the service, as lower-case extensions.
pub const SUPPORTED_FILE_EXTENSIONS: [&str; 9] = [
    "pdf", "doc", "docx", "ppt", "pptx", "jpg", "jpeg", "png", "gif",
];

/// Where the document bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileInput {
    /// A local file; its type is its extension unless overridden.
    Path {
        path: PathBuf,
        file_type: Option<String>,
    },
    /// Base64-encoded file content with an explicit type.
    Content { content: String, file_type: String },
}

impl FileInput {
    /// A local file whose type is taken from its extension.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        FileInput::Path {
            path: path.into(),
            file_type: None,
        }
    }

    /// Base64 content of the given type (`"pdf"`, `".PNG"`, ...).
    pub fn content(content: impl Into<String>, file_type: impl Into<String>) -> Self {
        FileInput::Content {
            content: content.into(),
            file_type: file_type.into(),
        }
    }

    /// Check the input and return its normalised file type.
    pub fn validate(&self) -> Result<String, ValidationError> {
        match self {
            FileInput::Path { path, file_type } => {
                check_path(path)?;
                let file_type = match file_type {
                    Some(t) => normalise_file_type(t),
                    None => extension_of(path),
                };
                check_file_type(&file_type)?;
                Ok(file_type)
            }
            FileInput::Content { file_type, .. } => {
                let file_type = normalise_file_type(file_type);
                check_file_type(&file_type)?;
                Ok(file_type)
            }
        }
    }

    /// File name announced to the server for async uploads.
    pub fn file_name(&self, file_type: &str) -> String {
        match self {
            FileInput::Path { path, .. } => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("file.{file_type}")),
            FileInput::Content { .. } => format!("file.{file_type}"),
        }
    }
}

/// Validate the loose `(path?, content?, type?)` triple callers such as the
/// CLI collect, and build the matching [`FileInput`].
///
/// Exactly one of `file_path` / `file_content` must be given; `file_type` is
/// mandatory with content and overrides the extension with a path.
pub fn validate_file_inputs(
    file_path: Option<&Path>,
    file_content: Option<&str>,
    file_type: Option<&str>,
) -> Result<FileInput, ValidationError> {
    let input = match (file_path, file_content) {
        (None, None) => return Err(ValidationError::MissingInputs),
        (Some(_), Some(_)) => return Err(ValidationError::ConflictingInputs),
        (None, Some(content)) => {
            let file_type = file_type.ok_or(ValidationError::MissingFileType)?;
            FileInput::content(content, file_type)
        }
        (Some(path), None) => FileInput::Path {
            path: path.to_path_buf(),
            file_type: file_type.map(str::to_string),
        },
    };
    let file_type = input.validate()?;
    debug!("Validated input of type '{}'", file_type);
    Ok(input)
}

/// Whether `file_type` (already normalised) is on the allow-list.
pub fn is_supported(file_type: &str) -> bool {
    SUPPORTED_FILE_EXTENSIONS.contains(&file_type)
}

fn check_path(path: &Path) -> Result<(), ValidationError> {
    let meta = std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .ok_or_else(|| ValidationError::NotFound(path.to_path_buf()))?;
    if meta.len() == 0 {
        return Err(ValidationError::FileEmpty(path.to_path_buf()));
    }
    Ok(())
}

fn check_file_type(file_type: &str) -> Result<(), ValidationError> {
    if is_supported(file_type) {
        return Ok(());
    }
    let mut supported = SUPPORTED_FILE_EXTENSIONS.to_vec();
    supported.sort_unstable();
    Err(ValidationError::UnsupportedFileType {
        file_type: file_type.to_string(),
        supported: supported.join(", "),
    })
}

fn normalise_file_type(t: &str) -> String {
    t.trim().trim_start_matches('.').to_lowercase()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
