//! Request encoding: file bytes ⇄ base64, and request payload assembly.
//!
//! The sync endpoints take the whole document inline as base64 inside the
//! JSON body; the async path uploads raw bytes to storage instead. Both
//! start from a [`FileInput`], which may itself already hold base64.

use crate::error::AnyParserError;
use crate::operation::{ExtractArgs, Operation};
use crate::pipeline::input::FileInput;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};
use tracing::debug;

/// Base64-encode raw bytes (standard alphabet, padded).
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64 into raw bytes.
pub fn decode_content(content: &str) -> Result<Vec<u8>, AnyParserError> {
    Ok(STANDARD.decode(content.trim())?)
}

/// Base64 content for the sync payload.
///
/// Content inputs are passed through untouched.
pub async fn file_content_base64(input: &FileInput) -> Result<String, AnyParserError> {
    match input {
        FileInput::Path { path, .. } => {
            let bytes = read_file(path).await?;
            let encoded = encode_bytes(&bytes);
            debug!(
                "Encoded {} → {} bytes base64",
                path.display(),
                encoded.len()
            );
            Ok(encoded)
        }
        FileInput::Content { content, .. } => Ok(content.clone()),
    }
}

/// Raw bytes for a storage upload.
pub async fn file_bytes(input: &FileInput) -> Result<Vec<u8>, AnyParserError> {
    match input {
        FileInput::Path { path, .. } => read_file(path).await,
        FileInput::Content { content, .. } => decode_content(content),
    }
}

async fn read_file(path: &std::path::Path) -> Result<Vec<u8>, AnyParserError> {
    tokio::fs::read(path).await.map_err(|e| AnyParserError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// JSON body for a sync call: `{file_content, file_type, <operation args>}`.
pub fn sync_payload(
    file_content: String,
    file_type: &str,
    operation: Operation,
    args: &ExtractArgs,
) -> Result<Value, AnyParserError> {
    let mut body = Map::new();
    body.insert("file_content".into(), Value::String(file_content));
    body.insert("file_type".into(), Value::String(file_type.to_string()));
    body.extend(args.payload_fields(operation)?);
    Ok(Value::Object(body))
}

/// JSON body for an async upload intent: `{file_name, process_type, extract_args?}`.
pub fn upload_intent_payload(
    file_name: &str,
    operation: Operation,
    args: &ExtractArgs,
) -> Result<Value, AnyParserError> {
    let mut body = Map::new();
    body.insert("file_name".into(), Value::String(file_name.to_string()));
    body.insert(
        "process_type".into(),
        Value::String(operation.process_type().to_string()),
    );
    let extra = args.payload_fields(operation)?;
    if !extra.is_empty() {
        body.insert("extract_args".into(), Value::Object(extra));
    }
    Ok(Value::Object(body))
}
