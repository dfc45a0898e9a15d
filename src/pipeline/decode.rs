//! Response decoding: pick the payload out of whichever shape the server sent.
//!
//! Server generations disagree on which top-level key holds the result
//! (`result`, `json`, `pii_extraction`, ...). Each operation therefore
//! declares an ordered list of `(key, kind)` pairs
//! ([`Operation::result_keys`]); the first key present wins and its kind
//! selects the extractor. When the operation is unknown, as with a bare
//! job id, [`GENERIC_PROBE_ORDER`] is tried instead.

use crate::error::AnyParserError;
use crate::operation::{Operation, ResultKind};
use crate::output::ExtractionResult;
use serde_json::Value;
use tracing::debug;

/// Probe order for responses of unknown operation. This is a compatibility
/// shim over undocumented server behaviour; changes need product review.
pub const GENERIC_PROBE_ORDER: [(&str, ResultKind); 4] = [
    ("json", ResultKind::KeyValue),
    ("resume_extraction", ResultKind::Resume),
    ("pii_extraction", ResultKind::Pii),
    ("markdown", ResultKind::Markdown),
];

/// Parse a response body as JSON, keeping the body for the error message.
pub fn parse_body(body: &str) -> Result<Value, AnyParserError> {
    serde_json::from_str(body).map_err(|source| AnyParserError::InvalidJson {
        body: body.to_string(),
        source,
    })
}

/// Decode a response body for a known operation.
pub fn decode_response(operation: Operation, body: &str) -> Result<ExtractionResult, AnyParserError> {
    let value = parse_body(body)?;
    decode_value(Some(operation), &value)
}

/// Decode an already-parsed response. `None` uses the generic probe order.
pub fn decode_value(
    operation: Option<Operation>,
    value: &Value,
) -> Result<ExtractionResult, AnyParserError> {
    let probes: &[(&str, ResultKind)] = match operation {
        Some(op) => op.result_keys(),
        None => &GENERIC_PROBE_ORDER,
    };

    for (key, kind) in probes {
        if let Some(payload) = value.get(*key) {
            debug!("Decoding response key '{}' as {:?}", key, kind);
            return extract(*kind, payload).ok_or_else(|| unrecognized(value));
        }
    }
    Err(unrecognized(value))
}

fn extract(kind: ResultKind, payload: &Value) -> Option<ExtractionResult> {
    match kind {
        ResultKind::Markdown => join_markdown(payload).map(ExtractionResult::Markdown),
        ResultKind::Tables => string_list(payload).map(ExtractionResult::Tables),
        ResultKind::KeyValue => Some(ExtractionResult::KeyValue(payload.clone())),
        ResultKind::Pii => Some(ExtractionResult::Pii(payload.clone())),
        ResultKind::Resume => Some(ExtractionResult::Resume(payload.clone())),
    }
}

/// A list of strings joins with `\n`; a lone string passes through.
fn join_markdown(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) => Some(s.clone()),
        Value::Array(_) => string_list(payload).map(|parts| parts.join("\n")),
        _ => None,
    }
}

fn string_list(payload: &Value) -> Option<Vec<String>> {
    match payload {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

fn unrecognized(value: &Value) -> AnyParserError {
    AnyParserError::UnrecognizedResponse {
        body: value.to_string(),
    }
}
