//! Operation kinds and their per-operation wire details.
//!
//! Every server operation is one [`Operation`] variant. The variant alone
//! decides the sync endpoint, the async `process_type`, the extra payload
//! arguments and which response keys carry the result, so the transport
//! code never branches on the operation beyond these lookups.

use crate::error::AnyParserError;
use crate::pipeline::input::FileInput;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The extraction operations offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Convert the document to markdown.
    Parse,
    /// Layout-aware, multi-language markdown conversion.
    ParsePro,
    /// OCR-based markdown conversion, optionally with table extraction.
    ParseWithOcr,
    /// Extract personally identifiable information.
    ExtractPii,
    /// Extract tables as HTML.
    ExtractTables,
    /// Extract caller-defined keys described in natural language.
    ExtractKeyValue,
    /// Extract resume sections (education, work history, skills, ...).
    ExtractResume,
}

/// How a result key's value is turned into an [`crate::ExtractionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Markdown,
    Tables,
    KeyValue,
    Pii,
    Resume,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Parse,
        Operation::ParsePro,
        Operation::ParseWithOcr,
        Operation::ExtractPii,
        Operation::ExtractTables,
        Operation::ExtractKeyValue,
        Operation::ExtractResume,
    ];

    /// Path segment of the sync endpoint, below `{base_url}/anyparser/`.
    pub fn sync_endpoint(self) -> &'static str {
        match self {
            Operation::Parse => "sync_parse",
            Operation::ParsePro => "sync_parse_pro",
            Operation::ParseWithOcr => "sync_parse_textract",
            Operation::ExtractPii => "sync_extract_pii",
            Operation::ExtractTables => "sync_extract_tables",
            Operation::ExtractKeyValue => "sync_extract_key_value",
            Operation::ExtractResume => "sync_extract_resume_key_value",
        }
    }

    /// `process_type` sent with an async upload intent.
    pub fn process_type(self) -> &'static str {
        match self {
            Operation::Parse => "parse",
            Operation::ParsePro => "parse_with_layout",
            Operation::ParseWithOcr => "parse_with_ocr",
            Operation::ExtractPii => "extract_pii",
            Operation::ExtractTables => "extract_tables",
            Operation::ExtractKeyValue => "extract_key_value",
            Operation::ExtractResume => "extract_resume_key_value",
        }
    }

    /// Response keys that may hold this operation's payload, in probe order.
    ///
    /// Later keys cover older server generations.
    pub fn result_keys(self) -> &'static [(&'static str, ResultKind)] {
        match self {
            Operation::Parse | Operation::ParsePro | Operation::ParseWithOcr => {
                &[("markdown", ResultKind::Markdown)]
            }
            Operation::ExtractTables => &[("markdown", ResultKind::Tables)],
            Operation::ExtractPii => &[
                ("pii_extraction", ResultKind::Pii),
                ("result", ResultKind::Pii),
            ],
            Operation::ExtractKeyValue => &[
                ("json", ResultKind::KeyValue),
                ("result", ResultKind::KeyValue),
            ],
            Operation::ExtractResume => &[
                ("extraction_result", ResultKind::Resume),
                ("resume_extraction", ResultKind::Resume),
            ],
        }
    }

    /// Stable CLI / log name.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Parse => "parse",
            Operation::ParsePro => "parse-pro",
            Operation::ParseWithOcr => "parse-ocr",
            Operation::ExtractPii => "pii",
            Operation::ExtractTables => "tables",
            Operation::ExtractKeyValue => "key-value",
            Operation::ExtractResume => "resume",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AnyParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Operation::ALL.iter().map(|op| op.as_str()).collect();
                AnyParserError::InvalidArgument(format!(
                    "unknown operation '{s}', expected one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// Optional instruction parameters for an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractArgs {
    /// Output key → natural-language description, for key-value extraction.
    pub extract_instruction: Option<BTreeMap<String, String>>,

    /// Ask OCR parsing to also extract tables.
    pub extract_tables: Option<bool>,
}

impl ExtractArgs {
    /// Args carrying an extract instruction.
    pub fn with_instruction<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            extract_instruction: Some(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            extract_tables: None,
        }
    }

    /// Operation-specific payload fields.
    ///
    /// Fields the operation does not understand are dropped rather than sent.
    pub fn payload_fields(&self, op: Operation) -> Result<Map<String, Value>, AnyParserError> {
        let mut fields = Map::new();
        match op {
            Operation::ParseWithOcr => {
                if let Some(flag) = self.extract_tables {
                    fields.insert("extract_tables".into(), Value::Bool(flag));
                }
            }
            Operation::ExtractTables => {
                fields.insert("extract_tables".into(), Value::Bool(true));
            }
            Operation::ExtractKeyValue => {
                let instruction = self
                    .extract_instruction
                    .as_ref()
                    .filter(|m| !m.is_empty())
                    .ok_or_else(|| {
                        AnyParserError::InvalidArgument(
                            "key-value extraction requires a non-empty extract instruction".into(),
                        )
                    })?;
                let pairs: Vec<Value> = instruction
                    .iter()
                    .map(|(key, description)| json!({ "key": key, "description": description }))
                    .collect();
                fields.insert(
                    "extract_input_key_description_pairs".into(),
                    Value::Array(pairs),
                );
            }
            Operation::Parse
            | Operation::ParsePro
            | Operation::ExtractPii
            | Operation::ExtractResume => {}
        }
        Ok(fields)
    }
}

/// A complete extraction request: what to send, and what to do with it.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub input: FileInput,
    pub operation: Operation,
    pub args: ExtractArgs,
}

impl ExtractionRequest {
    pub fn new(input: FileInput, operation: Operation) -> Self {
        Self {
            input,
            operation,
            args: ExtractArgs::default(),
        }
    }

    pub fn with_args(mut self, args: ExtractArgs) -> Self {
        self.args = args;
        self
    }
}
