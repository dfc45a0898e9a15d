//! Result types returned by extraction calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// The decoded payload of an extraction. Which variant comes back is fixed
/// by the operation, not negotiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExtractionResult {
    /// Markdown text (parse operations).
    Markdown(String),
    /// One HTML string per extracted table.
    Tables(Vec<String>),
    /// Key-value extraction output, as returned by the server.
    KeyValue(Value),
    /// PII record.
    Pii(Value),
    /// Resume sections.
    Resume(Value),
}

impl ExtractionResult {
    /// The markdown text, if this is a markdown result.
    pub fn as_markdown(&self) -> Option<&str> {
        match self {
            ExtractionResult::Markdown(s) => Some(s),
            _ => None,
        }
    }

    /// The JSON payload of a structured result.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ExtractionResult::KeyValue(v) | ExtractionResult::Pii(v) | ExtractionResult::Resume(v) => {
                Some(v)
            }
            _ => None,
        }
    }

    /// Render the result as text for display or files: markdown as-is,
    /// tables separated by blank lines, JSON pretty-printed.
    pub fn to_text(&self) -> String {
        match self {
            ExtractionResult::Markdown(s) => s.clone(),
            ExtractionResult::Tables(tables) => tables.join("\n\n"),
            ExtractionResult::KeyValue(v) | ExtractionResult::Pii(v) | ExtractionResult::Resume(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
        }
    }
}

/// A sync extraction result together with its wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub result: ExtractionResult,
    /// Request round-trip time, including server processing.
    pub elapsed_ms: u64,
}

impl ExtractionOutput {
    pub fn new(result: ExtractionResult, elapsed: Duration) -> Self {
        Self {
            result,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    /// Human-readable timing, e.g. `Time Elapsed: 1.25 seconds`.
    pub fn elapsed_display(&self) -> String {
        format!("Time Elapsed: {:.2} seconds", self.elapsed().as_secs_f64())
    }
}
