//! HTML table conversion for extract-tables results.
//!
//! The service returns each table as an HTML fragment. Callers that feed a
//! spreadsheet or a JSON store want rows instead. The fragments are small and
//! regular (`<table><tr><th|td>…`), so a handful of regexes is enough here;
//! cell entities are decoded with `html_escape`.

use crate::error::AnyParserError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Output format for extracted tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Keep the HTML the server returned. (default)
    #[default]
    Html,
    /// One array of `{header: cell}` objects per table.
    Json,
    /// One CSV document per table.
    Csv,
}

impl FromStr for TableFormat {
    type Err = AnyParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(TableFormat::Html),
            "json" => Ok(TableFormat::Json),
            "csv" => Ok(TableFormat::Csv),
            other => Err(AnyParserError::InvalidArgument(format!(
                "unknown table format '{other}', expected html, json or csv"
            ))),
        }
    }
}

/// A converted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConvertedTable {
    Html(String),
    Json(Vec<Map<String, Value>>),
    Csv(String),
}

static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</(?:th|td)\s*>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static RE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Convert every table in `tables` to `format`.
pub fn convert_tables(
    tables: &[String],
    format: TableFormat,
) -> Result<Vec<ConvertedTable>, AnyParserError> {
    tables
        .iter()
        .map(|html| match format {
            TableFormat::Html => Ok(ConvertedTable::Html(html.clone())),
            TableFormat::Json => html_table_to_json(html).map(ConvertedTable::Json),
            TableFormat::Csv => html_table_to_csv(html).map(ConvertedTable::Csv),
        })
        .collect()
}

/// Rows after the first become objects keyed by the first row's cell texts.
/// Only `<td>` cells count in body rows; extra cells beyond the header width
/// are dropped.
pub fn html_table_to_json(html: &str) -> Result<Vec<Map<String, Value>>, AnyParserError> {
    let rows = table_rows(html)?;
    let mut rows = rows.into_iter();
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.into_iter().map(|(_, text)| text).collect(),
        None => return Ok(Vec::new()),
    };

    Ok(rows
        .map(|cells| {
            headers
                .iter()
                .cloned()
                .zip(
                    cells
                        .into_iter()
                        .filter(|(is_header, _)| !is_header)
                        .map(|(_, text)| Value::String(text)),
                )
                .collect::<Map<String, Value>>()
        })
        .collect())
}

/// Every row, header row included, as one CSV record.
pub fn html_table_to_csv(html: &str) -> Result<String, AnyParserError> {
    let rows = table_rows(html)?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());
    for cells in rows {
        writer.write_record(cells.iter().map(|(_, text)| text.as_str()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AnyParserError::Internal(format!("csv flush: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AnyParserError::Internal(format!("csv utf-8: {e}")))
}

/// Cells of each row of the first table: `(is_header, text)`.
fn table_rows(html: &str) -> Result<Vec<Vec<(bool, String)>>, AnyParserError> {
    let table = RE_TABLE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or(AnyParserError::NoTableFound)?
        .as_str();

    Ok(RE_ROW
        .captures_iter(table)
        .map(|row| {
            RE_CELL
                .captures_iter(&row[1])
                .map(|cell| (cell[1].eq_ignore_ascii_case("th"), cell_text(&cell[2])))
                .collect::<Vec<_>>()
        })
        .collect())
}

fn cell_text(inner: &str) -> String {
    let stripped = RE_TAG.replace_all(inner, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    RE_SPACE.replace_all(decoded.trim(), " ").into_owned()
}
