//! Post-processing: turn raw VLM text into extraction records.
//!
//! Even when told to "reply ONLY with the JSON array", models regularly wrap
//! the array in a ```` ```json ```` fence. This is the most failure-prone step
//! of the pipeline, so it is kept as two pure functions:
//!
//! 1. [`strip_code_fences`]: text → text. Removes fence tokens when the
//!    response starts with one.
//! 2. [`parse_records`]: text → records. Strict JSON parse, no repair.

use crate::error::ExtractError;
use crate::output::ExtractionRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Opening (` ```json `) or closing (` ``` `) fence token plus an optional newline.
static RE_FENCE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\n?").unwrap());

/// Remove markdown code-fence tokens from a model response.
///
/// The response is trimmed first. Only when it then starts with ```` ``` ````
/// is every fence token removed, wherever it appears; a response that does
/// not open with a fence is returned trimmed but otherwise untouched.
pub fn strip_code_fences(raw: &str) -> String {
    let text = raw.trim();
    if text.starts_with("```") {
        RE_FENCE_TOKEN.replace_all(text, "").trim().to_string()
    } else {
        text.to_string()
    }
}

/// Clean the response and parse it as a JSON array of records.
///
/// Elements are returned exactly as the model produced them.
pub fn parse_records(raw: &str) -> Result<Vec<ExtractionRecord>, ExtractError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|source| ExtractError::MalformedJson { source })?;

    match value {
        Value::Array(items) => Ok(items.into_iter().map(ExtractionRecord::from).collect()),
        other => Err(ExtractError::NotAnArray {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
