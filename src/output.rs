//! Output types: extracted records and the upload response body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the source table as transcribed by the model.
///
/// No schema is enforced: the record is whatever JSON value the model put in
/// the array (normally an object with `frontLabor`, `tonnage`, date parts and
/// audit timestamps). It serialises transparently as that value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionRecord(Value);

impl ExtractionRecord {
    /// Look up a named field when the record is a JSON object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.as_object().and_then(|obj| obj.get(name))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ExtractionRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    /// Name the file was stored under in the uploads directory.
    pub filename: String,
    /// Name the client sent.
    pub originalname: String,
    /// Always equal to `data.len()`.
    #[serde(rename = "recordsExtracted")]
    pub records_extracted: usize,
    pub data: Vec<ExtractionRecord>,
}

impl UploadResponse {
    pub fn new(filename: String, originalname: String, data: Vec<ExtractionRecord>) -> Self {
        Self {
            success: true,
            message: "Image processed successfully".to_string(),
            filename,
            originalname,
            records_extracted: data.len(),
            data,
        }
    }
}
