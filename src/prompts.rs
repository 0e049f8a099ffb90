//! Prompt text for VLM-based table transcription.
//!
//! The instruction is the only place that knows the record shape the caller
//! expects back. Tests import it directly so prompt regressions show up
//! without a live model.

use chrono::{DateTime, SecondsFormat, Utc};

/// Render a timestamp the way the prompt and the record template expect it:
/// ISO-8601, millisecond precision, `Z` suffix (e.g. `2025-11-21T08:30:00.000Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the extraction instruction for a table image or PDF.
///
/// `now` is embedded three times: as the current-date reference and as the
/// default for the `createdAt` / `updatedAt` audit fields.
pub fn table_extraction_prompt(now: &str) -> String {
    format!(
        r#"Analyse this mining data table and extract ALL of its information as JSON.

CURRENT DATE: {now}

IMPORTANT:
- Extract EVERY row of the table
- For each row, create a JSON object with this EXACT structure:

{{
    "_id": "a unique MongoDB-style ID (24 hexadecimal characters)",
    "frontLabor": "value of the 'Reserva (tn)' column or a similar identifier",
    "date": "date in ISO format (2025-11-21T00:00:00.000Z)",
    "startDate": "the CURRENT DATE",
    "dateString": "date in YYYY-MM-DD format",
    "phase": "mineral",
    "tonnage": number of tonnes (convert to an integer),
    "volquetes": [],
    "firma_volquetes": [],
    "state": "active",
    "shift": "noche",
    "type": "blending",
    "accept": [],
    "day": day of the month (number),
    "month": month (number),
    "year": 2025,
    "__v": 0,
    "createdAt": "{now}",
    "updatedAt": "{now}"
}}

RULES:
1. Take "frontLabor" from the columns holding codes such as "1910_OB6_TJ-650"
2. "tonnage" must be the number of tonnes (look for columns such as TOTAL, Reserva, etc.)
3. Use the CURRENT DATE for startDate, createdAt and updatedAt
4. If a cell is blank or empty, use the default value
5. Return ONLY the JSON array, with no extra explanation
6. Make sure the result is valid JSON

Reply ONLY with the JSON array, nothing else."#
    )
}
