//! # table2json
//!
//! Transcribe photographed or scanned data tables into JSON records using a
//! Vision Language Model (VLM).
//!
//! A client uploads an image or PDF of a data sheet; the file is stored,
//! base64-encoded, and sent to the model together with a fixed instruction
//! describing the expected record shape. The model's reply is cleaned of
//! markdown fences and parsed strictly as a JSON array.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /upload
//!  │
//!  ├─ 1. Validate  one `file` part, image/* or PDF, ≤ 10 MiB
//!  ├─ 2. Store     uploads/<epoch-ms>-<random>-<name>
//!  ├─ 3. Encode    bytes → base64 inline payload
//!  ├─ 4. VLM       prompt (with current timestamp) + payload → text
//!  ├─ 5. Clean     strip ```json fences
//!  └─ 6. Parse     strict JSON array → records
//! ```
//!
//! ## Library use
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use table2json::{ProviderVision, ServerConfig, TableExtractor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     config.require_api_key()?;
//!     let extractor = TableExtractor::new(Arc::new(ProviderVision::from_config(&config)?));
//!     let records = extractor.extract("sheet.jpg".as_ref(), "image/jpeg").await?;
//!     println!("{} rows", records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `table2json-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{ErrorBody, ExtractError, StartupError, UploadError};
pub use extract::TableExtractor;
pub use output::{ExtractionRecord, UploadResponse};
pub use pipeline::encode::InlinePayload;
pub use pipeline::llm::{ProviderVision, VisionModel};
pub use server::{router, run, serve, state::AppState};
