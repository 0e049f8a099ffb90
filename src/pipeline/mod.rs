//! Pipeline stages for table-image-to-JSON extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! encode ──▶ llm ──▶ postprocess
//! (base64)   (VLM)   (fences → JSON records)
//! ```
//!
//! 1. [`encode`]      : read the stored upload and base64-wrap it with its MIME type
//! 2. [`llm`]         : send prompt + inline payload to the vision model; the only
//!    stage with network I/O
//! 3. [`postprocess`] : strip markdown fences and parse the text into records

pub mod encode;
pub mod llm;
pub mod postprocess;
