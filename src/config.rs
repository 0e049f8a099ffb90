//! Configuration types for the table extraction server.
//!
//! Everything the server and the extraction pipeline read at runtime lives in
//! [`ServerConfig`], built via its [`ServerConfigBuilder`]. The binary maps
//! its CLI flags onto the builder; tests construct configs directly.

use crate::error::StartupError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default upload size cap: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default vision model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Default LLM provider name understood by `edgequake_llm::ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Environment variable holding the model API key.
pub const DEFAULT_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Environment variable the given provider reads its API key from.
///
/// `None` for local providers that need no key.
pub fn api_key_var_for(provider: &str) -> Option<String> {
    match provider.trim().to_ascii_lowercase().as_str() {
        "ollama" | "lmstudio" | "mock" => None,
        "gemini" => Some(DEFAULT_API_KEY_VAR.to_string()),
        "azure" => Some("AZURE_OPENAI_API_KEY".to_string()),
        other => Some(format!("{}_API_KEY", other.replace('-', "_").to_ascii_uppercase())),
    }
}

/// Multipart field that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Configuration for the extraction server.
///
/// # Example
/// ```rust
/// use table2json::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .uploads_dir("/var/lib/table2json/uploads")
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// assert_eq!(config.address(), "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on. Default: `0.0.0.0`.
    pub host: String,

    /// TCP port. Default: 3000.
    pub port: u16,

    /// Directory that receives every accepted upload. Default: `uploads`.
    ///
    /// Files are never deleted by the server.
    pub uploads_dir: PathBuf,

    /// Largest accepted file part in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// LLM provider name (`gemini`, `openai`, `anthropic`, ...). Default: `gemini`.
    pub provider_name: String,

    /// Vision model identifier. Default: `gemini-2.0-flash-lite`.
    pub model: String,

    /// Environment variable that must hold the API key at startup.
    ///
    /// Follows `provider_name` unless set explicitly; `None` when the
    /// provider needs no key. Default: `GEMINI_API_KEY`.
    pub api_key_var: Option<String>,

    /// Sampling temperature. `None` leaves the provider default in place.
    pub temperature: Option<f32>,

    /// Output token cap. `None` leaves the provider default in place.
    ///
    /// Large sheets can produce long arrays; a low cap truncates the JSON
    /// and the response then fails to parse.
    pub max_tokens: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            uploads_dir: PathBuf::from("uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_var: Some(DEFAULT_API_KEY_VAR.to_string()),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
            explicit_key_var: false,
        }
    }

    /// `host:port` string used for binding and logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Read the API key named by `api_key_var` from the process environment.
    ///
    /// `Ok(None)` when the provider needs no key.
    pub fn require_api_key(&self) -> Result<Option<String>, StartupError> {
        self.require_api_key_with(|var| std::env::var(var).ok())
    }

    /// Like [`Self::require_api_key`] with an injectable lookup.
    ///
    /// An empty value counts as missing.
    pub fn require_api_key_with<F>(&self, lookup: F) -> Result<Option<String>, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(var) = &self.api_key_var else {
            return Ok(None);
        };
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(StartupError::MissingCredential { var: var.clone() }),
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
    explicit_key_var: bool,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn uploads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.uploads_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    /// Also switches `api_key_var` to the provider's variable, unless one
    /// was set with [`Self::api_key_var`].
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        if !self.explicit_key_var {
            self.config.api_key_var = api_key_var_for(&self.config.provider_name);
        }
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key_var(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_var = Some(var.into());
        self.explicit_key_var = true;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, StartupError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(StartupError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(StartupError::InvalidConfig("Model must not be empty".into()));
        }
        if c.provider_name.trim().is_empty() {
            return Err(StartupError::InvalidConfig(
                "Provider must not be empty".into(),
            ));
        }
        if c.api_key_var.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(StartupError::InvalidConfig(
                "API key variable name must not be empty".into(),
            ));
        }
        if c.max_tokens == Some(0) {
            return Err(StartupError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
