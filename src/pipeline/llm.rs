//! VLM interaction: send the prompt plus the inline file to the model.
//!
//! [`VisionModel`] is the seam between the extraction pipeline and the
//! outside world. Production uses [`ProviderVision`], a thin adapter over an
//! `edgequake_llm` provider; tests plug in canned implementations.
//!
//! One call is made per upload. Its first failure is final for that request.

use crate::config::ServerConfig;
use crate::error::{ExtractError, StartupError};
use crate::pipeline::encode::InlinePayload;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A multimodal model that reads an inline file and answers in text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send `prompt` together with `payload`; return the full text reply.
    async fn complete(&self, prompt: &str, payload: InlinePayload) -> Result<String, ExtractError>;

    /// Model identifier, for logging and error messages.
    fn model(&self) -> &str;
}

/// [`VisionModel`] backed by an `edgequake_llm` provider.
pub struct ProviderVision {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
}

impl ProviderVision {
    /// Wrap an already-constructed provider.
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            options: CompletionOptions::default(),
        }
    }

    /// Build the provider named in `config` (reads its API key from the environment).
    pub fn from_config(config: &ServerConfig) -> Result<Self, StartupError> {
        let provider = ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
            .map_err(|e| StartupError::ProviderNotConfigured {
                provider: config.provider_name.clone(),
                hint: format!("{e}"),
            })?;

        info!(
            "Vision provider ready: {} / {}",
            config.provider_name, config.model
        );

        Ok(Self {
            provider,
            model: config.model.clone(),
            options: build_options(config),
        })
    }
}

#[async_trait]
impl VisionModel for ProviderVision {
    async fn complete(&self, prompt: &str, payload: InlinePayload) -> Result<String, ExtractError> {
        let start = Instant::now();
        let image = ImageData::new(payload.data, payload.mime_type.as_str());
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ExtractError::ModelCall {
                model: self.model.clone(),
                message: format!("{e}"),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.model,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(ExtractError::ModelCall {
                model: self.model.clone(),
                message: "empty response".to_string(),
            });
        }

        Ok(response.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build `CompletionOptions` from the server config.
///
/// Unset fields stay `None` so the provider's own defaults apply.
fn build_options(config: &ServerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        ..Default::default()
    }
}
