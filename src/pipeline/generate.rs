//! Text generation: the [`TextGenerator`] seam and its LLM implementation.
//!
//! The expansion loop only ever sees a [`TextGenerator`]. Production code
//! injects an [`LlmGenerator`] wrapping an `edgequake_llm` provider; tests
//! inject scripted generators. The contract is fail-closed: `generate`
//! always returns a string, never an error, so a flaky provider can shorten
//! a report but cannot abort it.
//!
//! ## Retry Strategy
//!
//! Transient 429/503 errors are common under load. Failed calls are retried
//! with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms
//! base and 3 retries the waits are 500 ms → 1 s → 2 s. After the last
//! attempt the error text is returned as `Generation failed: <error>`.

use crate::config::ExpansionConfig;
use crate::error::ReportError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Prefix of the text returned when every attempt failed.
pub const FAILURE_PREFIX: &str = "Generation failed: ";

/// Something that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate up to `max_output_tokens` tokens for `prompt`.
    ///
    /// Never fails; on error, implementations return an explanatory string
    /// (or an empty one, which the expansion loop treats as a stall).
    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> String;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> String {
        (**self).generate(prompt, max_output_tokens).await
    }
}

/// [`TextGenerator`] backed by an `edgequake_llm` chat provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl std::fmt::Debug for LlmGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGenerator")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl LlmGenerator {
    /// Wrap `provider` with default sampling and retry settings.
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let defaults = ExpansionConfig::default();
        Self {
            provider,
            temperature: defaults.temperature,
            max_retries: defaults.max_retries,
            retry_backoff_ms: defaults.retry_backoff_ms,
        }
    }

    /// Resolve a provider from `config` and take its sampling and retry
    /// settings.
    pub fn from_config(config: &ExpansionConfig) -> Result<Self, ReportError> {
        let provider = resolve_provider(config)?;
        Ok(Self {
            provider,
            temperature: config.temperature,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, prompt: &str, max_output_tokens: usize) -> String {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];
        let options = build_options(self.temperature, max_output_tokens);

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "Generation: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Generation: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return response.content;
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    warn!("Generation: attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        let err_msg = last_err.unwrap_or_else(|| "Unknown error".to_string());
        format!("{FAILURE_PREFIX}{err_msg}")
    }
}

/// Delay before retry number `attempt` (1-based).
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ReportError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReportError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured even when several API keys are present.
/// 4. **OpenAI key** (`OPENAI_API_KEY`), then full auto-detection via
///    [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &ExpansionConfig) -> Result<Arc<dyn LLMProvider>, ReportError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReportError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
