//! Configuration for report generation.
//!
//! Every knob of the expansion loop, the LLM client and the renderer lives in
//! one [`ExpansionConfig`], built via [`ExpansionConfigBuilder`]. Callers set
//! only what they care about and rely on the documented defaults for the
//! rest.

use crate::error::ReportError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default placeholder marker searched for in templates.
pub const DEFAULT_MARKER: &str = "{{report_body}}";

/// Configuration for report expansion and assembly.
///
/// # Example
/// ```rust
/// use edgequake_report::ExpansionConfig;
///
/// let config = ExpansionConfig::builder()
///     .max_rounds(6)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.chars_per_page, 600);
/// ```
#[derive(Clone)]
pub struct ExpansionConfig {
    /// Maximum generation rounds per expansion, round 0 included. Default: 8.
    ///
    /// Each continuation prompt embeds the whole accumulated text, so prompt
    /// size grows with every round. Eight rounds is enough to reach a
    /// twenty-page target with typical model output lengths.
    pub max_rounds: u32,

    /// Characters per estimated page. Default: 600.
    ///
    /// A deliberately coarse figure for mixed CJK/Latin prose at the
    /// template's default font size.
    pub chars_per_page: usize,

    /// Fraction of the page target that counts as "reached". Range 0.1–1.0.
    /// Default: 0.9.
    pub completion_ratio: f32,

    /// Upper bound on a single generation call, in seconds. Default: 120.
    ///
    /// A call that runs past this is treated exactly like an empty response:
    /// the loop stops and returns what it has.
    pub round_timeout_secs: u64,

    /// Context longer than this many characters is truncated before it is
    /// put into a prompt. Default: 15 000.
    pub max_context_chars: usize,

    /// Extra instructions appended after the fixed formatting rules.
    pub custom_instructions: Option<String>,

    /// Placeholder marker the body is rendered into. Default: `{{report_body}}`.
    pub marker: String,

    /// Display width of embedded images, in inches. Default: 4.0.
    pub image_width_in: f32,

    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7.
    pub temperature: f32,

    /// Maximum retry attempts on a failed LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt.
    /// Default: 500.
    pub retry_backoff_ms: u64,

    /// Receives round start/complete and stop events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            chars_per_page: 600,
            completion_ratio: 0.9,
            round_timeout_secs: 120,
            max_context_chars: 15_000,
            custom_instructions: None,
            marker: DEFAULT_MARKER.to_string(),
            image_width_in: 4.0,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_retries: 3,
            retry_backoff_ms: 500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExpansionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpansionConfig")
            .field("max_rounds", &self.max_rounds)
            .field("chars_per_page", &self.chars_per_page)
            .field("completion_ratio", &self.completion_ratio)
            .field("round_timeout_secs", &self.round_timeout_secs)
            .field("max_context_chars", &self.max_context_chars)
            .field("custom_instructions", &self.custom_instructions.is_some())
            .field("marker", &self.marker)
            .field("image_width_in", &self.image_width_in)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .finish()
    }
}

impl ExpansionConfig {
    /// Create a new builder for `ExpansionConfig`.
    pub fn builder() -> ExpansionConfigBuilder {
        ExpansionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page count at which a target of `target_pages` counts as reached.
    pub fn completion_threshold(&self, target_pages: u32) -> f64 {
        target_pages as f64 * self.completion_ratio as f64
    }
}

/// Builder for [`ExpansionConfig`].
pub struct ExpansionConfigBuilder {
    config: ExpansionConfig,
}

impl fmt::Debug for ExpansionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpansionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExpansionConfigBuilder {
    pub fn max_rounds(mut self, n: u32) -> Self {
        self.config.max_rounds = n;
        self
    }

    pub fn chars_per_page(mut self, n: usize) -> Self {
        self.config.chars_per_page = n.max(1);
        self
    }

    pub fn completion_ratio(mut self, ratio: f32) -> Self {
        self.config.completion_ratio = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn round_timeout_secs(mut self, secs: u64) -> Self {
        self.config.round_timeout_secs = secs;
        self
    }

    pub fn max_context_chars(mut self, n: usize) -> Self {
        self.config.max_context_chars = n;
        self
    }

    pub fn custom_instructions(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.config.custom_instructions = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.config.marker = marker.into();
        self
    }

    pub fn image_width_in(mut self, inches: f32) -> Self {
        self.config.image_width_in = inches.clamp(0.5, 8.0);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExpansionConfig, ReportError> {
        let c = &self.config;
        if c.round_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "round_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.marker.is_empty() {
            return Err(ReportError::InvalidConfig(
                "placeholder marker must not be empty".into(),
            ));
        }
        if c.max_context_chars == 0 {
            return Err(ReportError::InvalidConfig(
                "max_context_chars must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExpansionConfig::default();
        assert_eq!(c.max_rounds, 8);
        assert_eq!(c.chars_per_page, 600);
        assert!((c.completion_ratio - 0.9).abs() < f32::EPSILON);
        assert_eq!(c.round_timeout_secs, 120);
        assert_eq!(c.max_context_chars, 15_000);
        assert_eq!(c.marker, "{{report_body}}");
    }

    #[test]
    fn builder_clamps() {
        let c = ExpansionConfig::builder()
            .completion_ratio(4.0)
            .temperature(-1.0)
            .chars_per_page(0)
            .image_width_in(20.0)
            .build()
            .unwrap();
        assert_eq!(c.completion_ratio, 1.0);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.chars_per_page, 1);
        assert_eq!(c.image_width_in, 8.0);
    }

    #[test]
    fn blank_custom_instructions_are_dropped() {
        let c = ExpansionConfig::builder()
            .custom_instructions("   ")
            .build()
            .unwrap();
        assert!(c.custom_instructions.is_none());
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(ExpansionConfig::builder().round_timeout_secs(0).build().is_err());
        assert!(ExpansionConfig::builder().marker("").build().is_err());
        assert!(ExpansionConfig::builder().max_context_chars(0).build().is_err());
    }

    #[test]
    fn zero_rounds_is_allowed() {
        let c = ExpansionConfig::builder().max_rounds(0).build().unwrap();
        assert_eq!(c.max_rounds, 0);
    }

    #[test]
    fn threshold() {
        let c = ExpansionConfig::default();
        assert!((c.completion_threshold(10) - 9.0).abs() < 1e-6);
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", ExpansionConfig::default());
        assert!(s.contains("ExpansionConfig"));
        assert!(!s.contains("progress_callback"));
    }
}
