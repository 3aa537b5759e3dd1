//! Iterative expansion: generate until the report is long enough.
//!
//! A single model call rarely produces a report of a requested length, so
//! [`expand`] drives the generator round by round:
//!
//! ```text
//! round 0    initial prompt (rules, page guidance, query, context)
//! round n>0  continuation prompt embedding everything so far
//!    │
//!    ├─ empty / timed out        → stop (EmptyResponse)
//!    ├─ already in accumulator   → stop (DuplicateResponse)
//!    ├─ append, render probe, estimate pages
//!    │     └─ pages ≥ target·ratio → stop (TargetReached)
//!    └─ rounds spent             → stop (RoundBudgetExhausted)
//! ```
//!
//! Rounds are sequential (each prompt depends on the previous output), but
//! all state lives in the call frame, so independent expansions can share
//! one generator and run concurrently. Nothing in here returns an error: a
//! stalled generator yields whatever text was accumulated.

use crate::config::ExpansionConfig;
use crate::document::Document;
use crate::output::{ExpansionOutput, StopReason};
use crate::pipeline::estimate::estimate_with;
use crate::pipeline::generate::TextGenerator;
use crate::pipeline::images::ImageRegistry;
use crate::pipeline::render::Renderer;
use crate::error::ReportError;
use crate::prompts::{
    combine_sections, continuation_prompt, field_prompt, initial_prompt, section_prompt,
    truncate_context, PromptInput,
};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on characters requested from one continuation round.
const MAX_CHARS_PER_ROUND: usize = 2000;

/// Characters of source text behind one section in separate mode.
pub const SOURCE_CHUNK_CHARS: usize = 8192;

/// Sections generated per source document in separate mode.
pub const SECTIONS_PER_SOURCE: usize = 3;

/// Output-token budget for a short template field.
const FIELD_TOKENS: usize = 1000;

/// Output-token budget for expansion rounds.
pub fn round_budget(target_pages: u32) -> usize {
    if target_pages > 6 {
        8000
    } else {
        4000
    }
}

/// Output-token budget for single-shot generation.
pub fn max_tokens_for_target(target_pages: Option<u32>) -> usize {
    match target_pages {
        Some(1..=3) => 2000,
        Some(4..=6) => 4000,
        Some(7..=10) => 8000,
        Some(p) if p > 10 => 8192,
        _ => 4000,
    }
}

/// Expand a report on `query` until it reaches about `target_pages` pages.
///
/// Equivalent to [`expand_with_images`] with an empty registry.
pub async fn expand(
    generator: &dyn TextGenerator,
    query: &str,
    context: &str,
    target_pages: u32,
    config: &ExpansionConfig,
) -> ExpansionOutput {
    expand_with_images(
        generator,
        query,
        context,
        target_pages,
        &ImageRegistry::new(),
        config,
    )
    .await
}

/// Expand a report, listing `registry`'s images in the initial prompt.
pub async fn expand_with_images(
    generator: &dyn TextGenerator,
    query: &str,
    context: &str,
    target_pages: u32,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> ExpansionOutput {
    let start = Instant::now();
    let threshold = config.completion_threshold(target_pages);
    let budget = round_budget(target_pages);
    let context = truncate_context(context, config.max_context_chars);
    let listing = registry.prompt_listing();

    info!(
        "Expanding '{}' to {} pages (max {} rounds)",
        query, target_pages, config.max_rounds
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_expansion_start(target_pages, config.max_rounds);
    }

    let mut accumulated = String::new();
    let mut pages = 0u32;
    let mut rounds = 0u32;
    let mut stop = StopReason::RoundBudgetExhausted;

    for round in 0..config.max_rounds {
        rounds = round + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_round_start(round, config.max_rounds);
        }

        let prompt = if round == 0 {
            initial_prompt(&PromptInput {
                query,
                context,
                target_pages: Some(target_pages),
                custom_instructions: config.custom_instructions.as_deref(),
                image_listing: Some(&listing),
            })
        } else {
            let missing = target_pages.saturating_sub(pages) as usize;
            let min_new = MAX_CHARS_PER_ROUND.min(missing.saturating_mul(config.chars_per_page));
            continuation_prompt(query, accumulated.trim(), target_pages, min_new)
        };
        debug!("Round {}: prompt of {} chars", round + 1, prompt.chars().count());

        let response = generate_bounded(generator, &prompt, budget, config).await;
        let new = response.trim();
        info!("Round {}: {} chars returned", round + 1, new.chars().count());

        if new.is_empty() {
            warn!("Round {}: empty response, stopping", round + 1);
            stop = StopReason::EmptyResponse;
            break;
        }
        if accumulated.contains(new) {
            warn!("Round {}: response repeats earlier content, stopping", round + 1);
            stop = StopReason::DuplicateResponse;
            break;
        }

        accumulated.push('\n');
        accumulated.push_str(new);
        pages = probe_pages(&accumulated, config.chars_per_page);

        info!(
            "Round {}: {} chars total, ~{} pages",
            round + 1,
            accumulated.trim().chars().count(),
            pages
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_round_complete(round, accumulated.trim().chars().count(), pages);
        }

        if f64::from(pages) >= threshold {
            info!("Target reached ({pages}/{target_pages} pages)");
            stop = StopReason::TargetReached;
            break;
        }
    }

    let text = accumulated.trim().to_string();
    info!(
        "Expansion finished after {} rounds: {} chars, ~{} pages, {} ({:?})",
        rounds,
        text.chars().count(),
        pages,
        stop,
        start.elapsed()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_expansion_complete(rounds, pages, stop);
    }

    ExpansionOutput {
        text,
        rounds,
        pages,
        stop,
    }
}

/// One generation call without expansion.
///
/// Uses the tiered output budget of [`max_tokens_for_target`]. Returns the
/// trimmed response; a timeout yields an empty string.
pub async fn generate_single(
    generator: &dyn TextGenerator,
    query: &str,
    context: &str,
    target_pages: Option<u32>,
    config: &ExpansionConfig,
) -> String {
    let context = truncate_context(context, config.max_context_chars);
    let prompt = initial_prompt(&PromptInput {
        query,
        context,
        target_pages,
        custom_instructions: config.custom_instructions.as_deref(),
        image_listing: None,
    });
    let budget = max_tokens_for_target(target_pages);
    info!("Generating '{}' in one call ({} tokens max)", query, budget);
    generate_bounded(generator, &prompt, budget, config)
        .await
        .trim()
        .to_string()
}

/// Generate without expansion and classify the single round.
///
/// The stop reason is `EmptyResponse` for an empty reply, `TargetReached`
/// when the text meets the completion threshold of `target_pages`, and
/// `RoundBudgetExhausted` otherwise.
pub async fn expand_single(
    generator: &dyn TextGenerator,
    query: &str,
    context: &str,
    target_pages: Option<u32>,
    config: &ExpansionConfig,
) -> ExpansionOutput {
    let text = generate_single(generator, query, context, target_pages, config).await;
    single_round(text, target_pages, config)
}

fn single_round(
    text: String,
    target_pages: Option<u32>,
    config: &ExpansionConfig,
) -> ExpansionOutput {
    let pages = if text.is_empty() {
        0
    } else {
        probe_pages(&text, config.chars_per_page)
    };
    let stop = match target_pages {
        _ if text.is_empty() => StopReason::EmptyResponse,
        Some(t) if f64::from(pages) >= config.completion_threshold(t) => StopReason::TargetReached,
        _ => StopReason::RoundBudgetExhausted,
    };
    ExpansionOutput {
        text,
        rounds: 1,
        pages,
        stop,
    }
}

/// One reference document for separate mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Heading the source's sections go under, usually its file name.
    pub name: String,
    pub content: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a UTF-8 text file; the file name becomes the source name.
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, content })
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Chunks that are only whitespace are dropped.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map_or(rest.len(), |(byte, _)| byte);
        let (chunk, tail) = rest.split_at(end);
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        rest = tail;
    }
    chunks
}

/// Generate up to [`SECTIONS_PER_SOURCE`] sections for one source, one per
/// chunk of its text. Empty responses are skipped.
pub async fn generate_sections(
    generator: &dyn TextGenerator,
    query: &str,
    source: &SourceText,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> Vec<String> {
    let listing = registry.prompt_listing();
    let chunks = split_chunks(&source.content, SOURCE_CHUNK_CHARS);
    let mut sections = Vec::new();

    for (i, chunk) in chunks.iter().take(SECTIONS_PER_SOURCE).enumerate() {
        let prompt = section_prompt(query, &source.name, chunk, i, Some(listing.as_str()));
        let response =
            generate_bounded(generator, &prompt, max_tokens_for_target(None), config).await;
        let section = response.trim();
        if section.is_empty() {
            warn!("{}: section {} came back empty", source.name, i + 1);
            continue;
        }
        sections.push(section.to_string());
    }
    debug!(
        "{}: {} sections from {} chunks",
        source.name,
        sections.len(),
        chunks.len()
    );
    sections
}

/// Separate mode: sections per source, stitched without merging.
///
/// Sources keep their order and each gets its own `##` heading, so the
/// material of different documents stays visibly apart.
pub async fn generate_separate(
    generator: &dyn TextGenerator,
    query: &str,
    sources: &[SourceText],
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> String {
    info!(
        "Generating '{}' from {} sources, separately",
        query,
        sources.len()
    );
    let mut per_source = Vec::with_capacity(sources.len());
    for source in sources {
        let sections = generate_sections(generator, query, source, registry, config).await;
        per_source.push((source.name.clone(), sections));
    }
    if per_source.iter().all(|(_, sections)| sections.is_empty()) {
        warn!("No source produced any section");
        return String::new();
    }
    combine_sections(query, &per_source, config.custom_instructions.as_deref())
}

/// Separate mode end to end.
///
/// With a target, the stitched sections become the reference material of a
/// regular expansion; without one they are the report, classified like
/// [`expand_single`].
pub async fn expand_separate(
    generator: &dyn TextGenerator,
    query: &str,
    sources: &[SourceText],
    target_pages: Option<u32>,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> ExpansionOutput {
    let combined = generate_separate(generator, query, sources, registry, config).await;
    match target_pages {
        Some(t) => expand_with_images(generator, query, &combined, t, registry, config).await,
        None => single_round(combined.trim().to_string(), None, config),
    }
}

/// Generate a short template field (two or three lines) from `material`.
///
/// `field` is a template field name such as `design_requirements`; its
/// underscores become spaces in the prompt. Returns the trimmed response,
/// empty on a stall.
pub async fn generate_field(
    generator: &dyn TextGenerator,
    field: &str,
    material: &str,
    config: &ExpansionConfig,
) -> String {
    let title = field.replace('_', " ");
    let material = truncate_context(material, config.max_context_chars);
    let prompt = field_prompt(&title, material);
    debug!("Generating field '{field}'");
    generate_bounded(generator, &prompt, FIELD_TOKENS, config)
        .await
        .trim()
        .to_string()
}

/// Call the generator under the configured round timeout.
async fn generate_bounded(
    generator: &dyn TextGenerator,
    prompt: &str,
    max_tokens: usize,
    config: &ExpansionConfig,
) -> String {
    let limit = Duration::from_secs(config.round_timeout_secs);
    match tokio::time::timeout(limit, generator.generate(prompt, max_tokens)).await {
        Ok(text) => text,
        Err(_) => {
            warn!("Generation timed out after {}s", config.round_timeout_secs);
            String::new()
        }
    }
}

/// Render `text` into a throwaway document and estimate its length.
pub(crate) fn probe_pages(text: &str, chars_per_page: usize) -> u32 {
    let registry = ImageRegistry::new();
    let mut probe = Document::new();
    let paragraphs = Renderer::new(&probe.styles, &registry).paragraphs(text);
    for p in paragraphs {
        probe.add_paragraph(p);
    }
    estimate_with(&probe, chars_per_page)
}
