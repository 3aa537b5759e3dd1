//! # edgequake-report
//!
//! Assemble long-form reports from LLM output into formatted Word documents.
//!
//! ## Why this crate?
//!
//! A single LLM call rarely produces a ten-page report: output budgets cap
//! it and models wrap up early. This crate keeps asking for more, rendering
//! the accumulated markdown into a probe document after every round and
//! estimating its page count, until the page target is met, the round budget
//! is spent, or the model stalls. The final text is then rendered into a
//! template at a marker, with headings, lists, code, bold spans and images
//! mapped onto the template's own styles.
//!
//! ## Pipeline Overview
//!
//! ```text
//! query + context
//!  │
//!  ├─ 1. Expand    round 0 prompt, then continuation prompts (LLM)
//!  ├─ 2. Probe     render accumulated text, estimate pages, stop or loop
//!  ├─ 3. Locate    find the marker: cell, paragraph, header, footer
//!  ├─ 4. Render    markdown subset → styled paragraphs (+ embedded images)
//!  └─ 5. Export    atomic .docx write
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_report::{
//!     generate_report, save_docx, Document, ExpansionConfig, ImageRegistry, LlmGenerator,
//!     Paragraph, StyleCatalog,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExpansionConfig::default();
//!     let generator = LlmGenerator::from_config(&config)?;
//!
//!     let mut template = Document::with_styles(StyleCatalog::standard());
//!     template.add_paragraph(Paragraph::with_text("{{report_body}}"));
//!
//!     let out = generate_report(
//!         &generator,
//!         &mut template,
//!         "Campus network lab",
//!         "ping and traceroute results ...",
//!         5,
//!         &ImageRegistry::new(),
//!         &config,
//!     )
//!     .await;
//!     eprintln!("{} rounds, ~{} pages ({})",
//!         out.expansion.rounds, out.document_pages, out.expansion.stop);
//!
//!     save_docx(&template, "report.docx".as_ref())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `reportgen` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod config;
pub mod document;
pub mod error;
pub mod expand;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{
    assemble_report, fill_field, fill_generated_fields, generate_report,
    generate_separate_report, generate_single_report, place_report, save_docx,
};
pub use config::{ExpansionConfig, ExpansionConfigBuilder, DEFAULT_MARKER};
pub use document::{
    find, find_cell, Block, CellTarget, Document, InsertionTarget, Paragraph, Run, Section,
    StyleCatalog, StyleDef, Table,
};
pub use error::ReportError;
pub use expand::{
    expand, expand_separate, expand_single, expand_with_images, generate_field,
    generate_separate, generate_single, SourceText,
};
pub use output::{ExpansionOutput, Placement, ReportOutput, StopReason};
pub use pipeline::estimate::estimate;
pub use pipeline::export::write_docx;
pub use pipeline::generate::{LlmGenerator, TextGenerator};
pub use pipeline::images::{HtmlImageSource, ImageEntry, ImageRegistry};
pub use progress::{ExpansionProgressCallback, NoopProgressCallback, ProgressCallback};
