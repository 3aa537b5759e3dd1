//! Error types for the edgequake-report library.
//!
//! Only the edges of the crate can fail: reading templates and image
//! manifests, writing `.docx` files, building a configuration, and wiring up
//! an LLM provider. Everything in between (parsing, locating, rendering,
//! estimating, the expansion loop) returns plain values and degrades
//! gracefully instead: a missing style falls back to direct formatting, a
//! missing image becomes a visible marker, a stalled generator ends the loop
//! with whatever text was accumulated.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-report library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Could not read an input file (template, context, manifest).
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template document could not be decoded.
    #[error("Invalid template '{path}': {detail}")]
    InvalidTemplate { path: PathBuf, detail: String },

    /// An image manifest could not be decoded.
    #[error("Invalid image manifest: {0}")]
    InvalidManifest(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// docx packing failed.
    #[error("Failed to build .docx '{path}': {detail}")]
    DocxExportFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
