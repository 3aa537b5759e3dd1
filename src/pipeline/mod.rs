//! Pipeline stages for report generation and assembly.
//!
//! Each submodule implements exactly one step. Only [`generate`] does
//! network I/O and only [`export`] touches the filesystem; everything else
//! is synchronous and works on in-memory values.
//!
//! ## Data Flow
//!
//! ```text
//! generate ──▶ markdown ──▶ render ──▶ estimate
//!   (LLM)      (parse)     (+images)   (pages)
//!                              │
//!                              └──▶ export (.docx)
//! ```
//!
//! 1. [`generate`] — the `TextGenerator` seam; LLM calls with retry/backoff
//! 2. [`markdown`] — line and bold-span state machines over the markdown subset
//! 3. [`render`]   — blocks to styled paragraphs, spliced into a target
//! 4. [`images`]   — token registry; bytes and dimensions for embedding
//! 5. [`estimate`] — heuristic page count that drives the expansion loop
//! 6. [`export`]   — `.docx` packing via docx-rs

pub mod estimate;
pub mod export;
pub mod generate;
pub mod images;
pub mod markdown;
pub mod render;
