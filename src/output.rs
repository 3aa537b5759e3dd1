//! Result types returned by expansion and assembly.

use crate::document::InsertionTarget;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the expansion loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The generator returned nothing usable (empty, whitespace, or timed out).
    EmptyResponse,
    /// The response was already contained in the accumulated text.
    DuplicateResponse,
    /// The estimated page count reached the completion threshold.
    TargetReached,
    /// `max_rounds` rounds ran without meeting any other condition.
    RoundBudgetExhausted,
}

impl StopReason {
    /// Whether the loop ended because the generator stopped producing
    /// new material.
    pub fn is_stall(self) -> bool {
        matches!(self, StopReason::EmptyResponse | StopReason::DuplicateResponse)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::EmptyResponse => "empty response",
            StopReason::DuplicateResponse => "duplicate response",
            StopReason::TargetReached => "target reached",
            StopReason::RoundBudgetExhausted => "round budget exhausted",
        };
        f.write_str(s)
    }
}

/// Outcome of one expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionOutput {
    /// Accumulated generated text, trimmed.
    pub text: String,
    /// Generation rounds that were attempted.
    pub rounds: u32,
    /// Estimated page count of `text`.
    pub pages: u32,
    pub stop: StopReason,
}

impl ExpansionOutput {
    /// Length of `text` in characters.
    pub fn chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Where the report body ended up in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Rendered into a located marker.
    Target(InsertionTarget),
    /// No marker found; appended at the end of the body.
    Appended,
}

/// Outcome of [`crate::assemble::generate_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutput {
    pub expansion: ExpansionOutput,
    pub placement: Placement,
    /// Page estimate of the assembled document, template included.
    pub document_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reason_display_and_stall() {
        assert_eq!(StopReason::TargetReached.to_string(), "target reached");
        assert!(StopReason::EmptyResponse.is_stall());
        assert!(StopReason::DuplicateResponse.is_stall());
        assert!(!StopReason::RoundBudgetExhausted.is_stall());
    }

    #[test]
    fn stop_reason_serialises_snake_case() {
        let json = serde_json::to_string(&StopReason::RoundBudgetExhausted).unwrap();
        assert_eq!(json, "\"round_budget_exhausted\"");
    }

    #[test]
    fn chars_counts_unicode_scalars() {
        let out = ExpansionOutput {
            text: "报告ab".into(),
            rounds: 1,
            pages: 1,
            stop: StopReason::TargetReached,
        };
        assert_eq!(out.chars(), 4);
    }
}
