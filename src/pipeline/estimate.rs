//! Heuristic page-count estimate.
//!
//! Real pagination depends on fonts, margins and the viewer, none of which
//! this crate controls. The estimate only has to be stable and monotone so
//! the expansion loop can decide whether to ask for more text:
//!
//! ```text
//! by_chars  = max(1, body_chars / chars_per_page)
//! by_breaks = runs_with_hard_breaks + 1
//! pages     = max(by_chars, by_breaks)
//! ```

use crate::document::Document;

/// Characters per estimated page when none is configured.
pub const DEFAULT_CHARS_PER_PAGE: usize = 600;

/// Estimate the page count of `document` at [`DEFAULT_CHARS_PER_PAGE`].
pub fn estimate(document: &Document) -> u32 {
    estimate_with(document, DEFAULT_CHARS_PER_PAGE)
}

/// Estimate the page count of `document` at `chars_per_page`.
///
/// Counts body paragraphs, table cells included. Headers and footers repeat
/// on every page and do not add length.
pub fn estimate_with(document: &Document, chars_per_page: usize) -> u32 {
    let paragraphs = document.all_body_paragraphs();
    let chars: usize = paragraphs.iter().map(|p| p.text().chars().count()).sum();
    let breaks: usize = paragraphs.iter().map(|p| p.break_count()).sum();

    let by_chars = (chars / chars_per_page.max(1)).max(1);
    let by_breaks = breaks + 1;
    u32::try_from(by_chars.max(by_breaks)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Paragraph, Run, Table};

    fn doc_with_chars(n: usize) -> Document {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("x".repeat(n)));
        doc
    }

    #[test]
    fn empty_document_is_one_page() {
        assert_eq!(estimate(&Document::new()), 1);
    }

    #[test]
    fn chars_drive_the_estimate() {
        assert_eq!(estimate(&doc_with_chars(599)), 1);
        assert_eq!(estimate(&doc_with_chars(1800)), 3);
        assert_eq!(estimate(&doc_with_chars(1799)), 2);
        assert_eq!(estimate_with(&doc_with_chars(1000), 100), 10);
    }

    #[test]
    fn breaks_drive_the_estimate() {
        let mut p = Paragraph::with_text("short");
        for _ in 0..4 {
            p.push(Run::page_break());
        }
        let mut doc = Document::new();
        doc.add_paragraph(p);
        assert_eq!(estimate(&doc), 5);
    }

    #[test]
    fn table_cells_count() {
        let mut doc = Document::new();
        doc.add_table(Table::from_text([["y".repeat(700), "z".repeat(700)]]));
        assert_eq!(estimate(&doc), 2);
    }

    #[test]
    fn multibyte_chars_count_once() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("报".repeat(1200)));
        assert_eq!(estimate(&doc), 2);
    }

    #[test]
    fn monotone_in_chars() {
        let mut last = 0;
        for n in (0..5000).step_by(137) {
            let pages = estimate(&doc_with_chars(n));
            assert!(pages >= last, "{n} chars gave {pages} < {last}");
            last = pages;
        }
    }
}
