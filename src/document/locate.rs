//! Placeholder location.
//!
//! Templates mark the spot for generated content with a literal marker such
//! as `{{report_body}}`. The marker can sit in a body paragraph, inside a
//! table cell (the common "form" layout), or in a header or footer, and a
//! template may contain more than one. The search order below is therefore
//! part of the contract: the first hit wins.
//!
//! 1. top-level body paragraphs, in order
//! 2. table cells, table → row → cell, scanning each cell's paragraphs
//! 3. header paragraphs, section by section
//! 4. footer paragraphs, section by section
//!
//! Targets are index paths rather than references so the caller can hold one
//! while mutating the document.

use super::{Block, Document, Paragraph, TableCell};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Where a located marker lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum InsertionTarget {
    /// A top-level paragraph; `block` indexes [`Document::body`].
    Body { block: usize },
    /// A paragraph inside a table cell.
    CellParagraph {
        cell: CellTarget,
        paragraph: usize,
    },
    /// A header paragraph of a section.
    Header { section: usize, paragraph: usize },
    /// A footer paragraph of a section.
    Footer { section: usize, paragraph: usize },
    /// A whole table cell, as returned by [`find_cell`].
    Cell(CellTarget),
}

/// A table cell addressed by body index, row and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellTarget {
    pub block: usize,
    pub row: usize,
    pub cell: usize,
}

impl From<CellTarget> for InsertionTarget {
    fn from(cell: CellTarget) -> Self {
        InsertionTarget::Cell(cell)
    }
}

/// Find the first paragraph holding `marker`.
pub fn find(document: &Document, marker: &str) -> Option<InsertionTarget> {
    if marker.is_empty() {
        return None;
    }

    for (block, p) in document.paragraphs() {
        if holds(p, marker) {
            debug!("Marker {marker} found in body paragraph {block}");
            return Some(InsertionTarget::Body { block });
        }
    }

    for (cell, c) in cells(document) {
        if let Some(paragraph) = c.paragraphs.iter().position(|p| holds(p, marker)) {
            debug!("Marker {marker} found in table cell {cell:?}");
            return Some(InsertionTarget::CellParagraph { cell, paragraph });
        }
    }

    for (section, s) in document.sections.iter().enumerate() {
        if let Some(paragraph) = s.header.iter().position(|p| holds(p, marker)) {
            debug!("Marker {marker} found in header of section {section}");
            return Some(InsertionTarget::Header { section, paragraph });
        }
    }

    for (section, s) in document.sections.iter().enumerate() {
        if let Some(paragraph) = s.footer.iter().position(|p| holds(p, marker)) {
            debug!("Marker {marker} found in footer of section {section}");
            return Some(InsertionTarget::Footer { section, paragraph });
        }
    }

    warn!("Marker {marker} not found in document");
    None
}

/// Find the first table cell holding `marker` and return the cell itself.
pub fn find_cell(document: &Document, marker: &str) -> Option<CellTarget> {
    if marker.is_empty() {
        return None;
    }
    let found = cells(document)
        .find(|(_, c)| c.text().contains(marker))
        .map(|(target, _)| target);
    match found {
        Some(t) => debug!("Marker {marker} found in cell {t:?}"),
        None => debug!("Marker {marker} not in any table cell"),
    }
    found
}

fn holds(paragraph: &Paragraph, marker: &str) -> bool {
    paragraph.text().contains(marker)
}

fn cells(document: &Document) -> impl Iterator<Item = (CellTarget, &TableCell)> {
    document
        .body
        .iter()
        .enumerate()
        .filter_map(|(block, b)| match b {
            Block::Table(t) => Some((block, t)),
            Block::Paragraph(_) => None,
        })
        .flat_map(|(block, t)| {
            t.rows.iter().enumerate().flat_map(move |(row, r)| {
                r.cells
                    .iter()
                    .enumerate()
                    .map(move |(cell, c)| (CellTarget { block, row, cell }, c))
            })
        })
}

impl Document {
    /// Borrow the paragraph a target points at. `None` for whole-cell
    /// targets and stale indices.
    pub fn paragraph(&self, target: InsertionTarget) -> Option<&Paragraph> {
        match target {
            InsertionTarget::Body { block } => match self.body.get(block)? {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            },
            InsertionTarget::CellParagraph { cell, paragraph } => {
                self.cell(cell)?.paragraphs.get(paragraph)
            }
            InsertionTarget::Header { section, paragraph } => {
                self.sections.get(section)?.header.get(paragraph)
            }
            InsertionTarget::Footer { section, paragraph } => {
                self.sections.get(section)?.footer.get(paragraph)
            }
            InsertionTarget::Cell(_) => None,
        }
    }

    pub fn paragraph_mut(&mut self, target: InsertionTarget) -> Option<&mut Paragraph> {
        match target {
            InsertionTarget::Body { block } => match self.body.get_mut(block)? {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            },
            InsertionTarget::CellParagraph { cell, paragraph } => {
                self.cell_mut(cell)?.paragraphs.get_mut(paragraph)
            }
            InsertionTarget::Header { section, paragraph } => {
                self.sections.get_mut(section)?.header.get_mut(paragraph)
            }
            InsertionTarget::Footer { section, paragraph } => {
                self.sections.get_mut(section)?.footer.get_mut(paragraph)
            }
            InsertionTarget::Cell(_) => None,
        }
    }

    pub fn cell(&self, target: CellTarget) -> Option<&TableCell> {
        match self.body.get(target.block)? {
            Block::Table(t) => t.rows.get(target.row)?.cells.get(target.cell),
            Block::Paragraph(_) => None,
        }
    }

    pub fn cell_mut(&mut self, target: CellTarget) -> Option<&mut TableCell> {
        match self.body.get_mut(target.block)? {
            Block::Table(t) => t.rows.get_mut(target.row)?.cells.get_mut(target.cell),
            Block::Paragraph(_) => None,
        }
    }

    /// Replace the target with `paragraphs`.
    ///
    /// A paragraph target is removed and `paragraphs` are spliced in at its
    /// position, in whatever container held it. A cell target loses all of
    /// its paragraphs and receives `paragraphs` as its new content. Returns
    /// `false` when the target no longer exists; the document is then left
    /// untouched.
    pub fn replace_target(&mut self, target: InsertionTarget, paragraphs: Vec<Paragraph>) -> bool {
        match target {
            InsertionTarget::Body { block } => {
                if !matches!(self.body.get(block), Some(Block::Paragraph(_))) {
                    return false;
                }
                self.body
                    .splice(block..=block, paragraphs.into_iter().map(Block::Paragraph));
                true
            }
            InsertionTarget::CellParagraph { cell, paragraph } => {
                match self.cell_mut(cell) {
                    Some(c) => splice_at(&mut c.paragraphs, paragraph, paragraphs),
                    None => false,
                }
            }
            InsertionTarget::Header { section, paragraph } => {
                match self.sections.get_mut(section) {
                    Some(s) => splice_at(&mut s.header, paragraph, paragraphs),
                    None => false,
                }
            }
            InsertionTarget::Footer { section, paragraph } => {
                match self.sections.get_mut(section) {
                    Some(s) => splice_at(&mut s.footer, paragraph, paragraphs),
                    None => false,
                }
            }
            InsertionTarget::Cell(cell) => match self.cell_mut(cell) {
                Some(c) => {
                    c.paragraphs = paragraphs;
                    true
                }
                None => false,
            },
        }
    }
}

fn splice_at(list: &mut Vec<Paragraph>, index: usize, with: Vec<Paragraph>) -> bool {
    if index >= list.len() {
        return false;
    }
    list.splice(index..=index, with);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Section, Table};

    const MARKER: &str = "{{report_body}}";

    fn template() -> Document {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("Title"));
        doc.add_table(Table::from_text([
            ["Name", "Alice"],
            ["Body", "see {{report_body}} here"],
        ]));
        doc
    }

    #[test]
    fn body_paragraph_wins_over_cell() {
        let mut doc = template();
        doc.add_paragraph(Paragraph::with_text(MARKER));
        assert_eq!(find(&doc, MARKER), Some(InsertionTarget::Body { block: 2 }));
    }

    #[test]
    fn cell_paragraph_found_in_row_order() {
        let doc = template();
        let expected = InsertionTarget::CellParagraph {
            cell: CellTarget {
                block: 1,
                row: 1,
                cell: 1,
            },
            paragraph: 0,
        };
        assert_eq!(find(&doc, MARKER), Some(expected));
    }

    #[test]
    fn header_before_footer() {
        let mut doc = Document::new();
        doc.sections = vec![
            Section {
                header: vec![],
                footer: vec![Paragraph::with_text(MARKER)],
            },
            Section {
                header: vec![Paragraph::with_text("x"), Paragraph::with_text(MARKER)],
                footer: vec![],
            },
        ];
        assert_eq!(
            find(&doc, MARKER),
            Some(InsertionTarget::Header {
                section: 1,
                paragraph: 1
            })
        );
    }

    #[test]
    fn find_is_stable_without_mutation() {
        let doc = template();
        assert_eq!(find(&doc, MARKER), find(&doc, MARKER));
        assert_eq!(find_cell(&doc, MARKER), find_cell(&doc, MARKER));
    }

    #[test]
    fn missing_marker_is_none() {
        let doc = template();
        assert_eq!(find(&doc, "{{nope}}"), None);
        assert_eq!(find_cell(&doc, "{{nope}}"), None);
        assert_eq!(find(&doc, ""), None);
    }

    #[test]
    fn find_cell_ignores_body_paragraphs() {
        let mut doc = template();
        doc.body.insert(0, Block::Paragraph(Paragraph::with_text(MARKER)));
        assert_eq!(
            find_cell(&doc, MARKER),
            Some(CellTarget {
                block: 2,
                row: 1,
                cell: 1
            })
        );
    }

    #[test]
    fn replace_body_target_splices_in_place() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("before"));
        doc.add_paragraph(Paragraph::with_text(MARKER));
        doc.add_paragraph(Paragraph::with_text("after"));
        let target = find(&doc, MARKER).unwrap();
        assert!(doc.replace_target(
            target,
            vec![Paragraph::with_text("one"), Paragraph::with_text("two")]
        ));
        let texts: Vec<String> = doc.paragraphs().map(|(_, p)| p.text()).collect();
        assert_eq!(texts, vec!["before", "one", "two", "after"]);
    }

    #[test]
    fn replace_cell_target_clears_cell() {
        let mut doc = template();
        let cell = find_cell(&doc, MARKER).unwrap();
        doc.cell_mut(cell)
            .unwrap()
            .paragraphs
            .push(Paragraph::with_text("second paragraph"));
        assert!(doc.replace_target(cell.into(), vec![Paragraph::with_text("new")]));
        assert_eq!(doc.cell(cell).unwrap().text(), "new");
        assert_eq!(find(&doc, MARKER), None);
    }

    #[test]
    fn stale_target_is_rejected() {
        let mut doc = Document::new();
        assert!(!doc.replace_target(InsertionTarget::Body { block: 3 }, vec![]));
    }
}
