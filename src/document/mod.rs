//! In-memory word-processing document model.
//!
//! The model is deliberately small: it carries exactly what the renderer
//! writes and what the locator and page estimator read. A [`Document`] owns
//! an ordered body of paragraphs and tables, a [`StyleCatalog`], and one
//! [`Section`] per page-setup region with its header and footer paragraphs.
//!
//! Everything derives `serde` so a template can be stored and loaded as
//! JSON by whatever manages templates upstream.
//!
//! ```text
//! Document
//!  ├─ body: [Block]          Paragraph | Table
//!  │                         Table ─▶ rows ─▶ cells ─▶ [Paragraph]
//!  ├─ styles: StyleCatalog   name ─▶ StyleDef
//!  └─ sections: [Section]    header [Paragraph], footer [Paragraph]
//! ```

pub mod locate;
pub mod style;

pub use locate::{find, find_cell, CellTarget, InsertionTarget};
pub use style::{resolve, Rgb, StyleCatalog, StyleDef, StyleKind};

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A word-processing document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Body content in document order.
    #[serde(default)]
    pub body: Vec<Block>,

    /// Named styles available to paragraphs and runs.
    #[serde(default)]
    pub styles: StyleCatalog,

    /// Page-setup sections. A fresh document has exactly one.
    #[serde(default = "default_sections")]
    pub sections: Vec<Section>,
}

fn default_sections() -> Vec<Section> {
    vec![Section::default()]
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a single empty section and no styles.
    pub fn new() -> Self {
        Self {
            body: Vec::new(),
            styles: StyleCatalog::default(),
            sections: default_sections(),
        }
    }

    /// Create an empty document using the given style catalog.
    pub fn with_styles(styles: StyleCatalog) -> Self {
        Self {
            styles,
            ..Self::new()
        }
    }

    /// Append a paragraph at the end of the body.
    pub fn add_paragraph(&mut self, paragraph: Paragraph) {
        self.body.push(Block::Paragraph(paragraph));
    }

    /// Append a table at the end of the body.
    pub fn add_table(&mut self, table: Table) {
        self.body.push(Block::Table(table));
    }

    /// Top-level paragraphs, in document order, with their body index.
    pub fn paragraphs(&self) -> impl Iterator<Item = (usize, &Paragraph)> {
        self.body.iter().enumerate().filter_map(|(i, b)| match b {
            Block::Paragraph(p) => Some((i, p)),
            Block::Table(_) => None,
        })
    }

    /// Tables, in document order, with their body index.
    pub fn tables(&self) -> impl Iterator<Item = (usize, &Table)> {
        self.body.iter().enumerate().filter_map(|(i, b)| match b {
            Block::Table(t) => Some((i, t)),
            Block::Paragraph(_) => None,
        })
    }

    /// Every body paragraph, including the ones nested in table cells.
    pub fn all_body_paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        for block in &self.body {
            match block {
                Block::Paragraph(p) => out.push(p),
                Block::Table(t) => out.extend(t.cells().flat_map(|c| c.paragraphs.iter())),
            }
        }
        out
    }

    /// Plain text of the body: paragraphs joined by newlines, table cells
    /// included in row order.
    pub fn plain_text(&self) -> String {
        self.all_body_paragraphs()
            .into_iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Load a template stored as JSON.
    pub fn from_json_file(path: &Path) -> Result<Self, ReportError> {
        let json = std::fs::read_to_string(path).map_err(|e| ReportError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ReportError::InvalidTemplate {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}

/// A block-level body element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// A page-setup region with its own header and footer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub header: Vec<Paragraph>,
    #[serde(default)]
    pub footer: Vec<Paragraph>,
}

/// A table: rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

impl Table {
    pub fn new(rows: Vec<TableRow>) -> Self {
        Self { rows }
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = &TableCell> {
        self.rows.iter().flat_map(|r| r.cells.iter())
    }

    /// Build a table from plain cell strings, one paragraph per cell.
    pub fn from_text<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|cells| TableRow {
                    cells: cells
                        .into_iter()
                        .map(TableCell::with_text)
                        .collect(),
                })
                .collect(),
        }
    }
}

/// A table row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

/// A table cell; a small document of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

impl TableCell {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            paragraphs: vec![Paragraph::with_text(text)],
        }
    }

    /// Cell text with paragraphs joined by newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A paragraph: an optional paragraph style and a sequence of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A paragraph holding a single unformatted text run.
    pub fn with_text(text: impl Into<String>) -> Self {
        let mut p = Self::new();
        p.push_text(text);
        p
    }

    pub fn styled(mut self, style: Option<&str>) -> Self {
        self.style = style.map(str::to_string);
        self
    }

    pub fn push(&mut self, run: Run) {
        self.runs.push(run);
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.runs.push(Run::text(text));
    }

    /// Concatenated run text. Breaks contribute `\n`; images contribute
    /// nothing.
    pub fn text(&self) -> String {
        self.runs.iter().map(Run::text_content).collect()
    }

    /// Number of runs that carry a hard break: explicit break runs and
    /// text runs with embedded newlines (written out as line breaks).
    pub fn break_count(&self) -> usize {
        self.runs.iter().filter(|r| r.has_break()).count()
    }

    /// Drop every run, keeping the paragraph style.
    pub fn clear(&mut self) {
        self.runs.clear();
    }
}

/// A run of uniformly formatted inline content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub content: RunContent,
    #[serde(default)]
    pub format: RunFormat,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: RunContent::Text(text.into()),
            format: RunFormat::default(),
        }
    }

    pub fn line_break() -> Self {
        Self {
            content: RunContent::Break(BreakKind::Line),
            format: RunFormat::default(),
        }
    }

    pub fn page_break() -> Self {
        Self {
            content: RunContent::Break(BreakKind::Page),
            format: RunFormat::default(),
        }
    }

    pub fn image(image: InlineImage) -> Self {
        Self {
            content: RunContent::Image(image),
            format: RunFormat::default(),
        }
    }

    pub fn with_format(mut self, format: RunFormat) -> Self {
        self.format = format;
        self
    }

    /// The text this run contributes to its paragraph.
    pub fn text_content(&self) -> &str {
        match &self.content {
            RunContent::Text(t) => t,
            RunContent::Break(_) => "\n",
            RunContent::Image(_) => "",
        }
    }

    /// Whether this run carries at least one hard break.
    pub fn has_break(&self) -> bool {
        match &self.content {
            RunContent::Break(_) => true,
            RunContent::Text(t) => t.contains('\n'),
            RunContent::Image(_) => false,
        }
    }

    pub fn is_bold(&self) -> bool {
        self.format.bold
    }
}

/// What a run carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RunContent {
    Text(String),
    Break(BreakKind),
    Image(InlineImage),
}

/// Explicit hard break inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    Line,
    Page,
}

/// Direct formatting on a run. Unset fields inherit from the styles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFormat {
    #[serde(default)]
    pub bold: bool,
    /// Character style name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_pt: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

/// An image embedded in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineImage {
    /// Registry token the image was resolved from, e.g. `img_3`.
    pub token: String,
    /// Where the bytes were read from.
    pub source: PathBuf,
    /// Encoded image bytes (PNG/JPEG) as read from `source`.
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Pixel dimensions of the decoded image.
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Display width in inches; height follows the aspect ratio.
    pub width_in: f32,
}

impl InlineImage {
    /// Display height in inches, preserving the pixel aspect ratio.
    pub fn height_in(&self) -> f32 {
        if self.pixel_width == 0 {
            return self.width_in;
        }
        self.width_in * self.pixel_height as f32 / self.pixel_width as f32
    }
}
