//! Render markdown-subset text into document paragraphs.
//!
//! Parsing is done by [`crate::pipeline::markdown`]; this stage turns each
//! [`MdBlock`] into a [`Paragraph`], choosing named styles from the target
//! document's catalog where they exist and falling back to direct run
//! formatting where they don't. Styles are resolved once per render, not per
//! block.
//!
//! | Block     | Style candidates          | Fallback                          |
//! |-----------|---------------------------|-----------------------------------|
//! | Heading N | `Heading N`, `标题 N`      | bold, 16/14/12/11 pt              |
//! | List item | `Normal`, `正文`           | none; text gets a `• ` prefix     |
//! | Code      | `Code`                    | Courier New 10 pt, colour 404040  |
//! | Paragraph | `Normal`, `正文`           | none                              |
//! | Bold span | `bold`, `Bold`, `Strong`  | direct bold (also used when the   |
//! |           |                           | match is not a character style)   |

use crate::document::{
    resolve, Document, InlineImage, InsertionTarget, Paragraph, Rgb, Run, RunFormat,
    StyleCatalog, StyleKind,
};
use crate::pipeline::images::{missing_marker, ImageRegistry};
use crate::pipeline::markdown::{self, MdBlock, Segment, Span};
use tracing::{debug, warn};

/// Display width of embedded images when none is configured.
pub const DEFAULT_IMAGE_WIDTH_IN: f32 = 4.0;

const CODE_FONT: &str = "Courier New";
const CODE_SIZE_PT: f32 = 10.0;
const CODE_COLOR: Rgb = Rgb(64, 64, 64);
const HEADING_FALLBACK_PT: [f32; 4] = [16.0, 14.0, 12.0, 11.0];
const BULLET: &str = "• ";

const HEADING_CANDIDATES: [[&str; 2]; 4] = [
    ["Heading 1", "标题 1"],
    ["Heading 2", "标题 2"],
    ["Heading 3", "标题 3"],
    ["Heading 4", "标题 4"],
];
const NORMAL_CANDIDATES: [&str; 2] = ["Normal", "正文"];
const CODE_CANDIDATES: [&str; 1] = ["Code"];
const BOLD_CANDIDATES: [&str; 3] = ["bold", "Bold", "Strong"];

/// Style names picked from a catalog, `None` where direct formatting applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ResolvedStyles {
    headings: [Option<String>; 4],
    normal: Option<String>,
    code: Option<String>,
    /// Only set when the match is a character style.
    bold: Option<String>,
}

impl ResolvedStyles {
    fn from_catalog(catalog: &StyleCatalog) -> Self {
        let pick = |candidates: &[&str]| resolve(catalog, candidates).map(str::to_string);

        let bold = resolve(catalog, &BOLD_CANDIDATES)
            .filter(|name| {
                catalog
                    .get(name)
                    .is_some_and(|def| def.kind == StyleKind::Character)
            })
            .map(str::to_string);

        Self {
            headings: HEADING_CANDIDATES.map(|c| pick(&c[..])),
            normal: pick(&NORMAL_CANDIDATES[..]),
            code: pick(&CODE_CANDIDATES[..]),
            bold,
        }
    }
}

/// Turns markdown-subset text into paragraphs for one document's styles.
#[derive(Debug, Clone)]
pub struct Renderer<'a> {
    styles: ResolvedStyles,
    registry: &'a ImageRegistry,
    image_width_in: f32,
}

impl<'a> Renderer<'a> {
    pub fn new(catalog: &StyleCatalog, registry: &'a ImageRegistry) -> Self {
        Self {
            styles: ResolvedStyles::from_catalog(catalog),
            registry,
            image_width_in: DEFAULT_IMAGE_WIDTH_IN,
        }
    }

    pub fn image_width_in(mut self, inches: f32) -> Self {
        self.image_width_in = inches;
        self
    }

    /// Parse `text` and materialise every block, in input order.
    pub fn paragraphs(&self, text: &str) -> Vec<Paragraph> {
        markdown::parse(text)
            .iter()
            .map(|block| self.block(block))
            .collect()
    }

    /// Runs for one line of text with `**bold**` spans and no block syntax.
    pub fn bold_runs(&self, text: &str) -> Vec<Run> {
        markdown::bold_spans(text)
            .iter()
            .map(|span| self.span_run(span))
            .collect()
    }

    fn block(&self, block: &MdBlock) -> Paragraph {
        match block {
            MdBlock::Heading { level, text } => self.heading(*level, text),
            MdBlock::ListItem { text } => {
                Paragraph::with_text(format!("{BULLET}{text}")).styled(self.styles.normal.as_deref())
            }
            MdBlock::Code { text } => self.code(text),
            MdBlock::Paragraph { spans } => self.spans(spans),
            MdBlock::Inline { segments } => self.inline(segments),
        }
    }

    fn heading(&self, level: u8, text: &str) -> Paragraph {
        let idx = usize::from(level.clamp(1, 4)) - 1;
        match &self.styles.headings[idx] {
            Some(style) => Paragraph::with_text(text).styled(Some(style.as_str())),
            None => {
                let mut p = Paragraph::new();
                p.push(Run::text(text).with_format(RunFormat {
                    bold: true,
                    size_pt: Some(HEADING_FALLBACK_PT[idx]),
                    ..RunFormat::default()
                }));
                p
            }
        }
    }

    fn code(&self, text: &str) -> Paragraph {
        match &self.styles.code {
            Some(style) => Paragraph::with_text(text).styled(Some(style.as_str())),
            None => {
                let mut p = Paragraph::new();
                p.push(Run::text(text).with_format(RunFormat {
                    font: Some(CODE_FONT.to_string()),
                    size_pt: Some(CODE_SIZE_PT),
                    color: Some(CODE_COLOR),
                    ..RunFormat::default()
                }));
                p
            }
        }
    }

    fn spans(&self, spans: &[Span]) -> Paragraph {
        let mut p = Paragraph::new().styled(self.styles.normal.as_deref());
        for span in spans {
            p.push(self.span_run(span));
        }
        p
    }

    fn span_run(&self, span: &Span) -> Run {
        if !span.bold {
            return Run::text(&span.text);
        }
        let format = match &self.styles.bold {
            Some(style) => RunFormat {
                style: Some(style.clone()),
                ..RunFormat::default()
            },
            None => RunFormat {
                bold: true,
                ..RunFormat::default()
            },
        };
        Run::text(&span.text).with_format(format)
    }

    fn inline(&self, segments: &[Segment]) -> Paragraph {
        let mut p = Paragraph::new().styled(self.styles.normal.as_deref());
        for segment in segments {
            match segment {
                Segment::Text { text } => p.push_text(text),
                Segment::Image { token } => p.push(self.image_run(token)),
            }
        }
        p
    }

    fn image_run(&self, token: &str) -> Run {
        match self.registry.load(token) {
            Some(img) => Run::image(InlineImage {
                token: token.to_string(),
                source: img.path,
                data: img.data,
                pixel_width: img.width,
                pixel_height: img.height,
                width_in: self.image_width_in,
            }),
            None => Run::text(missing_marker(token)),
        }
    }
}

/// Render `text` into `target`, replacing the marker container.
///
/// Returns `false`, leaving the document untouched, when the target no
/// longer exists.
pub fn render(
    document: &mut Document,
    target: InsertionTarget,
    text: &str,
    registry: &ImageRegistry,
) -> bool {
    let paragraphs = Renderer::new(&document.styles, registry).paragraphs(text);
    render_paragraphs(document, target, paragraphs)
}

/// Place already-rendered paragraphs into `target`.
pub fn render_paragraphs(
    document: &mut Document,
    target: InsertionTarget,
    paragraphs: Vec<Paragraph>,
) -> bool {
    let count = paragraphs.len();
    if document.replace_target(target, paragraphs) {
        debug!("Rendered {count} paragraphs into {target:?}");
        true
    } else {
        warn!("Render target {target:?} no longer exists");
        false
    }
}

/// Render `text` and append the paragraphs at the end of the body.
pub fn render_append(document: &mut Document, text: &str, registry: &ImageRegistry) {
    let paragraphs = Renderer::new(&document.styles, registry).paragraphs(text);
    debug!("Appending {} paragraphs at document end", paragraphs.len());
    for p in paragraphs {
        document.add_paragraph(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{find, find_cell, RunContent, StyleDef, Table};
    use crate::pipeline::images::ImageEntry;
    use std::path::PathBuf;

    fn render_plain(catalog: &StyleCatalog, text: &str) -> Vec<Paragraph> {
        let registry = ImageRegistry::new();
        Renderer::new(catalog, &registry).paragraphs(text)
    }

    #[test]
    fn heading_uses_named_style() {
        let out = render_plain(&StyleCatalog::standard(), "## Title");
        assert_eq!(out[0].style.as_deref(), Some("Heading 2"));
        assert_eq!(out[0].text(), "Title");
    }

    #[test]
    fn heading_falls_back_to_locale_alternate() {
        let mut c = StyleCatalog::new();
        c.insert("标题 1", StyleDef::paragraph());
        let out = render_plain(&c, "# 总结");
        assert_eq!(out[0].style.as_deref(), Some("标题 1"));
    }

    #[test]
    fn heading_without_styles_is_direct_bold() {
        let out = render_plain(&StyleCatalog::new(), "### Three");
        assert_eq!(out[0].style, None);
        let run = &out[0].runs[0];
        assert!(run.format.bold);
        assert_eq!(run.format.size_pt, Some(12.0));
    }

    #[test]
    fn list_item_gets_bullet() {
        let out = render_plain(&StyleCatalog::standard(), "- first item");
        assert_eq!(out[0].text(), "• first item");
        assert_eq!(out[0].style.as_deref(), Some("Normal"));
    }

    #[test]
    fn code_fallback_formatting() {
        let out = render_plain(&StyleCatalog::standard(), "```\nlet x = 1;\n  y\n```");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text(), "let x = 1;\n  y");
        let f = &out[0].runs[0].format;
        assert_eq!(f.font.as_deref(), Some("Courier New"));
        assert_eq!(f.size_pt, Some(10.0));
        assert_eq!(f.color, Some(Rgb(64, 64, 64)));
    }

    #[test]
    fn code_style_when_present() {
        let mut c = StyleCatalog::standard();
        c.insert("Code", StyleDef::paragraph().font("Consolas"));
        let out = render_plain(&c, "```\nx\n```");
        assert_eq!(out[0].style.as_deref(), Some("Code"));
        assert_eq!(out[0].runs[0].format, RunFormat::default());
    }

    #[test]
    fn bold_uses_character_style_only() {
        let out = render_plain(&StyleCatalog::standard(), "a **b**");
        assert_eq!(out[0].runs[1].format.style.as_deref(), Some("Strong"));
        assert!(!out[0].runs[1].format.bold);

        let mut c = StyleCatalog::new();
        c.insert("Bold", StyleDef::paragraph().bold());
        let out = render_plain(&c, "a **b**");
        assert_eq!(out[0].runs[1].format.style, None);
        assert!(out[0].runs[1].format.bold);
    }

    #[test]
    fn missing_image_is_visible() {
        let out = render_plain(&StyleCatalog::new(), "{{image:img_9}}");
        assert_eq!(out[0].text(), "[image img_9 not found]");
    }

    #[test]
    fn image_paragraph_takes_body_style() {
        let out = render_plain(&StyleCatalog::standard(), "see {{image:img_3}}\nplain");
        assert_eq!(out[0].style.as_deref(), Some("Normal"));
        assert_eq!(out[0].style, out[1].style);

        let bare = render_plain(&StyleCatalog::new(), "{{image:img_3}}");
        assert_eq!(bare[0].style, None);
    }

    #[test]
    fn resolved_image_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fig.png");
        image::RgbImage::new(20, 10).save(&path).unwrap();
        let registry = ImageRegistry::from_entries(vec![ImageEntry {
            token: "img_1".into(),
            path: path.clone(),
            description: String::new(),
        }]);

        let out = Renderer::new(&StyleCatalog::new(), &registry)
            .paragraphs("Figure: {{image:img_1}} done");
        let runs = &out[0].runs;
        assert_eq!(runs.len(), 3);
        match &runs[1].content {
            RunContent::Image(img) => {
                assert_eq!(img.source, PathBuf::from(&path));
                assert_eq!(img.width_in, 4.0);
                assert!((img.height_in() - 2.0).abs() < 1e-6);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn render_into_cell_replaces_content() {
        let mut doc = Document::with_styles(StyleCatalog::standard());
        doc.add_table(Table::from_text([["Body", "{{report_body}}"]]));
        let cell = find_cell(&doc, "{{report_body}}").unwrap();

        assert!(render(
            &mut doc,
            cell.into(),
            "# Report\nline",
            &ImageRegistry::new()
        ));
        let texts: Vec<String> = doc
            .cell(cell)
            .unwrap()
            .paragraphs
            .iter()
            .map(Paragraph::text)
            .collect();
        assert_eq!(texts, vec!["Report", "line"]);
        assert!(find(&doc, "{{report_body}}").is_none());
    }

    #[test]
    fn append_at_end() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("cover"));
        render_append(&mut doc, "one\ntwo", &ImageRegistry::new());
        assert_eq!(doc.plain_text(), "cover\none\ntwo");
    }
}
