//! `.docx` export of a [`Document`] via `docx-rs`.
//!
//! The in-memory model maps onto WordprocessingML almost one to one:
//!
//! | Model                 | docx-rs                                        |
//! |-----------------------|------------------------------------------------|
//! | `StyleCatalog` entry  | `Style` (id = name without spaces)             |
//! | `Block::Paragraph`    | `Paragraph` with `.style(id)`                  |
//! | `Block::Table`        | `Table` of `TableRow` of `TableCell`           |
//! | text with `\n`        | text runs split by `TextWrapping` breaks       |
//! | `BreakKind::Page`     | `BreakType::Page`                              |
//! | `InlineImage`         | `Pic::new_with_dimensions(..).size(emu, emu)`  |
//! | first `Section`       | document header / footer                       |
//!
//! Only the first section's header and footer are written; docx-rs models a
//! single default header and footer per document.

use crate::document::{
    BreakKind, Document, InlineImage, Paragraph, Run, RunContent, RunFormat, StyleDef,
    StyleKind, Table,
};
use crate::error::ReportError;
use docx_rs::{BreakType, Docx, Footer, Header, Pic, RunFonts, Style, StyleType};
use std::io::{Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

const EMU_PER_INCH: f32 = 914_400.0;

/// Half-points, the unit WordprocessingML uses for font sizes.
fn half_points(pt: f32) -> usize {
    (pt * 2.0).round().max(1.0) as usize
}

fn emu(inches: f32) -> u32 {
    (inches * EMU_PER_INCH).round().max(0.0) as u32
}

/// Style id for a style name: Word ids carry no spaces.
pub fn style_id(name: &str) -> String {
    name.split_whitespace().collect()
}

/// Build the docx-rs tree for `document`.
pub fn to_docx(document: &Document) -> Docx {
    let mut docx = Docx::new();

    for (name, def) in document.styles.iter() {
        let s = style(name, def);
        // docx-rs seeds `Normal`; catalog entries replace built-ins by id.
        docx.styles.styles.retain(|existing| existing.style_id != s.style_id);
        docx = docx.add_style(s);
    }

    for block in &document.body {
        docx = match block {
            crate::document::Block::Paragraph(p) => docx.add_paragraph(paragraph(p)),
            crate::document::Block::Table(t) => docx.add_table(table(t)),
        };
    }

    if let Some(section) = document.sections.first() {
        if !section.header.is_empty() {
            let header = section
                .header
                .iter()
                .fold(Header::new(), |h, p| h.add_paragraph(paragraph(p)));
            docx = docx.header(header);
        }
        if !section.footer.is_empty() {
            let footer = section
                .footer
                .iter()
                .fold(Footer::new(), |f, p| f.add_paragraph(paragraph(p)));
            docx = docx.footer(footer);
        }
    }
    if document.sections.len() > 1 {
        debug!(
            "Document has {} sections; only the first header/footer is exported",
            document.sections.len()
        );
    }

    docx
}

/// Pack `document` into `writer`. `path` only labels errors.
pub fn pack<W: Write + Seek>(document: &Document, writer: W, path: &Path) -> Result<(), ReportError> {
    to_docx(document)
        .build()
        .pack(writer)
        .map_err(|e| ReportError::DocxExportFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Write `document` to `path` as `.docx`.
///
/// Writes in place; use [`crate::assemble::save_docx`] for an atomic write.
pub fn write_docx(document: &Document, path: &Path) -> Result<(), ReportError> {
    let file = std::fs::File::create(path).map_err(|e| ReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    pack(document, file, path)
}

fn style(name: &str, def: &StyleDef) -> Style {
    let kind = match def.kind {
        StyleKind::Paragraph => StyleType::Paragraph,
        StyleKind::Character => StyleType::Character,
    };
    let mut s = Style::new(style_id(name), kind).name(name);
    if let Some(pt) = def.size_pt {
        s = s.size(half_points(pt));
    }
    if def.bold {
        s = s.bold();
    }
    if let Some(color) = def.color {
        s = s.color(color.hex());
    }
    if let Some(ref font) = def.font {
        s = s.fonts(fonts(font));
    }
    s
}

fn fonts(font: &str) -> RunFonts {
    RunFonts::new().ascii(font).hi_ansi(font).east_asia(font)
}

fn paragraph(p: &Paragraph) -> docx_rs::Paragraph {
    let mut out = docx_rs::Paragraph::new();
    if let Some(ref name) = p.style {
        out = out.style(&style_id(name));
    }
    for run in &p.runs {
        out = out.add_run(self::run(run));
    }
    out
}

fn run(r: &Run) -> docx_rs::Run {
    let mut out = formatted(docx_rs::Run::new(), &r.format);
    match &r.content {
        RunContent::Text(text) => {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    out = out.add_break(BreakType::TextWrapping);
                }
                if !line.is_empty() {
                    out = out.add_text(line);
                }
            }
        }
        RunContent::Break(BreakKind::Line) => out = out.add_break(BreakType::TextWrapping),
        RunContent::Break(BreakKind::Page) => out = out.add_break(BreakType::Page),
        RunContent::Image(img) => out = image(out, img),
    }
    out
}

fn formatted(mut out: docx_rs::Run, f: &RunFormat) -> docx_rs::Run {
    if let Some(ref name) = f.style {
        out = out.style(&style_id(name));
    }
    if f.bold {
        out = out.bold();
    }
    if let Some(pt) = f.size_pt {
        out = out.size(half_points(pt));
    }
    if let Some(color) = f.color {
        out = out.color(color.hex());
    }
    if let Some(ref font) = f.font {
        out = out.fonts(fonts(font));
    }
    out
}

fn image(out: docx_rs::Run, img: &InlineImage) -> docx_rs::Run {
    let data = if img.data.is_empty() {
        match std::fs::read(&img.source) {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    "Image {}: cannot reread {}: {e}",
                    img.token,
                    img.source.display()
                );
                return out.add_text(format!("[image {} not found]", img.token));
            }
        }
    } else {
        img.data.clone()
    };
    let pic = Pic::new_with_dimensions(data, img.pixel_width, img.pixel_height)
        .size(emu(img.width_in), emu(img.height_in()));
    out.add_image(pic)
}

fn table(t: &Table) -> docx_rs::Table {
    let rows = t
        .rows
        .iter()
        .map(|row| {
            let cells = row
                .cells
                .iter()
                .map(|cell| {
                    if cell.paragraphs.is_empty() {
                        return docx_rs::TableCell::new().add_paragraph(docx_rs::Paragraph::new());
                    }
                    cell.paragraphs
                        .iter()
                        .fold(docx_rs::TableCell::new(), |c, p| c.add_paragraph(paragraph(p)))
                })
                .collect();
            docx_rs::TableRow::new(cells)
        })
        .collect();
    docx_rs::Table::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Section, StyleCatalog, Table};

    #[test]
    fn units() {
        assert_eq!(half_points(10.0), 20);
        assert_eq!(half_points(10.5), 21);
        assert_eq!(emu(4.0), 3_657_600);
    }

    #[test]
    fn style_ids_drop_spaces() {
        assert_eq!(style_id("Heading 1"), "Heading1");
        assert_eq!(style_id("标题 2"), "标题2");
        assert_eq!(style_id("Normal"), "Normal");
    }

    #[test]
    fn writes_a_zip_container() {
        let mut doc = Document::with_styles(StyleCatalog::standard());
        doc.add_paragraph(Paragraph::with_text("Title").styled(Some("Heading 1")));
        let mut code = Paragraph::new();
        code.push_text("fn main() {\n    run();\n}");
        code.push(Run::page_break());
        doc.add_paragraph(code);
        doc.add_table(Table::from_text([["a", "b"], ["c", "d"]]));
        doc.sections = vec![Section {
            header: vec![Paragraph::with_text("header")],
            footer: vec![Paragraph::with_text("footer")],
        }];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        write_docx(&doc, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn style_ids_are_unique_in_styles_xml() {
        let mut doc = Document::with_styles(StyleCatalog::standard());
        doc.add_paragraph(Paragraph::with_text("body").styled(Some("Normal")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.docx");
        write_docx(&doc, &path).unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("word/styles.xml").unwrap(), &mut xml)
            .unwrap();

        let ids: Vec<&str> = xml
            .split("w:styleId=\"")
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect();
        assert!(ids.contains(&"Normal"));
        assert!(ids.contains(&"Heading1"));
        for id in &ids {
            assert_eq!(ids.iter().filter(|i| *i == id).count(), 1, "duplicate style id {id}");
        }
    }

    #[test]
    fn catalog_normal_replaces_the_builtin() {
        let mut styles = StyleCatalog::new();
        styles.insert("Normal", StyleDef::paragraph().font("SimSun").size_pt(12.0));
        let docx = to_docx(&Document::with_styles(styles));

        let normals: Vec<_> = docx
            .styles
            .styles
            .iter()
            .filter(|s| s.style_id == "Normal")
            .collect();
        assert_eq!(normals.len(), 1);
        assert!(normals[0].run_property.sz.is_some());
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.docx");
        let err = write_docx(&Document::new(), &path).unwrap_err();
        assert!(matches!(err, ReportError::OutputWriteFailed { .. }));
    }
}
