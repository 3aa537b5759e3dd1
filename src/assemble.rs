//! Document assembly: place generated text into a template and save it.
//!
//! ## Placement order
//!
//! 1. A table cell holding the marker: the whole cell is cleared and becomes
//!    the report body (templates often frame the body in a one-cell table).
//! 2. Any other paragraph holding the marker (body, cell paragraph, header,
//!    footer), replaced in place.
//! 3. No marker: the rendered paragraphs are appended to the body.
//!
//! Template fields (`{{name}}`) are filled with [`fill_field`], or generated
//! with [`fill_generated_fields`]. Fill them before placing the body so a
//! marker inside generated text is never mistaken for the template's.
//!
//! Nothing here fails for content reasons; only [`save_docx`] touches the
//! filesystem and returns an error.

use crate::config::ExpansionConfig;
use crate::document::{find, find_cell, Document, InsertionTarget};
use crate::error::ReportError;
use crate::expand::{expand_separate, expand_single, expand_with_images, generate_field, SourceText};
use crate::output::{ExpansionOutput, Placement, ReportOutput};
use crate::pipeline::estimate::estimate_with;
use crate::pipeline::export;
use crate::pipeline::generate::TextGenerator;
use crate::pipeline::images::ImageRegistry;
use crate::pipeline::render::{render_paragraphs, Renderer};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Render `text` into `document` at the configured marker.
pub fn assemble_report(
    document: &mut Document,
    text: &str,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> Placement {
    let paragraphs = Renderer::new(&document.styles, registry)
        .image_width_in(config.image_width_in)
        .paragraphs(text);

    let target = find_cell(document, &config.marker)
        .map(InsertionTarget::from)
        .or_else(|| find(document, &config.marker));

    match target {
        Some(t) if render_paragraphs(document, t, paragraphs.clone()) => {
            info!("Report body placed at {t:?}");
            Placement::Target(t)
        }
        _ => {
            warn!(
                "Marker '{}' not found; appending {} paragraphs",
                config.marker,
                paragraphs.len()
            );
            for p in paragraphs {
                document.add_paragraph(p);
            }
            Placement::Appended
        }
    }
}

/// Fill the `{{field}}` marker with `content`.
///
/// The paragraph keeps the text around the marker; `content` goes between,
/// with `**bold**` spans honoured. When the catalog has a style named
/// `field`, the paragraph takes it. Returns `false` when no paragraph holds
/// the marker.
pub fn fill_field(document: &mut Document, field: &str, content: &str) -> bool {
    let marker = format!("{{{{{field}}}}}");
    let Some(target) = find(document, &marker) else {
        debug!("Field '{field}' not present in template");
        return false;
    };

    let runs = Renderer::new(&document.styles, &ImageRegistry::new()).bold_runs(content);
    let style = document
        .styles
        .contains(field)
        .then(|| field.to_string());

    let Some(paragraph) = document.paragraph_mut(target) else {
        return false;
    };
    let text = paragraph.text();
    let Some(pos) = text.find(&marker) else {
        return false;
    };
    let (before, after) = (&text[..pos], &text[pos + marker.len()..]);

    let mut filled = crate::document::Paragraph::new();
    filled.style = style.or_else(|| paragraph.style.clone());
    if !before.is_empty() {
        filled.push_text(before);
    }
    for run in runs {
        filled.push(run);
    }
    if !after.is_empty() {
        filled.push_text(after);
    }
    *paragraph = filled;

    debug!("Filled field '{field}' at {target:?}");
    true
}

/// Place an expansion result into `document` at the configured marker.
pub fn place_report(
    document: &mut Document,
    expansion: ExpansionOutput,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> ReportOutput {
    let placement = assemble_report(document, &expansion.text, registry, config);
    let document_pages = estimate_with(document, config.chars_per_page);
    info!("Report assembled: ~{document_pages} pages in document");
    ReportOutput {
        expansion,
        placement,
        document_pages,
    }
}

/// Expand a report and place it into `document`.
pub async fn generate_report(
    generator: &dyn TextGenerator,
    document: &mut Document,
    query: &str,
    context: &str,
    target_pages: u32,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> ReportOutput {
    let start = Instant::now();
    let expansion =
        expand_with_images(generator, query, context, target_pages, registry, config).await;
    let out = place_report(document, expansion, registry, config);
    debug!("generate_report finished in {:?}", start.elapsed());
    out
}

/// One generation call placed into `document`, no expansion rounds.
///
/// See [`expand_single`] for how the single round is classified.
pub async fn generate_single_report(
    generator: &dyn TextGenerator,
    document: &mut Document,
    query: &str,
    context: &str,
    target_pages: Option<u32>,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> ReportOutput {
    let expansion = expand_single(generator, query, context, target_pages, config).await;
    place_report(document, expansion, registry, config)
}

/// Separate-mode report placed into `document`.
///
/// See [`expand_separate`]: sections per source, then an expansion seeded
/// with them when `target_pages` is given.
pub async fn generate_separate_report(
    generator: &dyn TextGenerator,
    document: &mut Document,
    query: &str,
    sources: &[SourceText],
    target_pages: Option<u32>,
    registry: &ImageRegistry,
    config: &ExpansionConfig,
) -> ReportOutput {
    let expansion =
        expand_separate(generator, query, sources, target_pages, registry, config).await;
    place_report(document, expansion, registry, config)
}

/// Generate and fill each of `fields` whose `{{field}}` marker is still in
/// `document`. Fields already filled (or absent) cost no generation call.
///
/// Returns the names of the fields filled, in order. A field whose
/// generation stalls is left unfilled.
pub async fn fill_generated_fields<S: AsRef<str>>(
    generator: &dyn TextGenerator,
    document: &mut Document,
    fields: &[S],
    material: &str,
    config: &ExpansionConfig,
) -> Vec<String> {
    let mut filled = Vec::new();
    for field in fields.iter().map(AsRef::as_ref) {
        if find(document, &format!("{{{{{field}}}}}")).is_none() {
            debug!("Field '{field}' already filled or absent; not generating");
            continue;
        }
        let content = generate_field(generator, field, material, config).await;
        if content.is_empty() {
            warn!("Field '{field}': nothing generated, left unfilled");
            continue;
        }
        if fill_field(document, field, &content) {
            filled.push(field.to_string());
        }
    }
    filled
}

/// Write `document` to `path` as `.docx`.
///
/// Packs into a temp file in the destination directory and renames it into
/// place, so a failed write never leaves a partial file at `path`.
pub fn save_docx(document: &Document, path: &Path) -> Result<(), ReportError> {
    let write_err = |e: std::io::Error| ReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    export::pack(document, tmp.as_file_mut(), path)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Paragraph, Section, StyleCatalog, StyleDef, Table};
    use crate::output::StopReason;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Fixed(String);

    #[async_trait]
    impl TextGenerator for Fixed {
        async fn generate(&self, _prompt: &str, _max: usize) -> String {
            self.0.clone()
        }
    }

    /// Answers with the first line of each prompt; records every prompt.
    #[derive(Default)]
    struct Echo(Mutex<Vec<String>>);

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str, _max: usize) -> String {
            self.0.lock().unwrap().push(prompt.to_string());
            prompt.lines().next().unwrap_or_default().to_string()
        }
    }

    fn config() -> ExpansionConfig {
        ExpansionConfig::default()
    }

    #[test]
    fn body_marker_is_replaced_in_place() {
        let mut doc = Document::with_styles(StyleCatalog::standard());
        doc.add_paragraph(Paragraph::with_text("Cover"));
        doc.add_paragraph(Paragraph::with_text("{{report_body}}"));
        doc.add_paragraph(Paragraph::with_text("Appendix"));

        let placement = assemble_report(&mut doc, "# Title\nBody", &ImageRegistry::new(), &config());

        assert_eq!(placement, Placement::Target(InsertionTarget::Body { block: 1 }));
        let texts: Vec<String> = doc.paragraphs().map(|(_, p)| p.text()).collect();
        assert_eq!(texts, ["Cover", "Title", "Body", "Appendix"]);
        assert!(!doc.plain_text().contains("{{report_body}}"));
    }

    #[test]
    fn cell_marker_clears_the_whole_cell() {
        let mut doc = Document::new();
        let mut table = Table::from_text([["Header"], ["{{report_body}}"]]);
        table.rows[1].cells[0]
            .paragraphs
            .push(Paragraph::with_text("placeholder note"));
        doc.add_table(table);

        let placement = assemble_report(&mut doc, "one\ntwo", &ImageRegistry::new(), &config());

        assert!(matches!(
            placement,
            Placement::Target(InsertionTarget::Cell(_))
        ));
        let (_, table) = doc.tables().next().unwrap();
        assert_eq!(table.rows[1].cells[0].text(), "one\ntwo");
        assert_eq!(table.rows[0].cells[0].text(), "Header");
    }

    #[test]
    fn missing_marker_appends() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("Existing"));

        let placement = assemble_report(&mut doc, "- item", &ImageRegistry::new(), &config());

        assert_eq!(placement, Placement::Appended);
        let texts: Vec<String> = doc.paragraphs().map(|(_, p)| p.text()).collect();
        assert_eq!(texts, ["Existing", "• item"]);
    }

    #[test]
    fn header_marker_is_found_last() {
        let mut doc = Document::new();
        doc.sections = vec![Section {
            header: vec![Paragraph::with_text("{{report_body}}")],
            footer: vec![],
        }];

        let placement = assemble_report(&mut doc, "text", &ImageRegistry::new(), &config());
        assert!(matches!(
            placement,
            Placement::Target(InsertionTarget::Header { .. })
        ));
        assert_eq!(doc.sections[0].header[0].text(), "text");
    }

    #[test]
    fn fill_field_keeps_surrounding_text() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("Author: {{author}} (lab 3)"));

        assert!(fill_field(&mut doc, "author", "**Ada** Lovelace"));

        let (_, p) = doc.paragraphs().next().unwrap();
        assert_eq!(p.text(), "Author: Ada Lovelace (lab 3)");
        assert!(p.runs.iter().any(|r| r.is_bold() && r.text_content() == "Ada"));
        assert!(p.runs.iter().any(|r| !r.is_bold() && r.text_content() == " Lovelace"));
    }

    #[test]
    fn fill_field_applies_matching_style() {
        let mut styles = StyleCatalog::standard();
        styles.insert("abstract", StyleDef::paragraph().size_pt(9.0));
        let mut doc = Document::with_styles(styles);
        doc.add_table(Table::from_text([["{{abstract}}"]]));

        assert!(fill_field(&mut doc, "abstract", "Short summary"));

        let (_, table) = doc.tables().next().unwrap();
        let p = &table.rows[0].cells[0].paragraphs[0];
        assert_eq!(p.style.as_deref(), Some("abstract"));
        assert_eq!(p.text(), "Short summary");
    }

    #[test]
    fn fill_field_without_marker() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("nothing here"));
        assert!(!fill_field(&mut doc, "author", "x"));
        assert_eq!(doc.plain_text(), "nothing here");
    }

    #[tokio::test]
    async fn generate_report_end_to_end() {
        let body = format!("# Findings\n{}", "x".repeat(1800));
        let generator = Fixed(body);
        let mut doc = Document::with_styles(StyleCatalog::standard());
        doc.add_paragraph(Paragraph::with_text("{{report_body}}"));

        let out = generate_report(
            &generator,
            &mut doc,
            "topic",
            "ctx",
            3,
            &ImageRegistry::new(),
            &config(),
        )
        .await;

        assert_eq!(out.expansion.stop, StopReason::TargetReached);
        assert_eq!(out.expansion.rounds, 1);
        assert_eq!(out.placement, Placement::Target(InsertionTarget::Body { block: 0 }));
        assert_eq!(out.document_pages, 3);
        assert_eq!(doc.paragraphs().next().unwrap().1.style.as_deref(), Some("Heading 1"));
    }

    #[tokio::test]
    async fn single_report_classifies_its_one_round() {
        let mut doc = Document::new();
        let out = generate_single_report(
            &Fixed("y".repeat(1200)),
            &mut doc,
            "q",
            "c",
            Some(2),
            &ImageRegistry::new(),
            &config(),
        )
        .await;
        assert_eq!(out.expansion.rounds, 1);
        assert_eq!(out.expansion.pages, 2);
        assert_eq!(out.expansion.stop, StopReason::TargetReached);
        assert_eq!(out.placement, Placement::Appended);

        let mut doc = Document::new();
        let short = generate_single_report(
            &Fixed("short".into()),
            &mut doc,
            "q",
            "c",
            Some(5),
            &ImageRegistry::new(),
            &config(),
        )
        .await;
        assert_eq!(short.expansion.stop, StopReason::RoundBudgetExhausted);

        let mut doc = Document::new();
        let empty = generate_single_report(
            &Fixed("  ".into()),
            &mut doc,
            "q",
            "c",
            None,
            &ImageRegistry::new(),
            &config(),
        )
        .await;
        assert_eq!(empty.expansion.stop, StopReason::EmptyResponse);
        assert_eq!(empty.expansion.pages, 0);
    }

    #[tokio::test]
    async fn separate_report_keeps_sources_apart() {
        let mut doc = Document::with_styles(StyleCatalog::standard());
        doc.add_paragraph(Paragraph::with_text("{{report_body}}"));
        let sources = [
            SourceText::new("ospf.md", "area 0"),
            SourceText::new("bgp.md", "as 65001"),
        ];

        let out = generate_separate_report(
            &Echo::default(),
            &mut doc,
            "Routing",
            &sources,
            None,
            &ImageRegistry::new(),
            &config(),
        )
        .await;

        assert_eq!(out.placement, Placement::Target(InsertionTarget::Body { block: 0 }));
        let headings: Vec<(String, Option<String>)> = doc
            .paragraphs()
            .filter(|(_, p)| p.style.as_deref().is_some_and(|s| s.starts_with("Heading")))
            .map(|(_, p)| (p.text(), p.style.clone()))
            .collect();
        let names: Vec<&str> = headings.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(names, ["Routing", "Overview", "ospf.md", "1", "bgp.md", "1"]);
        assert_eq!(headings[2].1.as_deref(), Some("Heading 2"));
        assert_eq!(headings[3].1.as_deref(), Some("Heading 3"));
    }

    #[tokio::test]
    async fn generated_fields_fill_only_open_markers() {
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("Requirements: {{design_requirements}}"));
        doc.add_paragraph(Paragraph::with_text("Statement: {{self_statement}}"));
        assert!(fill_field(&mut doc, "self_statement", "Written by me."));

        let generator = Echo::default();
        let filled = fill_generated_fields(
            &generator,
            &mut doc,
            &["design_requirements", "self_statement", "completion"],
            "lab notes",
            &config(),
        )
        .await;

        assert_eq!(filled, ["design_requirements"]);
        let prompts = generator.0.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("design requirements"));

        let texts: Vec<String> = doc.paragraphs().map(|(_, p)| p.text()).collect();
        assert!(texts[0].starts_with("Requirements: Based on the material below"));
        assert_eq!(texts[1], "Statement: Written by me.");
    }

    #[test]
    fn save_docx_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.docx");
        let mut doc = Document::new();
        doc.add_paragraph(Paragraph::with_text("hello"));

        save_docx(&doc, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
