//! CLI binary for edgequake-report.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExpansionConfig`, loads the template and image manifest, and writes the
//! assembled `.docx`.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_report::pipeline::images::is_image_file;
use edgequake_report::{
    expand_separate, expand_single, expand_with_images, fill_field, fill_generated_fields,
    place_report, save_docx, Document, ExpansionConfig, ExpansionProgressCallback,
    HtmlImageSource, ImageRegistry, LlmGenerator, Paragraph, ProgressCallback, ReportOutput,
    SourceText, StopReason, StyleCatalog, DEFAULT_MARKER,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while a round is in flight and one log line
/// per accepted round.
struct CliProgressCallback {
    bar: ProgressBar,
    round_started: Mutex<Option<Instant>>,
    target_pages: Mutex<u32>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            round_started: Mutex::new(None),
            target_pages: Mutex::new(0),
        })
    }

    fn round_elapsed(&self) -> f64 {
        self.round_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExpansionProgressCallback for CliProgressCallback {
    fn on_expansion_start(&self, target_pages: u32, max_rounds: u32) {
        if let Ok(mut t) = self.target_pages.lock() {
            *t = target_pages;
        }
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Expanding to ~{target_pages} pages (up to {max_rounds} rounds)…"
            ))
        ));
    }

    fn on_round_start(&self, round: u32, max_rounds: u32) {
        if let Ok(mut t) = self.round_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_prefix("Generating");
        self.bar.set_message(format!("round {}/{}", round + 1, max_rounds));
    }

    fn on_round_complete(&self, round: u32, chars: usize, pages: u32) {
        let target = self.target_pages.lock().map(|t| *t).unwrap_or(0);
        self.bar.println(format!(
            "  {} Round {:>2}  {:<14}  {:<12}  {}",
            green("✓"),
            round + 1,
            dim(&format!("{chars:>6} chars")),
            format!("~{pages}/{target} pages"),
            dim(&format!("{:.1}s", self.round_elapsed())),
        ));
    }

    fn on_expansion_complete(&self, rounds: u32, pages: u32, stop: StopReason) {
        self.bar.finish_and_clear();
        let mark = if stop.is_stall() { cyan("⚠") } else { green("✔") };
        eprintln!(
            "{} {} rounds, ~{} pages  {}",
            mark,
            bold(&rounds.to_string()),
            pages,
            dim(&format!("({stop})")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Five-page report into a blank document
  reportgen "Campus network lab" --context notes.md -o report.docx

  # Fill a template at its {{report_body}} marker, with images
  reportgen "Lab 3: routing" --context notes.md --template lab.json \
      --images images.json --target-pages 8 -o lab3.docx

  # Fill template fields as well
  reportgen "Lab 3" --template lab.json --field author="Ada Lovelace" \
      --field date=2026-10-19 -o lab3.docx

  # One generation call, no expansion rounds
  reportgen "Summary" --context notes.md --single -o summary.docx

  # Separate mode: sections per source, then expansion; generate cover fields
  reportgen "Lab 3" --source ospf.md --source bgp.md --template lab.json \
      --generate-field design_requirements --generate-field self_statement

  # Keep the markdown and an HTML preview
  reportgen "Topic" --markdown-out body.md --html-out body.html -o report.docx

TEMPLATES:
  A template is a JSON-serialised document (body blocks, styles, sections).
  The report body replaces the first table cell or paragraph containing the
  marker; without a marker it is appended to the end of the body.

IMAGE MANIFEST:
  [{"token": "img_1", "path": "topology.png", "description": "Lab topology"}]
  Relative paths resolve against the manifest's directory. The model is told
  about every image and may place it with {{image:img_1}}.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Generate long-form reports with an LLM and assemble them into .docx files.
#[derive(Parser, Debug)]
#[command(
    name = "reportgen",
    version,
    about = "Generate long-form reports with an LLM and assemble them into Word documents",
    long_about = "Generate a report on a query from reference material, expanding it round by \
round until it fills the requested number of pages, then render it into a Word template with \
headings, lists, code blocks, bold text and images.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// What the report is about.
    query: String,

    /// File with reference material for the report.
    #[arg(short, long, env = "REPORTGEN_CONTEXT", conflicts_with = "source")]
    context: Option<PathBuf>,

    /// Source document for separate mode; repeat for several. Each source
    /// gets its own sections under its file name.
    #[arg(long)]
    source: Vec<PathBuf>,

    /// Target length in estimated pages.
    #[arg(short = 'p', long, env = "REPORTGEN_TARGET_PAGES", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    target_pages: u32,

    /// Template document (JSON). Default: a blank document with standard styles.
    #[arg(short, long, env = "REPORTGEN_TEMPLATE")]
    template: Option<PathBuf>,

    /// Image manifest (JSON).
    #[arg(long, env = "REPORTGEN_IMAGES", conflicts_with = "image")]
    images: Option<PathBuf>,

    /// Image file; repeat for several. Tokens are img_1, img_2, … in order.
    #[arg(long, value_parser = parse_image)]
    image: Vec<PathBuf>,

    /// Write the .docx here.
    #[arg(short, long, env = "REPORTGEN_OUTPUT", default_value = "report.docx")]
    output: PathBuf,

    /// Also write the generated markdown here.
    #[arg(long, env = "REPORTGEN_MARKDOWN_OUT")]
    markdown_out: Option<PathBuf>,

    /// Also write an HTML preview of the markdown here.
    #[arg(long, env = "REPORTGEN_HTML_OUT")]
    html_out: Option<PathBuf>,

    /// URL prefix for <img> tags in the HTML preview. Default: inline data URIs.
    #[arg(long, env = "REPORTGEN_WEB_ROOT")]
    web_root: Option<String>,

    /// Placeholder the report body replaces.
    #[arg(long, env = "REPORTGEN_MARKER", default_value = DEFAULT_MARKER)]
    marker: String,

    /// Fill a template field: NAME=VALUE replaces {{NAME}}. Repeatable.
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Generate a short text for template field NAME when it is still open
    /// after the --field values are filled. Repeatable.
    #[arg(long = "generate-field", value_name = "NAME")]
    generate_fields: Vec<String>,

    /// One generation call, no expansion rounds.
    #[arg(long, env = "REPORTGEN_SINGLE")]
    single: bool,

    /// Maximum expansion rounds.
    #[arg(long, env = "REPORTGEN_MAX_ROUNDS", default_value_t = 8)]
    max_rounds: u32,

    /// Characters per estimated page.
    #[arg(long, env = "REPORTGEN_CHARS_PER_PAGE", default_value_t = 600)]
    chars_per_page: usize,

    /// Path to a text file with instructions that replace the default outline.
    #[arg(long, env = "REPORTGEN_INSTRUCTIONS")]
    instructions: Option<PathBuf>,

    /// Display width of embedded images, in inches.
    #[arg(long, env = "REPORTGEN_IMAGE_WIDTH", default_value_t = 4.0)]
    image_width: f32,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "REPORTGEN_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Retries per generation call on LLM failure.
    #[arg(long, env = "REPORTGEN_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-round LLM call timeout in seconds.
    #[arg(long, env = "REPORTGEN_ROUND_TIMEOUT", default_value_t = 120)]
    round_timeout: u64,

    /// Print a JSON summary (expansion result and placement) on stdout.
    #[arg(long, env = "REPORTGEN_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "REPORTGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "REPORTGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "REPORTGEN_QUIET")]
    quiet: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    output: &'a std::path::Path,
    #[serde(flatten)]
    report: &'a ReportOutput,
    fields_filled: Vec<&'a str>,
    fields_generated: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs quiet
    // while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inputs ───────────────────────────────────────────────────────────
    let context = match cli.context {
        Some(ref path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read context from {:?}", path))?,
        None => String::new(),
    };

    let mut document = match cli.template {
        Some(ref path) => Document::from_json_file(path).context("Failed to load template")?,
        None => {
            let mut doc = Document::with_styles(StyleCatalog::standard());
            doc.add_paragraph(Paragraph::with_text(cli.marker.as_str()));
            doc
        }
    };

    let registry = match cli.images {
        Some(ref path) => {
            ImageRegistry::from_json_file(path).context("Failed to load image manifest")?
        }
        None => ImageRegistry::from_uploads(cli.image.clone()),
    };

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.single {
        Some(CliProgressCallback::new() as Arc<dyn ExpansionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let generator = LlmGenerator::from_config(&config).context("Failed to set up LLM provider")?;

    // ── Template fields ──────────────────────────────────────────────────
    // Filled before the body goes in, so a {{name}} inside generated text
    // is never taken for the template's field.
    let fields_filled: Vec<&str> = cli
        .fields
        .iter()
        .filter(|(name, value)| fill_field(&mut document, name, value))
        .map(|(name, _)| name.as_str())
        .collect();

    // ── Generate ─────────────────────────────────────────────────────────
    let start = Instant::now();
    let target = Some(cli.target_pages).filter(|_| !cli.single);
    let separate = !cli.source.is_empty();
    let expansion = if separate {
        let sources = cli
            .source
            .iter()
            .map(|p| SourceText::from_file(p))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read source documents")?;
        expand_separate(&generator, &cli.query, &sources, target, &registry, &config).await
    } else if cli.single {
        expand_single(&generator, &cli.query, &context, Some(cli.target_pages), &config).await
    } else {
        expand_with_images(
            &generator,
            &cli.query,
            &context,
            cli.target_pages,
            &registry,
            &config,
        )
        .await
    };

    let material = if separate || context.trim().is_empty() {
        expansion.text.as_str()
    } else {
        context.as_str()
    };
    let fields_generated = fill_generated_fields(
        &generator,
        &mut document,
        &cli.generate_fields[..],
        material,
        &config,
    )
    .await;

    // ── Assemble ─────────────────────────────────────────────────────────
    let report: ReportOutput = place_report(&mut document, expansion, &registry, &config);

    // ── Outputs ──────────────────────────────────────────────────────────
    save_docx(&document, &cli.output).context("Failed to write .docx")?;

    if let Some(ref path) = cli.markdown_out {
        tokio::fs::write(path, &report.expansion.text)
            .await
            .with_context(|| format!("Failed to write markdown to {:?}", path))?;
    }
    if let Some(ref path) = cli.html_out {
        let source = match cli.web_root {
            Some(ref root) => HtmlImageSource::WebRoot(root.clone()),
            None => HtmlImageSource::Inline,
        };
        let html = registry.to_html(&report.expansion.text, &source);
        tokio::fs::write(path, html)
            .await
            .with_context(|| format!("Failed to write HTML to {:?}", path))?;
    }

    if cli.json {
        let summary = Summary {
            output: &cli.output,
            report: &report,
            fields_filled,
            fields_generated,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  ~{} pages  {} chars  {}ms  →  {}",
            green("✔"),
            report.document_pages,
            report.expansion.chars(),
            start.elapsed().as_millis(),
            bold(&cli.output.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `ExpansionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExpansionConfig> {
    let mut builder = ExpansionConfig::builder()
        .max_rounds(cli.max_rounds)
        .chars_per_page(cli.chars_per_page)
        .marker(cli.marker.as_str())
        .image_width_in(cli.image_width)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .round_timeout_secs(cli.round_timeout);

    if let Some(ref path) = cli.instructions {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instructions from {:?}", path))?;
        builder = builder.custom_instructions(text);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Accept `--image` paths with an image extension only.
fn parse_image(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if is_image_file(&path) {
        Ok(path)
    } else {
        Err(format!("'{s}' is not an image (png, jpg, jpeg, gif, bmp)"))
    }
}

/// Parse `--field NAME=VALUE`.
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty field name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_flag_rejects_non_images() {
        assert_eq!(parse_image("fig/topology.PNG"), Ok(PathBuf::from("fig/topology.PNG")));
        assert!(parse_image("notes.md").unwrap_err().contains("not an image"));
        assert!(parse_image("diagram").is_err());
    }

    #[test]
    fn field_flag_splits_on_first_equals() {
        assert_eq!(
            parse_field("title=a=b"),
            Ok(("title".to_string(), "a=b".to_string()))
        );
        assert!(parse_field("=x").is_err());
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn cli_rejects_image_arguments_that_are_not_images() {
        let err = Cli::try_parse_from(["reportgen", "q", "--image", "notes.txt"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["reportgen", "q", "--image", "a.png", "--image", "b.jpg"])
            .unwrap();
        assert_eq!(cli.image.len(), 2);
    }
}
