//! Image registry: maps inline `{{image:img_N}}` tokens to files.
//!
//! The registry is built once per assembly call from whatever images the
//! caller uploaded, and lives only as long as that call. Lookups are exact;
//! a token with no entry is not an error, the renderer prints a visible
//! "not found" marker in its place.

use crate::error::ReportError;
use crate::pipeline::markdown::RE_IMAGE_TOKEN;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Token used in generated text, e.g. `img_3`.
    pub token: String,
    /// Location of the image bytes.
    pub path: PathBuf,
    /// Human-readable description, used in prompts and as HTML alt text.
    #[serde(default)]
    pub description: String,
}

/// Ordered set of uploaded images, addressable by token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegistry {
    entries: Vec<ImageEntry>,
    /// Joined onto relative entry paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_dir: Option<PathBuf>,
}

/// Decoded bytes of a resolved image, ready to embed.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// How [`ImageRegistry::to_html`] points `<img>` tags at the files.
#[derive(Debug, Clone)]
pub enum HtmlImageSource {
    /// `src` is `prefix` joined with the entry's file name.
    WebRoot(String),
    /// `src` is a base64 `data:` URI of the file contents.
    Inline,
}

/// Visible text rendered in place of a token that cannot be embedded.
pub fn missing_marker(token: &str) -> String {
    format!("[image {token} not found]")
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ImageEntry>) -> Self {
        Self {
            entries,
            base_dir: None,
        }
    }

    /// Register uploaded files in order as `img_1`, `img_2`, …
    pub fn from_uploads<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let entries = paths
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let path: PathBuf = p.into();
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ImageEntry {
                    token: format!("img_{}", i + 1),
                    description: format!("Image: {name}"),
                    path,
                }
            })
            .collect();
        Self::from_entries(entries)
    }

    /// Load a JSON manifest: either a bare array of entries or
    /// `{"entries": [...], "base_dir": "..."}`.
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        if let Ok(entries) = serde_json::from_str::<Vec<ImageEntry>>(json) {
            return Ok(Self::from_entries(entries));
        }
        serde_json::from_str(json).map_err(|e| ReportError::InvalidManifest(e.to_string()))
    }

    /// Load a JSON manifest from `path`.
    ///
    /// Relative entry paths resolve against the manifest's own directory
    /// unless the manifest names a `base_dir`.
    pub fn from_json_file(path: &Path) -> Result<Self, ReportError> {
        let json = std::fs::read_to_string(path).map_err(|e| ReportError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut registry = Self::from_json(&json)?;
        if registry.base_dir.is_none() {
            registry.base_dir = path.parent().map(Path::to_path_buf);
        }
        Ok(registry)
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn push(&mut self, entry: ImageEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, token: &str) -> Option<&ImageEntry> {
        self.entries.iter().find(|e| e.token == token)
    }

    /// Path for `token`, with the base directory applied. `None` when the
    /// token is not registered.
    pub fn resolve(&self, token: &str) -> Option<PathBuf> {
        let entry = self.get(token)?;
        Some(match &self.base_dir {
            Some(base) if entry.path.is_relative() => base.join(&entry.path),
            _ => entry.path.clone(),
        })
    }

    /// Resolve `token` and read the image, probing its pixel size.
    ///
    /// Returns `None` for unknown tokens, unreadable files, and bytes that
    /// are not a decodable image; each case is logged.
    pub fn load(&self, token: &str) -> Option<LoadedImage> {
        let Some(path) = self.resolve(token) else {
            warn!("Image {token} is not registered");
            return None;
        };
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) => {
                warn!("Image {token}: cannot read {}: {e}", path.display());
                return None;
            }
        };
        let (width, height) = match probe_dimensions(&data) {
            Ok(dims) => dims,
            Err(e) => {
                warn!("Image {token}: {} is not a usable image: {e}", path.display());
                return None;
            }
        };
        debug!("Image {token} → {} ({width}x{height})", path.display());
        Some(LoadedImage {
            path,
            data,
            width,
            height,
        })
    }

    /// Replace every token in `text` with HTML markup for a web preview.
    ///
    /// Registered tokens whose file exists become `<img>` tags; everything
    /// else becomes a red "not found" span.
    pub fn to_html(&self, text: &str, source: &HtmlImageSource) -> String {
        RE_IMAGE_TOKEN
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let token = &caps[1];
                match self.html_img(token, source) {
                    Some(tag) => tag,
                    None => format!(
                        "<span style=\"color:red\">{}</span>",
                        html_escape(&missing_marker(token))
                    ),
                }
            })
            .into_owned()
    }

    fn html_img(&self, token: &str, source: &HtmlImageSource) -> Option<String> {
        let entry = self.get(token)?;
        let path = self.resolve(token)?;
        let src = match source {
            HtmlImageSource::WebRoot(prefix) => {
                if !path.exists() {
                    return None;
                }
                let name = path.file_name()?.to_string_lossy();
                format!("{}/{}", prefix.trim_end_matches('/'), name)
            }
            HtmlImageSource::Inline => {
                let data = std::fs::read(&path).ok()?;
                let mime = image::guess_format(&data)
                    .map(|f| f.to_mime_type())
                    .unwrap_or("application/octet-stream");
                let b64 = base64::engine::general_purpose::STANDARD.encode(&data);
                format!("data:{mime};base64,{b64}")
            }
        };
        Some(format!(
            "<img src=\"{}\" alt=\"{}\" style=\"max-width:90%;margin:12px auto;display:block;\" />",
            html_escape(&src),
            html_escape(&entry.description)
        ))
    }

    /// Prompt fragment listing the available tokens, one per line.
    pub fn prompt_listing(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("- {{{{image:{}}}}}: {}", e.token, e.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Look up `token` in `registry`. Exact match only.
pub fn resolve(token: &str, registry: &ImageRegistry) -> Option<PathBuf> {
    registry.resolve(token)
}

fn probe_dimensions(data: &[u8]) -> Result<(u32, u32), image::ImageError> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Whether `path` looks like an image by extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            matches!(
                e.to_ascii_lowercase().as_str(),
                "png" | "jpg" | "jpeg" | "gif" | "bmp"
            )
        })
        .unwrap_or(false)
}
