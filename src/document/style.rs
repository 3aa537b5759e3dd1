//! Style catalog and the style fallback chain.
//!
//! Templates come from many sources, and the style names they define vary
//! with the authoring tool and its UI language: one template has
//! `Heading 1`, another only `标题 1`, a third neither. Callers therefore ask
//! for an ordered list of acceptable names and get back the first one that
//! exists, or `None` so they can fall back to direct formatting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a style applies to whole paragraphs or to runs of characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleKind {
    #[default]
    Paragraph,
    Character,
}

/// 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Upper-case hex without a leading `#`, e.g. `404040`.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

/// A named style definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDef {
    #[serde(default)]
    pub kind: StyleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_pt: Option<f32>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl StyleDef {
    pub fn paragraph() -> Self {
        Self::default()
    }

    pub fn character() -> Self {
        Self {
            kind: StyleKind::Character,
            ..Self::default()
        }
    }

    pub fn font(mut self, font: impl Into<String>) -> Self {
        self.font = Some(font.into());
        self
    }

    pub fn size_pt(mut self, size: f32) -> Self {
        self.size_pt = Some(size);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }
}

/// Mapping from style name to definition, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCatalog {
    styles: BTreeMap<String, StyleDef>,
}

impl StyleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in styles of a blank English-locale template.
    pub fn standard() -> Self {
        let mut c = Self::new();
        c.insert("Normal", StyleDef::paragraph());
        c.insert("Heading 1", StyleDef::paragraph().bold().size_pt(16.0));
        c.insert("Heading 2", StyleDef::paragraph().bold().size_pt(14.0));
        c.insert("Heading 3", StyleDef::paragraph().bold().size_pt(12.0));
        c.insert("Heading 4", StyleDef::paragraph().bold().size_pt(11.0));
        c.insert("Strong", StyleDef::character().bold());
        c
    }

    pub fn insert(&mut self, name: impl Into<String>, def: StyleDef) {
        self.styles.insert(name.into(), def);
    }

    pub fn get(&self, name: &str) -> Option<&StyleDef> {
        self.styles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StyleDef)> {
        self.styles.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Return the first candidate that names a style in `catalog`.
///
/// `None` means no candidate exists and the caller should apply direct
/// formatting instead.
pub fn resolve<'a>(catalog: &StyleCatalog, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|name| catalog.contains(name))
}
