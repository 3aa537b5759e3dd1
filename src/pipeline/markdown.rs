//! Markdown-subset parser.
//!
//! Generated reports are prompted to use only a handful of symbols, so this
//! is not a CommonMark parser. Each line is classified on its own, with one
//! piece of state carried across lines: whether we are inside a fenced code
//! block. Precedence per line:
//!
//! 1. a trimmed line starting with ```` ``` ```` toggles the code block; the
//!    closing fence flushes the pending lines as one [`MdBlock::Code`]
//! 2. inside a code block, lines are kept verbatim
//! 3. a line with `{{image:img_N}}` tokens becomes [`MdBlock::Inline`]
//! 4. `- item` becomes [`MdBlock::ListItem`]
//! 5. `#`…`####` followed by a space becomes [`MdBlock::Heading`]
//! 6. anything else non-blank becomes [`MdBlock::Paragraph`], with `**`
//!    bold spans split out
//! 7. blank lines produce nothing
//!
//! An unterminated fence at the end of the input is flushed as a code block
//! so no generated content is silently dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Inline image token, e.g. `{{image:img_3}}`; group 1 is the registry token.
pub static RE_IMAGE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{image:(img_\d+)\}\}").unwrap());

const FENCE: &str = "```";
const LIST_MARKER: &str = "- ";
const BOLD_DELIMITER: &str = "**";

/// One structural element of the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MdBlock {
    /// `#` to `####`; `level` is 1–4.
    Heading { level: u8, text: String },
    /// `- item`, marker stripped.
    ListItem { text: String },
    /// Fenced code, lines joined with `\n` exactly as written.
    Code { text: String },
    /// A plain or bold-annotated paragraph.
    Paragraph { spans: Vec<Span> },
    /// A line carrying image tokens, split into text and image segments.
    Inline { segments: Vec<Segment> },
}

/// A run of paragraph text, bold or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub bold: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

/// Part of a line that carries image tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Image { token: String },
}

/// Parse `text` into blocks, in input order.
pub fn parse(text: &str) -> Vec<MdBlock> {
    let mut blocks = Vec::new();
    let mut in_code = false;
    let mut code_lines: Vec<&str> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();

        if line.starts_with(FENCE) {
            if in_code {
                blocks.push(MdBlock::Code {
                    text: code_lines.join("\n"),
                });
                code_lines.clear();
            }
            in_code = !in_code;
            continue;
        }

        if in_code {
            code_lines.push(raw);
            continue;
        }

        if let Some(block) = parse_line(line) {
            blocks.push(block);
        }
    }

    if in_code {
        blocks.push(MdBlock::Code {
            text: code_lines.join("\n"),
        });
    }

    blocks
}

/// Classify one trimmed line outside a code block.
fn parse_line(line: &str) -> Option<MdBlock> {
    if line.is_empty() {
        return None;
    }

    if RE_IMAGE_TOKEN.is_match(line) {
        return Some(MdBlock::Inline {
            segments: split_image_tokens(line),
        });
    }

    if let Some(item) = line.strip_prefix(LIST_MARKER) {
        return Some(MdBlock::ListItem {
            text: item.to_string(),
        });
    }

    if let Some((level, text)) = heading(line) {
        return Some(MdBlock::Heading {
            level,
            text: text.to_string(),
        });
    }

    Some(MdBlock::Paragraph {
        spans: bold_spans(line),
    })
}

/// `## Title` → `(2, "Title")`. Five or more `#` is not a heading.
fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=4).contains(&hashes) {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    Some((hashes as u8, rest.trim_start()))
}

/// Split a line around its image tokens. Empty text segments are dropped.
pub fn split_image_tokens(line: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in RE_IMAGE_TOKEN.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            segments.push(Segment::Text {
                text: line[last..whole.start()].to_string(),
            });
        }
        segments.push(Segment::Image {
            token: caps[1].to_string(),
        });
        last = whole.end();
    }
    if last < line.len() {
        segments.push(Segment::Text {
            text: line[last..].to_string(),
        });
    }
    segments
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoldState {
    OutsideBold,
    InsideBold,
}

/// Split a line into plain and bold spans on `**` delimiters.
///
/// Walks the line once, toggling between `OutsideBold` and `InsideBold` at
/// every delimiter. If the line ends while still `InsideBold`, the opening
/// delimiter had no partner: it is restored as literal `**` and the trailing
/// text is emitted as plain. Empty spans are never emitted, so the span texts
/// always concatenate to the line minus its paired delimiters.
pub fn bold_spans(line: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();
    let mut state = BoldState::OutsideBold;
    let mut rest = line;

    while let Some(pos) = rest.find(BOLD_DELIMITER) {
        let (piece, tail) = rest.split_at(pos);
        push_span(&mut spans, piece, state == BoldState::InsideBold);
        state = match state {
            BoldState::OutsideBold => BoldState::InsideBold,
            BoldState::InsideBold => BoldState::OutsideBold,
        };
        rest = &tail[BOLD_DELIMITER.len()..];
    }

    match state {
        BoldState::OutsideBold => push_span(&mut spans, rest, false),
        BoldState::InsideBold => {
            let literal = format!("{BOLD_DELIMITER}{rest}");
            push_span(&mut spans, &literal, false);
        }
    }

    spans
}

/// Append `text`, merging into the previous span when the weight matches.
fn push_span(spans: &mut Vec<Span>, text: &str, bold: bool) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(last) if last.bold == bold => last.text.push_str(text),
        _ => spans.push(Span {
            text: text.to_string(),
            bold,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(text: &str) -> MdBlock {
        MdBlock::Paragraph {
            spans: vec![Span::plain(text)],
        }
    }

    #[test]
    fn plain_lines_one_paragraph_each() {
        let blocks = parse("first line\n\nsecond line\n   \nthird");
        assert_eq!(
            blocks,
            vec![para("first line"), para("second line"), para("third")]
        );
    }

    #[test]
    fn list_item_strips_marker() {
        assert_eq!(
            parse("- first item"),
            vec![MdBlock::ListItem {
                text: "first item".into()
            }]
        );
    }

    #[test]
    fn heading_levels() {
        let blocks = parse("# One\n## Title\n### Three\n#### Four");
        let levels: Vec<(u8, &str)> = blocks
            .iter()
            .map(|b| match b {
                MdBlock::Heading { level, text } => (*level, text.as_str()),
                other => panic!("expected heading, got {other:?}"),
            })
            .collect();
        assert_eq!(
            levels,
            vec![(1, "One"), (2, "Title"), (3, "Three"), (4, "Four")]
        );
    }

    #[test]
    fn five_hashes_is_a_paragraph() {
        assert_eq!(parse("##### deep"), vec![para("##### deep")]);
    }

    #[test]
    fn hash_without_space_is_a_paragraph() {
        assert_eq!(parse("#hashtag"), vec![para("#hashtag")]);
    }

    #[test]
    fn code_block_is_verbatim() {
        let input = "intro\n```rust\nfn main() {\n    println!(\"hi\");\n\n}\n```\nafter";
        let blocks = parse(input);
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            MdBlock::Code {
                text: "fn main() {\n    println!(\"hi\");\n\n}".into()
            }
        );
    }

    #[test]
    fn markdown_inside_code_is_not_interpreted() {
        let blocks = parse("```\n# not a heading\n- not a list\n**x**\n```");
        assert_eq!(
            blocks,
            vec![MdBlock::Code {
                text: "# not a heading\n- not a list\n**x**".into()
            }]
        );
    }

    #[test]
    fn unterminated_fence_is_flushed() {
        let blocks = parse("```\nleft open");
        assert_eq!(
            blocks,
            vec![MdBlock::Code {
                text: "left open".into()
            }]
        );
    }

    #[test]
    fn bold_spans_alternate() {
        assert_eq!(
            bold_spans("a **b** c **d**"),
            vec![
                Span::plain("a "),
                Span::bold("b"),
                Span::plain(" c "),
                Span::bold("d"),
            ]
        );
    }

    #[test]
    fn even_delimiters_concatenate_to_line_without_them() {
        for line in [
            "**lead** text",
            "text **mid** text",
            "**a****b**",
            "x ** ** y",
            "****",
        ] {
            let joined: String = bold_spans(line).into_iter().map(|s| s.text).collect();
            assert_eq!(joined, line.replace("**", ""), "line: {line:?}");
        }
    }

    #[test]
    fn odd_delimiter_is_literal() {
        assert_eq!(
            bold_spans("a **b** c **d"),
            vec![Span::plain("a "), Span::bold("b"), Span::plain(" c **d")]
        );
        assert_eq!(bold_spans("2 ** 3"), vec![Span::plain("2 ** 3")]);
    }

    #[test]
    fn image_tokens_split_line() {
        let blocks = parse("See {{image:img_1}} and {{image:img_22}}.");
        assert_eq!(
            blocks,
            vec![MdBlock::Inline {
                segments: vec![
                    Segment::Text {
                        text: "See ".into()
                    },
                    Segment::Image {
                        token: "img_1".into()
                    },
                    Segment::Text {
                        text: " and ".into()
                    },
                    Segment::Image {
                        token: "img_22".into()
                    },
                    Segment::Text { text: ".".into() },
                ]
            }]
        );
    }

    #[test]
    fn image_line_takes_precedence_over_list() {
        let blocks = parse("- {{image:img_2}}");
        assert!(matches!(blocks[0], MdBlock::Inline { .. }));
    }

    #[test]
    fn malformed_token_is_plain_text() {
        assert_eq!(
            parse("{{image:photo}}"),
            vec![para("{{image:photo}}")]
        );
    }
}
