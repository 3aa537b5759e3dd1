//! Prompts for report generation.
//!
//! Every prompt the expansion loop sends is built here, so the formatting
//! contract with the model (which markdown symbols it may use, how images
//! are referenced) is stated in exactly one place and can be inspected by
//! unit tests without a live provider.
//!
//! The rules mirror what [`crate::pipeline::markdown`] understands: anything
//! the parser does not recognise is rendered as plain paragraph text, so the
//! prompt forbids it.

/// Fixed formatting rules placed at the top of every initial prompt.
pub const FORMAT_RULES: &str = r#"You are a report-writing assistant. Integrate the material below into a well-structured, fluent, strictly formatted Markdown report. Follow these formatting rules exactly:

1. ALLOWED SYMBOLS
   - Only these Markdown symbols may be used: # (level-1 heading), ## (level-2), ### (level-3), #### (level-4), ``` (code block), - (unnumbered list item), **bold**

2. FORBIDDEN
   - Do NOT use --- to separate paragraphs
   - Do NOT use ##### or deeper headings
   - Do NOT use HTML tags such as <p> or <br>
   - Do NOT add pleasantries such as "I hope this report helps"
   - Do NOT prefix the title with "Report:"; write the title itself
   - Do NOT combine a bullet and bold text as in "• **text**"

3. NUMBERING
   - Number paragraphs as 1. 2. 3.; do not use - or • for numbered lists

4. IMAGES
   - Insert images as {{image:img_N}}, e.g. {{image:img_1}}, at a fitting position

5. CODE
   - Wrap all code in paired ``` fences and keep its original indentation

6. TONE
   - Formal, neutral and informative unless told otherwise
   - Expand on the reference material to enrich the report
   - Use the allowed symbols wherever they help structure"#;

/// Closing instructions used when no custom instructions are configured.
const DEFAULT_OUTLINE: &str = r#"Write a report with the following parts:
1. Overview
2. Detailed analysis (may have several subsections)
3. Conclusions and recommendations
4. Where useful, supplementary parts such as technical procedures or figure descriptions
5. Prefer adding detail and implementation depth to what the material covers over introducing unrelated topics

Output a well-structured, accurately formatted, rigorous Markdown report. Do not add a closing remark such as "End of report"."#;

/// Page-length guidance for a target of `target_pages`, tiered by length.
///
/// Returns an empty string when no positive target is given.
pub fn page_control(target_pages: Option<u32>) -> String {
    let Some(pages) = target_pages.filter(|&p| p > 0) else {
        return String::new();
    };

    let detail = match pages {
        1..=3 => {
            "- Keep the content concise and focused on the key points\n\
             - Avoid redundant description"
        }
        4..=6 => {
            "- Give substantial content with the necessary technical detail\n\
             - Argue and analyse each section adequately"
        }
        7..=10 => {
            "- Go into great detail with in-depth technical analysis\n\
             - Give every section discussion, case analysis and detailed explanation\n\
             - Several subsections and detailed implementation steps are welcome"
        }
        _ => {
            "- Be exhaustive, with comprehensive technical analysis\n\
             - Give every section discussion, case analysis, explanation and deeper exploration\n\
             - Include several subsections, implementation steps, problem analysis and solutions\n\
             - Add technical detail, experimental data and comparisons where possible\n\
             - Keep the content substantive, never padded"
        }
    };

    format!(
        "\n\nPAGE LENGTH\n\
         The report should fill about {pages} pages of a word-processing document:\n\
         - Each page holds roughly 500-800 characters\n\
         {detail}"
    )
}

/// Inputs to [`initial_prompt`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInput<'a> {
    pub query: &'a str,
    pub context: &'a str,
    pub target_pages: Option<u32>,
    pub custom_instructions: Option<&'a str>,
    /// Pre-rendered image listing, one `- {{image:img_N}}: description` per line.
    pub image_listing: Option<&'a str>,
}

/// Build the round-0 prompt.
///
/// Layout: fixed rules, page-length guidance, available images, then either
/// the caller's custom instructions or the default outline, with the query
/// and reference material in between.
pub fn initial_prompt(input: &PromptInput<'_>) -> String {
    let mut prompt = String::from(FORMAT_RULES);
    prompt.push_str(&page_control(input.target_pages));

    if let Some(listing) = input.image_listing.filter(|l| !l.trim().is_empty()) {
        prompt.push_str("\n\nAVAILABLE IMAGES\n");
        prompt.push_str(listing);
    }

    match input.custom_instructions {
        Some(custom) => {
            prompt.push_str("\n\n");
            prompt.push_str(custom.trim());
            prompt.push_str(&format!(
                "\n\nQuery: {}\n\nContext:\n{}\n",
                input.query, input.context
            ));
        }
        None => {
            prompt.push_str(&format!(
                "\n\nQuery: {}\n\nReference material:\n{}\n\n{}\n",
                input.query, input.context, DEFAULT_OUTLINE
            ));
        }
    }
    prompt
}

/// Build the prompt for a round after the first.
///
/// Asks for at least `min_new_chars` characters of new material that does
/// not repeat `accumulated`, and embeds `accumulated` in full.
pub fn continuation_prompt(
    query: &str,
    accumulated: &str,
    target_pages: u32,
    min_new_chars: usize,
) -> String {
    format!(
        "Continue expanding the report on \"{query}\" below until the whole report fills \
         about {target_pages} pages of a word-processing document. In this round write at \
         least {min_new_chars} characters of new material. Add more technical detail, cases, \
         analysis, data and figures; keep the content rich and substantive, and do not repeat \
         anything written so far. Follow the same formatting rules as before.\n\n\
         REPORT SO FAR\n{accumulated}"
    )
}

/// Build the prompt for section `index` (0-based) of one source document.
///
/// Each source contributes a few sections written from consecutive chunks
/// of its text; the chunk is the only reference material the model sees.
pub fn section_prompt(
    query: &str,
    source_name: &str,
    chunk: &str,
    index: usize,
    image_listing: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Write section {} of a report on \"{query}\", based on the material below from \
         {source_name}.\n\n\
         SOURCE: {source_name}\n\
         MATERIAL\n{chunk}",
        index + 1
    );
    if let Some(listing) = image_listing.filter(|l| !l.trim().is_empty()) {
        prompt.push_str("\n\nAVAILABLE IMAGES\n");
        prompt.push_str(listing);
        prompt.push_str("\nPlace images where they fit, as {{image:img_N}}.");
    }
    prompt.push_str(
        "\n\nREQUIREMENTS\n\
         - Write several natural paragraphs grounded in the material\n\
         - Be specific and detailed; avoid vague description\n\
         - Keep a formal, academic register\n\
         - Cite technical details, data and examples from the material\n\
         - Cover everything the material contains\n\n",
    );
    prompt.push_str(FORMAT_RULES);
    prompt
}

/// Stitch per-source sections into one markdown report.
///
/// Layout: `# query`, an `## Overview` heading, then one `## name` heading
/// per source with its sections under `### 1`, `### 2`, ... Custom
/// instructions, when given, go under their own heading before the
/// overview.
pub fn combine_sections(
    query: &str,
    sources: &[(String, Vec<String>)],
    custom_instructions: Option<&str>,
) -> String {
    let mut out = format!("# {query}\n\n");
    if let Some(custom) = custom_instructions.filter(|c| !c.trim().is_empty()) {
        out.push_str(&format!("## Custom requirements\n\n{}\n\n", custom.trim()));
    }
    out.push_str("## Overview\n\n");
    for (name, sections) in sources {
        out.push_str(&format!("\n## {name}\n"));
        for (i, section) in sections.iter().enumerate() {
            out.push_str(&format!("\n### {}\n{}\n", i + 1, section));
        }
    }
    out
}

/// Build the prompt for a short template field such as "Design
/// requirements": two or three lines drawn from `material`.
pub fn field_prompt(title: &str, material: &str) -> String {
    format!(
        "Based on the material below, write {title} for this report in two or three \
         lines. Be brief and clear; no headings, lists or closing remarks.\n\n\
         MATERIAL\n{material}"
    )
}

/// Truncate `context` to at most `max_chars` characters, on a char boundary.
pub fn truncate_context(context: &str, max_chars: usize) -> &str {
    match context.char_indices().nth(max_chars) {
        Some((byte, _)) => &context[..byte],
        None => context,
    }
}
