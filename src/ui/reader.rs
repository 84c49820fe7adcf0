use std::io::{self, Write};
use std::sync::LazyLock;

use regex::Regex;

use super::{Style, Styler};
use crate::content::ReaderResult;
use crate::feed::try_parse_pub_date;
use crate::util::{
    collapse_whitespace, decode_entities, display_width, strip_control_chars, wrap_to_width,
};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>|[^<]+|<").unwrap()
});
static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']*)["']"#).unwrap());
static ALT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\balt\s*=\s*["']([^"']*)["']"#).unwrap());

/// A unit of reader content after HTML conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    ListItem(String),
    Quote(String),
    Image { src: String, alt: String },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Paragraph,
    Heading,
    ListItem,
}

struct BlockBuilder {
    blocks: Vec<Block>,
    text: String,
    kind: TextKind,
    quote_depth: usize,
    skip_depth: usize,
}

impl BlockBuilder {
    fn flush(&mut self) {
        let text = collapse_whitespace(&self.text);
        self.text.clear();
        if text.is_empty() {
            return;
        }
        let block = match self.kind {
            TextKind::Heading => Block::Heading(text),
            TextKind::ListItem => Block::ListItem(text),
            TextKind::Paragraph if self.quote_depth > 0 => Block::Quote(text),
            TextKind::Paragraph => Block::Paragraph(text),
        };
        self.blocks.push(block);
    }
}

/// Convert cleaned article HTML into text blocks.
///
/// Block-level tags end the current block; inline tags are dropped and
/// their text kept. Script and style bodies are skipped.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let mut b = BlockBuilder {
        blocks: Vec::new(),
        text: String::new(),
        kind: TextKind::Paragraph,
        quote_depth: 0,
        skip_depth: 0,
    };

    for caps in TOKEN.captures_iter(html) {
        let Some(name) = caps.get(2) else {
            let token = &caps[0];
            if b.skip_depth == 0 && !token.starts_with("<!--") {
                b.text.push_str(&decode_entities(token));
            }
            continue;
        };

        let closing = !caps[1].is_empty();
        let name = name.as_str().to_ascii_lowercase();

        if matches!(name.as_str(), "script" | "style" | "noscript") {
            if closing {
                b.skip_depth = b.skip_depth.saturating_sub(1);
            } else {
                b.skip_depth += 1;
            }
            continue;
        }
        if b.skip_depth > 0 {
            continue;
        }

        match (name.as_str(), closing) {
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", false) => {
                b.flush();
                b.kind = TextKind::Heading;
            }
            ("li", false) => {
                b.flush();
                b.kind = TextKind::ListItem;
            }
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li", true) => {
                b.flush();
                b.kind = TextKind::Paragraph;
            }
            ("blockquote", false) => {
                b.flush();
                b.quote_depth += 1;
            }
            ("blockquote", true) => {
                b.flush();
                b.quote_depth = b.quote_depth.saturating_sub(1);
            }
            ("img", _) => {
                let attrs = caps.get(3).map_or("", |m| m.as_str());
                let src = SRC_ATTR
                    .captures(attrs)
                    .map(|c| decode_entities(&c[1]).into_owned())
                    .unwrap_or_default();
                if !src.is_empty() {
                    b.flush();
                    let alt = ALT_ATTR
                        .captures(attrs)
                        .map(|c| collapse_whitespace(&decode_entities(&c[1])))
                        .unwrap_or_default();
                    b.blocks.push(Block::Image { src, alt });
                }
            }
            (
                "p" | "div" | "br" | "section" | "article" | "ul" | "ol" | "pre" | "figure"
                | "figcaption" | "table" | "tr" | "hr",
                _,
            ) => b.flush(),
            _ => {}
        }
    }

    b.flush();
    b.blocks
}

/// Render a reader result: header, optional error banner, then the body.
pub fn render_article<W: Write>(
    out: &mut W,
    result: &ReaderResult,
    styler: &Styler,
    width: usize,
) -> io::Result<()> {
    let palette = *styler.palette();
    let rule = "─".repeat(width.min(60));

    for line in wrap_to_width(&strip_control_chars(&result.title), width) {
        styler.write(out, &line, Style::fg(palette.title).bold())?;
        writeln!(out)?;
    }

    let mut meta: Vec<String> = Vec::new();
    if let Some(site) = &result.site_name {
        meta.push(strip_control_chars(site).into_owned());
    }
    if let Some(author) = &result.author {
        meta.push(format!("By {}", strip_control_chars(author)));
    }
    if let Some(date) = &result.published_date {
        meta.push(format_date(date));
    }
    if !meta.is_empty() {
        for line in wrap_to_width(&meta.join(" · "), width) {
            styler.write(out, &line, Style::fg(palette.meta))?;
            writeln!(out)?;
        }
    }
    if let Some(image) = &result.image_url {
        styler.write(
            out,
            &format!("Image: {}", strip_control_chars(image)),
            Style::fg(palette.link),
        )?;
        writeln!(out)?;
    }

    styler.write(out, &rule, Style::fg(palette.meta))?;
    writeln!(out)?;

    if !result.success {
        let reason = result
            .error
            .as_deref()
            .unwrap_or("Content extraction failed");
        styler.write(out, &format!("! {}", reason), Style::fg(palette.error).bold())?;
        writeln!(out)?;
        writeln!(out)?;
    }

    let body = strip_control_chars(&result.content);
    for (i, block) in html_to_blocks(&body).iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        write_block(out, block, styler, width)?;
    }

    Ok(())
}

fn write_block<W: Write>(out: &mut W, block: &Block, styler: &Styler, width: usize) -> io::Result<()> {
    let palette = *styler.palette();
    match block {
        Block::Heading(text) => {
            for line in wrap_to_width(text, width) {
                styler.write(out, &line, Style::fg(palette.title).bold())?;
                writeln!(out)?;
            }
        }
        Block::Paragraph(text) => {
            for line in wrap_to_width(text, width) {
                styler.write(out, &line, Style::fg(palette.body))?;
                writeln!(out)?;
            }
        }
        Block::ListItem(text) => write_prefixed(out, styler, text, "  • ", "    ", width, palette.body)?,
        Block::Quote(text) => write_prefixed(out, styler, text, "│ ", "│ ", width, palette.meta)?,
        Block::Image { src, alt } => {
            let label = if alt.is_empty() {
                format!("[Image] {}", src)
            } else {
                format!("[Image: {}] {}", alt, src)
            };
            styler.write(out, &label, Style::fg(palette.link))?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Wrapped text with `first` before the first line and `rest` before the others.
fn write_prefixed<W: Write>(
    out: &mut W,
    styler: &Styler,
    text: &str,
    first: &str,
    rest: &str,
    width: usize,
    color: crossterm::style::Color,
) -> io::Result<()> {
    let inner = width.saturating_sub(display_width(first)).max(10);
    for (i, line) in wrap_to_width(text, inner).iter().enumerate() {
        let prefix = if i == 0 { first } else { rest };
        write!(out, "{}", prefix)?;
        styler.write(out, line, Style::fg(color))?;
        writeln!(out)?;
    }
    Ok(())
}

/// `April 6, 2024` when the date parses, the raw value otherwise.
fn format_date(raw: &str) -> String {
    match try_parse_pub_date(raw) {
        Some(date) => date.format("%B %-d, %Y").to_string(),
        None => strip_control_chars(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(content: &str) -> ReaderResult {
        ReaderResult {
            title: "A headline".to_string(),
            content: content.to_string(),
            excerpt: String::new(),
            author: Some("Jane Doe".to_string()),
            published_date: Some("2024-04-06T09:02:55Z".to_string()),
            site_name: Some("example.com".to_string()),
            image_url: None,
            success: true,
            error: None,
        }
    }

    fn render(result: &ReaderResult, width: usize) -> String {
        let mut out = Vec::new();
        render_article(&mut out, result, &Styler::plain(), width).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_paragraphs_and_headings() {
        let blocks = html_to_blocks("<h2>Section</h2><p>First <b>bold</b> line.</p><p>Second</p>");
        assert_eq!(
            blocks,
            vec![
                Block::Heading("Section".to_string()),
                Block::Paragraph("First bold line.".to_string()),
                Block::Paragraph("Second".to_string()),
            ]
        );
    }

    #[test]
    fn test_lists_quotes_and_images() {
        let blocks = html_to_blocks(
            r#"<ul><li>One</li><li>Two &amp; three</li></ul>
               <blockquote><p>Quoted</p></blockquote>
               <img src="https://example.com/a.jpg" alt="A chart">"#,
        );
        assert_eq!(
            blocks,
            vec![
                Block::ListItem("One".to_string()),
                Block::ListItem("Two & three".to_string()),
                Block::Quote("Quoted".to_string()),
                Block::Image {
                    src: "https://example.com/a.jpg".to_string(),
                    alt: "A chart".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_br_splits_and_script_skipped() {
        let blocks = html_to_blocks("Line one<br>Line two<script>var x = '<p>';</script>");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph("Line one".to_string()),
                Block::Paragraph("Line two".to_string()),
            ]
        );
    }

    #[test]
    fn test_stray_angle_bracket_is_text() {
        let blocks = html_to_blocks("<p>1 < 2 is true</p>");
        assert_eq!(blocks, vec![Block::Paragraph("1 < 2 is true".to_string())]);
    }

    #[test]
    fn test_empty_html() {
        assert!(html_to_blocks("").is_empty());
        assert!(html_to_blocks("<div><p> </p></div>").is_empty());
    }

    #[test]
    fn test_render_header_and_wrapped_body() {
        let text = render(
            &result("<p>The quick brown fox jumps over the lazy dog.</p>"),
            20,
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A headline");
        assert_eq!(lines[1], "example.com · By");
        assert_eq!(lines[2], "Jane Doe · April 6,");
        assert_eq!(lines[3], "2024");
        assert_eq!(lines[4], "─".repeat(20));
        assert_eq!(lines[5], "The quick brown fox");
        assert_eq!(lines[6], "jumps over the lazy");
        assert_eq!(lines[7], "dog.");
    }

    #[test]
    fn test_render_fallback_banner() {
        let mut fallback = result("<p>Read it on the site.</p>");
        fallback.success = false;
        fallback.error = Some("Content extraction temporarily unavailable".to_string());

        let text = render(&fallback, 80);
        assert!(text.contains("! Content extraction temporarily unavailable"));
        assert!(text.contains("Read it on the site."));
    }

    #[test]
    fn test_list_item_hanging_indent() {
        let text = render(&result("<ul><li>alpha beta gamma delta epsilon</li></ul>"), 20);
        let body: Vec<&str> = text.lines().skip_while(|l| !l.starts_with('─')).skip(1).collect();
        assert_eq!(body, vec!["  • alpha beta gamma", "    delta epsilon"]);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-04-06T09:02:55Z"), "April 6, 2024");
        assert_eq!(format_date("last Tuesday"), "last Tuesday");
    }
}
