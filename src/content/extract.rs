//! Heuristic article extraction from raw HTML.
//!
//! Every field is located by an ordered list of regular expressions; the
//! first pattern that matches wins. Nothing here touches the network.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

use super::ReaderResult;

const EXCERPT_LENGTH: usize = 200;
const MAX_FALLBACK_PARAGRAPHS: usize = 15;
const MIN_FALLBACK_PARAGRAPHS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Could not extract readable content")]
    NoReadableContent,
}

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
}

static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"(?i)<title[^>]*>([^<]+)</title>",
        r"(?i)<h1[^>]*>([^<]+)</h1>",
        r#"(?i)<meta property="og:title" content="([^"]+)""#,
        r#"(?i)<meta name="title" content="([^"]+)""#,
    ])
});

static AUTHOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r#"(?i)<meta name="author" content="([^"]+)""#,
        r#"(?i)<meta property="article:author" content="([^"]+)""#,
        r#"(?i)<span[^>]*class="[^"]*author[^"]*"[^>]*>([^<]+)<"#,
        r#"(?i)<div[^>]*class="[^"]*byline[^"]*"[^>]*>.*?by\s+([^<]+)<"#,
    ])
});

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r#"(?i)<meta property="article:published_time" content="([^"]+)""#,
        r#"(?i)<meta name="date" content="([^"]+)""#,
        r#"(?i)<time[^>]*datetime="([^"]+)""#,
        r#"(?i)<meta property="og:updated_time" content="([^"]+)""#,
    ])
});

static SITE_NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r#"(?i)<meta property="og:site_name" content="([^"]+)""#,
        r#"(?i)<meta name="application-name" content="([^"]+)""#,
    ])
});

static IMAGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r#"(?i)<meta property="og:image" content="([^"]+)""#,
        r#"(?i)<meta name="twitter:image" content="([^"]+)""#,
        r#"(?i)<link rel="image_src" href="([^"]+)""#,
    ])
});

static ARTICLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<article[^>]*>([\s\S]*?)</article>").unwrap());
static MAIN_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<main[^>]*>([\s\S]*?)</main>").unwrap());
static CONTENT_DIV_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r#"(?i)<div[^>]*class="[^"]*content[^"]*"[^>]*>([\s\S]*?)</div>"#,
        r#"(?i)<div[^>]*class="[^"]*article[^"]*"[^>]*>([\s\S]*?)</div>"#,
        r#"(?i)<div[^>]*class="[^"]*post[^"]*"[^>]*>([\s\S]*?)</div>"#,
        r#"(?i)<div[^>]*id="[^"]*content[^"]*"[^>]*>([\s\S]*?)</div>"#,
    ])
});
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p[^>]*>[\s\S]*?</p>").unwrap());

static SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script[^>]*>[\s\S]*?</script>").unwrap());
static STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<style[^>]*>[\s\S]*?</style>").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<!--[\s\S]*?-->").unwrap());
static CHROME_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(nav|header|footer|aside|form)[^>]*>").unwrap());
static AD_DIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div[^>]*class="[^"]*ad[^"]*"[^>]*>[\s\S]*?</div>"#).unwrap()
});
static SOCIAL_DIV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<div[^>]*class="[^"]*social[^"]*"[^>]*>[\s\S]*?</div>"#).unwrap()
});
static CLASS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<([^>]+)\s+class="[^"]*"([^>]*)>"#).unwrap());
static ID_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<([^>]+)\s+id="[^"]*"([^>]*)>"#).unwrap());
static STYLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<([^>]+)\s+style="[^"]*"([^>]*)>"#).unwrap());
static SPACE_BEFORE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+>").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static TRAILING_PARTIAL_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\S*$").unwrap());

fn first_capture<'h>(patterns: &[Regex], html: &'h str) -> Option<&'h str> {
    patterns.iter().find_map(|p| {
        p.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
    })
}

/// Builds a successful [`ReaderResult`] from a page's HTML.
///
/// # Arguments
///
/// * `html` - The page as returned by a provider
/// * `original_url` - The article URL, for the site name and image base
///
/// # Errors
///
/// Returns `ExtractError::NoReadableContent` when neither a title nor any
/// main content could be found. A missing title alone becomes `"Article"`.
pub fn extract_from_html(html: &str, original_url: &str) -> Result<ReaderResult, ExtractError> {
    let title = extract_title(html);
    let content = extract_main_content(html);

    if title.is_empty() && content.is_empty() {
        return Err(ExtractError::NoReadableContent);
    }

    Ok(ReaderResult {
        title: if title.is_empty() {
            "Article".to_string()
        } else {
            title
        },
        excerpt: create_excerpt(&content, EXCERPT_LENGTH),
        content,
        author: extract_author(html),
        published_date: extract_published_date(html),
        site_name: extract_site_name(html, original_url),
        image_url: extract_main_image(html, original_url),
        success: true,
        error: None,
    })
}

/// Page title, or an empty string when no pattern matched.
pub fn extract_title(html: &str) -> String {
    first_capture(&TITLE_PATTERNS, html)
        .map(clean_text)
        .unwrap_or_default()
}

/// Byline from the author meta tags, an element whose class mentions
/// `author`, or the name after "by" in a `byline` block, whichever matches
/// first.
///
/// # Arguments
///
/// * `html` - Page HTML
///
/// # Returns
///
/// The entity-decoded, whitespace-collapsed author, or `None` when no
/// pattern matched.
pub fn extract_author(html: &str) -> Option<String> {
    first_capture(&AUTHOR_PATTERNS, html).map(clean_text)
}

/// Publication date exactly as the page states it.
pub fn extract_published_date(html: &str) -> Option<String> {
    first_capture(&DATE_PATTERNS, html).map(str::to_string)
}

/// Declared site name, else the article host without its first `www.`.
pub fn extract_site_name(html: &str, original_url: &str) -> Option<String> {
    if let Some(name) = first_capture(&SITE_NAME_PATTERNS, html) {
        return Some(clean_text(name));
    }
    Url::parse(original_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.replacen("www.", "", 1)))
}

/// Lead image URL.
///
/// Values starting with `http` are kept as is and values starting with `/`
/// are resolved against the article URL; anything else moves on to the next
/// pattern. Resolution follows URL rules rather than joining strings, so
/// `//cdn.example.com/i.png` takes the article's scheme and dot segments
/// are normalised.
///
/// # Arguments
///
/// * `html` - Page HTML
/// * `original_url` - The article URL, used as the base for relative values
///
/// # Returns
///
/// `None` when no pattern yields a usable value, or when a relative value
/// cannot be resolved because `original_url` does not parse.
pub fn extract_main_image(html: &str, original_url: &str) -> Option<String> {
    for pattern in IMAGE_PATTERNS.iter() {
        let Some(image_url) = pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            continue;
        };

        if image_url.starts_with("http") {
            return Some(image_url.to_string());
        }
        if image_url.starts_with('/') {
            return Url::parse(original_url)
                .and_then(|base| base.join(image_url))
                .ok()
                .map(String::from);
        }
    }
    None
}

/// Locates the article body and returns it as cleaned HTML.
///
/// Tries `<article>`, then `<main>`, then the first content-like `<div>`,
/// and finally the first paragraphs of the page when there are more than
/// three of them.
pub fn extract_main_content(html: &str) -> String {
    let block = if let Some(c) = ARTICLE_BLOCK.captures(html) {
        c.get(1).map_or(String::new(), |m| m.as_str().to_string())
    } else if let Some(c) = MAIN_BLOCK.captures(html) {
        c.get(1).map_or(String::new(), |m| m.as_str().to_string())
    } else {
        let div = CONTENT_DIV_PATTERNS
            .iter()
            .find_map(|p| p.captures(html))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        if div.is_empty() {
            let paragraphs: Vec<&str> = PARAGRAPH.find_iter(html).map(|m| m.as_str()).collect();
            if paragraphs.len() > MIN_FALLBACK_PARAGRAPHS {
                paragraphs[..paragraphs.len().min(MAX_FALLBACK_PARAGRAPHS)].join("\n")
            } else {
                String::new()
            }
        } else {
            div
        }
    };

    if block.is_empty() {
        String::new()
    } else {
        clean_html_preserve_formatting(&block)
    }
}

/// Strips scripts, styles, comments, page chrome, ad/social blocks and
/// presentational attributes, keeping the remaining markup.
pub fn clean_html_preserve_formatting(html: &str) -> String {
    let html = SCRIPT.replace_all(html, "");
    let html = STYLE.replace_all(&html, "");
    let html = COMMENT.replace_all(&html, "");
    let html = remove_chrome_blocks(&html);
    let html = AD_DIV.replace_all(&html, "");
    let html = SOCIAL_DIV.replace_all(&html, "");
    let html = CLASS_ATTR.replace_all(&html, "<${1}${2}>");
    let html = ID_ATTR.replace_all(&html, "<${1}${2}>");
    let html = STYLE_ATTR.replace_all(&html, "<${1}${2}>");
    let html = SPACE_BEFORE_CLOSE.replace_all(&html, ">");
    let html = BLANK_LINES.replace_all(&html, "\n");
    WHITESPACE.replace_all(&html, " ").trim().to_string()
}

/// Removes `<nav>`, `<header>`, `<footer>`, `<aside>` and `<form>` blocks up to
/// the first matching close tag. An opening tag without a close is kept.
fn remove_chrome_blocks(html: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    let mut search_from = 0;

    while let Some(caps) = CHROME_OPEN.captures_at(html, search_from) {
        let (Some(open), Some(tag)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let close = format!("</{}>", tag.as_str().to_ascii_lowercase());

        match lower[open.end()..].find(&close) {
            Some(offset) => {
                out.push_str(&html[pos..open.start()]);
                pos = open.end() + offset + close.len();
                search_from = pos;
            }
            // `<` is one byte, so the next search stays on a char boundary
            None => search_from = open.start() + 1,
        }
    }

    out.push_str(&html[pos..]);
    out
}

/// Decodes the handful of entities that show up in titles and meta tags,
/// then collapses whitespace.
pub fn clean_text(text: &str) -> String {
    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/");
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Plain-text preview of `content`, cut at a word boundary.
///
/// When longer than `max_length` characters the text is cut to that length,
/// the trailing partial word is dropped and `...` appended.
///
/// # Examples
///
/// ```
/// use newsdesk::content::extract::create_excerpt;
///
/// assert_eq!(create_excerpt("<p>Short</p>", 200), "Short");
/// ```
pub fn create_excerpt(content: &str, max_length: usize) -> String {
    if content.is_empty() {
        return String::new();
    }

    let text = TAG.replace_all(content, " ");
    let cleaned = WHITESPACE.replace_all(&text, " ").trim().to_string();

    match cleaned.char_indices().nth(max_length) {
        None => cleaned,
        Some((cut, _)) => {
            let head = TRAILING_PARTIAL_WORD.replace(&cleaned[..cut], "");
            format!("{head}...")
        }
    }
}
