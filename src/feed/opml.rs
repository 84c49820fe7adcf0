//! OPML import and export of feed lists.
//!
//! Folder outlines (those without `xmlUrl`) become the `category` of the
//! feeds nested inside them; on export, feeds are grouped back into folders.

use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use super::types::FeedSource;
use crate::util::validate_url;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
const MAX_OPML_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Failed to read OPML file: {0}")]
    Io(#[from] std::io::Error),
}

/// What an `<outline>` element turned out to be.
enum Outline {
    Feed(FeedSource),
    Folder(String),
    /// Feed with a rejected URL, or an outline with neither URL nor label
    Skipped,
}

/// Reads an OPML file and returns the feeds it lists.
///
/// Feeds with invalid URLs (localhost, private IPs, non-HTTP schemes) are
/// skipped with a warning.
///
/// # Security
///
/// - XXE is mitigated because `quick-xml` (0.37) does not parse `<!ENTITY>`
///   declarations; custom entities fail with `EscapeError::UnrecognizedEntity`.
/// - URLs are validated to prevent SSRF against localhost and private networks.
pub async fn import_file(path: &Path) -> Result<Vec<FeedSource>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read OPML file: {}", path.display()))?;
    parse_opml_content(&content)
}

/// Parses OPML text into feed sources.
pub fn parse_opml_content(content: &str) -> Result<Vec<FeedSource>> {
    // SEC-002: only the five XML builtin entities are ever resolved by
    // `decode_and_unescape_value()`; DOCTYPE entity declarations are ignored.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    // One entry per open <outline>; folders carry their label.
    let mut open: Vec<Option<String>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                if open.len() >= MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH).into());
                }
                let category = current_category(&open);
                match parse_outline(&e, &reader, category)? {
                    Outline::Feed(feed) => {
                        feeds.push(feed);
                        open.push(None);
                    }
                    Outline::Folder(label) => open.push(Some(label)),
                    Outline::Skipped => open.push(None),
                }
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                let category = current_category(&open);
                if let Outline::Feed(feed) = parse_outline(&e, &reader, category)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                open.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string()).into()),
            _ => {}
        }
    }

    Ok(feeds)
}

fn current_category(open: &[Option<String>]) -> Option<&str> {
    open.iter().rev().find_map(|label| label.as_deref())
}

fn parse_outline(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    category: Option<&str>,
) -> Result<Outline> {
    let mut xml_url = None;
    let mut title = None;
    let mut text = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = || attr.decode_and_unescape_value(reader.decoder());
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = Some(value()?.trim().to_string()),
            b"title" => title = Some(value()?.trim().to_string()),
            b"text" => text = Some(value()?.trim().to_string()),
            _ => {}
        }
    }

    let label = title.or(text).filter(|l| !l.is_empty());

    let Some(url) = xml_url else {
        return Ok(label.map_or(Outline::Skipped, Outline::Folder));
    };

    match validate_url(&url) {
        Ok(_) => Ok(Outline::Feed(FeedSource {
            name: label.unwrap_or_else(|| url.clone()),
            url,
            category: category.map(str::to_string),
        })),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL");
            Ok(Outline::Skipped)
        }
    }
}

/// Renders feeds as an OPML 2.0 document.
///
/// Uncategorized feeds sit directly under `<body>`; the rest are grouped in
/// one folder per category, in order of first appearance.
pub fn export_opml(feeds: &[FeedSource]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    writer
        .write_event(Event::Start(opml))
        .context("Failed to write opml element")?;

    for event in [
        Event::Start(BytesStart::new("head")),
        Event::Start(BytesStart::new("title")),
        Event::Text(BytesText::new("newsdesk feeds")),
        Event::End(BytesEnd::new("title")),
        Event::End(BytesEnd::new("head")),
    ] {
        writer
            .write_event(event)
            .context("Failed to write head element")?;
    }

    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .context("Failed to write body element")?;

    for feed in feeds.iter().filter(|f| f.category.is_none()) {
        write_feed_outline(&mut writer, feed)?;
    }

    let mut categories: Vec<&str> = Vec::new();
    for category in feeds.iter().filter_map(|f| f.category.as_deref()) {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    for category in categories {
        let mut folder = BytesStart::new("outline");
        folder.push_attribute(("text", category));
        folder.push_attribute(("title", category));
        writer
            .write_event(Event::Start(folder))
            .context("Failed to write category outline")?;
        for feed in feeds
            .iter()
            .filter(|f| f.category.as_deref() == Some(category))
        {
            write_feed_outline(&mut writer, feed)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("outline")))
            .context("Failed to close category outline")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .context("Failed to write body end")?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .context("Failed to write opml end")?;

    String::from_utf8(writer.into_inner()).context("Generated OPML contains invalid UTF-8")
}

fn write_feed_outline(writer: &mut Writer<Vec<u8>>, feed: &FeedSource) -> Result<()> {
    let mut outline = BytesStart::new("outline");
    outline.push_attribute(("type", "rss"));
    outline.push_attribute(("text", feed.name.as_str()));
    outline.push_attribute(("title", feed.name.as_str()));
    outline.push_attribute(("xmlUrl", feed.url.as_str()));
    writer
        .write_event(Event::Empty(outline))
        .context("Failed to write outline element")?;
    Ok(())
}

/// Writes the OPML export to `path` atomically.
///
/// The document goes to a temporary sibling file that is synced and then
/// renamed over the destination, so a crash never leaves a partial file.
pub fn export_to_file(feeds: &[FeedSource], path: &Path) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let content = export_opml(feeds)?;

    // SEC-009: Randomized temp filename to prevent TOCTOU race conditions
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let write_temp = || -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temporary file '{}'", temp_path.display()))?;
        std::io::Write::write_all(&mut file, content.as_bytes())
            .with_context(|| format!("Failed to write OPML to '{}'", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync '{}' to disk", temp_path.display()))?;
        std::fs::rename(&temp_path, path).with_context(|| {
            format!(
                "Failed to rename '{}' to '{}'",
                temp_path.display(),
                path.display()
            )
        })
    };

    write_temp().inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}
