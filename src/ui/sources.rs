use std::io::{self, Write};

use super::articles::write_source_tag;
use super::{Style, Styler};
use crate::feed::FeedSource;
use crate::util::strip_control_chars;

/// Render the available sources with selection markers.
///
/// An empty selection shows every source, which the footer points out.
pub fn render_sources<W: Write>(
    out: &mut W,
    available: &[String],
    selected: &[String],
    styler: &Styler,
) -> io::Result<()> {
    let palette = *styler.palette();

    if available.is_empty() {
        styler.write(out, "No sources available yet. Run `list` first.", Style::fg(palette.meta))?;
        writeln!(out)?;
        return Ok(());
    }

    for source in available {
        let is_selected = selected.iter().any(|s| s == source);
        let marker = if is_selected { "[x] " } else { "[ ] " };
        let style = if is_selected {
            Style::fg(palette.selected).bold()
        } else {
            Style::fg(palette.meta)
        };
        styler.write(out, marker, style)?;
        write_source_tag(out, styler, source)?;
        writeln!(out)?;
    }

    // Selected sources that no longer appear in the listing.
    for source in selected.iter().filter(|s| !available.contains(s)) {
        styler.write(out, "[x] ", Style::fg(palette.selected).bold())?;
        write_source_tag(out, styler, source)?;
        styler.write(out, " (no current articles)", Style::fg(palette.meta))?;
        writeln!(out)?;
    }

    writeln!(out)?;
    let footer = if selected.is_empty() {
        "No filter active: showing all sources.".to_string()
    } else {
        format!("{} of {} sources selected.", selected.len(), available.len())
    };
    styler.write(out, &footer, Style::fg(palette.meta))?;
    writeln!(out)?;
    Ok(())
}

/// Render the configured feed list, numbered, with category and URL.
pub fn render_feeds<W: Write>(out: &mut W, feeds: &[FeedSource], styler: &Styler) -> io::Result<()> {
    let palette = *styler.palette();

    if feeds.is_empty() {
        styler.write(out, "No feeds configured.", Style::fg(palette.meta))?;
        writeln!(out)?;
        return Ok(());
    }

    for (i, feed) in feeds.iter().enumerate() {
        styler.write(out, &format!("{:>3}. ", i + 1), Style::fg(palette.meta))?;
        styler.write(out, &strip_control_chars(&feed.name), Style::fg(palette.title).bold())?;
        if let Some(category) = &feed.category {
            styler.write(
                out,
                &format!(" ({})", strip_control_chars(category)),
                Style::fg(palette.meta),
            )?;
        }
        writeln!(out)?;
        write!(out, "     ")?;
        styler.write(out, &strip_control_chars(&feed.url), Style::fg(palette.link))?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render_sources_plain(available: &[&str], selected: &[&str]) -> String {
        let available: Vec<String> = available.iter().map(|s| s.to_string()).collect();
        let selected: Vec<String> = selected.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        render_sources(&mut out, &available, &selected, &Styler::plain()).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_sources_with_selection() {
        let text = render_sources_plain(&["Al Jazeera", "BBC News"], &["BBC News"]);
        assert_eq!(
            text,
            "[ ] [Al Jazeera]\n[x] [BBC News]\n\n1 of 2 sources selected.\n"
        );
    }

    #[test]
    fn test_sources_without_selection() {
        let text = render_sources_plain(&["BBC News"], &[]);
        assert!(text.ends_with("No filter active: showing all sources.\n"));
    }

    #[test]
    fn test_stale_selection_is_listed() {
        let text = render_sources_plain(&["BBC News"], &["Gone Feed"]);
        assert!(text.contains("[x] [Gone Feed] (no current articles)"));
    }

    #[test]
    fn test_feeds_list() {
        let feeds = vec![
            FeedSource::new("BBC News", "https://feeds.bbci.co.uk/news/rss.xml", None),
            FeedSource::new("Dev.to", "https://dev.to/feed", Some("Tech")),
        ];
        let mut out = Vec::new();
        render_feeds(&mut out, &feeds, &Styler::plain()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "  1. BBC News\n     https://feeds.bbci.co.uk/news/rss.xml\n  2. Dev.to (Tech)\n     https://dev.to/feed\n"
        );
    }

    #[test]
    fn test_empty_feeds() {
        let mut out = Vec::new();
        render_feeds(&mut out, &[], &Styler::plain()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No feeds configured.\n");
    }
}
