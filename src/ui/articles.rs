use std::io::{self, Write};

use chrono::{DateTime, Utc};
use crossterm::style::Color;

use super::{Style, Styler};
use crate::feed::NewsItem;
use crate::theme::{hex_to_color, is_light_color, source_color};
use crate::util::{format_relative, strip_control_chars, truncate_to_width};

/// Indent of the lines under each entry's header.
const INDENT: &str = "     ";

/// One row of a listing.
#[derive(Debug, Clone, Copy)]
pub struct ListEntry<'a> {
    /// 1-based number the user passes to `read`, `save` and friends.
    pub number: usize,
    pub item: &'a NewsItem,
    pub saved: bool,
    pub ignored: bool,
}

/// Render the article list.
///
/// Each entry is a header line (number, source tag, relative date, author,
/// markers), then the title, description and link, each cut to `width`.
pub fn render_articles<W: Write>(
    out: &mut W,
    entries: &[ListEntry<'_>],
    styler: &Styler,
    width: usize,
    now: DateTime<Utc>,
) -> io::Result<()> {
    let palette = *styler.palette();
    let body_width = width.saturating_sub(INDENT.len()).max(10);

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        let item = entry.item;

        styler.write(out, &format!("{:>3}. ", entry.number), Style::fg(palette.meta))?;
        write_source_tag(out, styler, &item.source_name)?;

        let mut meta = format!(" {}", format_relative(item.pub_date, now));
        if let Some(author) = &item.author {
            meta.push_str(" · ");
            meta.push_str(&strip_control_chars(author));
        }
        styler.write(out, &meta, Style::fg(palette.meta))?;

        if entry.saved {
            styler.write(out, " [saved]", Style::fg(palette.saved_marker).bold())?;
        }
        if entry.ignored {
            styler.write(out, " [ignored]", Style::fg(palette.ignored_marker))?;
        }
        writeln!(out)?;

        let title = strip_control_chars(&item.title);
        out.write_all(INDENT.as_bytes())?;
        styler.write(
            out,
            &truncate_to_width(&title, body_width),
            Style::fg(palette.title).bold(),
        )?;
        writeln!(out)?;

        let description = strip_control_chars(&item.description);
        if !description.trim().is_empty() {
            out.write_all(INDENT.as_bytes())?;
            styler.write(
                out,
                &truncate_to_width(description.trim(), body_width),
                Style::fg(palette.body),
            )?;
            writeln!(out)?;
        }

        if !item.link.is_empty() {
            out.write_all(INDENT.as_bytes())?;
            styler.write(
                out,
                &truncate_to_width(&strip_control_chars(&item.link), body_width),
                Style::fg(palette.link),
            )?;
            writeln!(out)?;
        }
    }

    Ok(())
}

/// `[Source]` on the source's accent color, with black or white text
/// depending on which reads better.
pub(crate) fn write_source_tag<W: Write>(
    out: &mut W,
    styler: &Styler,
    source_name: &str,
) -> io::Result<()> {
    let accent = source_color(source_name);
    let text_color = if is_light_color(accent) {
        Color::Black
    } else {
        Color::White
    };
    let style = Style {
        fg: Some(text_color),
        bg: hex_to_color(accent),
        bold: true,
    };
    let name = strip_control_chars(source_name);
    if styler.color_enabled() {
        styler.write(out, &format!(" {} ", name), style)
    } else {
        write!(out, "[{}]", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeVariant;
    use chrono::Duration;

    fn item() -> NewsItem {
        NewsItem {
            title: "Markets rally after rate decision".to_string(),
            link: "https://example.com/markets".to_string(),
            description: "Stocks rose sharply on Thursday.".to_string(),
            pub_date: Utc::now(),
            author: Some("Jane Doe".to_string()),
            source: "https://example.com/rss".to_string(),
            source_name: "BBC News".to_string(),
            image: None,
            categories: Vec::new(),
        }
    }

    fn render(entries: &[ListEntry<'_>], styler: &Styler, width: usize) -> String {
        let mut out = Vec::new();
        let now = entries
            .first()
            .map(|e| e.item.pub_date + Duration::minutes(5))
            .unwrap_or_else(Utc::now);
        render_articles(&mut out, entries, styler, width, now).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain_entry_layout() {
        let item = item();
        let text = render(
            &[ListEntry {
                number: 3,
                item: &item,
                saved: true,
                ignored: false,
            }],
            &Styler::plain(),
            80,
        );

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "  3. [BBC News] 5 minutes ago · Jane Doe [saved]");
        assert_eq!(lines[1], "     Markets rally after rate decision");
        assert_eq!(lines[2], "     Stocks rose sharply on Thursday.");
        assert_eq!(lines[3], "     https://example.com/markets");
    }

    #[test]
    fn test_title_truncated_to_width() {
        let item = item();
        let text = render(
            &[ListEntry {
                number: 1,
                item: &item,
                saved: false,
                ignored: true,
            }],
            &Styler::plain(),
            25,
        );

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with("[ignored]"));
        assert_eq!(lines[1], "     Markets rally aft...");
    }

    #[test]
    fn test_control_characters_are_stripped() {
        let mut item = item();
        item.title = "Evil\x1b[2J title".to_string();
        let text = render(
            &[ListEntry {
                number: 1,
                item: &item,
                saved: false,
                ignored: false,
            }],
            &Styler::plain(),
            80,
        );
        assert!(!text.contains('\x1b'));
        assert!(text.contains("Evil title"));
    }

    #[test]
    fn test_colored_source_tag() {
        let mut out = Vec::new();
        write_source_tag(&mut out, &Styler::new(ThemeVariant::Dark, true), "Hacker News").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(" Hacker News "));
        assert!(text.contains('\x1b'));
    }

    #[test]
    fn test_entries_separated_by_blank_line() {
        let a = item();
        let mut b = item();
        b.description = String::new();
        let text = render(
            &[
                ListEntry {
                    number: 1,
                    item: &a,
                    saved: false,
                    ignored: false,
                },
                ListEntry {
                    number: 2,
                    item: &b,
                    saved: false,
                    ignored: false,
                },
            ],
            &Styler::plain(),
            80,
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[4], "");
        assert!(lines[5].starts_with("  2. "));
        // No description line for the second entry.
        assert_eq!(lines[7], "     https://example.com/markets");
    }
}
