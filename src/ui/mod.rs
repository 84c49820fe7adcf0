//! Terminal output.
//!
//! Everything renders to an `impl Write` so commands can target stdout and
//! tests can target a buffer. ANSI styling goes through [`Styler`], which
//! writes plain text when color is off.
//!
//! # Module Structure
//!
//! - `articles` - article listing
//! - `reader` - reader view, including HTML-to-text conversion
//! - `sources` - source selection and feed list

mod articles;
pub mod reader;
mod sources;

use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};

use crate::theme::{ColorPalette, ThemeVariant};

pub use articles::{render_articles, ListEntry};
pub use reader::render_article;
pub use sources::{render_feeds, render_sources};

/// Fallback when the terminal size is unknown (piped output).
const DEFAULT_WIDTH: usize = 80;
const MIN_WIDTH: usize = 20;

/// Current terminal width in columns.
pub fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(w, _)| w as usize)
        .unwrap_or(DEFAULT_WIDTH)
        .max(MIN_WIDTH)
}

/// Applies theme colors to output, or nothing when color is disabled.
#[derive(Debug, Clone, Copy)]
pub struct Styler {
    color: bool,
    palette: ColorPalette,
}

/// A text style: optional colors plus bold.
#[derive(Debug, Clone, Copy, Default)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Style {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Default::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

impl Styler {
    pub fn new(theme: ThemeVariant, color: bool) -> Self {
        Self {
            color,
            palette: theme.palette(),
        }
    }

    /// No escape sequences at all.
    pub fn plain() -> Self {
        Self::new(ThemeVariant::default(), false)
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    /// Writes `text` in `style`, resetting afterwards.
    pub fn write<W: Write>(&self, out: &mut W, text: &str, style: Style) -> io::Result<()> {
        if !self.color || (style.fg.is_none() && style.bg.is_none() && !style.bold) {
            return write!(out, "{}", text);
        }
        if let Some(fg) = style.fg {
            queue!(out, SetForegroundColor(fg))?;
        }
        if let Some(bg) = style.bg {
            queue!(out, SetBackgroundColor(bg))?;
        }
        if style.bold {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        queue!(out, Print(text), SetAttribute(Attribute::Reset), ResetColor)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_writes_no_escapes() {
        let mut out = Vec::new();
        Styler::plain()
            .write(&mut out, "hello", Style::fg(Color::Red).bold())
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello");
    }

    #[test]
    fn test_color_writes_escapes() {
        let mut out = Vec::new();
        Styler::new(ThemeVariant::Dark, true)
            .write(&mut out, "hello", Style::fg(Color::Red))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains('\x1b'));
    }

    #[test]
    fn test_unstyled_text_has_no_escapes_even_with_color() {
        let mut out = Vec::new();
        Styler::new(ThemeVariant::Light, true)
            .write(&mut out, "hello", Style::default())
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello");
    }
}
