//! Source colors and the light/dark theme.
//!
//! Every source gets a stable accent color: known sources have a fixed
//! entry, anything else is hashed into [`COLOR_PALETTE`]. `ThemeVariant`
//! selects the `ColorPalette` used for the rest of the output.

use crossterm::style::Color;

// ============================================================================
// Theme Variant
// ============================================================================

/// Available theme variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeVariant {
    #[default]
    Light,
    Dark,
}

impl ThemeVariant {
    /// Parse a variant name (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// Build the `ColorPalette` for this variant.
    pub fn palette(self) -> ColorPalette {
        match self {
            Self::Light => ColorPalette::light(),
            Self::Dark => ColorPalette::dark(),
        }
    }

    /// Light → Dark → Light.
    pub fn toggle(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// Stored and displayed name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl std::fmt::Display for ThemeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Color Palette
// ============================================================================

/// Terminal colors for each semantic role in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPalette {
    pub title: Color,
    pub meta: Color,
    pub body: Color,
    pub link: Color,
    pub saved_marker: Color,
    pub ignored_marker: Color,
    pub error: Color,
    pub selected: Color,
}

impl ColorPalette {
    /// For terminals with a light background.
    fn light() -> Self {
        Self {
            title: Color::Black,
            meta: Color::DarkGrey,
            body: Color::Reset,
            link: Color::DarkBlue,
            saved_marker: Color::DarkYellow,
            ignored_marker: Color::DarkGrey,
            error: Color::DarkRed,
            selected: Color::DarkGreen,
        }
    }

    /// For terminals with a dark background.
    fn dark() -> Self {
        Self {
            title: Color::White,
            meta: Color::Grey,
            body: Color::Reset,
            link: Color::Cyan,
            saved_marker: Color::Yellow,
            ignored_marker: Color::DarkGrey,
            error: Color::Red,
            selected: Color::Green,
        }
    }
}

// ============================================================================
// Source Colors
// ============================================================================

/// Accent colors for sources without a fixed entry.
pub const COLOR_PALETTE: [&str; 12] = [
    "#667eea", // purple-blue
    "#10b981", // emerald
    "#f59e0b", // amber
    "#ef4444", // red
    "#8b5cf6", // violet
    "#06b6d4", // cyan
    "#f97316", // orange
    "#84cc16", // lime
    "#ec4899", // pink
    "#6366f1", // indigo
    "#14b8a6", // teal
    "#eab308", // yellow
];

const KNOWN_SOURCES: &[(&str, &str)] = &[
    ("BBC News", "#667eea"),
    ("Hacker News", "#10b981"),
    ("The Guardian", "#f59e0b"),
    ("Dev.to", "#ef4444"),
    ("NASA News", "#8b5cf6"),
    ("Al Jazeera", "#06b6d4"),
    ("La Vanguardia", "#f97316"),
    ("RAC1", "#84cc16"),
    ("Mundo Deportivo", "#ec4899"),
];

/// Accent color (`#rrggbb`) for a source name.
///
/// Known sources map to fixed colors so the default feeds never collide;
/// other names are hashed case-insensitively, so the same name always gets
/// the same color across runs and platforms.
pub fn source_color(source_name: &str) -> &'static str {
    if let Some((_, color)) = KNOWN_SOURCES.iter().find(|(name, _)| *name == source_name) {
        return color;
    }
    COLOR_PALETTE[palette_index(source_name)]
}

/// Index into [`COLOR_PALETTE`] for an unknown source.
///
/// A shift-add accumulate over the UTF-16 code units of the lower-cased
/// name, followed by the murmur3 finalizer. The arithmetic follows
/// ECMAScript number semantics exactly: the accumulator and the two
/// multiplications are IEEE doubles, and every bitwise step first
/// truncates to 32 bits.
fn palette_index(source_name: &str) -> usize {
    let lowered = source_name.to_lowercase();

    let mut hash = 0.0_f64;
    for unit in lowered.encode_utf16() {
        let shifted = to_int32(hash).wrapping_shl(5);
        hash = f64::from(shifted) + hash + f64::from(unit);
    }

    let mut h = to_int32(hash) ^ (to_uint32(hash) >> 16) as i32;
    let product = f64::from(h) * f64::from(0x85eb_ca6b_u32);
    h = to_int32(product) ^ (to_uint32(product) >> 13) as i32;
    let product = f64::from(h) * f64::from(0xc2b2_ae35_u32);
    h = to_int32(product) ^ (to_uint32(product) >> 16) as i32;

    (i64::from(h).unsigned_abs() % COLOR_PALETTE.len() as u64) as usize
}

/// ECMAScript `ToUint32`.
fn to_uint32(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    let modulus = 4_294_967_296.0_f64;
    let mut r = value.trunc() % modulus;
    if r < 0.0 {
        r += modulus;
    }
    r as u32
}

/// ECMAScript `ToInt32`.
fn to_int32(value: f64) -> i32 {
    to_uint32(value) as i32
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.trim_start_matches('#').get(..6)?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// `#rrggbb` to a terminal RGB color.
pub fn hex_to_color(color: &str) -> Option<Color> {
    parse_hex(color).map(|(r, g, b)| Color::Rgb { r, g, b })
}

/// Each channel brightened by 20 %, clamped at 255.
///
/// Input that is not `#rrggbb` is returned unchanged.
pub fn lighter_color(color: &str) -> String {
    let Some((r, g, b)) = parse_hex(color) else {
        return color.to_string();
    };
    let lift = |c: u8| (f64::from(c) * 1.2).round().min(255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", lift(r), lift(g), lift(b))
}

/// Whether text on this background should be dark (perceived luma > 0.5).
pub fn is_light_color(color: &str) -> bool {
    match parse_hex(color) {
        Some((r, g, b)) => {
            let luminance =
                (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0;
            luminance > 0.5
        }
        None => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
