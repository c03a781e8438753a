//! Color references and the resolver that turns them into a single display color.
//!
//! Workbook parts encode colors in several competing ways: a direct RGB value, an index into a
//! fixed legacy palette, an index into the theme palette plus a tint, or a DrawingML preset name.
//! Any of these may additionally carry a luminance modulation/offset pair. [`resolve_color`]
//! collapses all of them into one [`Color`].

use core::fmt;

use serde::{Deserialize, Serialize};

/// An opaque RGB display color, stored as `0xRRGGBB`.
///
/// Serialized as `#RRGGBB`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xFFFFFF);

    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[inline]
    pub const fn from_u32(rgb: u32) -> Self {
        Self(rgb & 0x00FF_FFFF)
    }

    #[inline]
    pub const fn rgb(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn channels(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// Parse `RGB`, `RRGGBB` or `AARRGGBB` hex, with or without a leading `#`.
    ///
    /// An alpha prefix is stripped rather than applied.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            3 => {
                let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
                u32::from_str_radix(&expanded, 16).ok().map(Self::from_u32)
            }
            6 | 8 => u32::from_str_radix(hex, 16).ok().map(Self::from_u32),
            _ => None,
        }
    }

    /// `#RRGGBB`, upper-case.
    pub fn to_hex(self) -> String {
        format!("#{:06X}", self.0)
    }

    /// `FFRRGGBB`, the opaque ARGB form used inside workbook parts.
    pub fn to_argb_hex(self) -> String {
        format!("FF{:06X}", self.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color `{value}`"))
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

/// A fill or stroke paint: either a color or explicitly nothing.
///
/// Serialized as `"transparent"` or `#RRGGBB`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Paint {
    Transparent,
    Solid(Color),
}

impl Paint {
    pub fn color(self) -> Option<Color> {
        match self {
            Paint::Transparent => None,
            Paint::Solid(c) => Some(c),
        }
    }

    pub fn is_transparent(self) -> bool {
        matches!(self, Paint::Transparent)
    }
}

impl From<Color> for Paint {
    fn from(value: Color) -> Self {
        Paint::Solid(value)
    }
}

impl TryFrom<String> for Paint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("transparent") {
            return Ok(Paint::Transparent);
        }
        Color::try_from(value).map(Paint::Solid)
    }
}

impl From<Paint> for String {
    fn from(value: Paint) -> Self {
        match value {
            Paint::Transparent => "transparent".to_string(),
            Paint::Solid(c) => c.to_hex(),
        }
    }
}

/// A format-native color reference before resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum ColorRef {
    /// Direct value; any alpha has already been stripped.
    Rgb(Color),
    /// Index into [`INDEXED_PALETTE`].
    Indexed(u32),
    /// Index into [`THEME_PALETTE`] with a tint fraction in `[-1, 1]`.
    Theme { index: u32, tint: f64 },
    /// DrawingML preset color name (`black`, `white`, `red`, ...).
    Preset(String),
}

/// Luminance modulation/offset, both expressed as fractions of full scale.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LumTransform {
    pub lum_mod: f64,
    pub lum_off: f64,
}

impl Default for LumTransform {
    fn default() -> Self {
        Self {
            lum_mod: 1.0,
            lum_off: 0.0,
        }
    }
}

impl LumTransform {
    pub fn is_identity(&self) -> bool {
        self.lum_mod == 1.0 && self.lum_off == 0.0
    }
}

/// Legacy 64-entry indexed palette.
pub static INDEXED_PALETTE: [u32; 64] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, //
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF, //
    0x800000, 0x008000, 0x000080, 0x808000, 0x808000, 0x008080, 0xC0C0C0, 0x808080, //
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF, //
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF, //
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99, //
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696, //
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333, //
];

/// Theme palette in workbook theme-index order:
/// `lt1, dk1, lt2, dk2, accent1..accent6, hlink, folHlink`.
pub static THEME_PALETTE: [u32; 12] = [
    0xFFFFFF, 0x000000, 0xE7E6E6, 0x44546A, 0x4472C4, 0xED7D31, 0xA5A5A5, 0xFFC000, 0x5B9BD5,
    0x70AD47, 0x0000FF, 0x800080,
];

static PRESET_COLORS: &[(&str, u32)] = &[
    ("black", 0x000000),
    ("white", 0xFFFFFF),
    ("red", 0xFF0000),
    ("green", 0x008000),
    ("lime", 0x00FF00),
    ("blue", 0x0000FF),
    ("yellow", 0xFFFF00),
    ("cyan", 0x00FFFF),
    ("aqua", 0x00FFFF),
    ("magenta", 0xFF00FF),
    ("fuchsia", 0xFF00FF),
    ("gray", 0x808080),
    ("grey", 0x808080),
    ("silver", 0xC0C0C0),
    ("maroon", 0x800000),
    ("navy", 0x000080),
    ("olive", 0x808000),
    ("purple", 0x800080),
    ("teal", 0x008080),
    ("orange", 0xFFA500),
    ("ltGray", 0xD3D3D3),
    ("dkGray", 0xA9A9A9),
];

/// Resolve a color reference, then apply the optional luminance transform.
///
/// Returns `None` for indices outside their palette and unknown preset names; the caller chooses
/// the fallback.
pub fn resolve_color(reference: &ColorRef, lum: Option<LumTransform>) -> Option<Color> {
    let base = match reference {
        ColorRef::Rgb(c) => *c,
        ColorRef::Indexed(idx) => Color::from_u32(*INDEXED_PALETTE.get(*idx as usize)?),
        ColorRef::Theme { index, tint } => {
            apply_tint(Color::from_u32(*THEME_PALETTE.get(*index as usize)?), *tint)
        }
        ColorRef::Preset(name) => preset_color(name)?,
    };

    Some(match lum {
        Some(lum) => apply_lum(base, lum),
        None => base,
    })
}

/// Look up a DrawingML preset color name. Matching ignores ASCII case.
pub fn preset_color(name: &str) -> Option<Color> {
    PRESET_COLORS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
        .map(|(_, rgb)| Color::from_u32(*rgb))
}

/// Lighten toward white (positive tint) or darken toward black (negative tint).
pub fn apply_tint(color: Color, tint: f64) -> Color {
    if tint == 0.0 || !tint.is_finite() {
        return color;
    }
    let tint = tint.clamp(-1.0, 1.0);
    let [r, g, b] = color.channels().map(|c| apply_tint_channel(c, tint));
    Color::from_rgb(r, g, b)
}

fn apply_tint_channel(channel: u8, tint: f64) -> u8 {
    let c = channel as f64;
    let adjusted = if tint < 0.0 {
        c * (1.0 + tint)
    } else {
        c + (255.0 - c) * tint
    };
    adjusted.round().clamp(0.0, 255.0) as u8
}

/// `channel' = clamp(channel * mod + off, 0, 1)` in normalized channel space.
pub fn apply_lum(color: Color, lum: LumTransform) -> Color {
    if lum.is_identity() {
        return color;
    }
    let [r, g, b] = color.channels().map(|c| {
        let v = (c as f64 / 255.0) * lum.lum_mod + lum.lum_off;
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    });
    Color::from_rgb(r, g, b)
}
