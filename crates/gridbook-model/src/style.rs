use core::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::color::{Color, Paint};

/// Border line style, named after the workbook-native border styles.
///
/// `Solid` is the grid editor's name for a plain line and is written out as `thin`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BorderLineStyle {
    #[default]
    Thin,
    Solid,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderLineStyle {
    /// Parse a native `style` attribute. `none` and unknown names yield `None`.
    pub fn from_native(s: &str) -> Option<Self> {
        Some(match s {
            "thin" => Self::Thin,
            "solid" => Self::Solid,
            "medium" => Self::Medium,
            "thick" => Self::Thick,
            "dashed" => Self::Dashed,
            "dotted" => Self::Dotted,
            "double" => Self::Double,
            "hair" => Self::Hair,
            "mediumDashed" => Self::MediumDashed,
            "dashDot" => Self::DashDot,
            "mediumDashDot" => Self::MediumDashDot,
            "dashDotDot" => Self::DashDotDot,
            "mediumDashDotDot" => Self::MediumDashDotDot,
            "slantDashDot" => Self::SlantDashDot,
            _ => return None,
        })
    }

    /// The native `style` attribute value.
    pub fn as_native(self) -> &'static str {
        match self {
            Self::Thin | Self::Solid => "thin",
            Self::Medium => "medium",
            Self::Thick => "thick",
            Self::Dashed => "dashed",
            Self::Dotted => "dotted",
            Self::Double => "double",
            Self::Hair => "hair",
            Self::MediumDashed => "mediumDashed",
            Self::DashDot => "dashDot",
            Self::MediumDashDot => "mediumDashDot",
            Self::DashDotDot => "dashDotDot",
            Self::MediumDashDotDot => "mediumDashDotDot",
            Self::SlantDashDot => "slantDashDot",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Solid => "solid",
            other => other.as_native(),
        }
    }

    /// Rendered line weight in pixels.
    pub fn weight_px(self) -> u8 {
        match self {
            Self::Thick => 3,
            Self::Medium | Self::MediumDashed | Self::MediumDashDot | Self::MediumDashDotDot => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderSide {
    pub style: BorderLineStyle,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Borders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<BorderSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<BorderSide>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.bottom.is_none() && self.left.is_none() && self.right.is_none()
    }
}

/// A diagonal line descriptor, serialized compactly as `"<N>px <style> <#color>"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DiagonalLine {
    pub width_px: u8,
    pub style: BorderLineStyle,
    pub color: Color,
}

impl DiagonalLine {
    pub fn from_side(side: BorderSide) -> Self {
        Self {
            width_px: side.style.weight_px(),
            style: side.style,
            color: side.color,
        }
    }

    /// Parse the compact form. Missing style/color parts default to `thin`/black.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split_whitespace();
        let width_px = parts.next()?.trim_end_matches("px").parse().ok()?;
        let style = match parts.next() {
            Some(style) => BorderLineStyle::from_native(style)?,
            None => BorderLineStyle::Thin,
        };
        let color = match parts.next() {
            Some(color) => Color::from_hex(color)?,
            None => Color::BLACK,
        };
        Some(Self {
            width_px,
            style,
            color,
        })
    }
}

impl fmt::Display for DiagonalLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px {} {}", self.width_px, self.style.label(), self.color)
    }
}

impl Serialize for DiagonalLine {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DiagonalLine {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DiagonalLine::parse(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid diagonal descriptor `{s}`")))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
    Justify,
    CenterContinuous,
}

impl HorizontalAlign {
    pub fn from_native(s: &str) -> Option<Self> {
        Some(match s {
            "left" => Self::Left,
            "center" => Self::Center,
            "right" => Self::Right,
            "justify" => Self::Justify,
            "centerContinuous" => Self::CenterContinuous,
            _ => return None,
        })
    }

    /// `centerContinuous` is written as plain `center`.
    pub fn as_native(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center | Self::CenterContinuous => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Center,
    Bottom,
}

impl VerticalAlign {
    /// Native `vertical` attribute; `center` and `middle` both mean centered.
    pub fn from_native(s: &str) -> Option<Self> {
        Some(match s {
            "top" => Self::Top,
            "center" | "middle" => Self::Center,
            "bottom" => Self::Bottom,
            _ => return None,
        })
    }

    pub fn as_native(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
        }
    }
}

/// Text rotation: an angle in degrees or stacked vertical text.
///
/// Serialized as a number or the string `"vertical"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextRotation {
    Degrees(i16),
    Vertical,
}

impl TextRotation {
    /// Native `textRotation` uses 0..=90 for counter-clockwise, 91..=180 for clockwise
    /// (`90 - value`) and 255 for vertical text.
    pub fn from_native(value: u16) -> Option<Self> {
        match value {
            0 => None,
            1..=90 => Some(Self::Degrees(value as i16)),
            91..=180 => Some(Self::Degrees(90 - value as i16)),
            255 => Some(Self::Vertical),
            _ => None,
        }
    }

    pub fn to_native(self) -> u16 {
        match self {
            Self::Vertical => 255,
            Self::Degrees(d) if d >= 0 => d.min(90) as u16,
            Self::Degrees(d) => (90 - d.max(-90)) as u16,
        }
    }
}

impl Serialize for TextRotation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TextRotation::Degrees(d) => serializer.serialize_i16(*d),
            TextRotation::Vertical => serializer.serialize_str("vertical"),
        }
    }
}

impl<'de> Deserialize<'de> for TextRotation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Degrees(i16),
            Keyword(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Degrees(d) => Ok(TextRotation::Degrees(d)),
            Repr::Keyword(k) if k == "vertical" => Ok(TextRotation::Vertical),
            Repr::Keyword(k) => Err(D::Error::custom(format!("invalid text rotation `{k}`"))),
        }
    }
}

/// Normalized cell formatting.
///
/// Unset colors are resolved against a [`RenderTheme`] at render time through
/// [`Style::effective_text_color`] and [`Style::effective_background`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Paint>,
    #[serde(default, skip_serializing_if = "Borders::is_empty")]
    pub border: Borders,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<HorizontalAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_text: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_rotation: Option<TextRotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagonal_up: Option<DiagonalLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagonal_down: Option<DiagonalLine>,
}

impl Style {
    pub fn effective_text_color(&self, theme: RenderTheme) -> Color {
        self.color.unwrap_or_else(|| theme.default_text_color())
    }

    pub fn effective_background(&self, theme: RenderTheme) -> Color {
        self.background_color
            .and_then(Paint::color)
            .unwrap_or_else(|| theme.default_background())
    }

    pub fn effective_vertical_align(&self) -> VerticalAlign {
        self.vertical_align.unwrap_or_default()
    }
}

/// Color scheme used to fill in unset style colors when rendering.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RenderTheme {
    #[default]
    Light,
    Dark,
}

impl RenderTheme {
    pub fn default_text_color(self) -> Color {
        match self {
            RenderTheme::Light => Color::BLACK,
            RenderTheme::Dark => Color::from_u32(0xE5E7EB),
        }
    }

    pub fn default_background(self) -> Color {
        match self {
            RenderTheme::Light => Color::WHITE,
            RenderTheme::Dark => Color::from_u32(0x1F2937),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn diagonal_descriptor_round_trips_through_its_compact_form() {
        let line = DiagonalLine::from_side(BorderSide {
            style: BorderLineStyle::Medium,
            color: Color::from_u32(0xFF0000),
        });
        assert_eq!(line.to_string(), "2px medium #FF0000");
        assert_eq!(DiagonalLine::parse("2px medium #FF0000"), Some(line));
        assert_eq!(
            DiagonalLine::parse("1px"),
            Some(DiagonalLine {
                width_px: 1,
                style: BorderLineStyle::Thin,
                color: Color::BLACK,
            })
        );
        assert_eq!(DiagonalLine::parse("wide"), None);
    }

    #[test]
    fn unset_colors_fall_back_to_theme_defaults() {
        let style = Style {
            background_color: Some(Paint::Transparent),
            ..Style::default()
        };
        assert_eq!(style.effective_text_color(RenderTheme::Light), Color::BLACK);
        assert_eq!(style.effective_background(RenderTheme::Light), Color::WHITE);
        assert_eq!(
            style.effective_background(RenderTheme::Dark),
            Color::from_u32(0x1F2937)
        );
    }

    #[test]
    fn text_rotation_native_encoding() {
        assert_eq!(TextRotation::from_native(45), Some(TextRotation::Degrees(45)));
        assert_eq!(TextRotation::from_native(135), Some(TextRotation::Degrees(-45)));
        assert_eq!(TextRotation::from_native(255), Some(TextRotation::Vertical));
        assert_eq!(TextRotation::Degrees(-45).to_native(), 135);
        assert_eq!(TextRotation::Vertical.to_native(), 255);
    }

    #[test]
    fn style_json_uses_camel_case_and_skips_defaults() {
        let style = Style {
            bold: true,
            background_color: Some(Paint::Solid(Color::from_u32(0xFFFF00))),
            text_rotation: Some(TextRotation::Vertical),
            diagonal_up: DiagonalLine::parse("1px thin #000000"),
            ..Style::default()
        };
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bold": true,
                "backgroundColor": "#FFFF00",
                "textRotation": "vertical",
                "diagonalUp": "1px thin #000000",
            })
        );
        let back: Style = serde_json::from_value(json).unwrap();
        assert_eq!(back, style);
    }
}
