use core::fmt;

use serde::{Deserialize, Serialize};

use crate::input::InputDescriptor;
use crate::style::Style;

/// A cell's display value.
///
/// Serialized as a JSON number, string, or `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Formula text (without the leading `=`) if this value is a formula.
    pub fn formula(&self) -> Option<&str> {
        self.as_text().and_then(|s| s.strip_prefix('='))
    }

    /// Whether the value is an encoded image payload (`data:image/...`).
    pub fn is_image_data(&self) -> bool {
        self.as_text().is_some_and(|s| s.starts_with("data:image"))
    }

    /// Numeric interpretation used by aggregations: numbers as-is, numeric text parsed, anything
    /// else `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    s.parse().ok()
                }
            }
            CellValue::Empty => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Text)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

/// Render a number the way the grid shows it: integers without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "inputConfig")]
    pub input: Option<InputDescriptor>,
}

impl Cell {
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_input(mut self, input: InputDescriptor) -> Self {
        self.input = Some(input);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_display_without_trailing_zero() {
        assert_eq!(CellValue::Number(6.0).to_string(), "6");
        assert_eq!(CellValue::Number(-2.5).to_string(), "-2.5");
        assert_eq!(CellValue::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn numeric_interpretation() {
        assert_eq!(CellValue::from("  42 ").as_number(), Some(42.0));
        assert_eq!(CellValue::from("abc").as_number(), None);
        assert_eq!(CellValue::from("").as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn json_shape_is_untagged() {
        let cell: Cell = serde_json::from_str(r#"{"value": 3}"#).unwrap();
        assert_eq!(cell.value, CellValue::Number(3.0));
        let cell: Cell = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(cell.value, CellValue::Empty);
        let cell: Cell = serde_json::from_str(r#"{"value": "=A1"}"#).unwrap();
        assert_eq!(cell.value.formula(), Some("A1"));
    }
}
