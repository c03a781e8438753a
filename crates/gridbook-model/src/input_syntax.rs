//! Inline field directives in plain cell text.
//!
//! A workbook authored in any spreadsheet program can declare a form field by typing
//! `{type label [= default] [# placeholder]}` into a cell, e.g. `{int Salary = 50000 # Enter salary}`.

use std::sync::OnceLock;

use regex::Regex;

use crate::input::{InputDescriptor, InputKind};

/// Result of scanning a cell's text for a directive.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedCellText {
    /// Value to display; `None` for image-capable fields.
    pub value: Option<String>,
    pub input: Option<InputDescriptor>,
}

impl ParsedCellText {
    fn plain(text: &str) -> Self {
        Self {
            value: Some(text.to_string()),
            input: None,
        }
    }
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{(\w+)\s+([a-zA-Z0-9_]+)\s*(?:=\s*(.*?))?\s*(?:#\s*(.*))?\}$")
            .expect("static regex must compile")
    })
}

fn list_default_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(.*)\]$").expect("static regex must compile"))
}

/// Recognize a field directive. Text that is not a directive, or names an unknown type, comes
/// back unchanged with no descriptor.
pub fn parse_cell_text(text: &str) -> ParsedCellText {
    let Some(caps) = directive_regex().captures(text.trim()) else {
        return ParsedCellText::plain(text);
    };

    let type_code = caps[1].to_ascii_lowercase();
    let label = caps[2].to_string();
    let default_raw = caps.get(3).map_or("", |m| m.as_str());
    let placeholder = caps.get(4).map_or("", |m| m.as_str()).trim();

    let mut options = Vec::new();
    let (kind, value) = match type_code.as_str() {
        "str" => (InputKind::Text, Some(default_raw.to_string())),
        "int" | "float" => (InputKind::Number, Some(default_raw.to_string())),
        "bool" => (InputKind::Boolean, Some(default_raw.to_string())),
        "list" => {
            let value = match list_default_regex().captures(default_raw) {
                Some(list) => {
                    options = list[1].split(',').map(|s| s.trim().to_string()).collect();
                    Some(options.first().cloned().unwrap_or_default())
                }
                None => Some(String::new()),
            };
            (InputKind::Select, value)
        }
        "img" | "cam" | "sign" => (InputKind::Image, None),
        _ => return ParsedCellText::plain(text),
    };

    ParsedCellText {
        value,
        input: Some(InputDescriptor {
            label: Some(label),
            placeholder: Some(placeholder.to_string()),
            options: (!options.is_empty()).then_some(options),
            required: true,
            ..InputDescriptor::new(kind)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn int_directive_with_default_and_placeholder() {
        let parsed = parse_cell_text("{int Salary = 50000 # Enter salary}");
        assert_eq!(parsed.value.as_deref(), Some("50000"));
        let input = parsed.input.unwrap();
        assert_eq!(input.kind, InputKind::Number);
        assert_eq!(input.label.as_deref(), Some("Salary"));
        assert_eq!(input.placeholder.as_deref(), Some("Enter salary"));
        assert!(input.required);
    }

    #[test]
    fn non_directive_text_is_unchanged() {
        assert_eq!(
            parse_cell_text("hello"),
            ParsedCellText {
                value: Some("hello".into()),
                input: None
            }
        );
        assert_eq!(parse_cell_text("{nope Field}").input, None);
        assert_eq!(parse_cell_text("{nope Field}").value.as_deref(), Some("{nope Field}"));
    }

    #[test]
    fn list_directive_selects_first_option() {
        let parsed = parse_cell_text("  {list Dept = [HR, IT ,Ops]}  ");
        assert_eq!(parsed.value.as_deref(), Some("HR"));
        let input = parsed.input.unwrap();
        assert_eq!(input.kind, InputKind::Select);
        assert_eq!(
            input.options,
            Some(vec!["HR".to_string(), "IT".to_string(), "Ops".to_string()])
        );
    }

    #[test]
    fn list_without_bracketed_default_has_no_options() {
        let parsed = parse_cell_text("{list Dept = HR}");
        assert_eq!(parsed.value.as_deref(), Some(""));
        assert_eq!(parsed.input.unwrap().options, None);
    }

    #[test]
    fn image_directives_have_no_display_value() {
        for code in ["img", "cam", "SIGN"] {
            let parsed = parse_cell_text(&format!("{{{code} Photo # Take a photo}}"));
            assert_eq!(parsed.value, None);
            assert_eq!(parsed.input.unwrap().kind, InputKind::Image);
        }
    }

    #[test]
    fn bare_directive_has_empty_default() {
        let parsed = parse_cell_text("{bool Active}");
        assert_eq!(parsed.value.as_deref(), Some(""));
        assert_eq!(parsed.input.unwrap().kind, InputKind::Boolean);
    }
}
