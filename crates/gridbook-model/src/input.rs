//! Typed-input descriptors: metadata that turns a cell or shape into a form field.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum InputKind {
    #[default]
    Text,
    Number,
    Float,
    Boolean,
    Select,
    Date,
    Symbol,
    Image,
    Draw,
    Uid,
}

impl InputKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, InputKind::Number | InputKind::Float)
    }

    /// Kinds whose value is an encoded image payload.
    pub fn is_image(self) -> bool {
        matches!(self, InputKind::Image | InputKind::Draw)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Manager,
    Staff,
    Viewer,
}

impl UserRole {
    /// Roles granted to every regular column.
    pub const EDITORS: [UserRole; 3] = [UserRole::Admin, UserRole::Manager, UserRole::Staff];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionalAction {
    Show,
    Enable,
}

/// Makes an input depend on the current value of another labelled input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRule {
    pub dependency_label: String,
    pub value: String,
    pub action: ConditionalAction,
}

/// How a `uid` input produces its identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum UidConfig {
    /// `prefix + zero-padded counter + suffix`, e.g. `EMP-0001`.
    #[serde(rename_all = "camelCase")]
    Sequential {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default = "default_start_from")]
        start_from: u64,
        #[serde(default = "default_padding")]
        padding: usize,
    },
    /// Fixed prefix/suffix around a body typed by the user.
    Manual {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
}

fn default_start_from() -> u64 {
    1
}

fn default_padding() -> usize {
    4
}

impl UidConfig {
    /// The `n`-th generated identifier (0-based). Manual configs wrap `n` as the body.
    pub fn generate(&self, n: u64) -> String {
        match self {
            UidConfig::Sequential {
                prefix,
                suffix,
                start_from,
                padding,
            } => format!(
                "{prefix}{:0width$}{suffix}",
                start_from.saturating_add(n),
                width = *padding
            ),
            UidConfig::Manual { prefix, suffix } => format!("{prefix}{n}{suffix}"),
        }
    }

    /// Wrap a user-entered body with the configured prefix/suffix.
    pub fn format_manual(&self, body: &str) -> String {
        match self {
            UidConfig::Sequential { prefix, suffix, .. } | UidConfig::Manual { prefix, suffix } => {
                format!("{prefix}{}{suffix}", body.trim())
            }
        }
    }

    /// Display template with blanks where the variable part goes, e.g. `INV-____/2026`.
    pub fn template(&self) -> String {
        match self {
            UidConfig::Sequential {
                prefix,
                suffix,
                padding,
                ..
            } => format!("{prefix}{}{suffix}", "#".repeat(*padding)),
            UidConfig::Manual { prefix, suffix } => format!("{prefix}____{suffix}"),
        }
    }
}

/// Metadata describing a cell or shape as a structured form field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    #[serde(rename = "type")]
    pub kind: InputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<ConditionalRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_roles: Vec<UserRole>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_departments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<UidConfig>,
}

impl InputDescriptor {
    pub fn new(kind: InputKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    /// Check `value` against the descriptor. Returns the failure message, if any.
    pub fn validate(&self, value: &str) -> Option<String> {
        let value = value.trim();
        let rule = self.validation.as_ref();
        let fail = |generated: String| {
            Some(
                rule.and_then(|r| r.message.clone())
                    .unwrap_or(generated),
            )
        };

        if value.is_empty() {
            if self.required {
                return fail(format!("{} is required", self.display_name()));
            }
            return None;
        }

        match self.kind {
            InputKind::Number | InputKind::Float => {
                let Ok(n) = value.parse::<f64>() else {
                    return fail(format!("{} must be a number", self.display_name()));
                };
                if self.kind == InputKind::Number && n.fract() != 0.0 {
                    return fail(format!("{} must be a whole number", self.display_name()));
                }
                if let Some(min) = rule.and_then(|r| r.min) {
                    if n < min {
                        return fail(format!("Value must be ≥ {min}"));
                    }
                }
                if let Some(max) = rule.and_then(|r| r.max) {
                    if n > max {
                        return fail(format!("Value must be ≤ {max}"));
                    }
                }
            }
            InputKind::Select => {
                if let Some(options) = &self.options {
                    if !options.iter().any(|o| o == value) {
                        return fail(format!("Please select from: {}", options.join(", ")));
                    }
                }
            }
            InputKind::Boolean => {
                if !matches!(value, "true" | "false") {
                    return fail(format!("{} must be true or false", self.display_name()));
                }
            }
            InputKind::Date => {
                if parse_input_date(value).is_none() {
                    return fail("Please enter a valid date.".to_string());
                }
            }
            _ => {}
        }

        let len = value.chars().count();
        if let Some(min_len) = rule.and_then(|r| r.min_length) {
            if len < min_len {
                return fail(format!("Must be at least {min_len} characters"));
            }
        }
        if let Some(max_len) = rule.and_then(|r| r.max_length) {
            if len > max_len {
                return fail(format!("Must be at most {max_len} characters"));
            }
        }
        if let Some(pattern) = rule.and_then(|r| r.pattern.as_deref()) {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(value) => {}
                Ok(_) => return fail(format!("{} has an invalid format", self.display_name())),
                Err(_) => return fail(format!("invalid validation pattern `{pattern}`")),
            }
        }

        None
    }

    /// Whether the conditional rule (if any) is satisfied. `lookup` returns the current value of
    /// another input by label.
    pub fn is_active<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> bool {
        match &self.conditional {
            None => true,
            Some(rule) => lookup(&rule.dependency_label)
                .map(|v| v.trim() == rule.value.trim())
                .unwrap_or(false),
        }
    }

    /// Role and department gate. Empty lists admit everyone.
    pub fn permits(&self, role: UserRole, department: Option<&str>) -> bool {
        let role_ok = self.allowed_roles.is_empty() || self.allowed_roles.contains(&role);
        let dept_ok = self.allowed_departments.is_empty()
            || department.is_some_and(|d| self.allowed_departments.iter().any(|a| a == d));
        role_ok && dept_ok
    }

    fn display_name(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => "Value",
        }
    }
}

/// Parse the date formats a date input may hold: ISO `2024-03-05`, ISO date-time, or
/// `05-Mar-24` as produced by import.
pub fn parse_input_date(value: &str) -> Option<NaiveDate> {
    static ISO_DATETIME: OnceLock<Regex> = OnceLock::new();
    let value = value.trim();
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    let iso = ISO_DATETIME.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})[T ]").expect("static regex must compile")
    });
    if let Some(caps) = iso.captures(value) {
        return NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok();
    }
    NaiveDate::parse_from_str(value, "%d-%b-%y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn number_input(min: Option<f64>, max: Option<f64>) -> InputDescriptor {
        InputDescriptor {
            label: Some("Salary".into()),
            required: true,
            validation: Some(ValidationRule {
                min,
                max,
                ..ValidationRule::default()
            }),
            ..InputDescriptor::new(InputKind::Number)
        }
    }

    #[test]
    fn number_validation() {
        let input = number_input(Some(10.0), Some(20.0));
        assert_eq!(input.validate(""), Some("Salary is required".to_string()));
        assert_eq!(input.validate("abc"), Some("Salary must be a number".to_string()));
        assert_eq!(input.validate("5"), Some("Value must be ≥ 10".to_string()));
        assert_eq!(input.validate("25"), Some("Value must be ≤ 20".to_string()));
        assert_eq!(input.validate("15"), None);
    }

    #[test]
    fn rule_message_overrides_generated_text() {
        let mut input = number_input(Some(0.0), None);
        input.validation.as_mut().unwrap().message = Some("positive please".into());
        assert_eq!(input.validate("-1"), Some("positive please".to_string()));
    }

    #[test]
    fn pattern_and_length_validation() {
        let input = InputDescriptor {
            validation: Some(ValidationRule {
                pattern: Some(r"^[A-Z]{3}$".into()),
                max_length: Some(3),
                ..ValidationRule::default()
            }),
            ..InputDescriptor::new(InputKind::Text)
        };
        assert_eq!(input.validate("ABC"), None);
        assert!(input.validate("ABCD").is_some());
        assert!(input.validate("abc").is_some());
        assert_eq!(input.validate(""), None);

        let broken = InputDescriptor {
            validation: Some(ValidationRule {
                pattern: Some("(".into()),
                ..ValidationRule::default()
            }),
            ..InputDescriptor::new(InputKind::Text)
        };
        assert!(broken.validate("x").is_some());
    }

    #[test]
    fn select_and_date_validation() {
        let select = InputDescriptor {
            options: Some(vec!["a".into(), "b".into()]),
            ..InputDescriptor::new(InputKind::Select)
        };
        assert_eq!(select.validate("a"), None);
        assert_eq!(select.validate("c"), Some("Please select from: a, b".to_string()));

        let date = InputDescriptor::new(InputKind::Date);
        assert_eq!(date.validate("2024-03-05"), None);
        assert_eq!(date.validate("05-Mar-24"), None);
        assert!(date.validate("someday").is_some());
    }

    #[test]
    fn conditional_visibility() {
        let input = InputDescriptor {
            conditional: Some(ConditionalRule {
                dependency_label: "Married".into(),
                value: "true".into(),
                action: ConditionalAction::Show,
            }),
            ..InputDescriptor::new(InputKind::Text)
        };
        assert!(input.is_active(|label| (label == "Married").then_some("true")));
        assert!(!input.is_active(|_| Some("false")));
        assert!(!input.is_active(|_| None));
        assert!(InputDescriptor::default().is_active(|_| None));
    }

    #[test]
    fn access_lists() {
        let input = InputDescriptor {
            allowed_roles: vec![UserRole::Admin, UserRole::Manager],
            allowed_departments: vec!["HR".into()],
            ..InputDescriptor::default()
        };
        assert!(input.permits(UserRole::Admin, Some("HR")));
        assert!(!input.permits(UserRole::Staff, Some("HR")));
        assert!(!input.permits(UserRole::Manager, Some("IT")));
        assert!(!input.permits(UserRole::Manager, None));
        assert!(InputDescriptor::default().permits(UserRole::Viewer, None));
    }

    #[test]
    fn uid_generation() {
        let seq = UidConfig::Sequential {
            prefix: "EMP-".into(),
            suffix: String::new(),
            start_from: 1,
            padding: 4,
        };
        assert_eq!(seq.generate(0), "EMP-0001");
        assert_eq!(seq.generate(41), "EMP-0042");
        assert_eq!(seq.template(), "EMP-####");

        let manual = UidConfig::Manual {
            prefix: "INV-".into(),
            suffix: "/2026".into(),
        };
        assert_eq!(manual.format_manual(" 77 "), "INV-77/2026");
        assert_eq!(manual.template(), "INV-____/2026");
    }

    #[test]
    fn uid_config_json_defaults() {
        let cfg: UidConfig =
            serde_json::from_str(r#"{"mode":"sequential","prefix":"EMP-"}"#).unwrap();
        assert_eq!(cfg.generate(0), "EMP-0001");
    }
}
