use gridbook_model::{format_number, CellValue};
use thiserror::Error;

/// Displayed for a call to a function the engine does not know.
pub const NAME_ERROR: &str = "#NAME?";
/// Displayed for a malformed expression.
pub const GENERIC_ERROR: &str = "#ERROR!";

/// Intermediate evaluation result.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric coercion for aggregation/arithmetic: numeric text parses, anything else is 0.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Number(n) if n.is_nan() => 0.0,
            Value::Number(n) => *n,
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
        }
    }

    pub fn into_cell_value(self) -> CellValue {
        match self {
            Value::Number(n) => CellValue::Number(n),
            Value::Text(s) => CellValue::Text(s),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Failures that abort a single evaluation and surface as [`GENERIC_ERROR`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unexpected character `{0}` in expression")]
    UnexpectedChar(char),
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
    #[error("expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),
    #[error("reference chain deeper than {0} levels")]
    DepthExceeded(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::Text(" 4.5 ".into()).to_number(), 4.5);
        assert_eq!(Value::Text("abc".into()).to_number(), 0.0);
        assert_eq!(Value::Text(NAME_ERROR.into()).to_number(), 0.0);
        assert_eq!(Value::Number(f64::NAN).to_number(), 0.0);
    }
}
