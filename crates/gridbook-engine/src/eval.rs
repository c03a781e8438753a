use std::sync::OnceLock;

use gridbook_model::{CellRef, CellValue, Sheet};
use regex::Regex;

use crate::arithmetic::evaluate_arithmetic;
use crate::functions;
use crate::value::{EvalError, Value, GENERIC_ERROR};

/// Maximum number of nested reference evaluations before a chain is reported as `#ERROR!`.
pub const MAX_DEPTH: usize = 256;

/// Evaluate a cell value against `sheet`.
///
/// Values that are not formulas (text without a leading `=`, numbers, empty) are returned as-is.
/// Failures never escape: unknown functions become `#NAME?`, malformed expressions and runaway
/// reference chains become `#ERROR!`, division by zero becomes NaN.
pub fn evaluate(value: &CellValue, sheet: &Sheet) -> CellValue {
    let Some(formula) = value.formula() else {
        return value.clone();
    };
    let mut evaluator = Evaluator::new(sheet);
    match evaluator.eval_formula(formula) {
        Ok(value) => value.into_cell_value(),
        Err(err) => {
            log::debug!("formula `={formula}` failed: {err}");
            CellValue::Text(GENERIC_ERROR.to_string())
        }
    }
}

/// Evaluate the cell at `cell` in `sheet`.
pub fn evaluate_cell(sheet: &Sheet, cell: CellRef) -> CellValue {
    evaluate(sheet.value(cell.row, cell.col), sheet)
}

/// Text the grid shows for an already evaluated value.
pub fn display_value(value: &CellValue) -> String {
    value.to_string()
}

fn cell_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$?[A-Za-z]+\$?\d+$").expect("static regex must compile"))
}

fn embedded_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?\b[A-Za-z]+\$?\d+\b").expect("static regex must compile"))
}

fn call_head_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z]+)\(").expect("static regex must compile"))
}

/// Parse a single A1 reference such as `B7` or `$B$7`.
pub(crate) fn parse_ref(text: &str) -> Option<CellRef> {
    if !cell_ref_re().is_match(text) {
        return None;
    }
    CellRef::from_a1(text).ok()
}

/// Parse a numeric literal. Only finite values count.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Split `NAME(args)` into an upper-cased name and the raw argument text.
///
/// Only matches when the parenthesis opened after the name closes at the very end, so
/// `SUM(A1)+SUM(A2)` is arithmetic, not a call.
fn split_call(formula: &str) -> Option<(String, &str)> {
    let head = call_head_re().captures(formula)?;
    let name = head.get(1)?;
    let open = name.end();
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, ch) in formula[open..].char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    let close = open + i;
                    if close + 1 != formula.len() {
                        return None;
                    }
                    return Some((name.as_str().to_ascii_uppercase(), &formula[open + 1..close]));
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) struct Evaluator<'a> {
    sheet: &'a Sheet,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(sheet: &'a Sheet) -> Self {
        Self { sheet, depth: 0 }
    }

    /// Evaluate formula text (without the leading `=`).
    pub(crate) fn eval_formula(&mut self, formula: &str) -> Result<Value, EvalError> {
        let formula = formula.trim();
        if let Some((name, args)) = split_call(formula) {
            return functions::call(self, &name, args);
        }

        let expr = self.substitute_refs(formula)?;
        match evaluate_arithmetic(&expr) {
            Ok(n) => Ok(Value::Number(n)),
            Err(err) => {
                log::debug!("cannot evaluate `{formula}`: {err}");
                Ok(Value::Text(GENERIC_ERROR.to_string()))
            }
        }
    }

    /// Replace every cell reference in `expr` with its numeric value.
    fn substitute_refs(&mut self, expr: &str) -> Result<String, EvalError> {
        let mut out = String::with_capacity(expr.len());
        let mut last = 0;
        let spans: Vec<(usize, usize)> = embedded_ref_re()
            .find_iter(expr)
            .map(|m| (m.start(), m.end()))
            .collect();
        for (start, end) in spans {
            let Some(cell) = parse_ref(&expr[start..end]) else {
                continue;
            };
            out.push_str(&expr[last..start]);
            let n = self.cell_number(cell)?;
            if n < 0.0 {
                out.push_str(&format!("({n})"));
            } else {
                out.push_str(&n.to_string());
            }
            last = end;
        }
        out.push_str(&expr[last..]);
        Ok(out)
    }

    /// Resolved value of a referenced cell; `None` when the cell is empty.
    pub(crate) fn cell_value(&mut self, cell: CellRef) -> Result<Option<Value>, EvalError> {
        let sheet = self.sheet;
        match sheet.value(cell.row, cell.col) {
            CellValue::Empty => Ok(None),
            CellValue::Number(n) => Ok(Some(Value::Number(*n))),
            CellValue::Text(s) => match s.strip_prefix('=') {
                Some(formula) => {
                    self.depth += 1;
                    if self.depth > MAX_DEPTH {
                        return Err(EvalError::DepthExceeded(MAX_DEPTH));
                    }
                    let result = self.eval_formula(formula);
                    self.depth -= 1;
                    result.map(Some)
                }
                None if s.is_empty() => Ok(None),
                None => Ok(Some(Value::Text(s.clone()))),
            },
        }
    }

    /// Numeric contribution of a referenced cell: empty, text and NaN all count as 0.
    pub(crate) fn cell_number(&mut self, cell: CellRef) -> Result<f64, EvalError> {
        Ok(self
            .cell_value(cell)?
            .map_or(0.0, |value| value.to_number()))
    }
}
