//! The built-in function set: `SUM`, `AVERAGE`/`AVG`, `MIN`, `MAX`, `COUNT`, `ABS`, `ROUND`, `IF`.

use gridbook_model::Range;

use crate::eval::{parse_number, parse_ref, Evaluator};
use crate::value::{EvalError, Value, GENERIC_ERROR, NAME_ERROR};

/// Split an argument list on commas that are not nested in parentheses or string literals.
pub(crate) fn split_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    for (i, ch) in args.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            ',' if !in_string && depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() || !out.is_empty() {
        out.push(last);
    }
    out
}

fn string_literal(arg: &str) -> Option<&str> {
    arg.strip_prefix('"')?.strip_suffix('"')
}

/// Dispatch a call. `name` is already upper-cased.
pub(crate) fn call(ev: &mut Evaluator<'_>, name: &str, args: &str) -> Result<Value, EvalError> {
    let args = split_args(args);
    let value = match name {
        "SUM" => Value::Number(collect_values(ev, &args)?.iter().sum()),
        "AVERAGE" | "AVG" => {
            let values = collect_values(ev, &args)?;
            if values.is_empty() {
                Value::Number(0.0)
            } else {
                Value::Number(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        "MIN" => Value::Number(
            collect_values(ev, &args)?
                .into_iter()
                .reduce(f64::min)
                .unwrap_or(0.0),
        ),
        "MAX" => Value::Number(
            collect_values(ev, &args)?
                .into_iter()
                .reduce(f64::max)
                .unwrap_or(0.0),
        ),
        "COUNT" => Value::Number(collect_values(ev, &args)?.len() as f64),
        "ABS" => Value::Number(
            collect_values(ev, &args)?
                .first()
                .map_or(0.0, |n| n.abs()),
        ),
        "ROUND" => {
            let values = collect_values(ev, &args)?;
            let x = values.first().copied().unwrap_or(0.0);
            let digits = values.get(1).copied().unwrap_or(0.0).trunc();
            let factor = 10f64.powi(digits as i32);
            Value::Number((x * factor).round() / factor)
        }
        "IF" => {
            let condition = match args.first() {
                Some(arg) => collect_values(ev, &[*arg])?.first().copied().unwrap_or(0.0),
                None => 0.0,
            };
            let branch = if condition != 0.0 && !condition.is_nan() {
                args.get(1)
            } else {
                args.get(2)
            };
            match branch {
                Some(arg) => resolve_arg(ev, arg)?,
                None => Value::Number(0.0),
            }
        }
        _ => Value::Text(NAME_ERROR.to_string()),
    };
    Ok(value)
}

/// Flatten arguments into numbers: ranges expand row-major, references resolve (empty is 0),
/// numeric literals parse, nested expressions evaluate. String literals contribute nothing.
fn collect_values(ev: &mut Evaluator<'_>, args: &[&str]) -> Result<Vec<f64>, EvalError> {
    let mut values = Vec::new();
    for arg in args {
        let arg = arg.trim();
        if arg.is_empty() || string_literal(arg).is_some() {
            continue;
        }
        if arg.contains(':') {
            match Range::from_a1(arg) {
                Ok(range) => {
                    for cell in range.cells() {
                        values.push(ev.cell_number(cell)?);
                    }
                }
                Err(err) => log::debug!("ignoring range argument `{arg}`: {err}"),
            }
        } else if let Some(cell) = parse_ref(arg) {
            values.push(ev.cell_number(cell)?);
        } else if let Some(n) = parse_number(arg) {
            values.push(n);
        } else {
            match ev.eval_formula(arg)? {
                Value::Number(n) => values.push(n),
                Value::Text(text) => {
                    if let Some(n) = parse_number(text.trim()) {
                        values.push(n);
                    }
                }
            }
        }
    }
    Ok(values)
}

/// Resolve an `IF` branch: string literals unquote, references yield the referenced value (empty
/// is 0), numbers parse, anything else is evaluated and falls back to its own text.
fn resolve_arg(ev: &mut Evaluator<'_>, arg: &str) -> Result<Value, EvalError> {
    if let Some(text) = string_literal(arg) {
        return Ok(Value::Text(text.to_string()));
    }
    if let Some(cell) = parse_ref(arg) {
        return Ok(ev.cell_value(cell)?.unwrap_or(Value::Number(0.0)));
    }
    if let Some(n) = parse_number(arg) {
        return Ok(Value::Number(n));
    }
    Ok(match ev.eval_formula(arg)? {
        Value::Text(text) if text == GENERIC_ERROR => Value::Text(arg.to_string()),
        value => value,
    })
}
