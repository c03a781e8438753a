//! Lazy formula evaluation over a [`gridbook_model::Sheet`].
//!
//! A formula is cell text starting with `=`: either a call to one of a handful of aggregate
//! functions or an arithmetic expression over numbers and cell references. Referenced formulas are
//! evaluated on demand every time; nothing is cached.
#![forbid(unsafe_code)]

mod arithmetic;
mod eval;
mod functions;
mod value;

pub use arithmetic::evaluate_arithmetic;
pub use eval::{display_value, evaluate, evaluate_cell, MAX_DEPTH};
pub use value::{EvalError, Value, GENERIC_ERROR, NAME_ERROR};
