use gridbook_engine::{display_value, evaluate, evaluate_cell, GENERIC_ERROR, NAME_ERROR};
use gridbook_model::{CellRef, CellValue, Sheet};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn eval(sheet: &Sheet, formula: &str) -> CellValue {
    evaluate(&CellValue::from(formula), sheet)
}

fn column_a(values: &[f64]) -> Sheet {
    let mut sheet = Sheet::blank("Sheet1");
    for (row, v) in values.iter().enumerate() {
        sheet.set_value(row as u32, 0, *v);
    }
    sheet
}

#[test]
fn sum_over_a_range() {
    let sheet = column_a(&[1.0, 2.0, 3.0]);
    assert_eq!(eval(&sheet, "=SUM(A1:A3)"), CellValue::Number(6.0));
    assert_eq!(eval(&sheet, "=sum(a3:a1)"), CellValue::Number(6.0));
}

#[test]
fn aggregates() {
    let sheet = column_a(&[4.0, -2.0, 10.0]);
    assert_eq!(eval(&sheet, "=AVERAGE(A1:A3)"), CellValue::Number(4.0));
    assert_eq!(eval(&sheet, "=AVG(A1,A3)"), CellValue::Number(7.0));
    assert_eq!(eval(&sheet, "=MIN(A1:A3)"), CellValue::Number(-2.0));
    assert_eq!(eval(&sheet, "=MAX(A1:A3, 12)"), CellValue::Number(12.0));
    assert_eq!(eval(&sheet, "=COUNT(A1:A4)"), CellValue::Number(4.0));
    assert_eq!(eval(&sheet, "=ABS(A2)"), CellValue::Number(2.0));
    assert_eq!(eval(&sheet, "=ROUND(2.346, 2)"), CellValue::Number(2.35));
    assert_eq!(eval(&sheet, "=ROUND(-2.5)"), CellValue::Number(-3.0));
    assert_eq!(eval(&sheet, "=MAX()"), CellValue::Number(0.0));
    assert_eq!(eval(&sheet, "=AVERAGE(\"x\")"), CellValue::Number(0.0));
}

#[test]
fn nested_calls_are_evaluated_as_arguments() {
    let sheet = column_a(&[1.0, 5.0, 3.0]);
    assert_eq!(eval(&sheet, "=SUM(A1, MAX(A1:A3))"), CellValue::Number(6.0));
    assert_eq!(eval(&sheet, "=SUM(A1*2, 1)"), CellValue::Number(3.0));
}

#[test]
fn if_picks_a_branch() {
    let mut sheet = column_a(&[3.0]);
    sheet.set_value(0, 1, "label");
    assert_eq!(eval(&sheet, "=IF(1,\"yes\",\"no\")"), CellValue::from("yes"));
    assert_eq!(eval(&sheet, "=IF(0,\"yes\",\"no\")"), CellValue::from("no"));
    assert_eq!(eval(&sheet, "=IF(A1-3, 1, 2)"), CellValue::Number(2.0));
    assert_eq!(eval(&sheet, "=IF(A1, B1, 0)"), CellValue::from("label"));
    assert_eq!(eval(&sheet, "=IF(A1, C9, 0)"), CellValue::Number(0.0));
    assert_eq!(eval(&sheet, "=IF(A1, A1*10, 0)"), CellValue::Number(30.0));
}

#[test]
fn referenced_formulas_resolve_on_demand() {
    let mut sheet = Sheet::blank("Sheet1");
    sheet.set_value(0, 0, 2.0);
    sheet.set_value(0, 1, "=A1*2");
    assert_eq!(eval(&sheet, "=A1+B1"), CellValue::Number(6.0));
    assert_eq!(
        evaluate_cell(&sheet, CellRef::new(0, 1)),
        CellValue::Number(4.0)
    );
}

#[test]
fn text_and_empty_cells_count_as_zero() {
    let mut sheet = Sheet::blank("Sheet1");
    sheet.set_value(0, 0, "abc");
    sheet.set_value(1, 0, "7");
    assert_eq!(eval(&sheet, "=A1+A2+A3"), CellValue::Number(7.0));
    assert_eq!(eval(&sheet, "=SUM(A1:A3)"), CellValue::Number(7.0));
}

#[test]
fn sentinels_instead_of_failures() {
    let sheet = Sheet::blank("Sheet1");
    match eval(&sheet, "=1/0") {
        CellValue::Number(n) => assert!(n.is_nan()),
        other => panic!("expected NaN, got {other:?}"),
    }
    assert_eq!(display_value(&eval(&sheet, "=1/0")), "NaN");
    assert_eq!(eval(&sheet, "=FOO(1)"), CellValue::from(NAME_ERROR));
    assert_eq!(eval(&sheet, "=1 +"), CellValue::from(GENERIC_ERROR));
    assert_eq!(eval(&sheet, "=A1:A3"), CellValue::from(GENERIC_ERROR));
}

#[test]
fn self_reference_is_reported_not_overflowed() {
    let mut sheet = Sheet::blank("Sheet1");
    sheet.set_value(0, 0, "=A1+1");
    sheet.set_value(0, 1, "=C1");
    sheet.set_value(0, 2, "=B1");
    assert_eq!(
        evaluate_cell(&sheet, CellRef::new(0, 0)),
        CellValue::from(GENERIC_ERROR)
    );
    assert_eq!(
        evaluate_cell(&sheet, CellRef::new(0, 1)),
        CellValue::from(GENERIC_ERROR)
    );
}

#[test]
fn long_running_total_chain_evaluates() {
    let mut sheet = Sheet::blank("Sheet1");
    sheet.set_value(0, 0, 1.0);
    for row in 1..150u32 {
        sheet.set_value(row, 0, format!("=A{row}+1"));
    }
    assert_eq!(
        evaluate_cell(&sheet, CellRef::new(149, 0)),
        CellValue::Number(150.0)
    );
}

proptest! {
    #[test]
    fn sum_matches_native_addition(values in prop::collection::vec(-1000i32..1000, 1..20)) {
        let floats: Vec<f64> = values.iter().map(|v| f64::from(*v)).collect();
        let sheet = column_a(&floats);
        let formula = format!("=SUM(A1:A{})", floats.len());
        prop_assert_eq!(eval(&sheet, &formula), CellValue::Number(floats.iter().sum()));
    }
}
