use gridbook_model::{CellRef, CellValue, Range, Sheet};
use proptest::prelude::*;

#[test]
fn merge_then_unmerge_keeps_values_in_the_anchor() {
    let mut sheet = Sheet::blank("Sheet1");
    sheet.set_value(1, 2, "title");

    assert!(sheet.merge_cells(Range::new(CellRef::new(0, 0), CellRef::new(1, 3))));
    assert_eq!(sheet.value(0, 0), &CellValue::from("title"));
    assert_eq!(sheet.value(1, 2), &CellValue::Empty);

    assert_eq!(sheet.unmerge_cells(Range::new(CellRef::new(1, 1), CellRef::new(1, 1))), 1);
    assert!(sheet.merges.is_empty());
    assert_eq!(sheet.value(0, 0), &CellValue::from("title"));
}

#[test]
fn anchor_value_is_never_overwritten() {
    let mut sheet = Sheet::blank("Sheet1");
    sheet.set_value(0, 0, 1.0);
    sheet.set_value(0, 1, 2.0);
    sheet.merge_cells(Range::from_a1("A1:B1").unwrap());
    assert_eq!(sheet.value(0, 0), &CellValue::Number(1.0));
    assert_eq!(sheet.value(0, 1), &CellValue::Number(2.0));
}

fn arb_range() -> impl Strategy<Value = Range> {
    (0u32..12, 0u32..12, 0u32..12, 0u32..12)
        .prop_map(|(r1, c1, r2, c2)| Range::new(CellRef::new(r1, c1), CellRef::new(r2, c2)))
}

#[derive(Debug, Clone)]
enum Op {
    Merge(Range),
    Unmerge(Range),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_range().prop_map(Op::Merge),
        1 => arb_range().prop_map(Op::Unmerge),
    ]
}

proptest! {
    #[test]
    fn merges_stay_normalized_and_disjoint(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut sheet = Sheet::blank("Sheet1");
        for op in ops {
            match op {
                Op::Merge(r) => { sheet.merge_cells(r); }
                Op::Unmerge(r) => { sheet.unmerge_cells(r); }
            }

            for (i, a) in sheet.merges.iter().enumerate() {
                prop_assert!(a.start.row <= a.end.row && a.start.col <= a.end.col);
                prop_assert!(!a.is_single_cell());
                for b in sheet.merges.iter().skip(i + 1) {
                    prop_assert!(!a.intersects(b), "{a} overlaps {b}");
                }
            }
        }
    }
}
