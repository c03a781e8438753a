use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{column_label, CellRef, MergeRange, Range};
use crate::cell::{Cell, CellValue};
use crate::input::UserRole;
use crate::shape::Shape;
use crate::units::{
    BLANK_COLUMN_WIDTH_PX, FALLBACK_COLUMN_WIDTH_PX, FALLBACK_ROW_HEIGHT_PX,
    MIN_RESIZED_COLUMN_WIDTH_PX, MIN_RESIZED_ROW_HEIGHT_PX, MIN_SHAPE_EXTENT_PX,
};

/// Rows/columns of a freshly generated blank sheet.
pub const BLANK_ROW_COUNT: u32 = 100;
pub const BLANK_COL_COUNT: u32 = 26;

/// Offset applied to a duplicated shape, in pixels on both axes.
pub const DUPLICATE_OFFSET_PX: i32 = 20;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    #[serde(rename = "id")]
    pub index: u32,
    /// Width in pixels.
    pub width: u32,
    #[serde(rename = "permissions", default)]
    pub allowed_roles: Vec<UserRole>,
    pub header: String,
}

impl ColumnMetadata {
    pub fn new(index: u32, width: u32, allowed_roles: Vec<UserRole>) -> Self {
        Self {
            index,
            width,
            allowed_roles,
            header: column_label(index),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMetadata {
    #[serde(rename = "id")]
    pub index: u32,
    /// Height in pixels.
    pub height: u32,
}

/// One worksheet: sparse cells plus the geometry, merges and floating shapes that belong to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: BTreeMap<u32, BTreeMap<u32, Cell>>,
    #[serde(default)]
    pub row_metadata: BTreeMap<u32, RowMetadata>,
    pub row_count: u32,
    pub col_count: u32,
    #[serde(default)]
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub merges: Vec<MergeRange>,
    #[serde(default)]
    pub shapes: Vec<Shape>,
}

static EMPTY_VALUE: CellValue = CellValue::Empty;

impl Sheet {
    /// An empty sheet with no rows or columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
            row_metadata: BTreeMap::new(),
            row_count: 0,
            col_count: 0,
            columns: Vec::new(),
            merges: Vec::new(),
            shapes: Vec::new(),
        }
    }

    /// The default 26 x 100 grid.
    pub fn blank(name: impl Into<String>) -> Self {
        let mut sheet = Self::new(name);
        sheet.row_count = BLANK_ROW_COUNT;
        sheet.col_count = BLANK_COL_COUNT;
        sheet.columns = (0..BLANK_COL_COUNT)
            .map(|i| ColumnMetadata::new(i, BLANK_COLUMN_WIDTH_PX, UserRole::EDITORS.to_vec()))
            .collect();
        sheet
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Mutable access, creating an empty cell when none exists.
    pub fn cell_mut(&mut self, row: u32, col: u32) -> &mut Cell {
        self.rows.entry(row).or_default().entry(col).or_default()
    }

    /// Display value of a cell; cells without an entry are empty.
    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        self.cell(row, col).map_or(&EMPTY_VALUE, |c| &c.value)
    }

    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        self.cell_mut(row, col).value = value.into();
        self.grow_to(row, col);
    }

    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) {
        self.rows.entry(row).or_default().insert(col, cell);
        self.grow_to(row, col);
    }

    pub fn remove_cell(&mut self, row: u32, col: u32) -> Option<Cell> {
        let row_map = self.rows.get_mut(&row)?;
        let cell = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        cell
    }

    /// Iterate populated cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.rows.iter().flat_map(|(&row, cols)| {
            cols.iter()
                .map(move |(&col, cell)| (CellRef::new(row, col), cell))
        })
    }

    fn grow_to(&mut self, row: u32, col: u32) {
        self.row_count = self.row_count.max(row.saturating_add(1));
        self.col_count = self.col_count.max(col.saturating_add(1));
    }

    // -- geometry --------------------------------------------------------------------------

    /// Column width in pixels; columns without metadata use the fallback width.
    pub fn column_width(&self, col: u32) -> u32 {
        self.columns
            .get(col as usize)
            .map_or(FALLBACK_COLUMN_WIDTH_PX, |c| c.width)
    }

    /// Row height in pixels; rows without metadata use the fallback height.
    pub fn row_height(&self, row: u32) -> u32 {
        self.row_metadata
            .get(&row)
            .map_or(FALLBACK_ROW_HEIGHT_PX, |r| r.height)
    }

    /// Absolute x of the left edge of `col`.
    pub fn column_x(&self, col: u32) -> u64 {
        (0..col).map(|c| u64::from(self.column_width(c))).sum()
    }

    /// Absolute y of the top edge of `row`.
    pub fn row_y(&self, row: u32) -> u64 {
        (0..row).map(|r| u64::from(self.row_height(r))).sum()
    }

    /// Inverse of [`Sheet::column_x`]: the column containing `x` and the offset into it.
    pub fn locate_x(&self, x: f64) -> (u32, f64) {
        locate(x, |c| self.column_width(c))
    }

    /// Inverse of [`Sheet::row_y`]: the row containing `y` and the offset into it.
    pub fn locate_y(&self, y: f64) -> (u32, f64) {
        locate(y, |r| self.row_height(r))
    }

    pub fn set_column_width(&mut self, col: u32, width_px: u32) {
        self.ensure_columns(col + 1);
        if let Some(column) = self.columns.get_mut(col as usize) {
            column.width = width_px.max(MIN_RESIZED_COLUMN_WIDTH_PX);
        }
    }

    pub fn set_row_height(&mut self, row: u32, height_px: u32) {
        self.row_metadata.insert(
            row,
            RowMetadata {
                index: row,
                height: height_px.max(MIN_RESIZED_ROW_HEIGHT_PX),
            },
        );
        self.row_count = self.row_count.max(row.saturating_add(1));
    }

    /// Extend column metadata up to `count` columns using the fallback width.
    pub fn ensure_columns(&mut self, count: u32) {
        while (self.columns.len() as u32) < count {
            let index = self.columns.len() as u32;
            self.columns.push(ColumnMetadata::new(
                index,
                FALLBACK_COLUMN_WIDTH_PX,
                UserRole::EDITORS.to_vec(),
            ));
        }
        self.col_count = self.col_count.max(count);
    }

    // -- merges ----------------------------------------------------------------------------

    /// Merge `range`. Returns `false` (and changes nothing) for a single-cell range.
    ///
    /// Existing merges overlapping `range` are dropped. If the anchor cell is empty, the first
    /// non-empty value in row-major order moves into it.
    pub fn merge_cells(&mut self, range: Range) -> bool {
        if range.is_single_cell() {
            return false;
        }

        self.merges.retain(|m| !m.intersects(&range));

        if self.value(range.start.row, range.start.col).is_empty() {
            let donor = range
                .cells()
                .skip(1)
                .find(|c| !self.value(c.row, c.col).is_empty());
            if let Some(donor) = donor {
                let value = std::mem::take(&mut self.cell_mut(donor.row, donor.col).value);
                self.cell_mut(range.start.row, range.start.col).value = value;
            }
        }

        self.merges.push(range);
        true
    }

    /// Remove every merge overlapping `range`. Returns how many were removed.
    pub fn unmerge_cells(&mut self, range: Range) -> usize {
        let before = self.merges.len();
        self.merges.retain(|m| !m.intersects(&range));
        before - self.merges.len()
    }

    pub fn merge_at(&self, cell: CellRef) -> Option<&MergeRange> {
        self.merges.iter().find(|m| m.contains(cell))
    }

    // -- shapes ----------------------------------------------------------------------------

    /// Append a shape on top of the z-order. A missing or clashing id is replaced with a fresh
    /// one. Returns the id.
    pub fn add_shape(&mut self, mut shape: Shape) -> String {
        if shape.id.is_empty() || self.shape(&shape.id).is_some() {
            shape.id = self.next_shape_id(shape.id_prefix());
        }
        let id = shape.id.clone();
        self.shapes.push(shape);
        id
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    pub fn shape_mut(&mut self, id: &str) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    /// Copy a shape, offset it, and put the copy on top. Returns the new id.
    pub fn duplicate_shape(&mut self, id: &str) -> Option<String> {
        let mut copy = self.shape(id)?.clone();
        copy.id = self.next_shape_id(copy.id_prefix());
        copy.x += DUPLICATE_OFFSET_PX;
        copy.y += DUPLICATE_OFFSET_PX;
        Some(self.add_shape(copy))
    }

    pub fn remove_shape(&mut self, id: &str) -> Option<Shape> {
        let idx = self.shapes.iter().position(|s| s.id == id)?;
        Some(self.shapes.remove(idx))
    }

    pub fn move_shape(&mut self, id: &str, x: i32, y: i32) -> bool {
        self.shape_mut(id).map(|s| (s.x, s.y) = (x, y)).is_some()
    }

    pub fn resize_shape(&mut self, id: &str, w: i32, h: i32) -> bool {
        self.shape_mut(id)
            .map(|s| {
                s.w = w.max(MIN_SHAPE_EXTENT_PX);
                s.h = h.max(MIN_SHAPE_EXTENT_PX);
            })
            .is_some()
    }

    /// Rotate clockwise by `degrees`, normalized into `[0, 360)`.
    pub fn rotate_shape(&mut self, id: &str, degrees: f64) -> bool {
        self.shape_mut(id)
            .map(|s| s.rotation = (s.rotation + degrees).rem_euclid(360.0))
            .is_some()
    }

    pub fn set_shape_opacity(&mut self, id: &str, opacity: f64) -> bool {
        self.shape_mut(id)
            .map(|s| s.opacity = opacity.clamp(0.0, 1.0))
            .is_some()
    }

    /// Swap a shape with the one above it.
    pub fn bring_shape_forward(&mut self, id: &str) -> bool {
        match self.shapes.iter().position(|s| s.id == id) {
            Some(idx) if idx + 1 < self.shapes.len() => {
                self.shapes.swap(idx, idx + 1);
                true
            }
            _ => false,
        }
    }

    /// Swap a shape with the one below it.
    pub fn send_shape_backward(&mut self, id: &str) -> bool {
        match self.shapes.iter().position(|s| s.id == id) {
            Some(idx) if idx > 0 => {
                self.shapes.swap(idx, idx - 1);
                true
            }
            _ => false,
        }
    }

    fn next_shape_id(&self, prefix: &str) -> String {
        let mut n = self.shapes.len();
        loop {
            let candidate = format!("{prefix}_{n}");
            if self.shape(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn locate(pos: f64, size_of: impl Fn(u32) -> u32) -> (u32, f64) {
    let pos = if pos.is_finite() { pos.max(0.0) } else { 0.0 };
    let mut start = 0.0;
    let mut index = 0u32;
    loop {
        let size = f64::from(size_of(index));
        if start + size > pos || index == u32::MAX {
            return (index, pos - start);
        }
        start += size;
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::VectorForm;
    use pretty_assertions::assert_eq;

    fn range(a1: &str) -> Range {
        Range::from_a1(a1).unwrap()
    }

    #[test]
    fn extent_grows_without_overflowing_at_the_last_index() {
        let mut sheet = Sheet::new("Edge");
        sheet.set_value(u32::MAX, u32::MAX, 1.0);
        assert_eq!(sheet.row_count, u32::MAX);
        assert_eq!(sheet.col_count, u32::MAX);
    }

    #[test]
    fn blank_sheet_defaults() {
        let sheet = Sheet::blank("Sheet1");
        assert_eq!(sheet.row_count, 100);
        assert_eq!(sheet.col_count, 26);
        assert_eq!(sheet.columns.len(), 26);
        assert_eq!(sheet.columns[25].header, "Z");
        assert!(sheet.columns.iter().all(|c| c.width == 85));
        assert_eq!(sheet.columns[0].allowed_roles, UserRole::EDITORS.to_vec());
        assert!(sheet.rows.is_empty() && sheet.merges.is_empty() && sheet.shapes.is_empty());
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let mut sheet = Sheet::blank("S");
        assert_eq!(sheet.value(5, 5), &CellValue::Empty);
        sheet.set_value(5, 5, 3.0);
        assert_eq!(sheet.value(5, 5), &CellValue::Number(3.0));
        assert!(sheet.remove_cell(5, 5).is_some());
        assert!(sheet.rows.is_empty());
    }

    #[test]
    fn geometry_uses_fallbacks_past_known_metadata() {
        let mut sheet = Sheet::new("S");
        sheet.columns = (0..3).map(|i| ColumnMetadata::new(i, 100, vec![])).collect();
        assert_eq!(sheet.column_x(2), 200);
        assert_eq!(sheet.column_x(4), 300 + 80);
        assert_eq!(sheet.row_y(2), 48);

        assert_eq!(sheet.locate_x(250.0), (2, 50.0));
        assert_eq!(sheet.locate_x(300.0), (3, 0.0));
        assert_eq!(sheet.locate_y(50.0), (2, 2.0));
    }

    #[test]
    fn resizing_applies_floors() {
        let mut sheet = Sheet::blank("S");
        sheet.set_column_width(1, 3);
        assert_eq!(sheet.column_width(1), MIN_RESIZED_COLUMN_WIDTH_PX);
        sheet.set_row_height(4, 1);
        assert_eq!(sheet.row_height(4), MIN_RESIZED_ROW_HEIGHT_PX);
        sheet.set_column_width(30, 120);
        assert_eq!(sheet.columns.len(), 31);
        assert_eq!(sheet.column_width(30), 120);
    }

    #[test]
    fn merge_moves_first_value_into_anchor() {
        let mut sheet = Sheet::blank("S");
        sheet.set_value(0, 1, "moved");
        sheet.set_value(1, 0, "stays");
        assert!(sheet.merge_cells(range("A1:B2")));
        assert_eq!(sheet.value(0, 0), &CellValue::from("moved"));
        assert_eq!(sheet.value(0, 1), &CellValue::Empty);
        assert_eq!(sheet.value(1, 0), &CellValue::from("stays"));
        assert_eq!(sheet.merge_at(CellRef::new(1, 1)), Some(&range("A1:B2")));
    }

    #[test]
    fn single_cell_merge_is_ignored() {
        let mut sheet = Sheet::blank("S");
        assert!(!sheet.merge_cells(range("C3")));
        assert!(sheet.merges.is_empty());
    }

    #[test]
    fn overlapping_merges_are_replaced() {
        let mut sheet = Sheet::blank("S");
        sheet.merge_cells(range("A1:B2"));
        sheet.merge_cells(range("D1:E1"));
        sheet.merge_cells(range("B1:D3"));
        assert_eq!(sheet.merges, vec![range("B1:D3")]);

        assert_eq!(sheet.unmerge_cells(range("C3")), 1);
        assert!(sheet.merges.is_empty());
    }

    #[test]
    fn shapes_append_on_top_with_unique_ids() {
        let mut sheet = Sheet::blank("S");
        let a = sheet.add_shape(Shape::form("", VectorForm::default(), 0, 0, 10, 10));
        let b = sheet.add_shape(Shape::form(a.clone(), VectorForm::default(), 5, 5, 10, 10));
        assert_ne!(a, b);

        let c = sheet.duplicate_shape(&a).unwrap();
        assert_eq!(sheet.shapes.last().unwrap().id, c);
        assert_eq!((sheet.shapes[2].x, sheet.shapes[2].y), (20, 20));

        assert!(sheet.send_shape_backward(&c));
        assert_eq!(sheet.shapes[1].id, c);
        assert!(sheet.remove_shape(&a).is_some());
        assert_eq!(sheet.shapes.len(), 2);
    }

    #[test]
    fn shape_transforms_are_clamped() {
        let mut sheet = Sheet::blank("S");
        let id = sheet.add_shape(Shape::form("", VectorForm::default(), 0, 0, 10, 10));
        sheet.rotate_shape(&id, -90.0);
        sheet.resize_shape(&id, 2, 50);
        sheet.set_shape_opacity(&id, 1.5);
        let shape = sheet.shape(&id).unwrap();
        assert_eq!(shape.rotation, 270.0);
        assert_eq!((shape.w, shape.h), (MIN_SHAPE_EXTENT_PX, 50));
        assert_eq!(shape.opacity, 1.0);
    }
}
