//! In-memory data model for Gridbook workbooks.
//!
//! A [`Workbook`] is an ordered list of [`Sheet`]s. Each sheet exclusively owns its sparse cells,
//! row/column geometry, merge ranges and floating [`Shape`]s; every mutation goes through the
//! operations on [`Sheet`].

pub mod address;
pub mod cell;
pub mod color;
pub mod input;
pub mod input_syntax;
pub mod shape;
pub mod sheet;
pub mod style;
pub mod units;
pub mod workbook;

pub use address::{
    column_index, column_label, A1ParseError, CellRef, MergeRange, Range, RangeParseError,
    EXCEL_MAX_COLS, EXCEL_MAX_ROWS,
};
pub use cell::{format_number, Cell, CellValue};
pub use color::{resolve_color, Color, ColorRef, LumTransform, Paint};
pub use input::{
    ConditionalAction, ConditionalRule, InputDescriptor, InputKind, UidConfig, UserRole,
    ValidationRule,
};
pub use input_syntax::{parse_cell_text, ParsedCellText};
pub use shape::{Geometry, Shape, ShapeKind, TextAlign, TextRun, VectorForm};
pub use sheet::{ColumnMetadata, RowMetadata, Sheet};
pub use style::{
    BorderLineStyle, BorderSide, Borders, DiagonalLine, HorizontalAlign, RenderTheme, Style,
    TextRotation, VerticalAlign,
};
pub use workbook::{EnvelopeError, Workbook};
