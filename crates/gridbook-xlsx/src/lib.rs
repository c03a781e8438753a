//! XLSX import and export for Gridbook workbooks.
//!
//! Import walks the package relationships from `_rels/.rels` to the workbook, its worksheets,
//! styles, shared strings and drawings, producing a [`gridbook_model::Workbook`]. Cell text goes
//! through the special input syntax; pictures become image shapes carrying data URLs and drawing
//! shapes become vector forms with group transforms flattened.
//!
//! Export writes cells, styles, merges, input validations and pictures. Vector forms are
//! rasterized to PNG and placed as pictures.
#![forbid(unsafe_code)]

mod drawingml;
mod error;
mod images;
mod path;
mod read;
mod relationships;
mod render;
mod shared_strings;
mod style_map;
mod styles;
mod worksheet;
mod write;
mod xml;
mod zip_util;

pub use error::XlsxError;
pub use read::{
    import_workbook, import_workbook_from_reader, import_workbook_with_options, ImportOptions,
};
pub use render::{render_form_png, MAX_RASTER_PIXELS};
pub use write::{export_sheets, export_workbook, export_workbook_with_options, ExportOptions};
pub use zip_util::{XlsxPackageLimits, DEFAULT_MAX_PART_BYTES, DEFAULT_MAX_TOTAL_BYTES};
