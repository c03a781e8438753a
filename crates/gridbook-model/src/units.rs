//! Conversions between workbook-native units and screen pixels.
//!
//! Drawing objects and sheet dimensions use unrelated native units:
//! - drawing offsets/extents are in EMUs (English Metric Units),
//! - column widths are in "characters" of the default font,
//! - row heights are in points.
//!
//! All ratios live here as named constants so import and export use exactly the same numbers.

/// EMUs per CSS pixel at 96 DPI: 914400 EMU per inch / 96 px per inch.
pub const EMU_PER_PIXEL: f64 = 9525.0;

/// DrawingML line widths are stored in EMU; 12700 EMU make one point.
pub const EMU_PER_POINT: f64 = 12700.0;

/// Pixels per character of column width for the default Calibri 11 font (7 px glyph plus
/// padding, averaged).
pub const PIXELS_PER_CHAR: f64 = 7.2;

/// Pixels per point at 96 DPI (96 / 72).
pub const PIXELS_PER_POINT: f64 = 4.0 / 3.0;

/// Narrowest column produced by import, in pixels.
pub const MIN_COLUMN_WIDTH_PX: u32 = 25;

/// Narrowest column produced by interactive resizing, in pixels.
pub const MIN_RESIZED_COLUMN_WIDTH_PX: u32 = 30;

/// Shortest row, in pixels.
pub const MIN_ROW_HEIGHT_PX: u32 = 8;

/// Shortest row produced by interactive resizing, in pixels.
pub const MIN_RESIZED_ROW_HEIGHT_PX: u32 = 16;

/// Smallest shape extent produced by interactive resizing, in pixels.
pub const MIN_SHAPE_EXTENT_PX: i32 = 10;

/// Narrowest exported column, in characters.
pub const MIN_COLUMN_WIDTH_CHARS: f64 = 2.0;

/// Column width assumed by a sheet with no `defaultColWidth`, in characters.
pub const DEFAULT_COLUMN_WIDTH_CHARS: f64 = 8.43;

/// Row height assumed by a sheet with no `defaultRowHeight`, in points.
pub const DEFAULT_ROW_HEIGHT_PT: f64 = 15.0;

/// Geometry used for columns/rows missing from the model when positioning anchors.
pub const FALLBACK_COLUMN_WIDTH_PX: u32 = 80;
pub const FALLBACK_ROW_HEIGHT_PX: u32 = 24;

/// Column width of a freshly generated blank sheet.
pub const BLANK_COLUMN_WIDTH_PX: u32 = 85;

#[inline]
pub fn emu_to_px(emu: i64) -> f64 {
    emu as f64 / EMU_PER_PIXEL
}

#[inline]
pub fn px_to_emu(px: f64) -> i64 {
    (px * EMU_PER_PIXEL).round() as i64
}

/// Line width in EMU to pixels, following the point-based DrawingML convention.
#[inline]
pub fn line_emu_to_px(emu: i64) -> f64 {
    emu as f64 / EMU_PER_POINT
}

#[inline]
pub fn px_to_line_emu(px: f64) -> i64 {
    (px * EMU_PER_POINT).round() as i64
}

/// Column width in characters to pixels, floored at [`MIN_COLUMN_WIDTH_PX`].
pub fn column_chars_to_px(chars: f64) -> u32 {
    let px = (chars * PIXELS_PER_CHAR).round();
    if !px.is_finite() || px < MIN_COLUMN_WIDTH_PX as f64 {
        return MIN_COLUMN_WIDTH_PX;
    }
    px as u32
}

/// Column width in pixels to characters, floored at [`MIN_COLUMN_WIDTH_CHARS`].
pub fn column_px_to_chars(px: u32) -> f64 {
    (px as f64 / PIXELS_PER_CHAR).max(MIN_COLUMN_WIDTH_CHARS)
}

/// Row height in points to pixels, floored at [`MIN_ROW_HEIGHT_PX`].
pub fn row_pt_to_px(points: f64) -> u32 {
    let px = (points * PIXELS_PER_POINT).round();
    if !px.is_finite() || px < MIN_ROW_HEIGHT_PX as f64 {
        return MIN_ROW_HEIGHT_PX;
    }
    px as u32
}

pub fn row_px_to_pt(px: u32) -> f64 {
    px as f64 / PIXELS_PER_POINT
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_sizes() {
        assert_eq!(column_chars_to_px(DEFAULT_COLUMN_WIDTH_CHARS), 61);
        assert_eq!(row_pt_to_px(DEFAULT_ROW_HEIGHT_PT), 20);
        assert_eq!(row_px_to_pt(20), 15.0);
    }

    #[test]
    fn floors_apply_after_conversion() {
        assert_eq!(column_chars_to_px(0.0), MIN_COLUMN_WIDTH_PX);
        assert_eq!(column_chars_to_px(-4.0), MIN_COLUMN_WIDTH_PX);
        assert_eq!(row_pt_to_px(0.0), MIN_ROW_HEIGHT_PX);
        assert_eq!(column_px_to_chars(5), MIN_COLUMN_WIDTH_CHARS);
    }

    #[test]
    fn emu_conversions() {
        assert_eq!(emu_to_px(952_500), 100.0);
        assert_eq!(px_to_emu(100.0), 952_500);
        assert_eq!(line_emu_to_px(25_400), 2.0);
    }

    proptest! {
        #[test]
        fn column_width_round_trips_within_a_pixel(px in MIN_COLUMN_WIDTH_PX..2_000u32) {
            let back = column_chars_to_px(column_px_to_chars(px));
            prop_assert!(back.abs_diff(px) <= 1, "{px} -> {back}");
        }

        #[test]
        fn row_height_round_trips_within_a_pixel(px in MIN_ROW_HEIGHT_PX..2_000u32) {
            let back = row_pt_to_px(row_px_to_pt(px));
            prop_assert!(back.abs_diff(px) <= 1, "{px} -> {back}");
        }
    }
}
