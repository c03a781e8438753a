//! Rasterizes vector forms so they can be re-embedded as pictures.
//!
//! Coverage is sampled at pixel centers without anti-aliasing. Text uses a built-in 3x5 bitmap
//! font scaled to the run's point size.

use std::io::Cursor;

use gridbook_model::units::PIXELS_PER_POINT;
use gridbook_model::{Color, Geometry, Paint, TextAlign, TextRun, VectorForm, VerticalAlign};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba, RgbaImage};

use crate::error::{Result, XlsxError};

/// Corner radius of `roundRect` forms.
const ROUND_RECT_RADIUS_PX: f64 = 10.0;
/// Inset between the form's edge and left/right/top/bottom aligned text.
const TEXT_PADDING_PX: i64 = 4;

const GLYPH_WIDTH: i64 = 3;
const GLYPH_HEIGHT: i64 = 5;
const GLYPH_ADVANCE: i64 = GLYPH_WIDTH + 1;
const LINE_ADVANCE: i64 = GLYPH_HEIGHT + 1;

/// Largest canvas (in pixels) a form is rendered onto; 4096 x 4096.
pub const MAX_RASTER_PIXELS: u64 = 16_777_216;

/// Render `form` at `width` x `height` pixels and encode it as PNG.
///
/// Fails with [`XlsxError::Invalid`] when the canvas would exceed [`MAX_RASTER_PIXELS`].
pub fn render_form_png(form: &VectorForm, width: u32, height: u32, opacity: f64) -> Result<Vec<u8>> {
    let area = u64::from(width.max(1)) * u64::from(height.max(1));
    if area > MAX_RASTER_PIXELS {
        return Err(XlsxError::Invalid(format!(
            "form of {width}x{height} px exceeds the {MAX_RASTER_PIXELS} px raster limit"
        )));
    }
    let img = rasterize(form, width, height, opacity);
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

pub(crate) fn rasterize(form: &VectorForm, width: u32, height: u32, opacity: f64) -> RgbaImage {
    let width = width.max(1);
    let height = height.max(1);
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let mut img: RgbaImage = ImageBuffer::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    let w = f64::from(width);
    let h = f64::from(height);
    let fill = form.fill.and_then(Paint::color);
    let stroke = form.stroke.and_then(Paint::color);
    let stroke_width = form.stroke_width.max(0.0);
    let dash = form.stroke_dash.as_deref().and_then(dash_period);

    for py in 0..height {
        for px in 0..width {
            let x = f64::from(px) + 0.5;
            let y = f64::from(py) + 0.5;
            let stroked = stroke.filter(|_| {
                stroke_width > 0.0
                    && on_outline(&form.geometry, x, y, w, h, stroke_width)
                    && dash.map_or(true, |period| (px + py) / period % 2 == 0)
            });
            let color = match stroked {
                Some(color) => Some(color),
                None => fill.filter(|_| inside(&form.geometry, x, y, 0.0, w, h)),
            };
            if let Some(color) = color {
                img.put_pixel(px, py, rgba(color, alpha));
            }
        }
    }

    if let Some(text) = form.text.as_ref().filter(|t| !t.text.trim().is_empty()) {
        draw_text(&mut img, text, alpha);
    }
    img
}

fn rgba(color: Color, alpha: u8) -> Rgba<u8> {
    let [r, g, b] = color.channels();
    Rgba([r, g, b, alpha])
}

/// Dash period in pixels for a preset dash name; solid lines have none.
fn dash_period(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    if lower == "solid" {
        None
    } else if lower.contains("dot") {
        Some(2)
    } else {
        Some(6)
    }
}

/// Whether `(x, y)` lies inside `geometry` drawn in the box `(inset, inset)-(w - inset, h - inset)`.
fn inside(geometry: &Geometry, x: f64, y: f64, inset: f64, w: f64, h: f64) -> bool {
    let (left, top, right, bottom) = (inset, inset, w - inset, h - inset);
    if right <= left || bottom <= top {
        return false;
    }
    match geometry {
        Geometry::Ellipse => {
            let rx = (right - left) / 2.0;
            let ry = (bottom - top) / 2.0;
            let dx = (x - (left + rx)) / rx;
            let dy = (y - (top + ry)) / ry;
            dx * dx + dy * dy <= 1.0
        }
        Geometry::Triangle => {
            let apex = ((left + right) / 2.0, top);
            let base_left = (left, bottom);
            let base_right = (right, bottom);
            let edge = |a: (f64, f64), b: (f64, f64)| (b.0 - a.0) * (y - a.1) - (b.1 - a.1) * (x - a.0);
            let e1 = edge(apex, base_right);
            let e2 = edge(base_right, base_left);
            let e3 = edge(base_left, apex);
            (e1 >= 0.0 && e2 >= 0.0 && e3 >= 0.0) || (e1 <= 0.0 && e2 <= 0.0 && e3 <= 0.0)
        }
        Geometry::RoundRect => {
            if x < left || x > right || y < top || y > bottom {
                return false;
            }
            let r = ROUND_RECT_RADIUS_PX
                .min((right - left) / 2.0)
                .min((bottom - top) / 2.0);
            let cx = x.clamp(left + r, right - r);
            let cy = y.clamp(top + r, bottom - r);
            (x - cx).powi(2) + (y - cy).powi(2) <= r * r
        }
        Geometry::Line => false,
        Geometry::Rect | Geometry::Other(_) => x >= left && x <= right && y >= top && y <= bottom,
    }
}

fn on_outline(geometry: &Geometry, x: f64, y: f64, w: f64, h: f64, stroke_width: f64) -> bool {
    if *geometry == Geometry::Line {
        let len = (w * w + h * h).sqrt();
        let distance = (h * x - w * y).abs() / len;
        return distance <= (stroke_width / 2.0).max(0.5);
    }
    inside(geometry, x, y, 0.0, w, h) && !inside(geometry, x, y, stroke_width, w, h)
}

fn draw_text(img: &mut RgbaImage, text: &TextRun, alpha: u8) {
    let color = rgba(text.color.unwrap_or(Color::BLACK), alpha);
    let scale = ((text.size * PIXELS_PER_POINT * 0.7) / GLYPH_HEIGHT as f64)
        .round()
        .max(1.0) as i64;
    let (width, height) = (i64::from(img.width()), i64::from(img.height()));

    let lines: Vec<&str> = text.text.lines().collect();
    let block_height = lines.len() as i64 * LINE_ADVANCE * scale - scale;
    let top = match text.vertical {
        VerticalAlign::Top => TEXT_PADDING_PX,
        VerticalAlign::Bottom => height - TEXT_PADDING_PX - block_height,
        VerticalAlign::Center => (height - block_height) / 2,
    };

    for (line_idx, line) in lines.iter().enumerate() {
        let chars: Vec<char> = line.chars().collect();
        let line_width = (chars.len() as i64 * GLYPH_ADVANCE * scale - scale).max(0);
        let left = match text.align {
            TextAlign::Left => TEXT_PADDING_PX,
            TextAlign::Right => width - TEXT_PADDING_PX - line_width,
            TextAlign::Center => (width - line_width) / 2,
        };
        let y0 = top + line_idx as i64 * LINE_ADVANCE * scale;
        for (char_idx, ch) in chars.iter().enumerate() {
            let x0 = left + char_idx as i64 * GLYPH_ADVANCE * scale;
            draw_glyph(img, glyph(*ch), x0, y0, scale, color);
            if text.bold {
                draw_glyph(img, glyph(*ch), x0 + 1, y0, scale, color);
            }
        }
    }
}

fn draw_glyph(img: &mut RgbaImage, rows: [u8; 5], x0: i64, y0: i64, scale: i64, color: Rgba<u8>) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let x = x0 + col * scale + dx;
                    let y = y0 + row as i64 * scale + dy;
                    if x >= 0 && y >= 0 && x < i64::from(img.width()) && y < i64::from(img.height()) {
                        img.put_pixel(x as u32, y as u32, color);
                    }
                }
            }
        }
    }
}

/// Rows of a 3x5 glyph, top to bottom, most significant bit on the left. Letters are drawn in
/// upper case; unknown characters render as `?`.
fn glyph(ch: char) -> [u8; 5] {
    match ch.to_ascii_uppercase() {
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
        'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
        'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
        'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
        'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '&' => [0b010, 0b101, 0b010, 0b101, 0b011],
        '*' => [0b101, 0b010, 0b101, 0b000, 0b000],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '"' => [0b101, 0b101, 0b000, 0b000, 0b000],
        _ => [0b111, 0b001, 0b010, 0b000, 0b010],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(geometry: Geometry) -> VectorForm {
        VectorForm {
            geometry,
            fill: Some(Paint::Solid(Color::from_u32(0xFF0000))),
            ..VectorForm::default()
        }
    }

    fn opaque(img: &RgbaImage, x: u32, y: u32) -> bool {
        img.get_pixel(x, y).0[3] != 0
    }

    #[test]
    fn oversized_canvas_is_refused_before_allocating() {
        let err = render_form_png(&form(Geometry::Rect), 100_000, 100_000, 1.0).unwrap_err();
        assert!(matches!(err, XlsxError::Invalid(_)), "{err}");
        assert!(render_form_png(&form(Geometry::Rect), u32::MAX, 1, 1.0).is_err());

        let png = render_form_png(&form(Geometry::Rect), 4096, 1, 1.0).unwrap();
        assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn ellipse_leaves_corners_clear() {
        let img = rasterize(&form(Geometry::Ellipse), 40, 20, 1.0);
        assert!(opaque(&img, 20, 10));
        assert!(!opaque(&img, 0, 0));
        assert!(!opaque(&img, 39, 19));
        assert_eq!(img.get_pixel(20, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn triangle_points_up() {
        let img = rasterize(&form(Geometry::Triangle), 20, 20, 1.0);
        assert!(opaque(&img, 10, 1));
        assert!(!opaque(&img, 0, 1));
        assert!(opaque(&img, 1, 19));
        assert!(opaque(&img, 18, 19));
    }

    #[test]
    fn round_rect_clips_corners_only() {
        let img = rasterize(&form(Geometry::RoundRect), 40, 40, 1.0);
        assert!(!opaque(&img, 0, 0));
        assert!(opaque(&img, 20, 0));
        assert!(opaque(&img, 0, 20));
    }

    #[test]
    fn stroke_draws_over_fill_on_the_outline() {
        let mut f = form(Geometry::Rect);
        f.stroke = Some(Paint::Solid(Color::BLACK));
        f.stroke_width = 2.0;
        let img = rasterize(&f, 10, 10, 0.5);
        assert_eq!(img.get_pixel(0, 5).0, [0, 0, 0, 128]);
        assert_eq!(img.get_pixel(1, 5).0, [0, 0, 0, 128]);
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 128]);
    }

    #[test]
    fn transparent_forms_only_draw_text() {
        let f = VectorForm {
            fill: Some(Paint::Transparent),
            text: Some(TextRun {
                text: "Hi".into(),
                ..TextRun::default()
            }),
            ..VectorForm::default()
        };
        let img = rasterize(&f, 60, 30, 1.0);
        let inked = img.pixels().filter(|p| p.0[3] != 0).count();
        assert!(inked > 0);
        assert!(img.pixels().all(|p| p.0[3] == 0 || p.0[..3] == [0, 0, 0]));
    }

    #[test]
    fn png_encoding_produces_a_png() {
        let bytes = render_form_png(&form(Geometry::Rect), 8, 8, 1.0).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
