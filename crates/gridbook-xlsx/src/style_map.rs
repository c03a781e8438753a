//! Raw formatting records ⇄ normalized [`Style`].

use std::collections::HashMap;

use gridbook_model::{
    resolve_color, BorderLineStyle, BorderSide, Borders, CellValue, Color, ColorRef, DiagonalLine,
    HorizontalAlign, Paint, Style, TextRotation, VerticalAlign,
};

use crate::styles::{RawBorderEdge, StyleSheet};
use crate::xml::{escape_attr, SPREADSHEETML_NS, XML_DECLARATION};

/// First id available for custom number formats.
pub(crate) const FIRST_CUSTOM_NUM_FMT_ID: u32 = 164;

fn resolve(color: Option<&ColorRef>) -> Option<Color> {
    color.and_then(|c| resolve_color(c, None))
}

fn border_side(edge: &RawBorderEdge) -> Option<BorderSide> {
    let style = edge.style.as_deref()?;
    Some(BorderSide {
        style: BorderLineStyle::from_native(style).unwrap_or_default(),
        color: resolve(edge.color.as_ref()).unwrap_or(Color::BLACK),
    })
}

/// Horizontal alignment used when the format leaves it unset: numbers right, booleans centered,
/// everything else left.
fn inferred_alignment(value: &CellValue) -> HorizontalAlign {
    match value {
        CellValue::Number(_) => HorizontalAlign::Right,
        CellValue::Text(s) if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") => {
            HorizontalAlign::Center
        }
        _ => HorizontalAlign::Left,
    }
}

/// Normalized style for a cell with cell-format index `xf` (`None` when the cell has no `s`).
pub(crate) fn import_style(styles: &StyleSheet, xf: Option<usize>, value: &CellValue) -> Style {
    let raw = xf.and_then(|idx| styles.xf(idx));
    let mut style = Style::default();

    if let Some(font) = raw.and_then(|xf| styles.font(xf)) {
        style.bold = font.bold;
        style.italic = font.italic;
        style.underline = font.underline;
        style.color = resolve(font.color.as_ref());
    }
    style.color = Some(style.color.unwrap_or(Color::BLACK));

    if let Some(fill) = raw.and_then(|xf| styles.fill(xf)) {
        if fill.pattern.as_deref() == Some("solid") {
            style.background_color = resolve(fill.fg_color.as_ref()).map(Paint::Solid);
        }
    }

    if let Some(border) = raw.and_then(|xf| styles.border(xf)) {
        style.border = Borders {
            top: border_side(&border.top),
            bottom: border_side(&border.bottom),
            left: border_side(&border.left),
            right: border_side(&border.right),
        };
        let diagonal = border_side(&border.diagonal).unwrap_or(BorderSide {
            style: BorderLineStyle::Thin,
            color: Color::BLACK,
        });
        if border.diagonal_up {
            style.diagonal_up = Some(DiagonalLine::from_side(diagonal));
        }
        if border.diagonal_down {
            style.diagonal_down = Some(DiagonalLine::from_side(diagonal));
        }
    }

    let alignment = raw.and_then(|xf| xf.alignment.as_ref());
    style.align = Some(
        alignment
            .and_then(|a| a.horizontal.as_deref())
            .and_then(HorizontalAlign::from_native)
            .unwrap_or_else(|| inferred_alignment(value)),
    );
    style.vertical_align = Some(
        alignment
            .and_then(|a| a.vertical.as_deref())
            .and_then(VerticalAlign::from_native)
            .unwrap_or(VerticalAlign::Center),
    );
    let wraps_line_break = value.as_text().is_some_and(|s| s.contains('\n'));
    if alignment.is_some_and(|a| a.wrap_text) || wraps_line_break {
        style.wrap_text = Some(true);
    }
    style.text_rotation = alignment
        .and_then(|a| a.text_rotation)
        .and_then(TextRotation::from_native);

    style
}

/// Font overrides the export pipeline applies on top of a cell's style.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct FormatOverrides {
    /// Muted italic font for empty input placeholders.
    pub placeholder_color: Option<Color>,
    /// Alignment used when the style sets none.
    pub default_align: Option<HorizontalAlign>,
    /// Apply the date number format.
    pub date: bool,
}

/// Interns fonts, fills, borders and cell formats while worksheets are written, then renders
/// `styles.xml`.
#[derive(Debug)]
pub(crate) struct StyleSheetBuilder {
    date_format: String,
    fonts: Interner,
    fills: Interner,
    borders: Interner,
    xfs: Interner,
}

#[derive(Debug, Default)]
struct Interner {
    items: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl Interner {
    fn intern(&mut self, xml: String) -> u32 {
        if let Some(idx) = self.lookup.get(&xml) {
            return *idx;
        }
        let idx = self.items.len() as u32;
        self.lookup.insert(xml.clone(), idx);
        self.items.push(xml);
        idx
    }
}

impl StyleSheetBuilder {
    pub(crate) fn new(date_format: &str) -> Self {
        let mut builder = Self {
            date_format: date_format.to_string(),
            fonts: Interner::default(),
            fills: Interner::default(),
            borders: Interner::default(),
            xfs: Interner::default(),
        };
        builder.fonts.intern(font_xml(false, false, false, None));
        builder
            .fills
            .intern(r#"<fill><patternFill patternType="none"/></fill>"#.to_string());
        builder
            .fills
            .intern(r#"<fill><patternFill patternType="gray125"/></fill>"#.to_string());
        builder
            .borders
            .intern("<border><left/><right/><top/><bottom/><diagonal/></border>".to_string());
        builder
            .xfs
            .intern(r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#.to_string());
        builder
    }

    /// Cell-format index for `style` with `overrides` applied. Index 0 is the default format.
    pub(crate) fn cell_format(&mut self, style: Option<&Style>, overrides: &FormatOverrides) -> u32 {
        let default_style = Style::default();
        let style = style.unwrap_or(&default_style);

        let font_id = match overrides.placeholder_color {
            Some(color) => self.fonts.intern(font_xml(false, true, false, Some(color))),
            None => self.fonts.intern(font_xml(
                style.bold,
                style.italic,
                style.underline,
                style.color,
            )),
        };

        let fill_id = match style.background_color {
            Some(Paint::Solid(color)) if color != Color::WHITE => self.fills.intern(format!(
                r#"<fill><patternFill patternType="solid"><fgColor rgb="{}"/><bgColor indexed="64"/></patternFill></fill>"#,
                color.to_argb_hex()
            )),
            _ => 0,
        };

        let border_id = self.borders.intern(border_xml(style));

        let align = style.align.or(overrides.default_align);
        let mut alignment = String::from("<alignment");
        if let Some(align) = align {
            alignment.push_str(&format!(r#" horizontal="{}""#, align.as_native()));
        }
        alignment.push_str(&format!(
            r#" vertical="{}""#,
            style.vertical_align.unwrap_or_default().as_native()
        ));
        if style.wrap_text == Some(true) {
            alignment.push_str(r#" wrapText="1""#);
        }
        if let Some(rotation) = style.text_rotation {
            alignment.push_str(&format!(r#" textRotation="{}""#, rotation.to_native()));
        }
        alignment.push_str("/>");

        let num_fmt_id = if overrides.date {
            FIRST_CUSTOM_NUM_FMT_ID
        } else {
            0
        };
        let mut xf = format!(
            r#"<xf numFmtId="{num_fmt_id}" fontId="{font_id}" fillId="{fill_id}" borderId="{border_id}" xfId="0""#
        );
        if num_fmt_id != 0 {
            xf.push_str(r#" applyNumberFormat="1""#);
        }
        if font_id != 0 {
            xf.push_str(r#" applyFont="1""#);
        }
        if fill_id != 0 {
            xf.push_str(r#" applyFill="1""#);
        }
        if border_id != 0 {
            xf.push_str(r#" applyBorder="1""#);
        }
        xf.push_str(r#" applyAlignment="1">"#);
        xf.push_str(&alignment);
        xf.push_str("</xf>");
        self.xfs.intern(xf)
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(&format!(r#"<styleSheet xmlns="{SPREADSHEETML_NS}">"#));
        xml.push_str(&format!(
            r#"<numFmts count="1"><numFmt numFmtId="{FIRST_CUSTOM_NUM_FMT_ID}" formatCode="{}"/></numFmts>"#,
            escape_attr(&self.date_format)
        ));
        push_list(&mut xml, "fonts", &self.fonts.items);
        push_list(&mut xml, "fills", &self.fills.items);
        push_list(&mut xml, "borders", &self.borders.items);
        xml.push_str(
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
        );
        push_list(&mut xml, "cellXfs", &self.xfs.items);
        xml.push_str(
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
        );
        xml.push_str("</styleSheet>");
        xml
    }
}

fn push_list(xml: &mut String, tag: &str, items: &[String]) {
    xml.push_str(&format!(r#"<{tag} count="{}">"#, items.len()));
    for item in items {
        xml.push_str(item);
    }
    xml.push_str(&format!("</{tag}>"));
}

fn font_xml(bold: bool, italic: bool, underline: bool, color: Option<Color>) -> String {
    let mut xml = String::from("<font>");
    if bold {
        xml.push_str("<b/>");
    }
    if italic {
        xml.push_str("<i/>");
    }
    if underline {
        xml.push_str("<u/>");
    }
    xml.push_str(r#"<sz val="11"/>"#);
    match color {
        Some(color) => xml.push_str(&format!(r#"<color rgb="{}"/>"#, color.to_argb_hex())),
        None => xml.push_str(r#"<color theme="1"/>"#),
    }
    xml.push_str(r#"<name val="Calibri"/><family val="2"/><scheme val="minor"/></font>"#);
    xml
}

fn edge_xml(tag: &str, side: Option<BorderSide>) -> String {
    match side {
        Some(side) => format!(
            r#"<{tag} style="{}"><color rgb="{}"/></{tag}>"#,
            side.style.as_native(),
            side.color.to_argb_hex()
        ),
        None => format!("<{tag}/>"),
    }
}

fn border_xml(style: &Style) -> String {
    let mut xml = String::from("<border");
    if style.diagonal_up.is_some() {
        xml.push_str(r#" diagonalUp="1""#);
    }
    if style.diagonal_down.is_some() {
        xml.push_str(r#" diagonalDown="1""#);
    }
    xml.push('>');
    xml.push_str(&edge_xml("left", style.border.left));
    xml.push_str(&edge_xml("right", style.border.right));
    xml.push_str(&edge_xml("top", style.border.top));
    xml.push_str(&edge_xml("bottom", style.border.bottom));
    let diagonal = style.diagonal_up.or(style.diagonal_down).map(|d| BorderSide {
        style: d.style,
        color: d.color,
    });
    xml.push_str(&edge_xml("diagonal", diagonal));
    xml.push_str("</border>");
    xml
}
