//! Raw formatting records from `xl/styles.xml`.
//!
//! Records are kept close to the file's shape (indices, attribute strings, unresolved colors);
//! [`crate::style_map`] turns them into the normalized [`gridbook_model::Style`].

use std::collections::HashMap;

use gridbook_model::{Color, ColorRef};
use roxmltree::{Document, Node};

use crate::error::Result;

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawFont {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<ColorRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawFill {
    pub pattern: Option<String>,
    pub fg_color: Option<ColorRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawBorderEdge {
    pub style: Option<String>,
    pub color: Option<ColorRef>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawBorder {
    pub left: RawBorderEdge,
    pub right: RawBorderEdge,
    pub top: RawBorderEdge,
    pub bottom: RawBorderEdge,
    pub diagonal: RawBorderEdge,
    pub diagonal_up: bool,
    pub diagonal_down: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawAlignment {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
    pub text_rotation: Option<u16>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawXf {
    pub num_fmt_id: u32,
    pub font_id: usize,
    pub fill_id: usize,
    pub border_id: usize,
    pub alignment: Option<RawAlignment>,
}

/// Everything a cell's `s` attribute can point at.
#[derive(Clone, Debug, Default)]
pub(crate) struct StyleSheet {
    pub num_fmts: HashMap<u32, String>,
    pub fonts: Vec<RawFont>,
    pub fills: Vec<RawFill>,
    pub borders: Vec<RawBorder>,
    pub cell_xfs: Vec<RawXf>,
}

impl StyleSheet {
    pub(crate) fn parse(xml: &[u8]) -> Result<Self> {
        let xml = String::from_utf8(xml.to_vec())?;
        let doc = Document::parse(&xml)?;
        let root = doc.root_element();

        let mut num_fmts = HashMap::new();
        if let Some(list) = child(root, "numFmts") {
            for num_fmt in children(list, "numFmt") {
                let id = num_fmt.attribute("numFmtId").and_then(|v| v.parse().ok());
                if let (Some(id), Some(code)) = (id, num_fmt.attribute("formatCode")) {
                    num_fmts.insert(id, code.to_string());
                }
            }
        }

        let fonts = child(root, "fonts")
            .map(|list| children(list, "font").map(parse_font).collect())
            .unwrap_or_default();
        let fills = child(root, "fills")
            .map(|list| children(list, "fill").map(parse_fill).collect())
            .unwrap_or_default();
        let borders = child(root, "borders")
            .map(|list| children(list, "border").map(parse_border).collect())
            .unwrap_or_default();
        let cell_xfs = child(root, "cellXfs")
            .map(|list| children(list, "xf").map(parse_xf).collect())
            .unwrap_or_default();

        Ok(Self {
            num_fmts,
            fonts,
            fills,
            borders,
            cell_xfs,
        })
    }

    pub(crate) fn xf(&self, index: usize) -> Option<&RawXf> {
        self.cell_xfs.get(index)
    }

    pub(crate) fn font(&self, xf: &RawXf) -> Option<&RawFont> {
        self.fonts.get(xf.font_id)
    }

    pub(crate) fn fill(&self, xf: &RawXf) -> Option<&RawFill> {
        self.fills.get(xf.fill_id)
    }

    pub(crate) fn border(&self, xf: &RawXf) -> Option<&RawBorder> {
        self.borders.get(xf.border_id)
    }

    /// Whether numbers formatted with `num_fmt_id` are dates.
    pub(crate) fn is_date_format(&self, num_fmt_id: u32) -> bool {
        if matches!(num_fmt_id, 14..=22 | 45..=47) {
            return true;
        }
        self.num_fmts
            .get(&num_fmt_id)
            .is_some_and(|code| is_date_format_code(code))
    }
}

/// A custom format code is a date when it has day/month/year tokens outside quoted text,
/// bracketed sections and escapes. A bare `m` only counts when no hour or second token is present.
pub(crate) fn is_date_format_code(code: &str) -> bool {
    let section = code.split(';').next().unwrap_or(code);
    let mut stripped = String::with_capacity(section.len());
    let mut chars = section.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '[' => {
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            other => stripped.push(other.to_ascii_lowercase()),
        }
    }

    if stripped.contains('d') || stripped.contains('y') {
        return true;
    }
    stripped.contains('m') && !stripped.contains('h') && !stripped.contains('s')
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// `<b/>` and `<b val="1"/>` are on, `<b val="0"/>` is off.
fn flag(node: Node<'_, '_>, name: &str) -> bool {
    child(node, name).is_some_and(|n| {
        n.attribute("val")
            .map_or(true, |v| !(v == "0" || v.eq_ignore_ascii_case("false")))
    })
}

fn parse_font(node: Node<'_, '_>) -> RawFont {
    RawFont {
        bold: flag(node, "b"),
        italic: flag(node, "i"),
        underline: child(node, "u").is_some_and(|u| u.attribute("val") != Some("none")),
        color: child(node, "color").and_then(parse_color),
    }
}

fn parse_fill(node: Node<'_, '_>) -> RawFill {
    let Some(pattern_fill) = child(node, "patternFill") else {
        return RawFill::default();
    };
    RawFill {
        pattern: pattern_fill.attribute("patternType").map(str::to_string),
        fg_color: child(pattern_fill, "fgColor").and_then(parse_color),
    }
}

fn parse_border(node: Node<'_, '_>) -> RawBorder {
    RawBorder {
        left: parse_edge(child(node, "left").or_else(|| child(node, "start"))),
        right: parse_edge(child(node, "right").or_else(|| child(node, "end"))),
        top: parse_edge(child(node, "top")),
        bottom: parse_edge(child(node, "bottom")),
        diagonal: parse_edge(child(node, "diagonal")),
        diagonal_up: is_true(node.attribute("diagonalUp")),
        diagonal_down: is_true(node.attribute("diagonalDown")),
    }
}

fn parse_edge(node: Option<Node<'_, '_>>) -> RawBorderEdge {
    let Some(node) = node else {
        return RawBorderEdge::default();
    };
    RawBorderEdge {
        style: node
            .attribute("style")
            .filter(|s| *s != "none")
            .map(str::to_string),
        color: child(node, "color").and_then(parse_color),
    }
}

fn parse_xf(node: Node<'_, '_>) -> RawXf {
    let index = |name: &str| {
        node.attribute(name)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0)
    };
    RawXf {
        num_fmt_id: node
            .attribute("numFmtId")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        font_id: index("fontId"),
        fill_id: index("fillId"),
        border_id: index("borderId"),
        alignment: child(node, "alignment").map(|a| RawAlignment {
            horizontal: a.attribute("horizontal").map(str::to_string),
            vertical: a.attribute("vertical").map(str::to_string),
            wrap_text: is_true(a.attribute("wrapText")),
            text_rotation: a.attribute("textRotation").and_then(|v| v.parse().ok()),
        }),
    }
}

/// SpreadsheetML `<color>`: `rgb` (ARGB), `theme` + `tint`, or `indexed`. `auto` is unset.
pub(crate) fn parse_color(node: Node<'_, '_>) -> Option<ColorRef> {
    if is_true(node.attribute("auto")) {
        return None;
    }
    if let Some(rgb) = node.attribute("rgb") {
        return Color::from_hex(rgb).map(ColorRef::Rgb);
    }
    if let Some(index) = node.attribute("theme").and_then(|v| v.parse().ok()) {
        let tint = node
            .attribute("tint")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        return Some(ColorRef::Theme { index, tint });
    }
    node.attribute("indexed")
        .and_then(|v| v.parse().ok())
        .map(ColorRef::Indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="2">
    <numFmt numFmtId="164" formatCode="dd\-mmm\-yy"/>
    <numFmt numFmtId="165" formatCode="&quot;day&quot; 0.00"/>
  </numFmts>
  <fonts count="2">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><i val="0"/><u/><color theme="4" tint="-0.25"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border><left/><right/><top/><bottom/><diagonal/></border>
    <border diagonalUp="1"><left style="thin"><color indexed="10"/></left><right style="none"/><top/><bottom style="medium"><color auto="1"/></bottom><diagonal style="dashed"/></border>
  </borders>
  <cellXfs count="2">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1" applyAlignment="1">
      <alignment horizontal="center" vertical="top" wrapText="1" textRotation="45"/>
    </xf>
  </cellXfs>
</styleSheet>"#;

    #[test]
    fn parses_every_record_list() {
        let styles = StyleSheet::parse(STYLES.as_bytes()).unwrap();
        let xf = styles.xf(1).unwrap();
        assert_eq!(xf.num_fmt_id, 164);

        let font = styles.font(xf).unwrap();
        assert!(font.bold && !font.italic && font.underline);
        assert_eq!(font.color, Some(ColorRef::Theme { index: 4, tint: -0.25 }));

        let fill = styles.fill(xf).unwrap();
        assert_eq!(fill.pattern.as_deref(), Some("solid"));
        assert_eq!(fill.fg_color, Some(ColorRef::Rgb(Color::from_u32(0xFFFF00))));

        let border = styles.border(xf).unwrap();
        assert_eq!(border.left.style.as_deref(), Some("thin"));
        assert_eq!(border.left.color, Some(ColorRef::Indexed(10)));
        assert_eq!(border.right.style, None);
        assert_eq!(border.bottom.color, None);
        assert!(border.diagonal_up && !border.diagonal_down);

        let alignment = xf.alignment.as_ref().unwrap();
        assert_eq!(alignment.horizontal.as_deref(), Some("center"));
        assert_eq!(alignment.text_rotation, Some(45));
        assert!(alignment.wrap_text);
    }

    #[test]
    fn date_formats_are_detected() {
        let styles = StyleSheet::parse(STYLES.as_bytes()).unwrap();
        assert!(styles.is_date_format(14));
        assert!(styles.is_date_format(164));
        assert!(!styles.is_date_format(165));
        assert!(!styles.is_date_format(0));
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("mmm yy"));
        assert!(!is_date_format_code("h:mm:ss"));
        assert!(!is_date_format_code("[Red]0.00"));
        assert!(!is_date_format_code("0.00\\d"));
    }

    #[test]
    fn missing_lists_are_empty() {
        let styles = StyleSheet::parse(br#"<styleSheet/>"#).unwrap();
        assert!(styles.xf(0).is_none());
    }
}
