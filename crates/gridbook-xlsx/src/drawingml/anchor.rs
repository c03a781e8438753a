use gridbook_model::units::{emu_to_px, px_to_emu};
use gridbook_model::Sheet;
use roxmltree::Node;

/// Size used for a one-cell anchor that declares no extent.
pub(crate) const DEFAULT_EXTENT_PX: f64 = 100.0;

/// A cell corner plus an EMU offset into that cell.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct AnchorPoint {
    pub col: u32,
    pub row: u32,
    pub col_off: i64,
    pub row_off: i64,
}

impl AnchorPoint {
    /// Absolute pixel position of this point given the sheet's current column widths and row
    /// heights.
    pub(crate) fn to_pixels(self, sheet: &Sheet) -> (f64, f64) {
        (
            sheet.column_x(self.col) as f64 + emu_to_px(self.col_off),
            sheet.row_y(self.row) as f64 + emu_to_px(self.row_off),
        )
    }

    /// Inverse of [`AnchorPoint::to_pixels`].
    pub(crate) fn from_pixels(sheet: &Sheet, x: f64, y: f64) -> Self {
        let (col, dx) = sheet.locate_x(x);
        let (row, dy) = sheet.locate_y(y);
        Self {
            col,
            row,
            col_off: px_to_emu(dx),
            row_off: px_to_emu(dy),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Anchor {
    Absolute { x: i64, y: i64, cx: i64, cy: i64 },
    OneCell { from: AnchorPoint, ext: Option<(i64, i64)> },
    TwoCell { from: AnchorPoint, to: AnchorPoint },
}

/// Pixel rectangle in absolute sheet coordinates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Anchor {
    pub(crate) fn to_rect(&self, sheet: &Sheet) -> Rect {
        match *self {
            Anchor::Absolute { x, y, cx, cy } => Rect {
                x: emu_to_px(x),
                y: emu_to_px(y),
                w: emu_to_px(cx),
                h: emu_to_px(cy),
            },
            Anchor::OneCell { from, ext } => {
                let (x, y) = from.to_pixels(sheet);
                let (w, h) = ext.map_or((DEFAULT_EXTENT_PX, DEFAULT_EXTENT_PX), |(cx, cy)| {
                    (emu_to_px(cx), emu_to_px(cy))
                });
                Rect { x, y, w, h }
            }
            Anchor::TwoCell { from, to } => {
                let (x1, y1) = from.to_pixels(sheet);
                let (x2, y2) = to.to_pixels(sheet);
                Rect {
                    x: x1.min(x2),
                    y: y1.min(y2),
                    w: (x2 - x1).abs(),
                    h: (y2 - y1).abs(),
                }
            }
        }
    }
}

/// Parse `xdr:absoluteAnchor`, `xdr:oneCellAnchor` or `xdr:twoCellAnchor`.
///
/// Missing `colOff`/`rowOff` default to 0 and whitespace around numbers is tolerated.
pub(crate) fn parse_anchor(anchor: Node<'_, '_>) -> Option<Anchor> {
    match anchor.tag_name().name() {
        "absoluteAnchor" => {
            let pos = child(anchor, "pos")?;
            let ext = child(anchor, "ext")?;
            Some(Anchor::Absolute {
                x: parse_attr_i64(pos, "x")?,
                y: parse_attr_i64(pos, "y")?,
                cx: parse_attr_i64(ext, "cx")?,
                cy: parse_attr_i64(ext, "cy")?,
            })
        }
        "oneCellAnchor" => Some(Anchor::OneCell {
            from: parse_anchor_point(child(anchor, "from")?)?,
            ext: child(anchor, "ext")
                .and_then(|ext| Some((parse_attr_i64(ext, "cx")?, parse_attr_i64(ext, "cy")?))),
        }),
        "twoCellAnchor" => Some(Anchor::TwoCell {
            from: parse_anchor_point(child(anchor, "from")?)?,
            to: parse_anchor_point(child(anchor, "to")?)?,
        }),
        _ => None,
    }
}

fn is_anchor_node(node: Node<'_, '_>) -> bool {
    node.is_element()
        && matches!(
            node.tag_name().name(),
            "oneCellAnchor" | "twoCellAnchor" | "absoluteAnchor"
        )
}

/// Anchor nodes directly under `xdr:wsDr`, in document order.
///
/// `mc:AlternateContent` is transparent: the first `mc:Choice` holding anchors wins, otherwise the
/// first such `mc:Fallback`. Searching all descendants would count both branches.
pub(crate) fn wsdr_anchor_nodes<'a, 'input>(wsdr: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut out = Vec::new();
    for node in wsdr.children().filter(|n| n.is_element()) {
        if is_anchor_node(node) {
            out.push(node);
        } else if node.tag_name().name() == "AlternateContent" {
            out.extend(select_alternate_branch(node, true));
        }
    }
    out
}

/// Element children of `node`, with every `mc:AlternateContent` replaced by the children of its
/// selected branch.
pub(crate) fn element_children<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    let mut out = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "AlternateContent" {
            out.extend(select_alternate_branch(child, false));
        } else {
            out.push(child);
        }
    }
    out
}

/// Nodes of the first non-empty `mc:Choice`, else of the first non-empty `mc:Fallback`.
/// `anchors` selects anchor descendants; otherwise the branch's element children are taken.
fn select_alternate_branch<'a, 'input>(
    node: Node<'a, 'input>,
    anchors: bool,
) -> Vec<Node<'a, 'input>> {
    for branch_name in ["Choice", "Fallback"] {
        for branch in node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == branch_name)
        {
            let found: Vec<_> = if anchors {
                branch.descendants().filter(|n| is_anchor_node(*n)).collect()
            } else {
                branch.children().filter(|n| n.is_element()).collect()
            };
            if !found.is_empty() {
                return found;
            }
        }
    }
    Vec::new()
}

fn parse_anchor_point(node: Node<'_, '_>) -> Option<AnchorPoint> {
    Some(AnchorPoint {
        col: child_text(node, "col")?.trim().parse().ok()?,
        row: child_text(node, "row")?.trim().parse().ok()?,
        col_off: child_text(node, "colOff")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
        row_off: child_text(node, "rowOff")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0),
    })
}

pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

pub(crate) fn parse_attr_i64(node: Node<'_, '_>, attr: &str) -> Option<i64> {
    node.attribute(attr)?.trim().parse().ok()
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbook_model::ColumnMetadata;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    const NS: &str = r#"xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing"
      xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006""#;

    fn sheet_with_uniform_columns(width: u32) -> Sheet {
        let mut sheet = Sheet::new("S");
        sheet.columns = (0..10).map(|i| ColumnMetadata::new(i, width, Vec::new())).collect();
        sheet
    }

    #[test]
    fn column_two_offset_zero_starts_at_160() {
        let xml = format!(
            r#"<xdr:wsDr {NS}><xdr:oneCellAnchor>
  <xdr:from><xdr:col>2</xdr:col><xdr:row> 1 </xdr:row></xdr:from>
  <xdr:ext cx="952500" cy="476250"/>
</xdr:oneCellAnchor></xdr:wsDr>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let anchors = wsdr_anchor_nodes(doc.root_element());
        let anchor = parse_anchor(anchors[0]).unwrap();
        let rect = anchor.to_rect(&sheet_with_uniform_columns(80));
        assert_eq!(
            rect,
            Rect {
                x: 160.0,
                y: 24.0,
                w: 100.0,
                h: 50.0
            }
        );
    }

    #[test]
    fn two_cell_anchor_spans_both_corners() {
        let xml = format!(
            r#"<xdr:wsDr {NS}><xdr:twoCellAnchor>
  <xdr:from><xdr:col>3</xdr:col><xdr:colOff>95250</xdr:colOff><xdr:row>2</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>
  <xdr:to><xdr:col>1</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>4</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>
</xdr:twoCellAnchor></xdr:wsDr>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let anchor = parse_anchor(wsdr_anchor_nodes(doc.root_element())[0]).unwrap();
        let rect = anchor.to_rect(&sheet_with_uniform_columns(50));
        assert_eq!(rect.x, 50.0);
        assert_eq!(rect.w, 110.0);
        assert_eq!(rect.y, 48.0);
        assert_eq!(rect.h, 48.0);
    }

    #[test]
    fn alternate_content_yields_one_branch() {
        let xml = format!(
            r#"<xdr:wsDr {NS}>
  <mc:AlternateContent>
    <mc:Choice Requires="a14"><xdr:absoluteAnchor><xdr:pos x="0" y="0"/><xdr:ext cx="1" cy="1"/></xdr:absoluteAnchor></mc:Choice>
    <mc:Fallback><xdr:absoluteAnchor><xdr:pos x="9" y="9"/><xdr:ext cx="1" cy="1"/></xdr:absoluteAnchor></mc:Fallback>
  </mc:AlternateContent>
</xdr:wsDr>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let anchors = wsdr_anchor_nodes(doc.root_element());
        assert_eq!(anchors.len(), 1);
        assert_eq!(
            parse_anchor(anchors[0]),
            Some(Anchor::Absolute {
                x: 0,
                y: 0,
                cx: 1,
                cy: 1
            })
        );
    }

    #[test]
    fn pixel_points_invert() {
        let sheet = sheet_with_uniform_columns(80);
        let point = AnchorPoint::from_pixels(&sheet, 170.0, 30.0);
        assert_eq!(
            point,
            AnchorPoint {
                col: 2,
                row: 1,
                col_off: 95250,
                row_off: 57150
            }
        );
        assert_eq!(point.to_pixels(&sheet), (170.0, 30.0));
    }

    #[test]
    fn one_cell_anchor_without_extent_uses_default_size() {
        let anchor = Anchor::OneCell {
            from: AnchorPoint::default(),
            ext: None,
        };
        let rect = anchor.to_rect(&sheet_with_uniform_columns(80));
        assert_eq!((rect.w, rect.h), (DEFAULT_EXTENT_PX, DEFAULT_EXTENT_PX));
    }
}
