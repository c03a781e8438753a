//! DrawingML worksheet drawings (`xl/drawings/drawingN.xml`).

use gridbook_model::Sheet;
use roxmltree::Document;

use crate::error::Result;

pub(crate) mod anchor;
pub(crate) mod color;
pub(crate) mod shapes;

pub(crate) use shapes::{PlacedContent, PlacedNode};

/// Decode every anchored leaf of a drawing part into absolute sheet pixels.
///
/// Positions are computed from the sheet's current column widths and row heights, so the sheet
/// geometry must be populated first. Anchors that cannot be parsed are logged and skipped.
pub(crate) fn decode_drawing(xml: &[u8], part_name: &str, sheet: &Sheet) -> Result<Vec<PlacedNode>> {
    let xml = String::from_utf8(xml.to_vec())?;
    let doc = Document::parse(&xml)?;

    let mut out = Vec::new();
    for (idx, node) in anchor::wsdr_anchor_nodes(doc.root_element())
        .into_iter()
        .enumerate()
    {
        let Some(parsed) = anchor::parse_anchor(node) else {
            log::warn!("{part_name}: skipping malformed anchor #{idx}");
            continue;
        };
        let frame = parsed.to_rect(sheet);
        for content in anchor::element_children(node) {
            if let Some(drawing_node) = shapes::DrawingNode::parse(content) {
                drawing_node.place(frame, &mut out);
            }
        }
    }
    Ok(out)
}
