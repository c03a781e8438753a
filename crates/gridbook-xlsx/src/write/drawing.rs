use gridbook_model::units::px_to_emu;

use crate::xml::escape_attr;

use super::worksheet::Picture;

const SPREADSHEET_DRAWING_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const DRAWINGML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// Angles in DrawingML are stored in 60000ths of a degree.
const ANGLE_UNITS_PER_DEGREE: f64 = 60_000.0;

/// `xl/drawings/drawingN.xml` holding one one-cell-anchored picture per entry. Picture `i`
/// references its media through relationship `rId{i + 1}`.
pub(crate) fn drawing_xml(pictures: &[Picture]) -> String {
    let mut xml = String::from(crate::xml::XML_DECLARATION);
    xml.push_str(&format!(
        r#"<xdr:wsDr xmlns:xdr="{SPREADSHEET_DRAWING_NS}" xmlns:a="{DRAWINGML_NS}" xmlns:r="{}">"#,
        crate::xml::RELATIONSHIPS_NS
    ));
    for (idx, picture) in pictures.iter().enumerate() {
        let id = idx + 1;
        let cx = px_to_emu(picture.width.max(1.0));
        let cy = px_to_emu(picture.height.max(1.0));
        let from = picture.from;

        xml.push_str("<xdr:oneCellAnchor>");
        xml.push_str(&format!(
            "<xdr:from><xdr:col>{}</xdr:col><xdr:colOff>{}</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>{}</xdr:rowOff></xdr:from>",
            from.col, from.col_off, from.row, from.row_off
        ));
        xml.push_str(&format!(r#"<xdr:ext cx="{cx}" cy="{cy}"/>"#));
        xml.push_str("<xdr:pic>");
        xml.push_str(&format!(
            r#"<xdr:nvPicPr><xdr:cNvPr id="{}" name="{}"/><xdr:cNvPicPr><a:picLocks noChangeAspect="1"/></xdr:cNvPicPr></xdr:nvPicPr>"#,
            id + 1,
            escape_attr(&format!("Picture {id}"))
        ));
        xml.push_str(&format!(r#"<xdr:blipFill><a:blip r:embed="rId{id}""#));
        if picture.opacity < 1.0 {
            let amount = (picture.opacity.clamp(0.0, 1.0) * 100_000.0).round() as i64;
            xml.push_str(&format!(r#"><a:alphaModFix amt="{amount}"/></a:blip>"#));
        } else {
            xml.push_str("/>");
        }
        xml.push_str("<a:stretch><a:fillRect/></a:stretch></xdr:blipFill>");

        xml.push_str("<xdr:spPr><a:xfrm");
        let rotation = (picture.rotation * ANGLE_UNITS_PER_DEGREE).round() as i64;
        if rotation != 0 {
            xml.push_str(&format!(r#" rot="{rotation}""#));
        }
        if picture.flip_h {
            xml.push_str(r#" flipH="1""#);
        }
        if picture.flip_v {
            xml.push_str(r#" flipV="1""#);
        }
        xml.push_str(&format!(
            r#"><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr>"#
        ));
        xml.push_str("</xdr:pic><xdr:clientData/></xdr:oneCellAnchor>");
    }
    xml.push_str("</xdr:wsDr>");
    xml
}
