//! Shape, connector, picture and group nodes of a worksheet drawing.
//!
//! Nodes are parsed into [`DrawingNode`] first and then placed by a single recursive visitor
//! that composes group transforms.

use gridbook_model::units::{line_emu_to_px, EMU_PER_PIXEL};
use gridbook_model::{Color, Geometry, Paint, TextAlign, TextRun, VectorForm, VerticalAlign};
use roxmltree::Node;

use super::anchor::{child, element_children, parse_attr_i64, Rect};
use super::color::parse_color;

/// Rotation unit of `a:xfrm@rot`.
const ROTATION_UNITS_PER_DEGREE: f64 = 60_000.0;

/// `a:xfrm` of a shape or group; lengths in EMU.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) struct Xfrm {
    pub off: (i64, i64),
    pub ext: (i64, i64),
    /// Child coordinate space of a group.
    pub ch_off: Option<(i64, i64)>,
    pub ch_ext: Option<(i64, i64)>,
    pub rotation: f64,
    pub flip_h: bool,
    pub flip_v: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DrawingNode {
    /// `xdr:sp` or `xdr:cxnSp`.
    Shape { xfrm: Option<Xfrm>, form: VectorForm },
    /// `xdr:pic`; `embed` is the relationship id of the image part.
    Picture { xfrm: Option<Xfrm>, embed: Option<String> },
    /// `xdr:grpSp`.
    Group { xfrm: Option<Xfrm>, children: Vec<DrawingNode> },
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PlacedContent {
    Form(VectorForm),
    Picture { embed: Option<String> },
}

/// A leaf node in absolute sheet pixels.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct PlacedNode {
    pub rect: Rect,
    pub rotation: f64,
    pub flip_h: bool,
    pub flip_v: bool,
    pub content: PlacedContent,
}

impl DrawingNode {
    /// Parse a node, or `None` for anything that is not a shape, connector, picture or group
    /// (`xdr:clientData`, `xdr:graphicFrame`, ...).
    pub(crate) fn parse(node: Node<'_, '_>) -> Option<Self> {
        match node.tag_name().name() {
            "sp" | "cxnSp" => Some(DrawingNode::Shape {
                xfrm: child(node, "spPr").and_then(parse_xfrm),
                form: parse_form(node),
            }),
            "pic" => Some(DrawingNode::Picture {
                xfrm: child(node, "spPr").and_then(parse_xfrm),
                embed: child(node, "blipFill")
                    .and_then(|fill| child(fill, "blip"))
                    .and_then(|blip| {
                        blip.attributes()
                            .find(|a| a.name() == "embed")
                            .map(|a| a.value().to_string())
                    }),
            }),
            "grpSp" => Some(DrawingNode::Group {
                xfrm: child(node, "grpSpPr").and_then(parse_xfrm),
                children: element_children(node)
                    .into_iter()
                    .filter_map(DrawingNode::parse)
                    .collect(),
            }),
            _ => None,
        }
    }

    fn xfrm(&self) -> Option<&Xfrm> {
        match self {
            DrawingNode::Shape { xfrm, .. }
            | DrawingNode::Picture { xfrm, .. }
            | DrawingNode::Group { xfrm, .. } => xfrm.as_ref(),
        }
    }

    /// Place this node into `frame` and append every leaf to `out`. Groups never produce a
    /// record themselves.
    pub(crate) fn place(&self, frame: Rect, out: &mut Vec<PlacedNode>) {
        let xfrm = self.xfrm().copied().unwrap_or_default();
        match self {
            DrawingNode::Shape { form, .. } => {
                out.push(placed(frame, &xfrm, PlacedContent::Form(form.clone())))
            }
            DrawingNode::Picture { embed, .. } => out.push(placed(
                frame,
                &xfrm,
                PlacedContent::Picture {
                    embed: embed.clone(),
                },
            )),
            DrawingNode::Group { children, xfrm } => {
                let space = ChildSpace::new(frame, xfrm.as_ref());
                for child in children {
                    let child_frame = child.xfrm().map_or(frame, |x| space.map(x));
                    child.place(child_frame, out);
                }
            }
        }
    }
}

fn placed(rect: Rect, xfrm: &Xfrm, content: PlacedContent) -> PlacedNode {
    PlacedNode {
        rect,
        rotation: xfrm.rotation,
        flip_h: xfrm.flip_h,
        flip_v: xfrm.flip_v,
        content,
    }
}

/// Maps a group's child coordinates (EMU) onto the group's pixel frame.
struct ChildSpace {
    frame: Rect,
    origin: (f64, f64),
    scale: (f64, f64),
}

impl ChildSpace {
    /// Without `chOff`/`chExt` the child space is the group's own offset and extent.
    fn new(frame: Rect, xfrm: Option<&Xfrm>) -> Self {
        let xfrm = xfrm.copied().unwrap_or_default();
        let (ox, oy) = xfrm.ch_off.unwrap_or(xfrm.off);
        let (ew, eh) = xfrm.ch_ext.unwrap_or(xfrm.ext);
        let scale = |px: f64, emu: i64| {
            if emu > 0 {
                px / emu as f64
            } else {
                1.0 / EMU_PER_PIXEL
            }
        };
        Self {
            frame,
            origin: (ox as f64, oy as f64),
            scale: (scale(frame.w, ew), scale(frame.h, eh)),
        }
    }

    fn map(&self, xfrm: &Xfrm) -> Rect {
        Rect {
            x: self.frame.x + (xfrm.off.0 as f64 - self.origin.0) * self.scale.0,
            y: self.frame.y + (xfrm.off.1 as f64 - self.origin.1) * self.scale.1,
            w: xfrm.ext.0 as f64 * self.scale.0,
            h: xfrm.ext.1 as f64 * self.scale.1,
        }
    }
}

fn parse_pair(node: Option<Node<'_, '_>>, a: &str, b: &str) -> Option<(i64, i64)> {
    let node = node?;
    Some((parse_attr_i64(node, a)?, parse_attr_i64(node, b)?))
}

fn is_on(node: Node<'_, '_>, attr: &str) -> bool {
    node.attribute(attr)
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

fn parse_xfrm(sp_pr: Node<'_, '_>) -> Option<Xfrm> {
    let xfrm = child(sp_pr, "xfrm")?;
    Some(Xfrm {
        off: parse_pair(child(xfrm, "off"), "x", "y").unwrap_or_default(),
        ext: parse_pair(child(xfrm, "ext"), "cx", "cy").unwrap_or_default(),
        ch_off: parse_pair(child(xfrm, "chOff"), "x", "y"),
        ch_ext: parse_pair(child(xfrm, "chExt"), "cx", "cy"),
        rotation: parse_attr_i64(xfrm, "rot").map_or(0.0, |r| r as f64 / ROTATION_UNITS_PER_DEGREE),
        flip_h: is_on(xfrm, "flipH"),
        flip_v: is_on(xfrm, "flipV"),
    })
}

fn parse_form(node: Node<'_, '_>) -> VectorForm {
    let sp_pr = child(node, "spPr");
    let style = child(node, "style");
    let mut form = VectorForm {
        geometry: sp_pr
            .and_then(|p| child(p, "prstGeom"))
            .and_then(|g| g.attribute("prst"))
            .map_or(Geometry::Rect, Geometry::from),
        ..VectorForm::default()
    };

    // Direct fill, then explicit no-fill, then the theme style reference.
    form.fill = sp_pr
        .and_then(|p| {
            if let Some(solid) = child(p, "solidFill") {
                return parse_color(solid).map(Paint::Solid);
            }
            child(p, "noFill").map(|_| Paint::Transparent)
        })
        .or_else(|| {
            style
                .and_then(|s| child(s, "fillRef"))
                .and_then(parse_color)
                .map(Paint::Solid)
        });

    match sp_pr.and_then(|p| child(p, "ln")) {
        Some(ln) => {
            form.stroke = Some(if child(ln, "noFill").is_some() {
                Paint::Transparent
            } else {
                Paint::Solid(
                    child(ln, "solidFill")
                        .and_then(parse_color)
                        .unwrap_or(Color::BLACK),
                )
            });
            if let Some(w) = parse_attr_i64(ln, "w") {
                form.stroke_width = line_emu_to_px(w);
            }
            form.stroke_dash = child(ln, "prstDash")
                .and_then(|d| d.attribute("val"))
                .map(str::to_string);
        }
        None => {
            form.stroke = style
                .and_then(|s| child(s, "lnRef"))
                .and_then(parse_color)
                .map(Paint::Solid);
        }
    }

    form.text = child(node, "txBody").and_then(parse_text);
    if form.text.is_some() && form.fill.is_none() {
        form.fill = Some(Paint::Solid(Color::WHITE));
    }
    form
}

fn parse_text(tx_body: Node<'_, '_>) -> Option<TextRun> {
    let paragraphs: Vec<Node<'_, '_>> = tx_body
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "p")
        .collect();

    let text = paragraphs
        .iter()
        .map(|p| {
            p.children()
                .filter(|n| n.is_element() && matches!(n.tag_name().name(), "r" | "fld"))
                .filter_map(|r| child(r, "t").and_then(|t| t.text()))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut run = TextRun {
        text: text.to_string(),
        ..TextRun::default()
    };

    run.vertical = match child(tx_body, "bodyPr").and_then(|b| b.attribute("anchor")) {
        Some("t") => VerticalAlign::Top,
        Some("b") => VerticalAlign::Bottom,
        _ => VerticalAlign::Center,
    };
    run.align = match paragraphs
        .first()
        .and_then(|p| child(*p, "pPr"))
        .and_then(|p| p.attribute("algn"))
    {
        Some("l") => TextAlign::Left,
        Some("r") => TextAlign::Right,
        _ => TextAlign::Center,
    };

    // Each property comes from the first run that declares it.
    let run_props: Vec<Node<'_, '_>> = paragraphs
        .iter()
        .flat_map(|p| p.children())
        .filter(|n| n.is_element() && n.tag_name().name() == "r")
        .filter_map(|r| child(r, "rPr"))
        .collect();
    run.color = run_props
        .iter()
        .find_map(|rpr| child(*rpr, "solidFill").and_then(parse_color));
    if let Some(sz) = run_props.iter().find_map(|rpr| parse_attr_i64(*rpr, "sz")) {
        run.size = sz as f64 / 100.0;
    }
    run.bold = run_props
        .iter()
        .find(|rpr| rpr.attribute("b").is_some())
        .is_some_and(|rpr| is_on(*rpr, "b"));
    Some(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    fn parse(xml: &str) -> DrawingNode {
        let wrapped = format!(
            r#"<root xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing"
                     xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
                     xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{xml}</root>"#
        );
        let doc = Document::parse(&wrapped).unwrap();
        let node = doc
            .root_element()
            .children()
            .find(|n| n.is_element())
            .unwrap();
        DrawingNode::parse(node).unwrap()
    }

    fn frame(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect { x, y, w, h }
    }

    #[test]
    fn shape_fill_stroke_and_text() {
        let node = parse(
            r#"<xdr:sp>
  <xdr:spPr>
    <a:xfrm rot="5400000" flipH="1"><a:off x="0" y="0"/><a:ext cx="10" cy="10"/></a:xfrm>
    <a:prstGeom prst="ellipse"/>
    <a:solidFill><a:srgbClr val="00FF00"/></a:solidFill>
    <a:ln w="25400"><a:solidFill><a:schemeClr val="accent2"/></a:solidFill><a:prstDash val="dash"/></a:ln>
  </xdr:spPr>
  <xdr:txBody>
    <a:bodyPr anchor="t"/>
    <a:p><a:pPr algn="r"/><a:r><a:rPr sz="1400" b="1"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:rPr><a:t>Hello</a:t></a:r></a:p>
    <a:p><a:r><a:t>world </a:t></a:r></a:p>
  </xdr:txBody>
</xdr:sp>"#,
        );
        let mut out = Vec::new();
        node.place(frame(10.0, 20.0, 30.0, 40.0), &mut out);
        assert_eq!(out.len(), 1);
        let placed = &out[0];
        assert_eq!(placed.rect, frame(10.0, 20.0, 30.0, 40.0));
        assert_eq!(placed.rotation, 90.0);
        assert!(placed.flip_h && !placed.flip_v);

        let PlacedContent::Form(form) = &placed.content else {
            panic!("expected a form");
        };
        assert_eq!(form.geometry, Geometry::Ellipse);
        assert_eq!(form.fill, Some(Paint::Solid(Color::from_u32(0x00FF00))));
        assert_eq!(form.stroke, Some(Paint::Solid(Color::from_u32(0xED7D31))));
        assert_eq!(form.stroke_width, 2.0);
        assert_eq!(form.stroke_dash.as_deref(), Some("dash"));

        let text = form.text.as_ref().unwrap();
        assert_eq!(text.text, "Hello\nworld");
        assert_eq!(text.color, Some(Color::from_u32(0xFF0000)));
        assert_eq!(text.size, 14.0);
        assert!(text.bold);
        assert_eq!(text.align, TextAlign::Right);
        assert_eq!(text.vertical, VerticalAlign::Top);
    }

    #[test]
    fn text_properties_come_from_the_first_run_declaring_each() {
        let node = parse(
            r#"<xdr:sp><xdr:spPr/><xdr:txBody><a:bodyPr/><a:p>
  <a:r><a:rPr lang="en-US"/><a:t>Hi </a:t></a:r>
  <a:r><a:rPr sz="1800" b="1"><a:solidFill><a:srgbClr val="FF0000"/></a:solidFill></a:rPr><a:t>there</a:t></a:r>
  <a:r><a:rPr sz="900" b="0"><a:solidFill><a:srgbClr val="0000FF"/></a:solidFill></a:rPr><a:t>!</a:t></a:r>
</a:p></xdr:txBody></xdr:sp>"#,
        );
        let DrawingNode::Shape { form, .. } = node else {
            panic!("expected a shape");
        };
        let text = form.text.unwrap();
        assert_eq!(text.text, "Hi there!");
        assert_eq!(text.color, Some(Color::from_u32(0xFF0000)));
        assert_eq!(text.size, 18.0);
        assert!(text.bold);

        let node = parse(
            r#"<xdr:sp><xdr:spPr/><xdr:txBody><a:bodyPr/><a:p>
  <a:r><a:rPr b="0"/><a:t>plain</a:t></a:r><a:r><a:rPr b="1"/><a:t>bold</a:t></a:r>
</a:p></xdr:txBody></xdr:sp>"#,
        );
        let DrawingNode::Shape { form, .. } = node else {
            panic!("expected a shape");
        };
        assert!(!form.text.unwrap().bold);
    }

    #[test]
    fn text_without_fill_defaults_to_white_and_style_refs_fill_in() {
        let node = parse(
            r#"<xdr:sp>
  <xdr:spPr/>
  <xdr:style>
    <a:lnRef idx="2"><a:schemeClr val="accent1"/></a:lnRef>
    <a:fillRef idx="1"><a:schemeClr val="accent3"/></a:fillRef>
  </xdr:style>
</xdr:sp>"#,
        );
        let DrawingNode::Shape { form, .. } = node else {
            panic!("expected a shape");
        };
        assert_eq!(form.fill, Some(Paint::Solid(Color::from_u32(0xA5A5A5))));
        assert_eq!(form.stroke, Some(Paint::Solid(Color::from_u32(0x4472C4))));

        let node = parse(
            r#"<xdr:sp><xdr:spPr/><xdr:txBody><a:bodyPr/><a:p><a:r><a:t>box</a:t></a:r></a:p></xdr:txBody></xdr:sp>"#,
        );
        let DrawingNode::Shape { form, .. } = node else {
            panic!("expected a shape");
        };
        assert_eq!(form.fill, Some(Paint::Solid(Color::WHITE)));
        let text = form.text.unwrap();
        assert_eq!(text.align, TextAlign::Center);
        assert_eq!(text.vertical, VerticalAlign::Center);
    }

    #[test]
    fn no_fill_and_connectors() {
        let node = parse(
            r#"<xdr:cxnSp><xdr:spPr><a:noFill/><a:ln><a:noFill/></a:ln></xdr:spPr></xdr:cxnSp>"#,
        );
        let DrawingNode::Shape { form, .. } = node else {
            panic!("expected a shape");
        };
        assert_eq!(form.geometry, Geometry::Rect);
        assert_eq!(form.fill, Some(Paint::Transparent));
        assert_eq!(form.stroke, Some(Paint::Transparent));
        assert_eq!(form.text, None);
    }

    #[test]
    fn group_halves_child_coordinates() {
        let node = parse(
            r#"<xdr:grpSp>
  <xdr:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="952500" cy="952500"/><a:chOff x="0" y="0"/><a:chExt cx="100" cy="100"/></a:xfrm></xdr:grpSpPr>
  <xdr:sp><xdr:spPr><a:xfrm><a:off x="40" y="20"/><a:ext cx="60" cy="80"/></a:xfrm></xdr:spPr></xdr:sp>
  <xdr:pic><xdr:blipFill><a:blip r:embed="rId3"/></xdr:blipFill><xdr:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="100" cy="100"/></a:xfrm></xdr:spPr></xdr:pic>
</xdr:grpSp>"#,
        );
        let mut out = Vec::new();
        node.place(frame(100.0, 200.0, 50.0, 50.0), &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].rect, frame(120.0, 210.0, 30.0, 40.0));
        assert_eq!(out[1].rect, frame(100.0, 200.0, 50.0, 50.0));
        assert_eq!(
            out[1].content,
            PlacedContent::Picture {
                embed: Some("rId3".to_string())
            }
        );
    }

    #[test]
    fn nested_groups_compose_scales() {
        let node = parse(
            r#"<xdr:grpSp>
  <xdr:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="1" cy="1"/><a:chOff x="0" y="0"/><a:chExt cx="200" cy="200"/></a:xfrm></xdr:grpSpPr>
  <xdr:grpSp>
    <xdr:grpSpPr><a:xfrm><a:off x="100" y="100"/><a:ext cx="100" cy="100"/><a:chOff x="0" y="0"/><a:chExt cx="10" cy="10"/></a:xfrm></xdr:grpSpPr>
    <xdr:sp><xdr:spPr><a:xfrm><a:off x="5" y="5"/><a:ext cx="5" cy="5"/></a:xfrm></xdr:spPr></xdr:sp>
  </xdr:grpSp>
</xdr:grpSp>"#,
        );
        let mut out = Vec::new();
        node.place(frame(0.0, 0.0, 100.0, 100.0), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].rect, frame(75.0, 75.0, 25.0, 25.0));
    }
}
