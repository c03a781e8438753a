use gridbook_model::{resolve_color, Color, ColorRef, LumTransform};
use roxmltree::Node;

/// Stand-in for scheme colors outside the theme palette (`phClr`, custom names).
pub(crate) const UNKNOWN_SCHEME_COLOR: Color = Color::from_u32(0x808080);

/// Theme index of a DrawingML scheme color name, matching the `theme` attribute of `styles.xml`.
fn scheme_to_theme_index(scheme: &str) -> Option<u32> {
    Some(match scheme {
        "lt1" | "bg1" => 0,
        "dk1" | "tx1" => 1,
        "lt2" | "bg2" => 2,
        "dk2" | "tx2" => 3,
        "accent1" => 4,
        "accent2" => 5,
        "accent3" => 6,
        "accent4" => 7,
        "accent5" => 8,
        "accent6" => 9,
        "hlink" => 10,
        "folHlink" => 11,
        _ => return None,
    })
}

/// `lumMod`/`lumOff` children, in 1/100000 units.
fn parse_lum(node: Node<'_, '_>) -> Option<LumTransform> {
    let fraction = |name: &str| {
        node.children()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .and_then(|n| n.attribute("val"))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| v / 100_000.0)
    };
    let lum_mod = fraction("lumMod");
    let lum_off = fraction("lumOff");
    if lum_mod.is_none() && lum_off.is_none() {
        return None;
    }
    Some(LumTransform {
        lum_mod: lum_mod.unwrap_or(1.0),
        lum_off: lum_off.unwrap_or(0.0),
    })
}

/// Resolve a single color element (`a:srgbClr`, `a:schemeClr`, `a:prstClr`, `a:sysClr`).
pub(crate) fn parse_color_element(node: Node<'_, '_>) -> Option<Color> {
    let val = node.attribute("val");
    let reference = match node.tag_name().name() {
        "srgbClr" => ColorRef::Rgb(Color::from_hex(val?)?),
        "schemeClr" => match scheme_to_theme_index(val?) {
            Some(index) => ColorRef::Theme { index, tint: 0.0 },
            None => ColorRef::Rgb(UNKNOWN_SCHEME_COLOR),
        },
        "prstClr" => ColorRef::Preset(val?.to_string()),
        "sysClr" => ColorRef::Rgb(
            node.attribute("lastClr")
                .and_then(Color::from_hex)
                .unwrap_or_else(|| match val {
                    Some("window") => Color::WHITE,
                    _ => Color::BLACK,
                }),
        ),
        _ => return None,
    };
    resolve_color(&reference, parse_lum(node))
}

/// First resolvable color among the element children of `container` (e.g. `a:solidFill`,
/// `a:fillRef`).
pub(crate) fn parse_color(container: Node<'_, '_>) -> Option<Color> {
    container
        .children()
        .filter(|n| n.is_element())
        .find_map(parse_color_element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    fn color_of(fill: &str) -> Option<Color> {
        let xml = format!(
            r#"<a:solidFill xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">{fill}</a:solidFill>"#
        );
        let doc = Document::parse(&xml).unwrap();
        parse_color(doc.root_element())
    }

    #[test]
    fn resolves_each_color_element() {
        assert_eq!(
            color_of(r#"<a:srgbClr val="FF0000"/>"#),
            Some(Color::from_u32(0xFF0000))
        );
        assert_eq!(color_of(r#"<a:schemeClr val="tx1"/>"#), Some(Color::BLACK));
        assert_eq!(color_of(r#"<a:schemeClr val="bg1"/>"#), Some(Color::WHITE));
        assert_eq!(
            color_of(r#"<a:schemeClr val="accent1"/>"#),
            Some(Color::from_u32(0x4472C4))
        );
        assert_eq!(
            color_of(r#"<a:schemeClr val="phClr"/>"#),
            Some(UNKNOWN_SCHEME_COLOR)
        );
        assert_eq!(color_of(r#"<a:prstClr val="white"/>"#), Some(Color::WHITE));
        assert_eq!(
            color_of(r#"<a:sysClr val="windowText" lastClr="111111"/>"#),
            Some(Color::from_u32(0x111111))
        );
        assert_eq!(color_of(r#"<a:prstClr val="chartreuse-ish"/>"#), None);
        assert_eq!(color_of(""), None);
    }

    #[test]
    fn luminance_children_are_applied() {
        assert_eq!(
            color_of(r#"<a:srgbClr val="FFFFFF"><a:lumMod val="50000"/></a:srgbClr>"#),
            Some(Color::from_u32(0x808080))
        );
        assert_eq!(
            color_of(r#"<a:schemeClr val="tx1"><a:lumMod val="75000"/><a:lumOff val="25000"/></a:schemeClr>"#),
            Some(Color::from_u32(0x404040))
        );
    }
}
