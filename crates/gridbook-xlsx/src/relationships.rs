use roxmltree::Document;

use crate::error::Result;

pub(crate) const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub(crate) const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
pub(crate) const REL_DRAWING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
pub(crate) const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub type_: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub(crate) fn new(id: impl Into<String>, type_: &str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_: type_.to_string(),
            target: target.into(),
            external: false,
        }
    }
}

pub(crate) fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>> {
    let xml = String::from_utf8(xml.to_vec())?;
    let doc = Document::parse(&xml)?;

    let mut rels = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if node.tag_name().name() != "Relationship" {
            continue;
        }
        let Some(id) = node.attribute("Id") else {
            continue;
        };
        rels.push(Relationship {
            id: id.to_string(),
            type_: node.attribute("Type").unwrap_or_default().to_string(),
            target: node.attribute("Target").unwrap_or_default().to_string(),
            external: node
                .attribute("TargetMode")
                .is_some_and(|mode| mode.eq_ignore_ascii_case("External")),
        });
    }
    Ok(rels)
}

pub(crate) fn write_relationships(rels: &[Relationship]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    );
    for rel in rels {
        xml.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
            crate::xml::escape_attr(&rel.id),
            crate::xml::escape_attr(&rel.type_),
            crate::xml::escape_attr(&rel.target),
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_types_and_external_mode() {
        let xml = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
  <Relationship Type="orphan" Target="x"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].type_, REL_IMAGE);
        assert_eq!(rels[0].target, "../media/image1.png");
        assert!(!rels[0].external);
        assert!(rels[1].external);
    }

    #[test]
    fn written_relationships_parse_back() {
        let rels = vec![Relationship::new("rId1", REL_DRAWING, "../drawings/drawing1.xml")];
        let parsed = parse_relationships(write_relationships(&rels).as_bytes()).unwrap();
        assert_eq!(parsed, rels);
    }
}
