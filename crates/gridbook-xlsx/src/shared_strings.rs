use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::{Result, XlsxError};
use crate::xml::{escape_text, needs_space_preserve, read_text, skip_element, SPREADSHEETML_NS};

/// Parse `sharedStrings.xml` into plain strings; rich-text runs are concatenated.
pub(crate) fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(read_string_item(&mut reader, b"si")?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => items.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(items)
}

/// Visible text of an `<si>` or `<is>` element. Phonetic runs are skipped.
pub(crate) fn read_string_item(reader: &mut Reader<&[u8]>, end: &[u8]) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                let name = e.name().as_ref().to_vec();
                text.push_str(&read_text(reader, QName(&name))?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"r" => {}
            Event::End(e) if e.local_name().as_ref() == b"r" => {}
            Event::Start(e) => skip_element(reader, &e)?,
            Event::End(e) if e.local_name().as_ref() == end => break,
            Event::Eof => {
                return Err(XlsxError::Invalid(format!(
                    "unexpected eof in <{}>",
                    String::from_utf8_lossy(end)
                )))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Interning table used while writing worksheets.
#[derive(Debug, Default)]
pub(crate) struct SharedStringTable {
    strings: Vec<String>,
    lookup: std::collections::HashMap<String, u32>,
    ref_count: u32,
}

impl SharedStringTable {
    pub(crate) fn intern(&mut self, s: &str) -> u32 {
        self.ref_count += 1;
        if let Some(idx) = self.lookup.get(s) {
            return *idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), idx);
        idx
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::from(crate::xml::XML_DECLARATION);
        xml.push_str(&format!(
            r#"<sst xmlns="{SPREADSHEETML_NS}" count="{}" uniqueCount="{}">"#,
            self.ref_count,
            self.strings.len()
        ));
        for s in &self.strings {
            xml.push_str("<si><t");
            if needs_space_preserve(s) {
                xml.push_str(r#" xml:space="preserve""#);
            }
            xml.push('>');
            xml.push_str(&escape_text(s));
            xml.push_str("</t></si>");
        }
        xml.push_str("</sst>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rich_text_runs_are_concatenated_and_phonetics_dropped() {
        let xml = br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <si><t>plain</t></si>
  <si><r><rPr><b/></rPr><t>bold</t></r><r><t xml:space="preserve"> tail</t></r></si>
  <si><t>kanji</t><rPh sb="0" eb="1"><t>ruby</t></rPh></si>
  <si/>
</sst>"#;
        assert_eq!(
            parse_shared_strings(xml).unwrap(),
            vec!["plain", "bold tail", "kanji", ""]
        );
    }

    #[test]
    fn table_interns_and_writes_back() {
        let mut table = SharedStringTable::default();
        assert_eq!(table.intern("a"), 0);
        assert_eq!(table.intern(" b"), 1);
        assert_eq!(table.intern("a"), 0);
        let xml = table.to_xml();
        assert!(xml.contains(r#"count="3" uniqueCount="2""#));
        assert_eq!(parse_shared_strings(xml.as_bytes()).unwrap(), vec!["a", " b"]);
    }
}
