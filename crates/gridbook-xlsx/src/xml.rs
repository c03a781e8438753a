//! Small helpers shared by the quick-xml readers and the string-building writers.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::{Result, XlsxError};

pub(crate) const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub(crate) const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(s: &str) -> String {
    escape_text(s)
        .replace('\"', "&quot;")
        .replace('\'', "&apos;")
        .replace('\n', "&#10;")
}

pub(crate) fn needs_space_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) || s.contains('\n')
}

/// Value of the attribute whose local name is `key` (prefixes such as `r:` are ignored).
pub(crate) fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Read the text content up to the matching end tag.
pub(crate) fn read_text(reader: &mut Reader<&[u8]>, end: QName<'_>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => {
                let t: Cow<'_, str> = e.unescape()?;
                text.push_str(&t);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8(e.into_inner().into_owned())?);
            }
            Event::End(e) if e.name() == end => break,
            Event::Eof => {
                return Err(XlsxError::Invalid(format!(
                    "unexpected eof inside <{}>",
                    String::from_utf8_lossy(end.as_ref())
                )))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

/// Skip the subtree opened by `start`.
pub(crate) fn skip_element(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<()> {
    let name = start.name().as_ref().to_vec();
    reader.read_to_end_into(QName(&name), &mut Vec::new())?;
    Ok(())
}
