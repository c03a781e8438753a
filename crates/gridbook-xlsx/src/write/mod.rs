//! [`Workbook`] → container.

mod drawing;
mod worksheet;

use std::collections::{BTreeMap, HashSet};
use std::io::{Cursor, Write};

use gridbook_model::{Color, Sheet, Workbook};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::Result;
use crate::path::{rels_for_part, relative_target};
use crate::relationships::{
    write_relationships, Relationship, REL_DRAWING, REL_IMAGE, REL_OFFICE_DOCUMENT,
    REL_SHARED_STRINGS, REL_STYLES, REL_WORKSHEET,
};
use crate::shared_strings::SharedStringTable;
use crate::style_map::StyleSheetBuilder;
use crate::xml::{escape_attr, RELATIONSHIPS_NS, SPREADSHEETML_NS, XML_DECLARATION};

use self::drawing::drawing_xml;
use self::worksheet::{write_worksheet, WriteContext};

const MAX_SHEET_NAME_CHARS: usize = 31;
const INVALID_SHEET_NAME_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
const CT_DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";

/// Knobs for [`export_workbook_with_options`].
#[derive(Clone, Debug, PartialEq)]
pub struct ExportOptions {
    /// Gridlines are hidden in exported sheets unless this is set.
    pub show_grid_lines: bool,
    /// Text color for placeholder and `[label]` text written into empty input cells.
    pub placeholder_color: Color,
    /// Number format code applied to date input cells.
    pub date_format: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            show_grid_lines: false,
            placeholder_color: Color::from_u32(0x9CA3AF),
            date_format: "dd-mmm-yy".to_string(),
        }
    }
}

/// Export a workbook with default options.
pub fn export_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    export_workbook_with_options(workbook, &ExportOptions::default())
}

pub fn export_workbook_with_options(workbook: &Workbook, options: &ExportOptions) -> Result<Vec<u8>> {
    export_sheets(&workbook.sheets, options)
}

/// Export an ordered list of sheets as one workbook. An empty list yields a single blank sheet.
pub fn export_sheets(sheets: &[Sheet], options: &ExportOptions) -> Result<Vec<u8>> {
    let mut parts = build_parts(sheets, options);

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let file_options =
        FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in parts.iter_mut() {
        zip.start_file(name.as_str(), file_options)?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn build_parts(sheets: &[Sheet], options: &ExportOptions) -> BTreeMap<String, Vec<u8>> {
    let blank;
    let sheets = if sheets.is_empty() {
        blank = [Sheet::blank("Sheet1")];
        &blank[..]
    } else {
        sheets
    };

    let mut parts = BTreeMap::new();
    let mut shared_strings = SharedStringTable::default();
    let mut styles = StyleSheetBuilder::new(&options.date_format);
    let mut content_types = ContentTypes::default();
    let mut workbook_rels = Vec::new();
    let mut sheet_entries = Vec::new();
    let mut used_names = HashSet::new();
    let mut media_count = 0usize;
    let mut drawing_count = 0usize;

    for (idx, sheet) in sheets.iter().enumerate() {
        let number = idx + 1;
        let sheet_part = format!("xl/worksheets/sheet{number}.xml");
        let rel_id = format!("rId{number}");

        let mut ctx = WriteContext {
            options,
            shared_strings: &mut shared_strings,
            styles: &mut styles,
        };
        let output = write_worksheet(sheet, &mut ctx, "rId1");

        if !output.pictures.is_empty() {
            drawing_count += 1;
            let drawing_part = format!("xl/drawings/drawing{drawing_count}.xml");
            let mut drawing_rels = Vec::with_capacity(output.pictures.len());
            for (pic_idx, picture) in output.pictures.iter().enumerate() {
                media_count += 1;
                let media_part = format!("xl/media/image{media_count}.{}", picture.image.extension);
                content_types.add_default(picture.image.extension, picture.image.content_type());
                drawing_rels.push(Relationship::new(
                    format!("rId{}", pic_idx + 1),
                    REL_IMAGE,
                    relative_target(&drawing_part, &media_part),
                ));
                parts.insert(media_part, picture.image.bytes.clone());
            }
            parts.insert(
                rels_for_part(&drawing_part),
                write_relationships(&drawing_rels).into_bytes(),
            );
            parts.insert(drawing_part.clone(), drawing_xml(&output.pictures).into_bytes());
            content_types.part(&drawing_part, CT_DRAWING);

            let sheet_rels = [Relationship::new(
                "rId1",
                REL_DRAWING,
                relative_target(&sheet_part, &drawing_part),
            )];
            parts.insert(
                rels_for_part(&sheet_part),
                write_relationships(&sheet_rels).into_bytes(),
            );
        }

        parts.insert(sheet_part.clone(), output.xml.into_bytes());
        content_types.part(&sheet_part, CT_WORKSHEET);
        workbook_rels.push(Relationship::new(
            rel_id.clone(),
            REL_WORKSHEET,
            relative_target("xl/workbook.xml", &sheet_part),
        ));
        sheet_entries.push((unique_sheet_name(&sheet.name, number, &mut used_names), rel_id));
    }

    let styles_rel = format!("rId{}", sheets.len() + 1);
    workbook_rels.push(Relationship::new(styles_rel, REL_STYLES, "styles.xml"));
    parts.insert("xl/styles.xml".to_string(), styles.to_xml().into_bytes());
    content_types.part("xl/styles.xml", CT_STYLES);

    if !shared_strings.is_empty() {
        let sst_rel = format!("rId{}", sheets.len() + 2);
        workbook_rels.push(Relationship::new(sst_rel, REL_SHARED_STRINGS, "sharedStrings.xml"));
        parts.insert(
            "xl/sharedStrings.xml".to_string(),
            shared_strings.to_xml().into_bytes(),
        );
        content_types.part("xl/sharedStrings.xml", CT_SHARED_STRINGS);
    }

    parts.insert("xl/workbook.xml".to_string(), workbook_xml(&sheet_entries).into_bytes());
    content_types.part("xl/workbook.xml", CT_WORKBOOK);
    parts.insert(
        "xl/_rels/workbook.xml.rels".to_string(),
        write_relationships(&workbook_rels).into_bytes(),
    );
    parts.insert(
        "_rels/.rels".to_string(),
        write_relationships(&[Relationship::new("rId1", REL_OFFICE_DOCUMENT, "xl/workbook.xml")])
            .into_bytes(),
    );
    parts.insert("[Content_Types].xml".to_string(), content_types.to_xml().into_bytes());

    parts
}

fn workbook_xml(sheets: &[(String, String)]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!(
        r#"<workbook xmlns="{SPREADSHEETML_NS}" xmlns:r="{RELATIONSHIPS_NS}"><bookViews><workbookView activeTab="0"/></bookViews><sheets>"#
    ));
    for (idx, (name, rel_id)) in sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="{}"/>"#,
            escape_attr(name),
            idx + 1,
            escape_attr(rel_id)
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

/// Sheet names are limited to 31 characters without `[]:*?/\` and must be unique
/// case-insensitively.
fn unique_sheet_name(name: &str, number: usize, used: &mut HashSet<String>) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_SHEET_NAME_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    let base = if cleaned.is_empty() {
        format!("Sheet{number}")
    } else {
        cleaned
    };

    let mut candidate = truncate_chars(&base, MAX_SHEET_NAME_CHARS);
    let mut suffix = 2usize;
    while used.contains(&candidate.to_lowercase()) {
        let tail = format!(" ({suffix})");
        let keep = MAX_SHEET_NAME_CHARS.saturating_sub(tail.chars().count());
        candidate = format!("{}{tail}", truncate_chars(&base, keep));
        suffix += 1;
    }
    if candidate != name {
        log::debug!("sheet {name:?} exported as {candidate:?}");
    }
    used.insert(candidate.to_lowercase());
    candidate
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Default)]
struct ContentTypes {
    defaults: BTreeMap<String, &'static str>,
    overrides: BTreeMap<String, &'static str>,
}

impl ContentTypes {
    fn add_default(&mut self, extension: &str, content_type: &'static str) {
        self.defaults.insert(extension.to_string(), content_type);
    }

    fn part(&mut self, part: &str, content_type: &'static str) {
        self.overrides.insert(format!("/{part}"), content_type);
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from(XML_DECLARATION);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        xml.push_str(
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
        );
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        for (ext, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{content_type}"/>"#,
                escape_attr(ext)
            ));
        }
        for (part, content_type) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{content_type}"/>"#,
                escape_attr(part)
            ));
        }
        xml.push_str("</Types>");
        xml
    }
}
