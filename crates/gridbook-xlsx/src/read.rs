//! Container → [`Workbook`].

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Seek, SeekFrom};

use chrono::{Days, NaiveDate};
use gridbook_model::units::{
    column_chars_to_px, row_pt_to_px, DEFAULT_COLUMN_WIDTH_CHARS, DEFAULT_ROW_HEIGHT_PT,
};
use gridbook_model::{
    parse_cell_text, Cell, CellValue, ColumnMetadata, Range, RowMetadata, Shape, Sheet, UserRole,
    Workbook, EXCEL_MAX_COLS, EXCEL_MAX_ROWS,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::drawingml::{decode_drawing, PlacedContent, PlacedNode};
use crate::error::{Result, XlsxError};
use crate::images::{media_mime, to_data_url};
use crate::path::{rels_for_part, resolve_target};
use crate::relationships::{
    parse_relationships, Relationship, REL_DRAWING, REL_IMAGE, REL_OFFICE_DOCUMENT,
    REL_SHARED_STRINGS, REL_STYLES,
};
use crate::shared_strings::parse_shared_strings;
use crate::style_map::import_style;
use crate::styles::StyleSheet;
use crate::worksheet::{parse_worksheet, RawCell, RawValue, RawWorksheet};
use crate::xml::attr_value;
use crate::zip_util::{read_zip_part_optional, InflateBudget, XlsxPackageLimits};

const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const MEDIA_PREFIX: &str = "xl/media/";

/// Display format of cells carrying a date number format.
const IMPORTED_DATE_FORMAT: &str = "%d-%b-%y";

/// Knobs for [`import_workbook_with_options`].
#[derive(Clone, Debug, PartialEq)]
pub struct ImportOptions {
    pub limits: XlsxPackageLimits,
    /// Column lists shorter than this are padded.
    pub min_columns: u32,
    pub min_rows: u32,
    /// Column width (characters) for sheets that declare no `defaultColWidth`.
    pub default_column_width_chars: f64,
    /// Row height (points) for sheets that declare no `defaultRowHeight`.
    pub default_row_height_pt: f64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            limits: XlsxPackageLimits::default(),
            min_columns: 10,
            min_rows: 20,
            default_column_width_chars: DEFAULT_COLUMN_WIDTH_CHARS,
            default_row_height_pt: DEFAULT_ROW_HEIGHT_PT,
        }
    }
}

/// Import a workbook from container bytes with default options.
pub fn import_workbook(bytes: &[u8]) -> Result<Workbook> {
    import_workbook_with_options(bytes, &ImportOptions::default())
}

pub fn import_workbook_with_options(bytes: &[u8], options: &ImportOptions) -> Result<Workbook> {
    import_workbook_from_reader(Cursor::new(bytes), options)
}

/// Import from a seekable reader. Only the parts the model needs are inflated.
///
/// Fails only when the archive cannot be opened, the workbook part is missing or unreadable, or
/// the inflate limits are exceeded. Problems inside a sheet are logged and skipped.
pub fn import_workbook_from_reader<R: Read + Seek>(
    mut reader: R,
    options: &ImportOptions,
) -> Result<Workbook> {
    reader.seek(SeekFrom::Start(0))?;
    let mut archive = ZipArchive::new(reader)?;
    let mut package = Package {
        archive: &mut archive,
        budget: InflateBudget::new(options.limits),
    };

    let workbook_part = package.workbook_part_name()?;
    let workbook_xml = package
        .read(&workbook_part)?
        .ok_or_else(|| XlsxError::MissingPart(workbook_part.clone()))?;
    let sheets = parse_workbook_sheets(&workbook_xml)?;
    let workbook_rels = package.relationships(&workbook_part)?;

    let styles = match package.related_part(
        &workbook_part,
        &workbook_rels,
        REL_STYLES,
        "xl/styles.xml",
    )? {
        Some(bytes) => StyleSheet::parse(&bytes).unwrap_or_else(|err| {
            log::warn!("styles part is unreadable, using defaults: {err}");
            StyleSheet::default()
        }),
        None => StyleSheet::default(),
    };
    let shared_strings = match package.related_part(
        &workbook_part,
        &workbook_rels,
        REL_SHARED_STRINGS,
        "xl/sharedStrings.xml",
    )? {
        Some(bytes) => parse_shared_strings(&bytes).unwrap_or_else(|err| {
            log::warn!("shared strings part is unreadable: {err}");
            Vec::new()
        }),
        None => Vec::new(),
    };
    let media = package.media_parts();

    let ctx = SheetContext {
        styles: &styles,
        shared_strings: &shared_strings,
        media: &media,
        options,
    };

    let mut workbook = Workbook::new();
    for (idx, entry) in sheets.iter().enumerate() {
        let part = entry
            .rel_id
            .as_deref()
            .and_then(|id| workbook_rels.iter().find(|rel| rel.id == id))
            .filter(|rel| !rel.external)
            .map(|rel| resolve_target(&workbook_part, &rel.target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", idx + 1));

        let sheet = package.import_sheet(&entry.name, &part, &ctx)?;
        workbook.push_renaming(sheet);
    }

    if workbook.sheets.is_empty() {
        workbook.sheets.push(Sheet::blank("Sheet1"));
    }
    Ok(workbook)
}

/// One `<sheet>` entry of the workbook part, in tab order.
#[derive(Clone, Debug, PartialEq, Eq)]
struct WorkbookSheet {
    name: String,
    rel_id: Option<String>,
}

fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<WorkbookSheet>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name")?.unwrap_or_default();
                sheets.push(WorkbookSheet {
                    name,
                    rel_id: attr_value(&e, b"id")?,
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

struct SheetContext<'a> {
    styles: &'a StyleSheet,
    shared_strings: &'a [String],
    /// Every `xl/media/*` part, sorted, for positional fallback.
    media: &'a [String],
    options: &'a ImportOptions,
}

struct Package<'a, R: Read + Seek> {
    archive: &'a mut ZipArchive<R>,
    budget: InflateBudget,
}

impl<R: Read + Seek> Package<'_, R> {
    fn read(&mut self, part: &str) -> Result<Option<Vec<u8>>> {
        read_zip_part_optional(self.archive, part, &mut self.budget)
    }

    /// Relationships of `part`; a missing or malformed `.rels` part yields none.
    fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>> {
        let rels_part = rels_for_part(part);
        Ok(match self.read(&rels_part)? {
            Some(bytes) => parse_relationships(&bytes).unwrap_or_else(|err| {
                log::warn!("{rels_part}: ignoring malformed relationships: {err}");
                Vec::new()
            }),
            None => Vec::new(),
        })
    }

    fn workbook_part_name(&mut self) -> Result<String> {
        let Some(bytes) = self.read(ROOT_RELS_PART)? else {
            return Ok(DEFAULT_WORKBOOK_PART.to_string());
        };
        let rels = parse_relationships(&bytes).unwrap_or_default();
        Ok(rels
            .iter()
            .find(|rel| rel.type_ == REL_OFFICE_DOCUMENT && !rel.external)
            .map(|rel| resolve_target("", &rel.target))
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()))
    }

    /// Part related to `source` by `rel_type`, falling back to the conventional part name.
    fn related_part(
        &mut self,
        source: &str,
        rels: &[Relationship],
        rel_type: &str,
        fallback: &str,
    ) -> Result<Option<Vec<u8>>> {
        let part = rels
            .iter()
            .find(|rel| rel.type_ == rel_type && !rel.external)
            .map(|rel| resolve_target(source, &rel.target))
            .unwrap_or_else(|| fallback.to_string());
        self.read(&part)
    }

    fn media_parts(&self) -> Vec<String> {
        let mut media: Vec<String> = self
            .archive
            .file_names()
            .map(|name| name.strip_prefix('/').unwrap_or(name))
            .filter(|name| name.starts_with(MEDIA_PREFIX) && !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        media.sort();
        media
    }

    fn import_sheet(&mut self, name: &str, part: &str, ctx: &SheetContext<'_>) -> Result<Sheet> {
        let raw = match self.read(part)? {
            Some(xml) => {
                let (raw, error) = parse_worksheet(&xml, part);
                if let Some(err) = error {
                    log::warn!(
                        "{part}: worksheet is malformed, keeping the {} rows read before the error: {err}",
                        raw.rows.len()
                    );
                }
                raw
            }
            None => {
                log::warn!("{part}: worksheet part for `{name}` is missing, importing it empty");
                RawWorksheet::default()
            }
        };

        let mut sheet = build_sheet(name, &raw, ctx, part);

        if let Some(drawing_id) = raw.drawing.as_deref() {
            let sheet_rels = self.relationships(part)?;
            let drawing_part = sheet_rels
                .iter()
                .find(|rel| rel.id == drawing_id && rel.type_ == REL_DRAWING && !rel.external)
                .map(|rel| resolve_target(part, &rel.target));
            match drawing_part {
                Some(drawing_part) => self.import_drawing(&mut sheet, &drawing_part, ctx)?,
                None => log::warn!("{part}: drawing relationship `{drawing_id}` not found"),
            }
        }
        Ok(sheet)
    }

    /// Decode the sheet's drawing part and append its shapes: pictures first, then forms.
    fn import_drawing(
        &mut self,
        sheet: &mut Sheet,
        drawing_part: &str,
        ctx: &SheetContext<'_>,
    ) -> Result<()> {
        let Some(xml) = self.read(drawing_part)? else {
            log::warn!("{drawing_part}: drawing part is missing");
            return Ok(());
        };
        let placed = match decode_drawing(&xml, drawing_part, sheet) {
            Ok(placed) => placed,
            Err(err) => {
                log::warn!("{drawing_part}: skipping unreadable drawing: {err}");
                return Ok(());
            }
        };
        let drawing_rels = self.relationships(drawing_part)?;

        let (pictures, forms): (Vec<PlacedNode>, Vec<PlacedNode>) = placed
            .into_iter()
            .partition(|node| matches!(node.content, PlacedContent::Picture { .. }));

        for (ordinal, node) in pictures.into_iter().enumerate() {
            let PlacedContent::Picture { embed } = &node.content else {
                continue;
            };
            let by_id = embed.as_deref().and_then(|id| {
                drawing_rels
                    .iter()
                    .find(|rel| rel.id == id && rel.type_ == REL_IMAGE && !rel.external)
                    .map(|rel| resolve_target(drawing_part, &rel.target))
            });
            let media_part = match by_id {
                Some(part) => part,
                None => match ctx.media.get(ordinal) {
                    Some(part) => part.clone(),
                    None => {
                        log::warn!("{drawing_part}: picture #{ordinal} has no media payload");
                        continue;
                    }
                },
            };
            let bytes = match self.read(&media_part)? {
                Some(bytes) => bytes,
                None => {
                    log::warn!("{drawing_part}: media part {media_part} is missing");
                    continue;
                }
            };
            let src = to_data_url(media_mime(&media_part, &bytes), &bytes);
            sheet.add_shape(placed_shape(&node, |x, y, w, h| {
                Shape::image("", src, x, y, w, h)
            }));
        }

        for node in forms {
            let PlacedContent::Form(form) = &node.content else {
                continue;
            };
            let form = form.clone();
            sheet.add_shape(placed_shape(&node, |x, y, w, h| {
                Shape::form("", form, x, y, w, h)
            }));
        }
        Ok(())
    }
}

fn placed_shape(node: &PlacedNode, build: impl FnOnce(i32, i32, i32, i32) -> Shape) -> Shape {
    let px = |v: f64| v.round() as i32;
    let mut shape = build(
        px(node.rect.x),
        px(node.rect.y),
        px(node.rect.w).max(1),
        px(node.rect.h).max(1),
    );
    shape.rotation = node.rotation;
    shape.flip_h = node.flip_h;
    shape.flip_v = node.flip_v;
    shape
}

/// Row/column extent declared by the `<dimension>` element, as (rows, columns).
fn declared_extent(dimension: Option<&str>) -> (u32, u32) {
    dimension
        .and_then(|d| Range::from_a1(d).ok())
        .map_or((0, 0), |range| (range.end.row + 1, range.end.col + 1))
}

fn build_sheet(name: &str, raw: &RawWorksheet, ctx: &SheetContext<'_>, part: &str) -> Sheet {
    let options = ctx.options;
    let mut sheet = Sheet::new(name);

    let (declared_rows, declared_cols) = declared_extent(raw.dimension.as_deref());
    let declared_cols = raw
        .columns
        .iter()
        .map(|c| c.max + 1)
        .fold(declared_cols, u32::max);
    let populated_cols = declared_cols.max(raw.used_columns());
    let padded_cols = populated_cols.max(options.min_columns).min(EXCEL_MAX_COLS);

    let default_width = raw
        .default_col_width
        .unwrap_or(options.default_column_width_chars);
    sheet.columns = (0..padded_cols)
        .map(|index| {
            let chars = raw
                .columns
                .iter()
                .find(|c| c.min <= index && index <= c.max)
                .and_then(|c| c.width)
                .unwrap_or(default_width);
            let roles = if index < populated_cols {
                UserRole::EDITORS.to_vec()
            } else {
                vec![UserRole::Admin]
            };
            ColumnMetadata::new(index, column_chars_to_px(chars), roles)
        })
        .collect();
    sheet.col_count = padded_cols;

    let last_row = raw.rows.iter().map(|r| r.index + 1).max().unwrap_or(0);
    sheet.row_count = declared_rows
        .max(last_row)
        .max(options.min_rows)
        .min(EXCEL_MAX_ROWS);

    let default_height = raw
        .default_row_height
        .unwrap_or(options.default_row_height_pt);
    let explicit_heights: HashMap<u32, f64> = raw
        .rows
        .iter()
        .filter_map(|r| r.height.map(|h| (r.index, h)))
        .collect();
    sheet.row_metadata = (0..sheet.row_count)
        .map(|index| {
            let points = explicit_heights.get(&index).copied().unwrap_or(default_height);
            (
                index,
                RowMetadata {
                    index,
                    height: row_pt_to_px(points),
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    for row in &raw.rows {
        for raw_cell in &row.cells {
            if let Some(cell) = import_cell(raw_cell, ctx, part) {
                sheet.set_cell(raw_cell.cell.row, raw_cell.cell.col, cell);
            }
        }
    }

    for merge in &raw.merges {
        match Range::from_a1(merge) {
            Ok(range) => {
                sheet.merge_cells(range);
            }
            Err(err) => log::warn!("{part}: skipping merge `{merge}`: {err}"),
        }
    }
    sheet
}

/// Value, style and input descriptor for one cell; `None` when the cell is skipped or carries
/// neither a value nor a style.
fn import_cell(raw: &RawCell, ctx: &SheetContext<'_>, part: &str) -> Option<Cell> {
    let value = match &raw.value {
        RawValue::Empty => match (&raw.formula, raw.style) {
            (Some(formula), _) => CellValue::Text(format!("={formula}")),
            (None, Some(_)) => CellValue::Empty,
            (None, None) => return None,
        },
        RawValue::Number(n) => {
            let is_date = raw
                .style
                .and_then(|idx| ctx.styles.xf(idx))
                .is_some_and(|xf| ctx.styles.is_date_format(xf.num_fmt_id));
            match is_date.then(|| format_serial_date(*n)).flatten() {
                Some(date) => CellValue::Text(date),
                None => CellValue::Number(*n),
            }
        }
        RawValue::SharedString(idx) => match ctx.shared_strings.get(*idx) {
            Some(s) => CellValue::Text(s.clone()),
            None => {
                log::warn!(
                    "{part}: skipping cell {}: shared string #{idx} does not exist",
                    raw.cell.to_a1()
                );
                return None;
            }
        },
        RawValue::Text(s) => CellValue::Text(s.clone()),
        RawValue::Bool(b) => CellValue::Text(b.to_string()),
        RawValue::Error(e) => CellValue::Text(e.clone()),
    };

    let style = import_style(ctx.styles, raw.style, &value);
    let mut cell = Cell::new(value).with_style(style);
    if let CellValue::Text(text) = &cell.value {
        let parsed = parse_cell_text(text);
        if let Some(input) = parsed.input {
            cell.value = parsed.value.map_or(CellValue::Empty, CellValue::Text);
            cell.input = Some(input);
        }
    }
    Some(cell)
}

/// `DD-Mon-YY` for a serial date in the 1900 date system.
fn format_serial_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_days(Days::new(serial.floor() as u64))?;
    Some(date.format(IMPORTED_DATE_FORMAT).to_string())
}
