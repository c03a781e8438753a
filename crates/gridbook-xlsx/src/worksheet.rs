//! Streaming reader for worksheet parts.

use gridbook_model::{CellRef, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::{Result, XlsxError};
use crate::shared_strings::read_string_item;
use crate::xml::{attr_value, read_text, skip_element};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RawValue {
    Empty,
    Number(f64),
    SharedString(usize),
    Text(String),
    Bool(bool),
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawCell {
    pub cell: CellRef,
    pub style: Option<usize>,
    pub value: RawValue,
    pub formula: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawRow {
    /// Zero-based.
    pub index: u32,
    /// Points.
    pub height: Option<f64>,
    pub cells: Vec<RawCell>,
}

/// A `<col>` span; `min`/`max` are zero-based and inclusive.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawColumn {
    pub min: u32,
    pub max: u32,
    /// Characters.
    pub width: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RawWorksheet {
    pub default_col_width: Option<f64>,
    pub default_row_height: Option<f64>,
    /// `A1:C3` style range of the `<dimension>` element.
    pub dimension: Option<String>,
    pub columns: Vec<RawColumn>,
    pub rows: Vec<RawRow>,
    pub merges: Vec<String>,
    /// Relationship id of the sheet's drawing part.
    pub drawing: Option<String>,
}

impl RawWorksheet {
    /// Highest populated column index plus one.
    pub(crate) fn used_columns(&self) -> u32 {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .map(|c| c.cell.col + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Parse a worksheet part. On malformed XML the rows read before the error are kept and the
/// error is returned alongside them.
pub(crate) fn parse_worksheet(xml: &[u8], part_name: &str) -> (RawWorksheet, Option<XlsxError>) {
    let mut sheet = RawWorksheet::default();
    let error = read_worksheet(xml, part_name, &mut sheet).err();
    (sheet, error)
}

fn read_worksheet(xml: &[u8], part_name: &str, sheet: &mut RawWorksheet) -> Result<()> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut next_row = 0u32;
    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                match e.local_name().as_ref() {
                    b"sheetFormatPr" => {
                        sheet.default_col_width = parse_f64(attr_value(e, b"defaultColWidth")?);
                        sheet.default_row_height =
                            parse_f64(attr_value(e, b"defaultRowHeight")?);
                    }
                    b"dimension" => sheet.dimension = attr_value(e, b"ref")?,
                    b"col" => match parse_col(e)? {
                        Some(col) => sheet.columns.push(col),
                        None => log::warn!("{part_name}: skipping <col> without a valid span"),
                    },
                    b"row" => {
                        let index = attr_value(e, b"r")?
                            .and_then(|r| r.trim().parse::<u32>().ok())
                            .and_then(|r| r.checked_sub(1))
                            .unwrap_or(next_row);
                        if index >= EXCEL_MAX_ROWS {
                            log::warn!(
                                "{part_name}: skipping row {} past the row limit",
                                u64::from(index) + 1
                            );
                            if is_start {
                                skip_element(&mut reader, e)?;
                            }
                            buf.clear();
                            continue;
                        }
                        let mut row = RawRow {
                            index,
                            height: parse_f64(attr_value(e, b"ht")?),
                            cells: Vec::new(),
                        };
                        let cells = if is_start {
                            parse_row_cells(&mut reader, &mut row, part_name)
                        } else {
                            Ok(())
                        };
                        next_row = index + 1;
                        sheet.rows.push(row);
                        cells?;
                    }
                    b"mergeCell" => {
                        if let Some(range) = attr_value(e, b"ref")? {
                            sheet.merges.push(range);
                        }
                    }
                    b"drawing" => sheet.drawing = attr_value(e, b"id")?,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_f64(value: Option<String>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_col(e: &BytesStart<'_>) -> Result<Option<RawColumn>> {
    let bound = |v: Option<String>| v.and_then(|v| v.trim().parse::<u32>().ok()).filter(|v| *v > 0);
    let (Some(min), Some(max)) = (bound(attr_value(e, b"min")?), bound(attr_value(e, b"max")?)) else {
        return Ok(None);
    };
    if min > EXCEL_MAX_COLS {
        return Ok(None);
    }
    Ok(Some(RawColumn {
        min: min - 1,
        max: max.max(min).min(EXCEL_MAX_COLS) - 1,
        width: parse_f64(attr_value(e, b"width")?),
    }))
}

fn parse_row_cells(reader: &mut Reader<&[u8]>, row: &mut RawRow, part_name: &str) -> Result<()> {
    let mut buf = Vec::new();
    let mut next_col = 0u32;
    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let is_start = matches!(event, Event::Start(_));
                let reference = attr_value(e, b"r")?;
                let style = attr_value(e, b"s")?.and_then(|s| s.trim().parse::<usize>().ok());
                let kind = attr_value(e, b"t")?;

                let (value, formula) = if is_start {
                    read_cell_body(reader, kind.as_deref(), part_name)?
                } else {
                    (RawValue::Empty, None)
                };

                let cell = match reference {
                    Some(a1) => match CellRef::from_a1(&a1) {
                        Ok(cell) => cell,
                        Err(err) => {
                            log::warn!("{part_name}: skipping cell `{a1}` in row {}: {err}", row.index + 1);
                            continue;
                        }
                    },
                    None if next_col < EXCEL_MAX_COLS => CellRef::new(row.index, next_col),
                    None => {
                        log::warn!(
                            "{part_name}: skipping cell past the column limit in row {}",
                            row.index + 1
                        );
                        continue;
                    }
                };
                next_col = cell.col + 1;
                row.cells.push(RawCell {
                    cell,
                    style,
                    value,
                    formula,
                });
            }
            Event::Start(ref e) => skip_element(reader, e)?,
            Event::End(ref e) if e.local_name().as_ref() == b"row" => break,
            Event::Eof => {
                return Err(XlsxError::Invalid(format!(
                    "{part_name}: unexpected eof in row {}",
                    row.index + 1
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

fn read_cell_body(
    reader: &mut Reader<&[u8]>,
    kind: Option<&str>,
    part_name: &str,
) -> Result<(RawValue, Option<String>)> {
    let mut buf = Vec::new();
    let mut raw: Option<String> = None;
    let mut inline: Option<String> = None;
    let mut formula: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"v" => {
                    let name = e.name().as_ref().to_vec();
                    raw = Some(read_text(reader, QName(&name))?);
                }
                b"f" => {
                    let name = e.name().as_ref().to_vec();
                    formula = Some(read_text(reader, QName(&name))?).filter(|f| !f.is_empty());
                }
                b"is" => inline = Some(read_string_item(reader, b"is")?),
                _ => skip_element(reader, &e)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"c" => break,
            Event::Eof => {
                return Err(XlsxError::Invalid(format!(
                    "{part_name}: unexpected eof in <c>"
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    let value = match (kind, raw) {
        (Some("inlineStr"), _) => inline.map_or(RawValue::Empty, RawValue::Text),
        (_, None) => RawValue::Empty,
        (Some("s"), Some(v)) => match v.trim().parse::<usize>() {
            Ok(idx) => RawValue::SharedString(idx),
            Err(_) => {
                log::warn!("{part_name}: invalid shared string index `{v}`");
                RawValue::Empty
            }
        },
        (Some("b"), Some(v)) => RawValue::Bool(v.trim() == "1" || v.trim().eq_ignore_ascii_case("true")),
        (Some("e"), Some(v)) => RawValue::Error(v),
        (Some("str") | Some("d"), Some(v)) => RawValue::Text(v),
        (_, Some(v)) => match v.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => RawValue::Number(n),
            _ => RawValue::Text(v),
        },
    };
    Ok((value, formula))
}
