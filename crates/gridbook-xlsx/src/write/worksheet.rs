use chrono::NaiveDate;
use gridbook_model::input::parse_input_date;
use gridbook_model::units::{column_px_to_chars, row_px_to_pt};
use gridbook_model::{
    format_number, Cell, CellRef, CellValue, HorizontalAlign, InputDescriptor, InputKind,
    ShapeKind, Sheet,
};

use crate::drawingml::anchor::AnchorPoint;
use crate::images::EmbeddedImage;
use crate::render::render_form_png;
use crate::shared_strings::SharedStringTable;
use crate::style_map::{FormatOverrides, StyleSheetBuilder};
use crate::xml::{escape_attr, escape_text, RELATIONSHIPS_NS, SPREADSHEETML_NS, XML_DECLARATION};

use super::ExportOptions;

/// Text written in place of a cell image whose payload cannot be decoded.
pub(crate) const IMAGE_ERROR_TEXT: &str = "(Image Error)";

/// A picture to place in the sheet's drawing part.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Picture {
    pub from: AnchorPoint,
    /// Extent in pixels.
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub flip_h: bool,
    pub flip_v: bool,
    pub opacity: f64,
    pub image: EmbeddedImage,
}

pub(crate) struct WorksheetOutput {
    pub xml: String,
    pub pictures: Vec<Picture>,
}

/// Shared state for every sheet of one export.
pub(crate) struct WriteContext<'a> {
    pub options: &'a ExportOptions,
    pub shared_strings: &'a mut SharedStringTable,
    pub styles: &'a mut StyleSheetBuilder,
}

enum Written {
    Empty,
    Text(String),
    Number(f64),
    Formula(String),
}

/// Serialize one sheet. `drawing_rel_id` is referenced from `<drawing>` when the sheet ends up
/// with pictures.
pub(crate) fn write_worksheet(
    sheet: &Sheet,
    ctx: &mut WriteContext<'_>,
    drawing_rel_id: &str,
) -> WorksheetOutput {
    let mut pictures = Vec::new();
    let mut validations = Vec::new();

    let mut sheet_data = String::from("<sheetData>");
    let row_indices: std::collections::BTreeSet<u32> = sheet
        .row_metadata
        .keys()
        .chain(sheet.rows.keys())
        .copied()
        .filter(|row| *row < sheet.row_count)
        .collect();
    for row in row_indices {
        sheet_data.push_str(&format!(r#"<row r="{}""#, row + 1));
        if let Some(meta) = sheet.row_metadata.get(&row) {
            sheet_data.push_str(&format!(
                r#" ht="{}" customHeight="1""#,
                format_number(row_px_to_pt(meta.height))
            ));
        }
        let cells = sheet
            .rows
            .get(&row)
            .into_iter()
            .flat_map(|cells| cells.iter())
            .filter(|(col, _)| **col < sheet.col_count);
        let mut body = String::new();
        for (&col, cell) in cells {
            let at = CellRef::new(row, col);
            write_cell(sheet, at, cell, ctx, &mut body, &mut pictures);
            if let Some(input) = &cell.input {
                if let Some(xml) = data_validation_xml(at, input) {
                    validations.push(xml);
                }
            }
        }
        if body.is_empty() {
            sheet_data.push_str("/>");
        } else {
            sheet_data.push('>');
            sheet_data.push_str(&body);
            sheet_data.push_str("</row>");
        }
    }
    sheet_data.push_str("</sheetData>");

    for shape in &sheet.shapes {
        let image = match &shape.kind {
            ShapeKind::Image { src } => EmbeddedImage::from_data_url(src),
            ShapeKind::Form(form) => render_form_png(
                form,
                shape.w.max(1) as u32,
                shape.h.max(1) as u32,
                shape.opacity,
            )
            .and_then(EmbeddedImage::from_bytes),
        };
        match image {
            Ok(image) => pictures.push(Picture {
                from: AnchorPoint::from_pixels(sheet, f64::from(shape.x), f64::from(shape.y)),
                width: f64::from(shape.w),
                height: f64::from(shape.h),
                rotation: shape.rotation,
                flip_h: shape.flip_h,
                flip_v: shape.flip_v,
                opacity: if shape.is_image() { shape.opacity } else { 1.0 },
                image,
            }),
            Err(err) => log::warn!("sheet `{}`: skipping shape `{}`: {err}", sheet.name, shape.id),
        }
    }

    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!(
        r#"<worksheet xmlns="{SPREADSHEETML_NS}" xmlns:r="{RELATIONSHIPS_NS}">"#
    ));
    xml.push_str(&format!(
        r#"<dimension ref="{}"/>"#,
        dimension(sheet.row_count, sheet.col_count)
    ));
    xml.push_str(&format!(
        r#"<sheetViews><sheetView workbookViewId="0"{}/></sheetViews>"#,
        if ctx.options.show_grid_lines {
            ""
        } else {
            r#" showGridLines="0""#
        }
    ));
    xml.push_str(r#"<sheetFormatPr defaultRowHeight="15"/>"#);
    if !sheet.columns.is_empty() {
        xml.push_str("<cols>");
        for (idx, column) in sheet.columns.iter().enumerate() {
            let n = idx + 1;
            xml.push_str(&format!(
                r#"<col min="{n}" max="{n}" width="{}" customWidth="1"/>"#,
                column_px_to_chars(column.width)
            ));
        }
        xml.push_str("</cols>");
    }
    xml.push_str(&sheet_data);

    let merges: Vec<String> = sheet
        .merges
        .iter()
        .filter(|m| !m.is_single_cell())
        .map(|m| m.to_string())
        .collect();
    if !merges.is_empty() {
        xml.push_str(&format!(r#"<mergeCells count="{}">"#, merges.len()));
        for merge in &merges {
            xml.push_str(&format!(r#"<mergeCell ref="{merge}"/>"#));
        }
        xml.push_str("</mergeCells>");
    }

    if !validations.is_empty() {
        xml.push_str(&format!(
            r#"<dataValidations count="{}">"#,
            validations.len()
        ));
        for validation in &validations {
            xml.push_str(validation);
        }
        xml.push_str("</dataValidations>");
    }

    xml.push_str(
        r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    );
    if !pictures.is_empty() {
        xml.push_str(&format!(
            r#"<drawing r:id="{}"/>"#,
            escape_attr(drawing_rel_id)
        ));
    }
    xml.push_str("</worksheet>");

    WorksheetOutput { xml, pictures }
}

fn dimension(rows: u32, cols: u32) -> String {
    let end = CellRef::new(rows.saturating_sub(1), cols.saturating_sub(1));
    if end == CellRef::new(0, 0) {
        "A1".to_string()
    } else {
        format!("A1:{end}")
    }
}

fn write_cell(
    sheet: &Sheet,
    at: CellRef,
    cell: &Cell,
    ctx: &mut WriteContext<'_>,
    out: &mut String,
    pictures: &mut Vec<Picture>,
) {
    let mut overrides = FormatOverrides::default();
    let input_kind = cell.input.as_ref().map(|input| input.kind);

    let written = if cell.value.is_image_data() {
        let src = cell.value.as_text().unwrap_or_default();
        match EmbeddedImage::from_data_url(src) {
            Ok(image) => {
                pictures.push(Picture {
                    from: AnchorPoint {
                        col: at.col,
                        row: at.row,
                        col_off: 0,
                        row_off: 0,
                    },
                    width: f64::from(sheet.column_width(at.col)),
                    height: f64::from(sheet.row_height(at.row)),
                    rotation: 0.0,
                    flip_h: false,
                    flip_v: false,
                    opacity: 1.0,
                    image,
                });
                Written::Empty
            }
            Err(err) => {
                log::warn!("sheet `{}`: cell {at} image cannot be exported: {err}", sheet.name);
                Written::Text(IMAGE_ERROR_TEXT.to_string())
            }
        }
    } else if input_kind == Some(InputKind::Boolean) {
        overrides.default_align = Some(HorizontalAlign::Center);
        match cell.value.as_text() {
            Some("true") => Written::Text("YES".to_string()),
            Some("false") => Written::Text("NO".to_string()),
            _ => Written::Empty,
        }
    } else if input_kind == Some(InputKind::Date) && !cell.value.is_empty() {
        match parse_input_date(&cell.value.to_string()).and_then(date_serial) {
            Some(serial) => {
                overrides.date = true;
                Written::Number(serial)
            }
            None => literal(&cell.value),
        }
    } else if cell.value.is_empty() {
        match cell.input.as_ref().and_then(template_text) {
            Some(text) => {
                overrides.placeholder_color = Some(ctx.options.placeholder_color);
                Written::Text(text)
            }
            None => Written::Empty,
        }
    } else {
        literal(&cell.value)
    };

    let style_id = if cell.style.is_some() || overrides != FormatOverrides::default() {
        ctx.styles.cell_format(cell.style.as_ref(), &overrides)
    } else {
        0
    };

    out.push_str(&format!(r#"<c r="{at}""#));
    if style_id != 0 {
        out.push_str(&format!(r#" s="{style_id}""#));
    }
    match written {
        Written::Empty => out.push_str("/>"),
        Written::Text(text) => {
            let idx = ctx.shared_strings.intern(&text);
            out.push_str(&format!(r#" t="s"><v>{idx}</v></c>"#));
        }
        Written::Number(n) => out.push_str(&format!("><v>{n}</v></c>")),
        Written::Formula(formula) => {
            out.push_str(&format!("><f>{}</f></c>", escape_text(&formula)));
        }
    }
}

fn literal(value: &CellValue) -> Written {
    match value {
        CellValue::Empty => Written::Empty,
        CellValue::Number(n) if n.is_finite() => Written::Number(*n),
        CellValue::Number(n) => Written::Text(format_number(*n)),
        CellValue::Text(s) => match s.strip_prefix('=') {
            Some(formula) if !formula.trim().is_empty() => Written::Formula(formula.to_string()),
            _ => Written::Text(s.clone()),
        },
    }
}

/// Placeholder, or `[label]`, shown in an empty input cell.
fn template_text(input: &InputDescriptor) -> Option<String> {
    if let Some(placeholder) = input.placeholder.as_deref().filter(|p| !p.is_empty()) {
        return Some(placeholder.to_string());
    }
    input
        .label
        .as_deref()
        .filter(|l| !l.is_empty())
        .map(|label| format!("[{label}]"))
}

/// Serial number of `date` in the 1900 date system.
fn date_serial(date: NaiveDate) -> Option<f64> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    Some((date - epoch).num_days() as f64)
}

/// `<dataValidation>` for an input descriptor, or `None` when it carries no constraint and no
/// prompt.
fn data_validation_xml(at: CellRef, input: &InputDescriptor) -> Option<String> {
    let rule = input.validation.as_ref();
    let custom_message = rule.and_then(|r| r.message.clone());
    let allow_blank = !input.required;

    let mut attrs: Vec<(&str, String)> = Vec::new();
    let mut formulas: Vec<String> = Vec::new();
    let flag = |b: bool| String::from(if b { "1" } else { "0" });

    match input.kind {
        InputKind::Select => {
            let options = input.options.as_deref().unwrap_or_default();
            if !options.is_empty() {
                attrs.push(("type", "list".into()));
                attrs.push(("allowBlank", flag(allow_blank)));
                attrs.push(("showErrorMessage", "1".into()));
                attrs.push(("errorTitle", "Invalid Selection".into()));
                attrs.push((
                    "error",
                    custom_message.unwrap_or_else(|| {
                        format!("Please select from: {}", options.join(", "))
                    }),
                ));
                formulas.push(format!("\"{}\"", options.join(",")));
            }
        }
        InputKind::Number | InputKind::Float => {
            let min = rule.and_then(|r| r.min);
            let max = rule.and_then(|r| r.max);
            let operator = match (min, max) {
                (Some(_), Some(_)) => Some("between"),
                (Some(_), None) => Some("greaterThanOrEqual"),
                (None, Some(_)) => Some("lessThanOrEqual"),
                (None, None) => None,
            };
            if let Some(operator) = operator {
                let kind = if input.kind == InputKind::Float {
                    "decimal"
                } else {
                    "whole"
                };
                attrs.push(("type", kind.into()));
                attrs.push(("operator", operator.into()));
                attrs.push(("allowBlank", flag(allow_blank)));
                attrs.push(("showErrorMessage", "1".into()));
                attrs.push(("errorTitle", "Invalid Number".into()));
                let bounds: Vec<String> = [
                    min.map(|m| format!("≥ {}", format_number(m))),
                    max.map(|m| format!("≤ {}", format_number(m))),
                ]
                .into_iter()
                .flatten()
                .collect();
                attrs.push((
                    "error",
                    custom_message.unwrap_or_else(|| format!("Value must be {}", bounds.join(" and "))),
                ));
                formulas.extend(min.into_iter().chain(max).map(format_number));
            }
        }
        InputKind::Date => {
            attrs.push(("type", "date".into()));
            attrs.push(("operator", "greaterThanOrEqual".into()));
            attrs.push(("allowBlank", flag(allow_blank)));
            attrs.push(("showErrorMessage", "1".into()));
            attrs.push(("errorTitle", "Invalid Date".into()));
            attrs.push(("error", "Please enter a valid date.".into()));
            // 1900-01-01
            formulas.push("1".into());
        }
        InputKind::Boolean => {
            attrs.push(("type", "list".into()));
            attrs.push(("allowBlank", "1".into()));
            formulas.push("\"YES,NO\"".into());
        }
        _ => {}
    }

    let label = input.label.as_deref().filter(|l| !l.is_empty());
    let placeholder = input.placeholder.as_deref().filter(|p| !p.is_empty());
    if label.is_some() || placeholder.is_some() {
        let fallback = if input.required {
            "(Required)"
        } else {
            "(Optional)"
        };
        let prompt = placeholder.unwrap_or(fallback).to_string();
        attrs.push(("showInputMessage", "1".into()));
        attrs.push(("promptTitle", label.unwrap_or_default().to_string()));
        attrs.push(("prompt", prompt));
    }

    if attrs.is_empty() {
        return None;
    }

    let mut xml = String::from("<dataValidation");
    for (key, value) in &attrs {
        xml.push_str(&format!(r#" {key}="{}""#, escape_attr(value)));
    }
    xml.push_str(&format!(r#" sqref="{at}">"#));
    for (idx, formula) in formulas.iter().enumerate() {
        let tag = if idx == 0 { "formula1" } else { "formula2" };
        xml.push_str(&format!("<{tag}>{}</{tag}>", escape_text(formula)));
    }
    xml.push_str("</dataValidation>");
    Some(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbook_model::ValidationRule;
    use pretty_assertions::assert_eq;

    fn input(kind: InputKind) -> InputDescriptor {
        InputDescriptor::new(kind)
    }

    #[test]
    fn select_inputs_become_list_validations() {
        let mut select = input(InputKind::Select);
        select.label = Some("Status".into());
        select.options = Some(vec!["Open".into(), "Closed".into()]);
        select.required = true;

        let xml = data_validation_xml(CellRef::new(1, 2), &select).unwrap();
        assert_eq!(
            xml,
            r#"<dataValidation type="list" allowBlank="0" showErrorMessage="1" errorTitle="Invalid Selection" error="Please select from: Open, Closed" showInputMessage="1" promptTitle="Status" prompt="(Required)" sqref="C2"><formula1>"Open,Closed"</formula1></dataValidation>"#
        );
    }

    #[test]
    fn number_bounds_pick_the_operator() {
        let mut number = input(InputKind::Number);
        number.validation = Some(ValidationRule {
            min: Some(1.0),
            max: Some(10.0),
            ..ValidationRule::default()
        });
        let xml = data_validation_xml(CellRef::new(0, 0), &number).unwrap();
        assert!(xml.contains(r#"type="whole" operator="between""#));
        assert!(xml.contains(r#"error="Value must be ≥ 1 and ≤ 10""#));
        assert!(xml.contains("<formula1>1</formula1><formula2>10</formula2>"));

        number.validation = Some(ValidationRule {
            max: Some(5.5),
            message: Some("Too big".into()),
            ..ValidationRule::default()
        });
        let xml = data_validation_xml(CellRef::new(0, 0), &number).unwrap();
        assert!(xml.contains(r#"operator="lessThanOrEqual""#));
        assert!(xml.contains(r#"error="Too big""#));
        assert!(xml.contains("<formula1>5.5</formula1>"));
    }

    #[test]
    fn unconstrained_inputs_only_get_prompts() {
        assert_eq!(data_validation_xml(CellRef::new(0, 0), &input(InputKind::Text)), None);

        let mut text = input(InputKind::Text);
        text.placeholder = Some("Your name".into());
        assert_eq!(
            data_validation_xml(CellRef::new(0, 0), &text).unwrap(),
            r#"<dataValidation showInputMessage="1" promptTitle="" prompt="Your name" sqref="A1"></dataValidation>"#
        );
    }

    #[test]
    fn dates_and_booleans_have_fixed_rules() {
        let xml = data_validation_xml(CellRef::new(0, 0), &input(InputKind::Date)).unwrap();
        assert!(xml.contains(r#"type="date" operator="greaterThanOrEqual""#));
        assert!(xml.contains("<formula1>1</formula1>"));

        let xml = data_validation_xml(CellRef::new(0, 0), &input(InputKind::Boolean)).unwrap();
        assert!(xml.contains(r#"type="list" allowBlank="1""#));
        assert!(xml.contains(r#"<formula1>"YES,NO"</formula1>"#));
    }

    #[test]
    fn date_serials_use_the_1900_system() {
        assert_eq!(date_serial(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()), Some(45356.0));
        assert_eq!(date_serial(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap()), Some(2.0));
    }

    #[test]
    fn dimension_covers_the_grid() {
        assert_eq!(dimension(100, 26), "A1:Z100");
        assert_eq!(dimension(0, 0), "A1");
    }
}
