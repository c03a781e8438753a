use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sheet::Sheet;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid workbook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("workbook JSON must be an array of sheets or a single sheet object")]
    InvalidEnvelope,
    #[error("duplicate sheet name `{0}`")]
    DuplicateSheetName(String),
}

/// An ordered list of uniquely named sheets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// A workbook holding one blank `Sheet1`.
    pub fn with_blank_sheet() -> Self {
        Self {
            sheets: vec![Sheet::blank("Sheet1")],
        }
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Append a sheet. Names must be unique within the workbook.
    pub fn add_sheet(&mut self, sheet: Sheet) -> Result<(), EnvelopeError> {
        if self.sheet(&sheet.name).is_some() {
            return Err(EnvelopeError::DuplicateSheetName(sheet.name));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    /// Append a sheet, renaming it `Name (2)`, `Name (3)`, ... if the name is taken.
    pub fn push_renaming(&mut self, mut sheet: Sheet) -> &mut Sheet {
        sheet.name = self.unique_name(&sheet.name);
        self.sheets.push(sheet);
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }

    /// Append a blank sheet named `Sheet N` (first free N).
    pub fn add_blank_sheet(&mut self) -> &mut Sheet {
        let mut n = self.sheets.len() + 1;
        while self.sheet(&format!("Sheet{n}")).is_some() {
            n += 1;
        }
        self.push_renaming(Sheet::blank(format!("Sheet{n}")))
    }

    fn unique_name(&self, base: &str) -> String {
        let base = if base.trim().is_empty() { "Sheet" } else { base };
        if self.sheet(base).is_none() {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base} ({n})"))
            .find(|candidate| self.sheet(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string_pretty(&self.sheets)?)
    }

    /// Load a save file: either an array of sheets or a single sheet object.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let is_sheet_object = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("rows") && obj.contains_key("columns"));
        let sheets: Vec<Sheet> = if value.is_array() {
            serde_json::from_value(value)?
        } else if is_sheet_object {
            vec![serde_json::from_value(value)?]
        } else {
            return Err(EnvelopeError::InvalidEnvelope);
        };

        let mut workbook = Workbook::new();
        for sheet in sheets {
            workbook.add_sheet(sheet)?;
        }
        Ok(workbook)
    }
}
