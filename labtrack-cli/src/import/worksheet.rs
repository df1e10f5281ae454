//! In-memory worksheet model
//!
//! A `Workbook` is one decoded upload; each `Worksheet` is a sparse grid of
//! normalized cells addressed by (1-based row, column letter). The grid is
//! built once per upload and reused by every importer over it; addressing is
//! stable for the worksheet's lifetime.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Reader, open_workbook_auto};
use chrono::{DateTime, Utc};

use super::cell::{CellValue, normalize};
use super::columns::{column_index, column_label};

/// One decoded upload: metadata plus its worksheets
#[derive(Debug)]
pub struct Workbook {
    /// Original filename of the upload
    pub file_name: String,
    /// MIME type of the upload
    pub mime_type: String,
    /// When the file was uploaded
    pub uploaded_at: DateTime<Utc>,
    /// Who uploaded it
    pub uploaded_by: String,
    sheets: Vec<Worksheet>,
}

impl Workbook {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Workbook {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            uploaded_at: Utc::now(),
            uploaded_by: uploaded_by.into(),
            sheets: Vec::new(),
        }
    }

    pub fn add_sheet(&mut self, sheet: Worksheet) {
        self.sheets.push(sheet);
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    /// Find a worksheet by name
    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    /// The first worksheet, which is where single-sheet lab documents live
    pub fn first_sheet(&self) -> Result<&Worksheet> {
        self.sheets.first().context("workbook has no worksheets")
    }
}

/// A sparse grid of normalized cells
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    name: String,
    cells: HashMap<(u32, u32), CellValue>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Worksheet {
            name: name.into(),
            cells: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a normalized cell at (1-based row, 0-based column index)
    pub fn add_cell(&mut self, row: u32, column: u32, value: CellValue) {
        debug_assert!(row >= 1, "rows are 1-based");
        self.cells.insert((row, column), value);
    }

    /// Convenience for tests and builders: add a cell by column letter
    pub fn add_cell_at(&mut self, row: u32, column: &str, value: CellValue) {
        if let Some(index) = column_index(column) {
            self.add_cell(row, index, value);
        }
    }

    /// Look up a cell by (1-based row, column letter). Absent cells are
    /// `None`, never an error; sparse population is normal.
    pub fn value(&self, row: u32, column: &str) -> Option<&CellValue> {
        let index = column_index(column)?;
        self.cells.get(&(row, index))
    }

    /// Number of rows, derived as the maximum row index observed across all
    /// cells so it stays correct regardless of insertion order.
    pub fn num_rows(&self) -> u32 {
        self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Decode an uploaded spreadsheet file (xlsx, xls, ods) into a `Workbook` of
/// normalized cells. Any unclassifiable cell aborts the whole load.
pub fn load_workbook(
    path: &Path,
    file_name: &str,
    mime_type: &str,
    uploaded_by: &str,
) -> Result<Workbook> {
    let mut reader = open_workbook_auto(path)
        .with_context(|| format!("failed to open spreadsheet: {}", path.display()))?;

    let mut workbook = Workbook::new(file_name, mime_type, uploaded_by);

    let sheet_names = reader.sheet_names().to_vec();
    for sheet_name in sheet_names {
        let range = reader
            .worksheet_range(&sheet_name)
            .with_context(|| format!("failed to read sheet: {}", sheet_name))?;

        let mut sheet = Worksheet::new(&sheet_name);
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (r, row) in range.rows().enumerate() {
            for (c, data) in row.iter().enumerate() {
                let abs_row = start_row + r as u32 + 1;
                let abs_col = start_col + c as u32;
                let label = column_label(abs_col);
                if let Some(value) = normalize(data, abs_row, &label).with_context(|| {
                    format!("sheet '{}' failed to load", sheet_name)
                })? {
                    sheet.add_cell(abs_row, abs_col, value);
                }
            }
        }

        log::debug!(
            "loaded sheet '{}': {} cells, {} rows",
            sheet_name,
            sheet.cell_count(),
            sheet.num_rows()
        );
        workbook.add_sheet(sheet);
    }

    Ok(workbook)
}
