//! Spreadsheet export of grouped results.
//!
//! Sheets are xlsx workbooks. Templates are opened and written in place so
//! their styling, merged cells and other sheets survive the fill.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use umya_spreadsheet::Spreadsheet;

use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::models::ExportRow;

pub const CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    /// New sheet with a header row
    Fresh { header: [String; 2] },
    /// Fill an existing sheet starting at a 1-based (row, column)
    Template {
        path: PathBuf,
        start_row: usize,
        start_col: usize,
    },
}

/// Writes export rows to a sheet and returns its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportWriter {
    layout: Layout,
}

impl ExportWriter {
    pub fn fresh() -> Self {
        let defaults = ExportConfig::default();
        Self {
            layout: Layout::Fresh {
                header: defaults.header,
            },
        }
    }

    pub fn with_header(header: [String; 2]) -> Self {
        Self {
            layout: Layout::Fresh { header },
        }
    }

    /// Fill `path`, starting at row 3, column 1
    pub fn template(path: impl Into<PathBuf>) -> Self {
        let defaults = ExportConfig::default();
        Self {
            layout: Layout::Template {
                path: path.into(),
                start_row: defaults.start_row,
                start_col: defaults.start_col,
            },
        }
    }

    /// Move the template write position. Values below 1 are treated as 1.
    pub fn at(mut self, row: usize, col: usize) -> Self {
        if let Layout::Template {
            start_row,
            start_col,
            ..
        } = &mut self.layout
        {
            *start_row = row.max(1);
            *start_col = col.max(1);
        }
        self
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        match &config.template {
            Some(path) => Self::template(path).at(config.start_row, config.start_col),
            None => Self::with_header(config.header.clone()),
        }
    }

    pub fn template_path(&self) -> Option<&Path> {
        match &self.layout {
            Layout::Template { path, .. } => Some(path),
            Layout::Fresh { .. } => None,
        }
    }

    pub fn write(&self, rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
        let book = match &self.layout {
            Layout::Fresh { header } => fresh_book(header, rows)?,
            Layout::Template {
                path,
                start_row,
                start_col,
            } => {
                let mut book = read_template(path)?;
                fill(&mut book, rows, *start_row, *start_col)?;
                book
            }
        };

        let mut out = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
            .map_err(|e| ExportError::Sheet(e.to_string()))?;
        let bytes = out.into_inner();
        info!("Exported {} rows ({} bytes)", rows.len(), bytes.len());
        Ok(bytes)
    }
}

impl Default for ExportWriter {
    fn default() -> Self {
        Self::fresh()
    }
}

/// 1-based (column, row) as the workbook addresses cells
fn cell(row: usize, col: usize) -> Result<(u32, u32), ExportError> {
    match (u32::try_from(col), u32::try_from(row)) {
        (Ok(c), Ok(r)) => Ok((c, r)),
        _ => Err(ExportError::Sheet(format!(
            "cell position out of range: row {row}, column {col}"
        ))),
    }
}

fn fresh_book(header: &[String; 2], rows: &[ExportRow]) -> Result<Spreadsheet, ExportError> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_active_sheet_mut();

    for (i, title) in header.iter().enumerate() {
        let pos = cell(1, i + 1)?;
        sheet.get_cell_mut(pos).set_value(title.as_str());
        sheet.get_style_mut(pos).get_font_mut().set_bold(true);
    }
    for (i, row) in rows.iter().enumerate() {
        sheet.get_cell_mut(cell(i + 2, 1)?).set_value(row.parent.as_str());
        sheet.get_cell_mut(cell(i + 2, 2)?).set_value(row.units.as_str());
    }

    Ok(book)
}

fn read_template(path: &Path) -> Result<Spreadsheet, ExportError> {
    if !path.is_file() {
        return Err(ExportError::TemplateNotFound(path.to_path_buf()));
    }

    let book = umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| ExportError::Sheet(format!("{}: {e}", path.display())))?;
    debug!("Template {:?} has {} sheets", path, book.get_sheet_count());
    Ok(book)
}

/// Write rows into the active sheet at a 1-based offset, leaving every other
/// cell untouched
fn fill(
    book: &mut Spreadsheet,
    rows: &[ExportRow],
    start_row: usize,
    start_col: usize,
) -> Result<(), ExportError> {
    let sheet = book.get_active_sheet_mut();
    for (i, row) in rows.iter().enumerate() {
        let r = start_row + i;
        sheet
            .get_cell_mut(cell(r, start_col)?)
            .set_value(row.parent.as_str());
        sheet
            .get_cell_mut(cell(r, start_col + 1)?)
            .set_value(row.units.as_str());
    }
    Ok(())
}
