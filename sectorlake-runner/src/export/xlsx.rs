//! Spreadsheet export: one worksheet, header row, no index column.

use super::{write_atomic, ExportError, Format};
use rust_xlsxwriter::Workbook;
use sectorlake_core::schema::field_names;
use sectorlake_core::PeriodDataset;
use std::path::Path;

/// Rows per worksheet, header included.
pub const MAX_SHEET_ROWS: usize = 1_048_576;

pub fn write_xlsx(dataset: &PeriodDataset, path: &Path) -> Result<(), ExportError> {
    write_atomic(Format::Xlsx, path, |tmp| {
        if dataset.len() + 1 > MAX_SHEET_ROWS {
            return Err(format!(
                "{} rows do not fit in one worksheet (limit {})",
                dataset.len(),
                MAX_SHEET_ROWS - 1
            ));
        }

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let cell_err = |e: rust_xlsxwriter::XlsxError| format!("cell: {e}");

        for (col, name) in field_names().iter().enumerate() {
            sheet.write_string(0, col as u16, *name).map_err(cell_err)?;
        }

        for (i, row) in dataset.rows().iter().enumerate() {
            let r = (i + 1) as u32;
            sheet.write_string(r, 0, row.date_string()).map_err(cell_err)?;
            sheet.write_number(r, 1, row.cik).map_err(cell_err)?;
            sheet.write_string(r, 2, row.symbol.as_str()).map_err(cell_err)?;
            for (j, value) in row.values().into_iter().enumerate() {
                // Missing values stay blank.
                if value.is_finite() {
                    sheet.write_number(r, 3 + j as u16, value).map_err(cell_err)?;
                }
            }
        }

        workbook.save(tmp).map_err(|e| format!("save workbook: {e}"))?;
        Ok(())
    })
}
