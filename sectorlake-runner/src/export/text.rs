//! CSV and JSON export, and CSV reload.

use super::{write_atomic, ExportError, Format};
use sectorlake_core::schema::field_names;
use sectorlake_core::{CompanyPeriodRow, PeriodDataset};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Header row plus one line per record, no index column.
pub fn write_csv(dataset: &PeriodDataset, path: &Path) -> Result<(), ExportError> {
    write_atomic(Format::Csv, path, |tmp| {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(tmp)
            .map_err(|e| format!("create file: {e}"))?;
        wtr.write_record(field_names())
            .map_err(|e| format!("header: {e}"))?;
        for row in dataset.rows() {
            wtr.serialize(row).map_err(|e| format!("record: {e}"))?;
        }
        wtr.flush().map_err(|e| format!("flush: {e}"))?;
        Ok(())
    })
}

/// Read the records of a CSV written by [`write_csv`]. A header-only file
/// yields no rows.
pub fn read_csv_rows(path: &Path) -> Result<Vec<CompanyPeriodRow>, ExportError> {
    let read_err = |reason: String| ExportError::Read {
        path: path.to_path_buf(),
        reason,
    };

    let mut rdr = csv::Reader::from_path(path).map_err(|e| read_err(e.to_string()))?;

    let headers = rdr.headers().map_err(|e| read_err(e.to_string()))?;
    let expected = field_names();
    if headers.iter().ne(expected.iter().copied()) {
        return Err(read_err(format!(
            "unexpected header {:?}, expected {expected:?}",
            headers.iter().collect::<Vec<_>>()
        )));
    }

    rdr.deserialize::<CompanyPeriodRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| read_err(e.to_string()))
}

/// Read a CSV written by [`write_csv`] back into a dataset labelled `label`,
/// bounded by its earliest and latest dates. Fails on a header-only file,
/// which carries no bounds.
pub fn read_csv_dataset(path: &Path, label: &str) -> Result<PeriodDataset, ExportError> {
    let rows = read_csv_rows(path)?;
    PeriodDataset::from_rows(label, rows).ok_or_else(|| ExportError::Read {
        path: path.to_path_buf(),
        reason: "no records".into(),
    })
}

/// A JSON array with one object per record, keys in schema order.
pub fn write_json(dataset: &PeriodDataset, path: &Path) -> Result<(), ExportError> {
    write_atomic(Format::Json, path, |tmp| {
        let file = fs::File::create(tmp).map_err(|e| format!("create file: {e}"))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer(&mut out, dataset.rows())
            .map_err(|e| format!("serialize: {e}"))?;
        out.flush().map_err(|e| format!("flush: {e}"))?;
        Ok(())
    })
}
