//! Parquet export through a polars `DataFrame`.

use super::{write_atomic, ExportError, Format};
use polars::prelude::*;
use sectorlake_core::schema::{FieldType, OUTPUT_FIELDS};
use sectorlake_core::PeriodDataset;
use std::fs;
use std::path::Path;

/// Polars schema equivalent of the output schema.
pub fn polars_schema() -> Schema {
    Schema::from_iter(OUTPUT_FIELDS.iter().map(|f| {
        let dtype = match f.dtype {
            FieldType::String => DataType::String,
            FieldType::Int32 => DataType::Int32,
            FieldType::Float64 => DataType::Float64,
        };
        Field::new(f.name.into(), dtype)
    }))
}

/// Convert a dataset to a DataFrame with the ten output columns.
pub fn dataset_to_dataframe(dataset: &PeriodDataset) -> PolarsResult<DataFrame> {
    let rows = dataset.rows();
    let float_col = |name: &str, get: fn(&sectorlake_core::CompanyPeriodRow) -> f64| {
        Column::new(name.into(), rows.iter().map(get).collect::<Vec<f64>>())
    };

    DataFrame::new(vec![
        Column::new(
            "Date".into(),
            rows.iter().map(|r| r.date_string()).collect::<Vec<String>>(),
        ),
        Column::new("CIK".into(), rows.iter().map(|r| r.cik).collect::<Vec<i32>>()),
        Column::new(
            "Symbol".into(),
            rows.iter().map(|r| r.symbol.clone()).collect::<Vec<String>>(),
        ),
        float_col("Open", |r| r.open),
        float_col("High", |r| r.high),
        float_col("Low", |r| r.low),
        float_col("Close", |r| r.close),
        float_col("Volume", |r| r.volume),
        float_col("Dividends", |r| r.dividends),
        float_col("StockSplits", |r| r.stock_splits),
    ])
}

pub fn write_parquet(dataset: &PeriodDataset, path: &Path) -> Result<(), ExportError> {
    write_atomic(Format::Parquet, path, |tmp| {
        let mut df = dataset_to_dataframe(dataset).map_err(|e| format!("dataframe: {e}"))?;
        let file = fs::File::create(tmp).map_err(|e| format!("create file: {e}"))?;
        ParquetWriter::new(file)
            .finish(&mut df)
            .map_err(|e| format!("write parquet: {e}"))?;
        Ok(())
    })
}
