//! Avro container export.
//!
//! The record schema is embedded in the file. It is derived from the output
//! schema, with `CIK` as a 32-bit Avro `int` and the date as a string.

use super::{write_atomic, ExportError, Format};
use apache_avro::types::Value;
use apache_avro::{Reader, Schema, Writer};
use sectorlake_core::schema::{FieldType, OUTPUT_FIELDS};
use sectorlake_core::{CompanyPeriodRow, PeriodDataset};
use serde_json::json;
use std::fs;
use std::io::BufReader;
use std::path::Path;

/// Avro names allow `[A-Za-z0-9_]` and must not start with a digit.
pub fn record_name(base_name: &str) -> String {
    let mut name: String = base_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// JSON text of the record schema for `base_name`.
pub fn schema_json(base_name: &str) -> String {
    let fields: Vec<serde_json::Value> = OUTPUT_FIELDS
        .iter()
        .map(|f| {
            let avro_type = match f.dtype {
                FieldType::String => "string",
                FieldType::Int32 => "int",
                FieldType::Float64 => "double",
            };
            json!({ "name": f.name, "type": avro_type })
        })
        .collect();

    json!({
        "type": "record",
        "name": record_name(base_name),
        "fields": fields,
    })
    .to_string()
}

pub fn avro_schema(base_name: &str) -> Result<Schema, apache_avro::Error> {
    Schema::parse_str(&schema_json(base_name))
}

fn row_to_value(row: &CompanyPeriodRow) -> Value {
    let [open, high, low, close, volume, dividends, stock_splits] = row.values();
    Value::Record(vec![
        ("Date".to_string(), Value::String(row.date_string())),
        ("CIK".to_string(), Value::Int(row.cik)),
        ("Symbol".to_string(), Value::String(row.symbol.clone())),
        ("Open".to_string(), Value::Double(open)),
        ("High".to_string(), Value::Double(high)),
        ("Low".to_string(), Value::Double(low)),
        ("Close".to_string(), Value::Double(close)),
        ("Volume".to_string(), Value::Double(volume)),
        ("Dividends".to_string(), Value::Double(dividends)),
        ("StockSplits".to_string(), Value::Double(stock_splits)),
    ])
}

pub fn write_avro(dataset: &PeriodDataset, base_name: &str, path: &Path) -> Result<(), ExportError> {
    write_atomic(Format::Avro, path, |tmp| {
        let schema = avro_schema(base_name).map_err(|e| format!("schema: {e}"))?;
        let file = fs::File::create(tmp).map_err(|e| format!("create file: {e}"))?;
        let mut writer = Writer::new(&schema, file);
        for row in dataset.rows() {
            writer
                .append(row_to_value(row))
                .map_err(|e| format!("append record: {e}"))?;
        }
        let file = writer.into_inner().map_err(|e| format!("flush: {e}"))?;
        file.sync_all().map_err(|e| format!("sync: {e}"))?;
        Ok(())
    })
}

/// Read every record of an Avro file as `(field name, value)` pairs in
/// the order they are stored.
pub fn read_records(path: &Path) -> Result<Vec<Vec<(String, Value)>>, String> {
    let file = fs::File::open(path).map_err(|e| format!("open: {e}"))?;
    let reader = Reader::new(BufReader::new(file)).map_err(|e| format!("avro header: {e}"))?;

    reader
        .enumerate()
        .map(|(i, value)| match value {
            Ok(Value::Record(fields)) => Ok(fields),
            Ok(other) => Err(format!("record {i} is not a record: {other:?}")),
            Err(e) => Err(format!("record {i}: {e}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sectorlake_core::PeriodSpec;

    #[test]
    fn record_names_are_sanitized() {
        assert_eq!(record_name("data_2020"), "data_2020");
        assert_eq!(record_name("data_2020-01-01_2020-07-01"), "data_2020_01_01_2020_07_01");
        assert_eq!(record_name("2020"), "_2020");
    }

    #[test]
    fn schema_declares_int_cik() {
        let schema = avro_schema("data_2020").unwrap();
        let canonical = schema.canonical_form();
        assert!(canonical.contains(r#"{"name":"CIK","type":"int"}"#));
        assert!(canonical.contains(r#"{"name":"Date","type":"string"}"#));
    }

    #[test]
    fn records_read_back_in_schema_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_2023.avro");
        let period = PeriodSpec::completed(
            "2023",
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let row = CompanyPeriodRow {
            date: NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
            cik: 1341439,
            symbol: "ORCL".into(),
            open: 89.0,
            high: 89.5,
            low: 87.2,
            close: 88.1,
            volume: 6.1e6,
            dividends: 0.32,
            stock_splits: 0.0,
        };
        write_avro(&PeriodDataset::new(&period, vec![row]), "data_2023", &path).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        let names: Vec<&str> = records[0].iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, sectorlake_core::schema::field_names().to_vec());
        assert_eq!(records[0][1].1, Value::Int(1341439));
        assert_eq!(records[0][0].1, Value::String("2023-01-03".into()));
        assert_eq!(records[0][8].1, Value::Double(0.32));
    }
}
