//! ORC export, converted from the Avro output of the same base name.
//!
//! Column names are the lowercased output field names. The Avro file is read
//! record by record and the values are pushed into Arrow column builders that
//! are flushed into ORC stripes in fixed-size batches.

use super::{write_atomic, ExportError, Format};
use apache_avro::types::Value;
use apache_avro::Reader;
use arrow::array::{ArrayRef, Float64Builder, Int32Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use orc_rust::arrow_writer::ArrowWriterBuilder;
use std::fs;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

pub const ORC_SCHEMA: &str = "struct<date:string,cik:int,symbol:string,open:double,high:double,low:double,close:double,volume:double,dividends:double,stocksplits:double>";

const BATCH_ROWS: usize = 10_000;

/// Parse an ORC `struct<name:type,...>` type string into an Arrow schema.
///
/// Only the primitive types the output uses are accepted.
pub fn parse_orc_schema(type_str: &str) -> Result<Schema, String> {
    let body = type_str
        .trim()
        .strip_prefix("struct<")
        .and_then(|s| s.strip_suffix('>'))
        .ok_or_else(|| format!("not a struct type: {type_str}"))?;

    let fields = body
        .split(',')
        .map(|entry| {
            let (name, ty) = entry
                .split_once(':')
                .ok_or_else(|| format!("malformed field '{entry}'"))?;
            let dtype = match ty.trim() {
                "string" => DataType::Utf8,
                "int" => DataType::Int32,
                "double" => DataType::Float64,
                other => return Err(format!("unsupported ORC type '{other}'")),
            };
            Ok(Field::new(name.trim(), dtype, true))
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Schema::new(fields))
}

enum ColumnBuilder {
    Str(StringBuilder),
    Int(Int32Builder),
    Double(Float64Builder),
}

impl ColumnBuilder {
    fn for_type(dtype: &DataType) -> Self {
        match dtype {
            DataType::Utf8 => ColumnBuilder::Str(StringBuilder::new()),
            DataType::Int32 => ColumnBuilder::Int(Int32Builder::new()),
            _ => ColumnBuilder::Double(Float64Builder::new()),
        }
    }

    fn push(&mut self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (ColumnBuilder::Str(b), Value::String(s)) => b.append_value(s),
            (ColumnBuilder::Int(b), Value::Int(v)) => b.append_value(*v),
            (ColumnBuilder::Double(b), Value::Double(v)) => b.append_value(*v),
            (ColumnBuilder::Str(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Int(b), Value::Null) => b.append_null(),
            (ColumnBuilder::Double(b), Value::Null) => b.append_null(),
            (_, other) => return Err(format!("unexpected Avro value {other:?}")),
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Str(b) => Arc::new(b.finish()),
            ColumnBuilder::Int(b) => Arc::new(b.finish()),
            ColumnBuilder::Double(b) => Arc::new(b.finish()),
        }
    }
}

struct BatchBuilder {
    schema: SchemaRef,
    columns: Vec<ColumnBuilder>,
    rows: usize,
}

impl BatchBuilder {
    fn new(schema: SchemaRef) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnBuilder::for_type(f.data_type()))
            .collect();
        Self {
            schema,
            columns,
            rows: 0,
        }
    }

    fn push_record(&mut self, fields: &[(String, Value)]) -> Result<(), String> {
        if fields.len() != self.columns.len() {
            return Err(format!(
                "record has {} fields, ORC schema has {}",
                fields.len(),
                self.columns.len()
            ));
        }
        for ((name, value), (column, field)) in fields
            .iter()
            .zip(self.columns.iter_mut().zip(self.schema.fields().iter()))
        {
            if name.to_ascii_lowercase() != *field.name() {
                return Err(format!(
                    "Avro field '{name}' does not line up with ORC column '{}'",
                    field.name()
                ));
            }
            column
                .push(value)
                .map_err(|e| format!("column {name}: {e}"))?;
        }
        self.rows += 1;
        Ok(())
    }

    fn take_batch(&mut self) -> Result<RecordBatch, String> {
        let arrays = self.columns.iter_mut().map(ColumnBuilder::finish).collect();
        self.rows = 0;
        RecordBatch::try_new(self.schema.clone(), arrays).map_err(|e| format!("record batch: {e}"))
    }
}

/// Build `orc_path` from the records in `avro_path`.
pub fn convert_avro_to_orc(avro_path: &Path, orc_path: &Path) -> Result<(), ExportError> {
    if !avro_path.is_file() {
        return Err(ExportError::MissingIntermediateFile {
            path: avro_path.to_path_buf(),
        });
    }

    write_atomic(Format::Orc, orc_path, |tmp| {
        let schema: SchemaRef = Arc::new(parse_orc_schema(ORC_SCHEMA)?);

        let input = fs::File::open(avro_path).map_err(|e| format!("open avro: {e}"))?;
        let reader =
            Reader::new(BufReader::new(input)).map_err(|e| format!("avro header: {e}"))?;

        let output = fs::File::create(tmp).map_err(|e| format!("create file: {e}"))?;
        let mut writer = ArrowWriterBuilder::new(output, schema.clone())
            .try_build()
            .map_err(|e| format!("orc writer: {e}"))?;

        let mut batch = BatchBuilder::new(schema);
        let mut total = 0usize;
        for (i, record) in reader.enumerate() {
            match record.map_err(|e| format!("avro record {i}: {e}"))? {
                Value::Record(fields) => batch.push_record(&fields)?,
                other => return Err(format!("avro record {i} is not a record: {other:?}")),
            }
            total += 1;
            if batch.rows == BATCH_ROWS {
                writer
                    .write(&batch.take_batch()?)
                    .map_err(|e| format!("write stripe: {e}"))?;
            }
        }
        if batch.rows > 0 {
            writer
                .write(&batch.take_batch()?)
                .map_err(|e| format!("write stripe: {e}"))?;
        }
        writer.close().map_err(|e| format!("close: {e}"))?;

        tracing::debug!(rows = total, avro = %avro_path.display(), "converted avro to orc");
        Ok(())
    })
}
