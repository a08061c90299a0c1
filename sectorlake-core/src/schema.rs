//! The fixed output schema shared by every format.

/// Logical type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int32,
    Float64,
}

/// One output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputField {
    pub name: &'static str,
    pub dtype: FieldType,
}

const fn field(name: &'static str, dtype: FieldType) -> OutputField {
    OutputField { name, dtype }
}

/// Output columns, in order.
pub const OUTPUT_FIELDS: [OutputField; 10] = [
    field("Date", FieldType::String),
    field("CIK", FieldType::Int32),
    field("Symbol", FieldType::String),
    field("Open", FieldType::Float64),
    field("High", FieldType::Float64),
    field("Low", FieldType::Float64),
    field("Close", FieldType::Float64),
    field("Volume", FieldType::Float64),
    field("Dividends", FieldType::Float64),
    field("StockSplits", FieldType::Float64),
];

/// Column names, in order.
pub fn field_names() -> [&'static str; 10] {
    OUTPUT_FIELDS.map(|f| f.name)
}
