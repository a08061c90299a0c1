//! SectorLake Runner: configuration, export and the run loop.
//!
//! - `config`: TOML run configuration and period resolution
//! - `export`: CSV, JSON, Parquet, XLSX, Avro and Avro-derived ORC writers
//! - `manifest`: per-period sidecar with file sizes and BLAKE3 hashes
//! - `pipeline`: roster, assembly and writing for every period

pub mod config;
pub mod export;
pub mod manifest;
pub mod pipeline;

pub use config::{ConfigError, EtlConfig, PeriodConfig};
pub use export::{ExportError, Format, MultiFormatWriter, WriteFailurePolicy, WriteReport};
pub use manifest::PeriodManifest;
pub use pipeline::{reexport, run_pipeline, PipelineError, PipelineOptions, RunSummary};
