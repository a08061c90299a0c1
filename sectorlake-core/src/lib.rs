//! SectorLake Core: extraction and assembly for the sector price ETL.
//!
//! - Domain types (companies, daily bars, unified rows, period datasets)
//! - The fixed ten-column output schema
//! - Roster scraping and the Yahoo Finance provider behind traits
//! - Retry policy and circuit breaker shared by all outbound requests
//! - Forward fill and per-period dataset assembly

pub mod data;
pub mod domain;
pub mod schema;

pub use domain::{CompanyPeriodRow, CompanyRecord, PeriodDataset, PeriodSpec, PriceBar};
