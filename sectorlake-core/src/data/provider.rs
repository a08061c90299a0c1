//! Data provider traits and structured error types.
//!
//! `CompanyDirectory` and `DataProvider` abstract over the two external
//! sources (the index roster page and the market-data API) so the pipeline
//! can run against mocks in tests.

use crate::domain::{CompanyRecord, PriceBar};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for extraction.
///
/// These are designed to be displayable in CLI output and logs.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("directory parse error: {0}")]
    Parse(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),
}

impl DataError {
    /// Errors that must stop the whole run even when failing companies are
    /// being skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DataError::CircuitBreakerTripped)
    }
}

/// Source of the company roster.
pub trait CompanyDirectory: Send + Sync {
    /// Companies whose sector equals `sector` exactly, in source order.
    fn list_companies(&self, sector: &str) -> Result<Vec<CompanyRecord>, DataError>;
}

/// Source of daily price bars.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for `symbol` over `[start, end)`.
    ///
    /// A symbol with no trading activity in range yields an empty vector.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError>;
}
