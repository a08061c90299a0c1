//! Extraction and assembly: roster, market data, period datasets.

pub mod assemble;
pub mod circuit_breaker;
pub mod directory;
pub mod fill;
pub mod http;
pub mod provider;
pub mod yahoo;

pub use assemble::{
    assemble, AssembledPeriod, AssemblyOptions, AssemblyProgress, FetchFailurePolicy,
    LogProgress, NoProgress, SkippedCompany,
};
pub use circuit_breaker::CircuitBreaker;
pub use directory::{parse_directory, WebDirectory, INFORMATION_TECHNOLOGY, SP500_URL};
pub use fill::forward_fill;
pub use http::{HttpClient, RetryPolicy};
pub use provider::{CompanyDirectory, DataError, DataProvider};
pub use yahoo::YahooProvider;
