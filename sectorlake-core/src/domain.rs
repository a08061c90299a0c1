//! Domain types: roster entries, daily bars, unified rows, period datasets.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// One company from the index roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub symbol: String,
    pub sector: String,
    /// Central Index Key.
    pub cik: i32,
}

/// One trading day for one company, as returned by a data provider.
///
/// A missing numeric field is `NaN`. Dividends and splits are events: days
/// without one carry `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub dividends: f64,
    pub stock_splits: f64,
}

impl PriceBar {
    /// True when none of the OHLCV fields carries a value (a non-trading day).
    pub fn is_void(&self) -> bool {
        self.open.is_nan()
            && self.high.is_nan()
            && self.low.is_nan()
            && self.close.is_nan()
            && self.volume.is_nan()
    }

    /// Mutable handles to the fields eligible for forward fill.
    pub(crate) fn quote_fields_mut(&mut self) -> [&mut f64; 5] {
        [
            &mut self.open,
            &mut self.high,
            &mut self.low,
            &mut self.close,
            &mut self.volume,
        ]
    }
}

/// The unified row written to every output format.
///
/// Field order matches the output schema: `Date, CIK, Symbol, Open, High,
/// Low, Close, Volume, Dividends, StockSplits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyPeriodRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "CIK")]
    pub cik: i32,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
    #[serde(rename = "Dividends")]
    pub dividends: f64,
    #[serde(rename = "StockSplits")]
    pub stock_splits: f64,
}

impl CompanyPeriodRow {
    pub fn from_bar(company: &CompanyRecord, bar: &PriceBar) -> Self {
        Self {
            date: bar.date,
            cik: company.cik,
            symbol: company.symbol.clone(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            dividends: bar.dividends,
            stock_splits: bar.stock_splits,
        }
    }

    /// ISO-8601 calendar date, no time or offset.
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// The float columns in schema order, `Open` through `StockSplits`.
    pub fn values(&self) -> [f64; 7] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.dividends,
            self.stock_splits,
        ]
    }
}

/// A period to assemble: `[start, end)` for completed periods, `[start, end]`
/// for the in-progress one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSpec {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_current: bool,
}

impl PeriodSpec {
    /// A completed period with an exclusive end.
    pub fn completed(label: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end,
            is_current: false,
        }
    }

    /// The in-progress period, fetched through `today` inclusive.
    pub fn in_progress(label: impl Into<String>, start: NaiveDate, today: NaiveDate) -> Self {
        Self {
            label: label.into(),
            start,
            end: today,
            is_current: true,
        }
    }

    /// Calendar year `year`, relative to `today`.
    ///
    /// Past years end on January 1st of the following year; the current year
    /// runs through today. Returns `None` for future years.
    pub fn year(year: i32, today: NaiveDate) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        match year.cmp(&today.year()) {
            std::cmp::Ordering::Less => {
                let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)?;
                Some(Self::completed(year.to_string(), start, end))
            }
            std::cmp::Ordering::Equal => Some(Self::in_progress(year.to_string(), start, today)),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Half-open `[start, end)` bounds to hand to a data provider.
    pub fn fetch_bounds(&self) -> (NaiveDate, NaiveDate) {
        if self.is_current {
            let end = self.end.checked_add_days(Days::new(1)).unwrap_or(self.end);
            (self.start, end)
        } else {
            (self.start, self.end)
        }
    }

    /// Output base name, e.g. `data_2020`.
    pub fn base_name(&self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.label.clone()
        } else {
            format!("{prefix}_{}", self.label)
        }
    }
}

/// One period's unified table. Rows keep assembly order.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodDataset {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    rows: Vec<CompanyPeriodRow>,
}

impl PeriodDataset {
    pub fn new(period: &PeriodSpec, rows: Vec<CompanyPeriodRow>) -> Self {
        Self {
            label: period.label.clone(),
            start: period.start,
            end: period.end,
            rows,
        }
    }

    /// Build a dataset from rows that were read back from disk.
    ///
    /// The bounds are the earliest and latest row dates.
    pub fn from_rows(label: impl Into<String>, rows: Vec<CompanyPeriodRow>) -> Option<Self> {
        let start = rows.iter().map(|r| r.date).min()?;
        let end = rows.iter().map(|r| r.date).max()?;
        Some(Self {
            label: label.into(),
            start,
            end,
            rows,
        })
    }

    pub fn rows(&self) -> &[CompanyPeriodRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct companies that contributed rows.
    pub fn company_count(&self) -> usize {
        let mut seen: Vec<&str> = self.rows.iter().map(|r| r.symbol.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}
