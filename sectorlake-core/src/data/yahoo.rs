//! Yahoo Finance data provider.
//!
//! Fetches daily bars plus dividend and split events from the v8 chart API.
//! Yahoo has no official API and is subject to unannounced format changes;
//! parsing failures surface as `ResponseFormatChanged`.

use super::http::HttpClient;
use super::provider::{DataError, DataProvider};
use crate::domain::PriceBar;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::HashMap;

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Debug, Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct SplitEvent {
    date: i64,
    numerator: f64,
    denominator: f64,
}

pub struct YahooProvider {
    http: HttpClient,
    auto_adjust: bool,
}

impl YahooProvider {
    /// `auto_adjust` scales OHLC by the adjusted close, like the chart's
    /// default "adjusted" view.
    pub fn new(http: HttpClient, auto_adjust: bool) -> Self {
        Self { http, auto_adjust }
    }

    /// Chart URL for `[start, end)`.
    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        format!(
            "{CHART_BASE_URL}/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &events=div%2Csplits&includeAdjustedClose=true"
        )
    }
}

/// Exchange-local calendar date of a bar timestamp.
fn local_date(ts: i64, gmtoffset: i64) -> Result<NaiveDate, DataError> {
    DateTime::from_timestamp(ts + gmtoffset, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))
}

fn value_at(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

/// Convert a chart response into bars within `[start, end)`.
fn parse_chart(
    symbol: &str,
    resp: ChartResponse,
    start: NaiveDate,
    end: NaiveDate,
    auto_adjust: bool,
) -> Result<Vec<PriceBar>, DataError> {
    let results = match (resp.chart.result, resp.chart.error) {
        (Some(results), _) => results,
        (None, Some(err)) if err.code == "Not Found" => {
            tracing::warn!(symbol, "symbol not found by provider, treating as no data");
            return Ok(Vec::new());
        }
        (None, Some(err)) => {
            return Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            )))
        }
        (None, None) => {
            return Err(DataError::ResponseFormatChanged(
                "empty result with no error".into(),
            ))
        }
    };

    let Some(data) = results.into_iter().next() else {
        return Ok(Vec::new());
    };

    // No timestamps means no trading activity in range.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let gmtoffset = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let events = data.events.unwrap_or_default();
    let mut dividends: HashMap<NaiveDate, f64> = HashMap::new();
    for ev in events.dividends.values() {
        *dividends.entry(local_date(ev.date, gmtoffset)?).or_default() += ev.amount;
    }
    let mut splits: HashMap<NaiveDate, f64> = HashMap::new();
    for ev in events.splits.values() {
        if ev.denominator != 0.0 {
            splits.insert(local_date(ev.date, gmtoffset)?, ev.numerator / ev.denominator);
        }
    }

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = local_date(ts, gmtoffset)?;
        if date < start || date >= end {
            continue;
        }

        let mut bar = PriceBar {
            date,
            open: value_at(&quote.open, i).unwrap_or(f64::NAN),
            high: value_at(&quote.high, i).unwrap_or(f64::NAN),
            low: value_at(&quote.low, i).unwrap_or(f64::NAN),
            close: value_at(&quote.close, i).unwrap_or(f64::NAN),
            volume: value_at(&quote.volume, i).unwrap_or(f64::NAN),
            dividends: dividends.get(&date).copied().unwrap_or(0.0),
            stock_splits: splits.get(&date).copied().unwrap_or(0.0),
        };

        // Holidays and halted days come back with every field null.
        if bar.is_void() {
            continue;
        }

        if auto_adjust {
            let adj = adj_closes.as_deref().and_then(|v| value_at(v, i));
            if let Some(adj) = adj {
                if bar.close.is_finite() && bar.close != 0.0 {
                    let ratio = adj / bar.close;
                    bar.open *= ratio;
                    bar.high *= ratio;
                    bar.low *= ratio;
                    bar.close = adj;
                }
            }
        }

        bars.push(bar);
    }

    Ok(bars)
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let body = match self.http.get_text(&url) {
            Ok(body) => body,
            Err(DataError::NotFound(_)) => {
                tracing::warn!(symbol, "symbol not found by provider, treating as no data");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let chart: ChartResponse = serde_json::from_str(&body).map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        let bars = parse_chart(symbol, chart, start, end, self.auto_adjust)?;
        tracing::debug!(symbol, %start, %end, bars = bars.len(), "fetched bars");
        Ok(bars)
    }
}
