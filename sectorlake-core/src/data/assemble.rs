//! Period assembly: one fetch per company, concatenated in company order.

use super::fill::forward_fill;
use super::provider::{DataError, DataProvider};
use crate::domain::{CompanyPeriodRow, CompanyRecord, PeriodDataset, PeriodSpec, PriceBar};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// What to do when one company's fetch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailurePolicy {
    /// Fail the whole period on the first error.
    #[default]
    Abort,
    /// Leave the company out and record it in `AssembledPeriod::skipped`.
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub on_fetch_error: FetchFailurePolicy,
    /// Bound on consecutive forward-filled values (in-progress period only).
    pub fill_limit: Option<usize>,
    /// Fetch companies on the rayon pool. Row order is unchanged.
    pub parallel: bool,
}

/// A company left out under `FetchFailurePolicy::Skip`.
#[derive(Debug)]
pub struct SkippedCompany {
    pub symbol: String,
    pub error: DataError,
}

#[derive(Debug)]
pub struct AssembledPeriod {
    pub dataset: PeriodDataset,
    pub skipped: Vec<SkippedCompany>,
}

/// Progress callbacks for a period assembly.
pub trait AssemblyProgress: Send + Sync {
    fn on_company_start(&self, symbol: &str, index: usize, total: usize);

    fn on_company_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    );

    fn on_period_complete(&self, label: &str, rows: usize, skipped: usize);
}

/// Progress reporter that emits tracing events.
pub struct LogProgress;

impl AssemblyProgress for LogProgress {
    fn on_company_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::debug!("[{}/{}] fetching {symbol}", index + 1, total);
    }

    fn on_company_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(rows) => tracing::info!("[{}/{}] {symbol}: {rows} rows", index + 1, total),
            Err(e) => tracing::warn!("[{}/{}] {symbol}: {e}", index + 1, total),
        }
    }

    fn on_period_complete(&self, label: &str, rows: usize, skipped: usize) {
        tracing::info!(period = label, rows, skipped, "period assembled");
    }
}

/// Progress reporter that ignores every event.
pub struct NoProgress;

impl AssemblyProgress for NoProgress {
    fn on_company_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_company_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: Result<usize, &DataError>,
    ) {
    }

    fn on_period_complete(&self, _label: &str, _rows: usize, _skipped: usize) {}
}

/// Fetch one company's bars for `period`, forward-filled when in progress.
fn fetch_company(
    provider: &dyn DataProvider,
    company: &CompanyRecord,
    period: &PeriodSpec,
    opts: &AssemblyOptions,
) -> Result<Vec<PriceBar>, DataError> {
    let (start, end) = period.fetch_bounds();
    let bars = provider.fetch(&company.symbol, start, end)?;
    if period.is_current {
        Ok(forward_fill(bars, opts.fill_limit))
    } else {
        Ok(bars)
    }
}

fn aborts_assembly(opts: &AssemblyOptions, e: &DataError) -> bool {
    opts.on_fetch_error == FetchFailurePolicy::Abort || e.is_fatal()
}

/// Assemble one period's dataset from `companies`, in input order.
///
/// Under `Abort` the first failing company ends the assembly with its error.
/// Under `Skip` failing companies contribute no rows, except for fatal errors
/// (tripped circuit breaker), which always abort. On the parallel path an
/// aborting error stops companies that have not started yet; fetches already
/// in flight run to completion.
pub fn assemble(
    provider: &dyn DataProvider,
    companies: &[CompanyRecord],
    period: &PeriodSpec,
    opts: &AssemblyOptions,
    progress: &dyn AssemblyProgress,
) -> Result<AssembledPeriod, DataError> {
    let total = companies.len();
    let mut rows: Vec<CompanyPeriodRow> = Vec::new();
    let mut skipped = Vec::new();

    let mut accept = |index: usize,
                      company: &CompanyRecord,
                      result: Result<Vec<PriceBar>, DataError>|
     -> Result<(), DataError> {
        match result {
            Ok(bars) => {
                progress.on_company_complete(&company.symbol, index, total, Ok(bars.len()));
                rows.extend(bars.iter().map(|bar| CompanyPeriodRow::from_bar(company, bar)));
                Ok(())
            }
            Err(e) => {
                progress.on_company_complete(&company.symbol, index, total, Err(&e));
                if aborts_assembly(opts, &e) {
                    return Err(e);
                }
                skipped.push(SkippedCompany {
                    symbol: company.symbol.clone(),
                    error: e,
                });
                Ok(())
            }
        }
    };

    if opts.parallel {
        // Once an aborting error is seen, companies not yet started are left
        // unfetched (`None`).
        let stop = AtomicBool::new(false);
        let results: Vec<Option<Result<Vec<PriceBar>, DataError>>> = companies
            .par_iter()
            .enumerate()
            .map(|(i, company)| {
                if stop.load(Ordering::Relaxed) {
                    return None;
                }
                progress.on_company_start(&company.symbol, i, total);
                let result = fetch_company(provider, company, period, opts);
                if let Err(e) = &result {
                    if aborts_assembly(opts, e) {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
                Some(result)
            })
            .collect();
        for (i, (company, result)) in companies.iter().zip(results).enumerate() {
            if let Some(result) = result {
                accept(i, company, result)?;
            }
        }
    } else {
        for (i, company) in companies.iter().enumerate() {
            progress.on_company_start(&company.symbol, i, total);
            accept(i, company, fetch_company(provider, company, period, opts))?;
        }
    }

    progress.on_period_complete(&period.label, rows.len(), skipped.len());

    Ok(AssembledPeriod {
        dataset: PeriodDataset::new(period, rows),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn company(symbol: &str, cik: i32) -> CompanyRecord {
        CompanyRecord {
            symbol: symbol.into(),
            sector: "Information Technology".into(),
            cik,
        }
    }

    fn bars(n: usize, close: f64) -> Vec<PriceBar> {
        (0..n)
            .map(|i| PriceBar {
                date: date(2020, 1, 1) + chrono::Days::new(i as u64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                dividends: 0.0,
                stock_splits: 0.0,
            })
            .collect()
    }

    #[derive(Default)]
    struct MockProvider {
        bars: HashMap<String, Vec<PriceBar>>,
        failing: Vec<String>,
        delay: Option<std::time::Duration>,
        calls: Mutex<Vec<(String, NaiveDate, NaiveDate)>>,
    }

    impl DataProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn fetch(
            &self,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PriceBar>, DataError> {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), start, end));
            if self.failing.iter().any(|s| s == symbol) {
                return Err(DataError::SourceUnavailable(format!("{symbol} down")));
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            Ok(self.bars.get(symbol).cloned().unwrap_or_default())
        }
    }

    fn year_2020() -> PeriodSpec {
        PeriodSpec::completed("2020", date(2020, 1, 1), date(2021, 1, 1))
    }

    #[test]
    fn attaches_symbol_and_cik_to_every_row() {
        let mut provider = MockProvider::default();
        provider.bars.insert("X".into(), bars(250, 10.0));

        let out = assemble(
            &provider,
            &[company("X", 42)],
            &year_2020(),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(out.dataset.len(), 250);
        assert!(out
            .dataset
            .rows()
            .iter()
            .all(|r| r.symbol == "X" && r.cik == 42));
    }

    #[test]
    fn rows_follow_company_order() {
        let mut provider = MockProvider::default();
        provider.bars.insert("B".into(), bars(2, 2.0));
        provider.bars.insert("A".into(), bars(3, 1.0));

        let out = assemble(
            &provider,
            &[company("B", 2), company("A", 1)],
            &year_2020(),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();

        let symbols: Vec<&str> = out.dataset.rows().iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["B", "B", "A", "A", "A"]);
    }

    #[test]
    fn company_without_bars_contributes_nothing() {
        let mut provider = MockProvider::default();
        provider.bars.insert("A".into(), bars(5, 1.0));

        let out = assemble(
            &provider,
            &[company("A", 1), company("EMPTY", 2)],
            &year_2020(),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(out.dataset.len(), 5);
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let mut provider = MockProvider::default();
        provider.bars.insert("A".into(), bars(5, 1.0));
        provider.failing.push("BAD".into());

        let err = assemble(
            &provider,
            &[company("BAD", 1), company("A", 2)],
            &year_2020(),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap_err();

        assert!(matches!(err, DataError::SourceUnavailable(_)));
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn skip_policy_records_failures() {
        let mut provider = MockProvider::default();
        provider.bars.insert("A".into(), bars(5, 1.0));
        provider.failing.push("BAD".into());

        let opts = AssemblyOptions {
            on_fetch_error: FetchFailurePolicy::Skip,
            ..AssemblyOptions::default()
        };
        let out = assemble(
            &provider,
            &[company("BAD", 1), company("A", 2)],
            &year_2020(),
            &opts,
            &NoProgress,
        )
        .unwrap();

        assert_eq!(out.dataset.len(), 5);
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].symbol, "BAD");
    }

    #[test]
    fn current_period_is_end_inclusive_and_filled() {
        let mut provider = MockProvider::default();
        let mut series = bars(3, 10.0);
        series[1].close = f64::NAN;
        provider.bars.insert("A".into(), series.clone());
        provider.bars.insert("B".into(), series);

        let today = date(2020, 1, 3);
        let current = PeriodSpec::in_progress("2020", date(2020, 1, 1), today);
        let out = assemble(
            &provider,
            &[company("A", 1)],
            &current,
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();

        assert_eq!(out.dataset.rows()[1].close, 10.0);
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls[0].2, date(2020, 1, 4));

        drop(calls);
        let past = assemble(
            &provider,
            &[company("B", 2)],
            &year_2020(),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();
        assert!(past.dataset.rows()[1].close.is_nan());
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut provider = MockProvider::default();
        let companies: Vec<CompanyRecord> = (0..20)
            .map(|i| company(&format!("S{i}"), i))
            .collect();
        for (i, c) in companies.iter().enumerate() {
            provider.bars.insert(c.symbol.clone(), bars(i % 4, i as f64));
        }

        let seq = assemble(
            &provider,
            &companies,
            &year_2020(),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();
        let par = assemble(
            &provider,
            &companies,
            &year_2020(),
            &AssemblyOptions {
                parallel: true,
                ..AssemblyOptions::default()
            },
            &NoProgress,
        )
        .unwrap();

        assert_eq!(seq.dataset, par.dataset);
    }

    #[test]
    fn parallel_abort_leaves_remaining_companies_unfetched() {
        let mut provider = MockProvider {
            delay: Some(std::time::Duration::from_millis(5)),
            ..MockProvider::default()
        };
        provider.failing.push("BAD".into());
        let companies: Vec<CompanyRecord> = std::iter::once(company("BAD", 0))
            .chain((1..64).map(|i| company(&format!("S{i}"), i)))
            .collect();
        for c in &companies[1..] {
            provider.bars.insert(c.symbol.clone(), bars(2, 1.0));
        }

        let opts = AssemblyOptions {
            parallel: true,
            ..AssemblyOptions::default()
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let err = pool
            .install(|| assemble(&provider, &companies, &year_2020(), &opts, &NoProgress))
            .unwrap_err();

        assert!(matches!(err, DataError::SourceUnavailable(_)));
        assert!(provider.calls.lock().unwrap().len() < companies.len());
    }
}
