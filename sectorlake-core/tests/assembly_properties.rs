//! Assembly properties against an in-memory provider.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use sectorlake_core::data::{
    assemble, parse_directory, AssemblyOptions, CompanyDirectory, DataError, DataProvider,
    NoProgress, INFORMATION_TECHNOLOGY,
};
use sectorlake_core::{CompanyRecord, PeriodSpec, PriceBar};
use std::collections::HashMap;

struct FixedProvider {
    counts: HashMap<String, usize>,
}

impl DataProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let n = self.counts.get(symbol).copied().unwrap_or(0);
        Ok((0..n)
            .map(|i| PriceBar {
                date: start + Days::new(i as u64),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 1_000.0,
                dividends: 0.0,
                stock_splits: 0.0,
            })
            .collect())
    }
}

struct HtmlDirectory(String);

impl CompanyDirectory for HtmlDirectory {
    fn list_companies(&self, sector: &str) -> Result<Vec<CompanyRecord>, DataError> {
        parse_directory(&self.0, sector)
    }
}

fn year(y: i32) -> PeriodSpec {
    PeriodSpec::completed(
        y.to_string(),
        NaiveDate::from_ymd_opt(y, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(y + 1, 1, 1).unwrap(),
    )
}

#[test]
fn roster_to_dataset_scenario() {
    let html = r#"<table class="wikitable sortable">
        <tr><th>Symbol</th><th>Security</th><th>Sector</th><th>a</th><th>b</th><th>c</th><th>CIK</th></tr>
        <tr><td>X</td><td>X Corp</td><td>Information Technology</td><td></td><td></td><td></td><td>0000000101</td></tr>
        <tr><td>Y</td><td>Y Inc</td><td>Utilities</td><td></td><td></td><td></td><td>0000000102</td></tr>
        <tr><td>Z</td><td>Z Ltd</td><td>Information Technology</td><td></td><td></td><td></td><td>0000000103</td></tr>
    </table>"#;
    let directory = HtmlDirectory(html.to_string());
    let companies = directory.list_companies(INFORMATION_TECHNOLOGY).unwrap();
    assert_eq!(
        companies.iter().map(|c| c.symbol.as_str()).collect::<Vec<_>>(),
        vec!["X", "Z"]
    );

    let provider = FixedProvider {
        counts: HashMap::from([("X".to_string(), 250), ("Z".to_string(), 0)]),
    };
    let out = assemble(
        &provider,
        &companies,
        &year(2020),
        &AssemblyOptions::default(),
        &NoProgress,
    )
    .unwrap();

    assert_eq!(out.dataset.len(), 250);
    assert!(out.dataset.rows().iter().all(|r| r.symbol == "X" && r.cik == 101));
    assert_eq!(out.dataset.company_count(), 1);
}

proptest! {
    #[test]
    fn row_count_is_sum_of_bar_counts(counts in prop::collection::vec(0usize..300, 0..12)) {
        let companies: Vec<CompanyRecord> = counts
            .iter()
            .enumerate()
            .map(|(i, _)| CompanyRecord {
                symbol: format!("S{i}"),
                sector: INFORMATION_TECHNOLOGY.to_string(),
                cik: i as i32 + 1,
            })
            .collect();
        let provider = FixedProvider {
            counts: companies
                .iter()
                .zip(&counts)
                .map(|(c, n)| (c.symbol.clone(), *n))
                .collect(),
        };

        let out = assemble(
            &provider,
            &companies,
            &year(2021),
            &AssemblyOptions::default(),
            &NoProgress,
        )
        .unwrap();

        prop_assert_eq!(out.dataset.len(), counts.iter().sum::<usize>());
        for (company, n) in companies.iter().zip(&counts) {
            let rows = out
                .dataset
                .rows()
                .iter()
                .filter(|r| r.symbol == company.symbol)
                .count();
            prop_assert_eq!(rows, *n);
        }
    }
}
