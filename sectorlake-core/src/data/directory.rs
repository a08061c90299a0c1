//! Index roster scraped from a sortable HTML table.
//!
//! The page is expected to carry a `wikitable sortable` table whose first row
//! is a header and whose data rows have at least seven cells:
//! `[symbol, _, sector, _, _, _, cik]`.

use super::http::HttpClient;
use super::provider::{CompanyDirectory, DataError};
use crate::domain::CompanyRecord;
use scraper::{ElementRef, Html, Selector};

pub const SP500_URL: &str = "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

pub const INFORMATION_TECHNOLOGY: &str = "Information Technology";

const SYMBOL_COL: usize = 0;
const SECTOR_COL: usize = 2;
const CIK_COL: usize = 6;
const MIN_COLUMNS: usize = CIK_COL + 1;

/// Roster fetched from a web page (the S&P 500 list on Wikipedia by default).
pub struct WebDirectory {
    http: HttpClient,
    url: String,
}

impl WebDirectory {
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CompanyDirectory for WebDirectory {
    fn list_companies(&self, sector: &str) -> Result<Vec<CompanyRecord>, DataError> {
        let html = self.http.get_text(&self.url).map_err(|e| match e {
            DataError::NotFound(url) => DataError::SourceUnavailable(format!("{url} not found")),
            other => other,
        })?;
        let companies = parse_directory(&html, sector)?;
        tracing::info!(
            url = %self.url,
            sector,
            companies = companies.len(),
            "roster loaded"
        );
        Ok(companies)
    }
}

fn selector(css: &str) -> Result<Selector, DataError> {
    Selector::parse(css).map_err(|e| DataError::Parse(format!("invalid selector '{css}': {e:?}")))
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse the roster table out of `html` and keep rows whose sector equals
/// `sector` exactly.
pub fn parse_directory(html: &str, sector: &str) -> Result<Vec<CompanyRecord>, DataError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table.wikitable.sortable")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| DataError::Parse("no sortable table found".into()))?;

    let mut rows = table.select(&row_sel);
    if rows.next().is_none() {
        return Err(DataError::Parse("sortable table has no header row".into()));
    }

    let mut companies = Vec::new();
    for (i, row) in rows.enumerate() {
        let cells: Vec<String> = row.select(&cell_sel).map(|c| cell_text(&c)).collect();
        if cells.len() < MIN_COLUMNS {
            return Err(DataError::Parse(format!(
                "row {} has {} columns, expected at least {MIN_COLUMNS}",
                i + 1,
                cells.len()
            )));
        }

        if cells[SECTOR_COL] != sector {
            continue;
        }

        let symbol = cells[SYMBOL_COL].clone();
        let raw_cik = &cells[CIK_COL];
        let cik = raw_cik.parse::<i32>().map_err(|e| {
            DataError::Parse(format!("CIK '{raw_cik}' for {symbol} is not an integer: {e}"))
        })?;

        companies.push(CompanyRecord {
            symbol,
            sector: cells[SECTOR_COL].clone(),
            cik,
        });
    }

    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table class="wikitable sortable" id="constituents">
              <tbody>
                <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th><th>Sub-Industry</th>
                    <th>HQ</th><th>Added</th><th>CIK</th><th>Founded</th></tr>
                {rows}
              </tbody>
            </table>
            <table class="wikitable sortable"><tr><th>Changes</th></tr></table>
            </body></html>"#
        )
    }

    fn row(symbol: &str, sector: &str, cik: &str) -> String {
        format!(
            "<tr><td><a href=\"#\">{symbol}</a></td><td>Name</td><td>{sector}</td>\
             <td>Sub</td><td>City</td><td>2000-01-01</td><td>{cik}</td><td>1976</td></tr>"
        )
    }

    #[test]
    fn filters_by_exact_sector_in_source_order() {
        let html = page(&[
            row("AAPL", "Information Technology", "0000320193"),
            row("JNJ", "Health Care", "0000200406"),
            row("MSFT", "Information Technology", "0000789019"),
        ]
        .concat());

        let companies = parse_directory(&html, INFORMATION_TECHNOLOGY).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].symbol, "AAPL");
        assert_eq!(companies[0].cik, 320193);
        assert_eq!(companies[1].symbol, "MSFT");
        assert_eq!(companies[1].cik, 789019);
        assert!(companies.iter().all(|c| c.sector == INFORMATION_TECHNOLOGY));
    }

    #[test]
    fn sector_match_is_exact() {
        let html = page(&row("AAPL", "Information Technology", "1"));
        assert!(parse_directory(&html, "information technology")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn cell_text_is_trimmed() {
        let html = page(
            "<tr><td>\n ACN \n</td><td>x</td><td> Information Technology </td>\
             <td></td><td></td><td></td><td> 1467373 </td></tr>",
        );
        let companies = parse_directory(&html, INFORMATION_TECHNOLOGY).unwrap();
        assert_eq!(companies[0].symbol, "ACN");
        assert_eq!(companies[0].cik, 1467373);
    }

    #[test]
    fn short_row_is_a_parse_error() {
        let html = page("<tr><td>AAPL</td><td>Apple</td><td>Information Technology</td></tr>");
        let err = parse_directory(&html, INFORMATION_TECHNOLOGY).unwrap_err();
        assert!(matches!(err, DataError::Parse(msg) if msg.contains("3 columns")));
    }

    #[test]
    fn short_row_fails_even_outside_the_sector() {
        let html = page(&format!(
            "{}<tr><td>JNJ</td><td>x</td><td>Health Care</td></tr>",
            row("AAPL", "Information Technology", "1")
        ));
        assert!(parse_directory(&html, INFORMATION_TECHNOLOGY).is_err());
    }

    #[test]
    fn missing_table_is_a_parse_error() {
        let err = parse_directory("<html><table><tr><td>x</td></tr></table></html>", "x")
            .unwrap_err();
        assert!(matches!(err, DataError::Parse(_)));
    }

    #[test]
    fn empty_table_is_a_parse_error() {
        let html = r#"<table class="wikitable sortable"></table>"#;
        assert!(matches!(
            parse_directory(html, "x").unwrap_err(),
            DataError::Parse(_)
        ));
    }

    #[test]
    fn non_integer_cik_is_a_parse_error() {
        let html = page(&row("AAPL", "Information Technology", "n/a"));
        let err = parse_directory(&html, INFORMATION_TECHNOLOGY).unwrap_err();
        assert!(matches!(err, DataError::Parse(msg) if msg.contains("AAPL")));
    }
}
