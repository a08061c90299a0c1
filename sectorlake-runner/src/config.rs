//! TOML run configuration.
//!
//! Every section is optional; a missing file section falls back to its
//! defaults. Dates are quoted ISO strings (`start = "2020-01-01"`).

use crate::export::{Format, WriteFailurePolicy};
use chrono::{Datelike, NaiveDate};
use sectorlake_core::data::{
    AssemblyOptions, FetchFailurePolicy, RetryPolicy, INFORMATION_TECHNOLOGY, SP500_URL,
};
use sectorlake_core::data::http::DEFAULT_USER_AGENT;
use sectorlake_core::PeriodSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// First year of the default period list.
pub const DEFAULT_FIRST_YEAR: i32 = 2018;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("invalid config: {0}")]
    Parse(String),

    #[error("period '{label}': end {end} is not after start {start}")]
    EmptyRange {
        label: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("period '{0}' lies in the future")]
    FuturePeriod(String),

    #[error("no output formats selected")]
    NoFormats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub sector: String,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub formats: Vec<Format>,
    pub write_manifest: bool,
    pub directory: DirectoryConfig,
    pub fetch: FetchConfig,
    pub policy: PolicyConfig,
    pub periods: Vec<PeriodConfig>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            sector: INFORMATION_TECHNOLOGY.to_string(),
            output_dir: PathBuf::from("."),
            file_prefix: "data".to_string(),
            formats: Format::ALL.to_vec(),
            write_manifest: true,
            directory: DirectoryConfig::default(),
            fetch: FetchConfig::default(),
            policy: PolicyConfig::default(),
            periods: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub url: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: SP500_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    /// Replace close with adjusted close and scale open/high/low to match.
    pub auto_adjust: bool,
    pub parallel: bool,
    /// Bound on consecutive forward-filled values; unbounded when absent.
    pub fill_limit: Option<usize>,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            auto_adjust: true,
            parallel: false,
            fill_limit: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub on_fetch_error: FetchFailurePolicy,
    pub on_write_error: WriteFailurePolicy,
}

/// One `[[periods]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodConfig {
    /// A calendar year.
    Year { year: i32 },
    /// An explicit range. `end` is exclusive; without `end`, or with
    /// `current = true`, the range runs through today.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        start: NaiveDate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<NaiveDate>,
        #[serde(default)]
        current: bool,
    },
}

impl PeriodConfig {
    pub fn resolve(&self, today: NaiveDate) -> Result<PeriodSpec, ConfigError> {
        match self {
            PeriodConfig::Year { year } => {
                PeriodSpec::year(*year, today).ok_or_else(|| ConfigError::FuturePeriod(year.to_string()))
            }
            PeriodConfig::Range {
                label,
                start,
                end,
                current,
            } => {
                let in_progress = *current || end.is_none();
                let effective_end = if in_progress {
                    today
                } else {
                    end.unwrap_or(today)
                };
                let label = label.clone().unwrap_or_else(|| {
                    if in_progress {
                        format!("{start}_current")
                    } else {
                        format!("{start}_{effective_end}")
                    }
                });

                if *start > today {
                    return Err(ConfigError::FuturePeriod(label));
                }
                if in_progress {
                    return Ok(PeriodSpec::in_progress(label, *start, today));
                }
                if effective_end <= *start {
                    return Err(ConfigError::EmptyRange {
                        label,
                        start: *start,
                        end: effective_end,
                    });
                }
                Ok(PeriodSpec::completed(label, *start, effective_end))
            }
        }
    }
}

impl EtlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The configured periods, or every year from 2018 through `today`'s
    /// year when none are configured.
    pub fn resolve_periods(&self, today: NaiveDate) -> Result<Vec<PeriodSpec>, ConfigError> {
        if self.periods.is_empty() {
            return Ok((DEFAULT_FIRST_YEAR..=today.year())
                .filter_map(|y| PeriodSpec::year(y, today))
                .collect());
        }
        self.periods.iter().map(|p| p.resolve(today)).collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            max_retries: self.fetch.max_retries,
            base_delay: Duration::from_millis(self.fetch.base_delay_ms),
            user_agent: self.fetch.user_agent.clone(),
        }
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        AssemblyOptions {
            on_fetch_error: self.policy.on_fetch_error,
            fill_limit: self.fetch.fill_limit,
            parallel: self.fetch.parallel,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = EtlConfig::from_toml("").unwrap();
        assert_eq!(cfg, EtlConfig::default());
        assert_eq!(cfg.sector, "Information Technology");
        assert_eq!(cfg.formats.len(), 6);
        assert_eq!(cfg.policy.on_fetch_error, FetchFailurePolicy::Abort);
        assert_eq!(cfg.policy.on_write_error, WriteFailurePolicy::Continue);
    }

    #[test]
    fn default_periods_run_through_current_year() {
        let periods = EtlConfig::default()
            .resolve_periods(date(2021, 3, 15))
            .unwrap();
        let labels: Vec<&str> = periods.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, ["2018", "2019", "2020", "2021"]);
        assert!(!periods[2].is_current);
        assert_eq!(periods[2].end, date(2021, 1, 1));
        assert!(periods[3].is_current);
        assert_eq!(periods[3].end, date(2021, 3, 15));
    }

    #[test]
    fn full_file_parses() {
        let cfg = EtlConfig::from_toml(
            r#"
sector = "Health Care"
output_dir = "out"
file_prefix = "hc"
formats = ["csv", "avro", "orc"]

[fetch]
parallel = true
fill_limit = 2

[policy]
on_fetch_error = "skip"
on_write_error = "abort"

[[periods]]
year = 2019

[[periods]]
label = "h1"
start = "2020-01-01"
end = "2020-07-01"

[[periods]]
start = "2021-01-01"
current = true
"#,
        )
        .unwrap();

        assert_eq!(cfg.sector, "Health Care");
        assert_eq!(cfg.formats, vec![Format::Csv, Format::Avro, Format::Orc]);
        assert_eq!(cfg.fetch.max_retries, 3);
        let opts = cfg.assembly_options();
        assert_eq!(opts.on_fetch_error, FetchFailurePolicy::Skip);
        assert_eq!(opts.fill_limit, Some(2));
        assert!(opts.parallel);

        let periods = cfg.resolve_periods(date(2021, 6, 30)).unwrap();
        assert_eq!(periods[0].label, "2019");
        assert_eq!(periods[1].base_name(&cfg.file_prefix), "hc_h1");
        assert_eq!(periods[1].end, date(2020, 7, 1));
        assert!(periods[2].is_current);
        assert_eq!(periods[2].label, "2021-01-01_current");
    }

    #[test]
    fn unlabelled_current_range_keeps_its_name_across_days() {
        let cfg = EtlConfig {
            periods: vec![PeriodConfig::Range {
                label: None,
                start: date(2024, 1, 1),
                end: None,
                current: true,
            }],
            ..EtlConfig::default()
        };
        let monday = cfg.resolve_periods(date(2024, 3, 4)).unwrap();
        let tuesday = cfg.resolve_periods(date(2024, 3, 5)).unwrap();
        assert_eq!(monday[0].base_name("data"), tuesday[0].base_name("data"));
        assert_eq!(monday[0].label, "2024-01-01_current");
        assert_ne!(monday[0].end, tuesday[0].end);
    }

    #[test]
    fn unlabelled_range_uses_bounds() {
        let p = PeriodConfig::Range {
            label: None,
            start: date(2020, 1, 1),
            end: Some(date(2020, 4, 1)),
            current: false,
        };
        assert_eq!(p.resolve(date(2022, 1, 1)).unwrap().label, "2020-01-01_2020-04-01");
    }

    #[test]
    fn backwards_range_is_rejected() {
        let p = PeriodConfig::Range {
            label: Some("bad".into()),
            start: date(2020, 5, 1),
            end: Some(date(2020, 5, 1)),
            current: false,
        };
        assert!(matches!(
            p.resolve(date(2022, 1, 1)),
            Err(ConfigError::EmptyRange { .. })
        ));
    }

    #[test]
    fn future_year_is_rejected() {
        let p = PeriodConfig::Year { year: 2030 };
        assert!(matches!(
            p.resolve(date(2022, 1, 1)),
            Err(ConfigError::FuturePeriod(_))
        ));
    }

    #[test]
    fn unknown_format_is_a_parse_error() {
        assert!(matches!(
            EtlConfig::from_toml(r#"formats = ["xls"]"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn retry_policy_follows_fetch_section() {
        let cfg = EtlConfig::from_toml("[fetch]\ntimeout_secs = 5\nbase_delay_ms = 100").unwrap();
        let policy = cfg.retry_policy();
        assert_eq!(policy.timeout, Duration::from_secs(5));
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }
}
