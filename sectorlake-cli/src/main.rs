//! SectorLake CLI: sector price extraction and multi-format export.
//!
//! Commands:
//! - `run`: list the sector's companies, assemble every period, write outputs
//! - `companies`: print the filtered roster
//! - `convert`: rebuild `{base}.orc` from `{base}.avro`
//! - `reexport`: rewrite outputs from `{base}.csv` without network access

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sectorlake_core::data::{
    CircuitBreaker, CompanyDirectory, FetchFailurePolicy, HttpClient, LogProgress, WebDirectory,
    YahooProvider,
};
use sectorlake_runner::{
    reexport, run_pipeline, EtlConfig, Format, MultiFormatWriter, PeriodConfig, PipelineOptions,
    RunSummary, WriteFailurePolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sectorlake",
    version,
    about = "SectorLake: daily prices for one index sector, exported per period"
)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path to a TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// GICS sector to extract, matched exactly.
    #[arg(long)]
    sector: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, assemble and write every configured period.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Calendar year to extract (repeatable).
        #[arg(long = "year")]
        years: Vec<i32>,

        /// Date range START:END or LABEL=START:END, END exclusive (repeatable).
        #[arg(long = "period")]
        periods: Vec<String>,

        /// Output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output format: csv, json, parquet, xlsx, avro, orc (repeatable).
        #[arg(long = "format")]
        formats: Vec<Format>,

        /// Leave out companies whose fetch fails instead of aborting.
        #[arg(long, default_value_t = false)]
        skip_failed_companies: bool,

        /// Stop at the first failed format write.
        #[arg(long, default_value_t = false)]
        abort_on_write_error: bool,

        /// Fetch companies in parallel.
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Print the companies in the sector (symbol and CIK).
    Companies {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Rebuild `{base}.orc` from an existing `{base}.avro`.
    Convert {
        /// Base name, e.g. data_2020.
        base_name: String,

        /// Directory holding the Avro file.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Rewrite outputs from an existing `{base}.csv`.
    Reexport {
        /// Base name, e.g. data_2020.
        base_name: String,

        /// Directory holding the CSV file.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Formats to write. Defaults to every format except CSV.
        #[arg(long = "format")]
        formats: Vec<Format>,

        /// Stop at the first failed format write.
        #[arg(long, default_value_t = false)]
        abort_on_write_error: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            source,
            years,
            periods,
            output_dir,
            formats,
            skip_failed_companies,
            abort_on_write_error,
            parallel,
        } => {
            let mut cfg = load_config(&source)?;
            if !years.is_empty() || !periods.is_empty() {
                cfg.periods = years
                    .into_iter()
                    .map(|year| Ok(PeriodConfig::Year { year }))
                    .chain(periods.iter().map(|p| parse_period_arg(p)))
                    .collect::<Result<_>>()?;
            }
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if !formats.is_empty() {
                cfg.formats = formats;
            }
            if skip_failed_companies {
                cfg.policy.on_fetch_error = FetchFailurePolicy::Skip;
            }
            if abort_on_write_error {
                cfg.policy.on_write_error = WriteFailurePolicy::Abort;
            }
            if parallel {
                cfg.fetch.parallel = true;
            }
            run_etl(&cfg)
        }
        Commands::Companies { source } => {
            let cfg = load_config(&source)?;
            let (directory, _) = build_sources(&cfg)?;
            let companies = directory.list_companies(&cfg.sector)?;
            for c in &companies {
                println!("{}\t{}", c.symbol, c.cik);
            }
            eprintln!("{} companies in '{}'", companies.len(), cfg.sector);
            Ok(())
        }
        Commands::Convert {
            base_name,
            output_dir,
        } => {
            let writer = MultiFormatWriter::new(output_dir, WriteFailurePolicy::Abort);
            let path = writer.convert_avro_to_orc(&base_name)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
        Commands::Reexport {
            base_name,
            output_dir,
            formats,
            abort_on_write_error,
        } => {
            let formats = if formats.is_empty() {
                Format::ALL.into_iter().filter(|f| *f != Format::Csv).collect()
            } else {
                formats
            };
            let policy = if abort_on_write_error {
                WriteFailurePolicy::Abort
            } else {
                WriteFailurePolicy::Continue
            };
            let report = reexport(&output_dir, &base_name, &formats, policy)?;
            for (format, path) in report.written() {
                println!("{format:>8}  {}", path.display());
            }
            if !report.all_succeeded() {
                for (format, err) in report.failures() {
                    eprintln!("Error for {format}: {err}");
                }
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(source: &SourceArgs) -> Result<EtlConfig> {
    let mut cfg = match &source.config {
        Some(path) => EtlConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EtlConfig::default(),
    };
    if let Some(sector) = &source.sector {
        cfg.sector = sector.clone();
    }
    Ok(cfg)
}

/// `START:END` or `LABEL=START:END`, dates as YYYY-MM-DD.
fn parse_period_arg(arg: &str) -> Result<PeriodConfig> {
    let (label, range) = match arg.split_once('=') {
        Some((label, range)) => (Some(label.trim().to_string()), range),
        None => (None, arg),
    };
    let Some((start, end)) = range.split_once(':') else {
        bail!("invalid period '{arg}': expected START:END or LABEL=START:END");
    };
    let parse = |s: &str| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}' in period '{arg}'"))
    };
    Ok(PeriodConfig::Range {
        label,
        start: parse(start)?,
        end: Some(parse(end)?),
        current: false,
    })
}

fn build_sources(cfg: &EtlConfig) -> Result<(WebDirectory, YahooProvider)> {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let http = HttpClient::new(cfg.retry_policy(), breaker).context("building HTTP client")?;
    let directory = WebDirectory::new(http.clone(), cfg.directory.url.clone());
    let provider = YahooProvider::new(http, cfg.fetch.auto_adjust);
    Ok((directory, provider))
}

fn run_etl(cfg: &EtlConfig) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let opts = PipelineOptions::from_config(cfg, today)?;
    let (directory, provider) = build_sources(cfg)?;
    tracing::info!(
        sector = %opts.sector,
        periods = opts.periods.len(),
        output_dir = %opts.output_dir.display(),
        "starting run"
    );

    let summary = run_pipeline(&directory, &provider, &opts, &LogProgress)?;
    print_summary(&summary);

    if !summary.all_succeeded() {
        eprintln!("{} output(s) failed", summary.failure_count());
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} companies, {} periods, {} rows",
        summary.companies,
        summary.periods.len(),
        summary.total_rows()
    );
    for period in &summary.periods {
        println!(
            "  {:<24} {:>8} rows  {:>4} companies",
            period.base_name, period.rows, period.companies
        );
        if !period.skipped.is_empty() {
            println!("    skipped: {}", period.skipped.join(", "));
        }
        for (format, err) in period.report.failures() {
            eprintln!("    Error for {format}: {err}");
        }
        if let Some(err) = &period.manifest_error {
            eprintln!("    Error for manifest: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_arg_with_label() {
        let p = parse_period_arg("h1=2020-01-01:2020-07-01").unwrap();
        assert_eq!(
            p,
            PeriodConfig::Range {
                label: Some("h1".into()),
                start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                end: Some(NaiveDate::from_ymd_opt(2020, 7, 1).unwrap()),
                current: false,
            }
        );
    }

    #[test]
    fn period_arg_without_label() {
        match parse_period_arg("2019-03-01:2019-04-01").unwrap() {
            PeriodConfig::Range { label, .. } => assert!(label.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn period_arg_rejects_garbage() {
        assert!(parse_period_arg("2019").is_err());
        assert!(parse_period_arg("2019-13-01:2020-01-01").is_err());
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "sectorlake",
            "run",
            "--year",
            "2020",
            "--format",
            "csv",
            "--format",
            "ORC",
            "--skip-failed-companies",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                years,
                formats,
                skip_failed_companies,
                ..
            } => {
                assert_eq!(years, vec![2020]);
                assert_eq!(formats, vec![Format::Csv, Format::Orc]);
                assert!(skip_failed_companies);
            }
            _ => panic!("expected run"),
        }
    }
}
