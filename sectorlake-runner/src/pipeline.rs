//! End-to-end run: roster, then assemble and write each period in turn.

use crate::config::{ConfigError, EtlConfig};
use crate::export::text::{read_csv_dataset, read_csv_rows};
use crate::export::{ExportError, Format, MultiFormatWriter, WriteFailurePolicy, WriteReport};
use crate::manifest::{ManifestHeader, PeriodManifest};
use chrono::NaiveDate;
use sectorlake_core::data::{
    assemble, AssemblyOptions, AssemblyProgress, CompanyDirectory, DataError, DataProvider,
};
use sectorlake_core::{PeriodDataset, PeriodSpec};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no companies found for sector '{sector}'")]
    NoCompanies { sector: String },
}

/// Everything a run needs, with periods already resolved.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub sector: String,
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub formats: Vec<Format>,
    pub periods: Vec<PeriodSpec>,
    pub assembly: AssemblyOptions,
    pub on_write_error: WriteFailurePolicy,
    pub write_manifest: bool,
}

impl PipelineOptions {
    pub fn from_config(cfg: &EtlConfig, today: NaiveDate) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            sector: cfg.sector.clone(),
            output_dir: cfg.output_dir.clone(),
            file_prefix: cfg.file_prefix.clone(),
            formats: cfg.formats.clone(),
            periods: cfg.resolve_periods(today)?,
            assembly: cfg.assembly_options(),
            on_write_error: cfg.policy.on_write_error,
            write_manifest: cfg.write_manifest,
        })
    }
}

#[derive(Debug)]
pub struct PeriodSummary {
    pub label: String,
    pub base_name: String,
    pub rows: usize,
    pub companies: usize,
    pub skipped: Vec<String>,
    pub report: WriteReport,
    pub manifest: Option<PathBuf>,
    pub manifest_error: Option<ExportError>,
}

impl PeriodSummary {
    pub fn all_succeeded(&self) -> bool {
        self.report.all_succeeded() && self.manifest_error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    /// Companies matching the sector filter.
    pub companies: usize,
    pub periods: Vec<PeriodSummary>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.periods.iter().all(PeriodSummary::all_succeeded)
    }

    pub fn total_rows(&self) -> usize {
        self.periods.iter().map(|p| p.rows).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.periods
            .iter()
            .map(|p| p.report.failures().count() + usize::from(p.manifest_error.is_some()))
            .sum()
    }
}

/// Run every configured period.
///
/// Extraction errors end the run. Write failures end it only under
/// `WriteFailurePolicy::Abort`; otherwise they are reported in the summary.
pub fn run_pipeline(
    directory: &dyn CompanyDirectory,
    provider: &dyn DataProvider,
    opts: &PipelineOptions,
    progress: &dyn AssemblyProgress,
) -> Result<RunSummary, PipelineError> {
    let companies = directory.list_companies(&opts.sector)?;
    if companies.is_empty() {
        return Err(PipelineError::NoCompanies {
            sector: opts.sector.clone(),
        });
    }
    tracing::info!(sector = %opts.sector, companies = companies.len(), "roster loaded");

    let writer = MultiFormatWriter::new(&opts.output_dir, opts.on_write_error);
    let mut summary = RunSummary {
        companies: companies.len(),
        periods: Vec::with_capacity(opts.periods.len()),
    };

    for period in &opts.periods {
        let base_name = period.base_name(&opts.file_prefix);
        tracing::info!(period = %period.label, start = %period.start, end = %period.end, current = period.is_current, "assembling");

        let assembled = assemble(provider, &companies, period, &opts.assembly, progress)?;
        let dataset = assembled.dataset;
        let skipped: Vec<String> = assembled.skipped.into_iter().map(|s| s.symbol).collect();

        let report = writer.write(&dataset, &base_name, &opts.formats)?;

        let (manifest, manifest_error) = if opts.write_manifest {
            let header = ManifestHeader {
                label: period.label.clone(),
                start: period.start,
                end: period.end,
                is_current: period.is_current,
                rows: dataset.len(),
                companies: dataset.company_count(),
                skipped: skipped.clone(),
            };
            match PeriodManifest::from_report(header, &report)
                .and_then(|m| m.write(writer.output_dir()))
            {
                Ok(path) => (Some(path), None),
                Err(e) if opts.on_write_error == WriteFailurePolicy::Abort => return Err(e.into()),
                Err(e) => {
                    tracing::error!(error = %e, "manifest write failed");
                    (None, Some(e))
                }
            }
        } else {
            (None, None)
        };

        summary.periods.push(PeriodSummary {
            label: period.label.clone(),
            base_name,
            rows: dataset.len(),
            companies: dataset.company_count(),
            skipped,
            report,
            manifest,
            manifest_error,
        });
    }

    Ok(summary)
}

/// Rewrite the outputs of `base_name` from its CSV, without fetching.
///
/// The period label and bounds come from `{base_name}.manifest.json` when it
/// exists, which also lets a header-only CSV (an empty period) be re-exported.
/// Without a manifest they are taken from the rows. When the CSV itself is
/// among `formats` it is rewritten in place after being read.
pub fn reexport(
    output_dir: &Path,
    base_name: &str,
    formats: &[Format],
    policy: WriteFailurePolicy,
) -> Result<WriteReport, PipelineError> {
    let writer = MultiFormatWriter::new(output_dir, policy);
    let csv_path = writer.path_for(base_name, Format::Csv);
    let manifest_path = PeriodManifest::path_in(output_dir, base_name);

    let dataset = if manifest_path.is_file() {
        let manifest = PeriodManifest::load(&manifest_path)?;
        let period = PeriodSpec {
            label: manifest.label,
            start: manifest.start,
            end: manifest.end,
            is_current: manifest.is_current,
        };
        PeriodDataset::new(&period, read_csv_rows(&csv_path)?)
    } else {
        read_csv_dataset(&csv_path, base_name)?
    };
    tracing::info!(base = base_name, rows = dataset.len(), "reloaded from csv");
    Ok(writer.write(&dataset, base_name, formats)?)
}
