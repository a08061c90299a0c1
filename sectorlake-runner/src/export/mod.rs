//! Multi-format export of period datasets.
//!
//! Layout: `{output_dir}/{base_name}.{csv,json,parquet,xlsx,avro,orc}`
//!
//! - Every file is written to `{path}.tmp` and renamed into place
//! - Formats run in a fixed order so Avro always precedes ORC
//! - ORC is derived from the Avro file, never from the dataset directly
//! - Failures are isolated per format unless the policy says abort

pub mod avro;
pub mod orc;
pub mod parquet;
pub mod text;
pub mod xlsx;

use sectorlake_core::PeriodDataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Output formats, in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Csv,
    Json,
    Parquet,
    Xlsx,
    Avro,
    Orc,
}

impl Format {
    pub const ALL: [Format; 6] = [
        Format::Csv,
        Format::Json,
        Format::Parquet,
        Format::Xlsx,
        Format::Avro,
        Format::Orc,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
            Format::Parquet => "parquet",
            Format::Xlsx => "xlsx",
            Format::Avro => "avro",
            Format::Orc => "orc",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| {
                format!("unknown format '{s}'. Valid: csv, json, parquet, xlsx, avro, orc")
            })
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("missing intermediate file {}: the Avro output for this base name must be written first", path.display())]
    MissingIntermediateFile { path: PathBuf },

    #[error("{format} write to {} failed: {reason}", path.display())]
    WriteFailure {
        format: Format,
        path: PathBuf,
        reason: String,
    },

    #[error("cannot prepare output directory {}: {reason}", path.display())]
    OutputDir { path: PathBuf, reason: String },

    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },
}

/// What to do when one format fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Record the failure and keep writing the remaining formats.
    #[default]
    Continue,
    /// Stop at the first failing format.
    Abort,
}

/// `{path}.tmp`, next to the final file.
fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Run `write` against a temp path, then rename it over `path`.
///
/// The temp file is removed on any failure, so `path` either holds a complete
/// file or is left as it was.
pub(crate) fn write_atomic<F>(format: Format, path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&Path) -> Result<(), String>,
{
    let tmp = tmp_path(path);
    let result = write(&tmp).and_then(|()| {
        fs::rename(&tmp, path).map_err(|e| format!("atomic rename failed: {e}"))
    });
    result.map_err(|reason| {
        let _ = fs::remove_file(&tmp);
        ExportError::WriteFailure {
            format,
            path: path.to_path_buf(),
            reason,
        }
    })
}

/// Result of writing one format.
#[derive(Debug)]
pub struct FormatOutcome {
    pub format: Format,
    pub result: Result<PathBuf, ExportError>,
}

/// Per-format results of one `MultiFormatWriter::write` call.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub base_name: String,
    pub outcomes: Vec<FormatOutcome>,
}

impl WriteReport {
    pub fn written(&self) -> impl Iterator<Item = (Format, &Path)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|p| (o.format, p.as_path())))
    }

    pub fn failures(&self) -> impl Iterator<Item = (Format, &ExportError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.format, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Writes period datasets into one output directory.
#[derive(Debug, Clone)]
pub struct MultiFormatWriter {
    output_dir: PathBuf,
    policy: WriteFailurePolicy,
}

impl MultiFormatWriter {
    pub fn new(output_dir: impl Into<PathBuf>, policy: WriteFailurePolicy) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `{output_dir}/{base_name}.{ext}`
    pub fn path_for(&self, base_name: &str, format: Format) -> PathBuf {
        self.output_dir
            .join(format!("{base_name}.{}", format.extension()))
    }

    fn ensure_output_dir(&self) -> Result<(), ExportError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| ExportError::OutputDir {
            path: self.output_dir.clone(),
            reason: e.to_string(),
        })
    }

    /// Write `dataset` in each of `formats`.
    ///
    /// Duplicates are ignored and formats run in `Format` order. Under
    /// `WriteFailurePolicy::Abort` the first failure is returned as the error;
    /// otherwise failures are recorded in the report.
    pub fn write(
        &self,
        dataset: &PeriodDataset,
        base_name: &str,
        formats: &[Format],
    ) -> Result<WriteReport, ExportError> {
        self.ensure_output_dir()?;

        let formats: BTreeSet<Format> = formats.iter().copied().collect();
        let mut report = WriteReport {
            base_name: base_name.to_string(),
            outcomes: Vec::with_capacity(formats.len()),
        };
        let mut avro_failed = false;

        for format in formats {
            let path = self.path_for(base_name, format);
            let result = match format {
                Format::Csv => text::write_csv(dataset, &path),
                Format::Json => text::write_json(dataset, &path),
                Format::Parquet => parquet::write_parquet(dataset, &path),
                Format::Xlsx => xlsx::write_xlsx(dataset, &path),
                Format::Avro => {
                    let result = avro::write_avro(dataset, base_name, &path);
                    avro_failed = result.is_err();
                    result
                }
                Format::Orc if avro_failed => Err(ExportError::MissingIntermediateFile {
                    path: self.path_for(base_name, Format::Avro),
                }),
                Format::Orc => {
                    orc::convert_avro_to_orc(&self.path_for(base_name, Format::Avro), &path)
                }
            };

            match result {
                Ok(()) => {
                    tracing::info!(format = %format, path = %path.display(), rows = dataset.len(), "written");
                    report.outcomes.push(FormatOutcome {
                        format,
                        result: Ok(path),
                    });
                }
                Err(e) => {
                    tracing::error!(format = %format, error = %e, "write failed");
                    if self.policy == WriteFailurePolicy::Abort {
                        return Err(e);
                    }
                    report.outcomes.push(FormatOutcome {
                        format,
                        result: Err(e),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Regenerate `{base_name}.orc` from an existing `{base_name}.avro`.
    pub fn convert_avro_to_orc(&self, base_name: &str) -> Result<PathBuf, ExportError> {
        self.ensure_output_dir()?;
        let orc_path = self.path_for(base_name, Format::Orc);
        orc::convert_avro_to_orc(&self.path_for(base_name, Format::Avro), &orc_path)?;
        Ok(orc_path)
    }
}
