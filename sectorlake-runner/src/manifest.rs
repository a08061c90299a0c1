//! Per-period manifest sidecar (`{base_name}.manifest.json`).

use crate::export::{write_atomic, ExportError, Format, WriteReport};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub format: Format,
    /// File name relative to the manifest's directory.
    pub file: String,
    pub bytes: u64,
    /// Hex BLAKE3 digest of the file contents.
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodManifest {
    pub label: String,
    pub base_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_current: bool,
    pub rows: usize,
    pub companies: usize,
    pub skipped: Vec<String>,
    pub files: Vec<ManifestFile>,
}

/// Hash a file in fixed-size chunks.
pub fn hash_file(path: &Path) -> std::io::Result<(u64, String)> {
    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    let mut bytes = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        bytes += n as u64;
    }
    Ok((bytes, hasher.finalize().to_hex().to_string()))
}

impl PeriodManifest {
    /// Describe the files listed as written in `report`.
    pub fn from_report(
        summary: ManifestHeader,
        report: &WriteReport,
    ) -> Result<Self, ExportError> {
        let files = report
            .written()
            .map(|(format, path)| {
                let (bytes, blake3) = hash_file(path).map_err(|e| ExportError::Read {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(ManifestFile {
                    format,
                    file,
                    bytes,
                    blake3,
                })
            })
            .collect::<Result<Vec<_>, ExportError>>()?;

        Ok(Self {
            label: summary.label,
            base_name: report.base_name.clone(),
            start: summary.start,
            end: summary.end,
            is_current: summary.is_current,
            rows: summary.rows,
            companies: summary.companies,
            skipped: summary.skipped,
            files,
        })
    }

    pub fn path_in(output_dir: &Path, base_name: &str) -> PathBuf {
        output_dir.join(format!("{base_name}.manifest.json"))
    }

    /// Write the manifest as pretty JSON, atomically.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, ExportError> {
        let path = Self::path_in(output_dir, &self.base_name);
        write_atomic(Format::Json, &path, |tmp| {
            let json =
                serde_json::to_string_pretty(self).map_err(|e| format!("serialize manifest: {e}"))?;
            fs::write(tmp, json).map_err(|e| format!("write manifest: {e}"))
        })?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let read_err = |reason: String| ExportError::Read {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| read_err(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| read_err(e.to_string()))
    }
}

/// Period facts that are not derivable from the write report.
#[derive(Debug, Clone)]
pub struct ManifestHeader {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_current: bool,
    pub rows: usize,
    pub companies: usize,
    pub skipped: Vec<String>,
}
