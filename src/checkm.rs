use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::info;

use crate::domain::SequenceExt;
use crate::error::RefineryError;
use crate::exec::{find_in_path, run_tool};
use crate::report::QualityReport;

/// Result of one assessment pass. `NoBins` is not a failure: refinement can
/// legitimately merge or eliminate every input bin, and the loop terminates
/// gracefully on it.
#[derive(Debug, Clone)]
pub enum Assessment {
    Report(QualityReport),
    NoBins,
}

#[derive(Debug, Clone)]
pub struct AssessRequest {
    pub bin_dir: Utf8PathBuf,
    pub threads: u32,
    pub pplacer_threads: u32,
}

/// Boundary to the external quality-assessment tool.
pub trait QualityClient {
    fn assess(&self, request: &AssessRequest) -> Result<Assessment, RefineryError>;
}

impl<T: QualityClient + ?Sized> QualityClient for &T {
    fn assess(&self, request: &AssessRequest) -> Result<Assessment, RefineryError> {
        (**self).assess(request)
    }
}

#[derive(Debug, Clone)]
pub struct SystemCheckmClient {
    checkm: Option<PathBuf>,
}

impl SystemCheckmClient {
    pub fn new() -> Self {
        Self {
            checkm: find_in_path("checkm"),
        }
    }
}

impl Default for SystemCheckmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityClient for SystemCheckmClient {
    fn assess(&self, request: &AssessRequest) -> Result<Assessment, RefineryError> {
        if !has_bins(&request.bin_dir)? {
            info!(dir = %request.bin_dir, "no bins to assess");
            return Ok(Assessment::NoBins);
        }

        let checkm = self
            .checkm
            .as_ref()
            .ok_or_else(|| RefineryError::MissingTool("checkm".to_string()))?;
        let report_path = request.bin_dir.join("checkm.out");
        let args = vec![
            "lineage_wf".to_string(),
            "-t".to_string(),
            request.threads.to_string(),
            "--pplacer_threads".to_string(),
            request.pplacer_threads.to_string(),
            "-x".to_string(),
            SequenceExt::fna().to_string(),
            "--tab_table".to_string(),
            "-f".to_string(),
            report_path.to_string(),
            request.bin_dir.to_string(),
            request.bin_dir.join("checkm").to_string(),
        ];
        run_tool(checkm, &args).map_err(RefineryError::QualityTool)?;

        // The tool writes nothing when it finds nothing to place.
        if !report_path.as_std_path().exists() {
            info!(dir = %request.bin_dir, "quality tool produced no report");
            return Ok(Assessment::NoBins);
        }
        Ok(Assessment::Report(QualityReport::load(&report_path)?))
    }
}

fn has_bins(dir: &Utf8Path) -> Result<bool, RefineryError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| RefineryError::Filesystem(format!("read {dir}: {err}")))?;
    for entry in entries {
        let entry = entry.map_err(|err| RefineryError::Filesystem(err.to_string()))?;
        let path = entry.path();
        let is_bin = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("fna"))
            .unwrap_or(false);
        if path.is_file() && is_bin {
            return Ok(true);
        }
    }
    Ok(false)
}
