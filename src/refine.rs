use std::path::PathBuf;

use camino::Utf8PathBuf;

use crate::domain::SequenceExt;
use crate::error::RefineryError;
use crate::exec::{find_in_path, run_tool};

/// One blocking invocation of the refinement tool: consume the staged
/// contaminated bins, emit a refined bin directory.
#[derive(Debug, Clone)]
pub struct RefineRequest {
    pub assembly: Utf8PathBuf,
    pub coverage_values: Utf8PathBuf,
    pub kmer_frequencies: Utf8PathBuf,
    pub bin_dir: Utf8PathBuf,
    pub extension: SequenceExt,
    pub checkm_report: Utf8PathBuf,
    pub max_contamination: f64,
    pub min_bin_size: u64,
    pub threads: u32,
    pub output_dir: Utf8PathBuf,
}

/// Boundary to the external refinement tool. The controller only needs the
/// blocking call; test doubles simulate refinement without spawning anything.
pub trait RefineClient {
    fn refine(&self, request: &RefineRequest) -> Result<(), RefineryError>;
}

impl<T: RefineClient + ?Sized> RefineClient for &T {
    fn refine(&self, request: &RefineRequest) -> Result<(), RefineryError> {
        (**self).refine(request)
    }
}

#[derive(Debug, Clone)]
pub struct SystemRefineClient {
    rosella: Option<PathBuf>,
}

impl SystemRefineClient {
    pub fn new() -> Self {
        Self {
            rosella: find_in_path("rosella"),
        }
    }
}

impl Default for SystemRefineClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RefineClient for SystemRefineClient {
    fn refine(&self, request: &RefineRequest) -> Result<(), RefineryError> {
        let rosella = self
            .rosella
            .as_ref()
            .ok_or_else(|| RefineryError::MissingTool("rosella".to_string()))?;
        let args = vec![
            "refine".to_string(),
            "-a".to_string(),
            request.assembly.to_string(),
            "--coverage-values".to_string(),
            request.coverage_values.to_string(),
            "--kmer-frequencies".to_string(),
            request.kmer_frequencies.to_string(),
            "-d".to_string(),
            request.bin_dir.to_string(),
            "-x".to_string(),
            request.extension.to_string(),
            "--checkm-file".to_string(),
            request.checkm_report.to_string(),
            "--max-contamination".to_string(),
            request.max_contamination.to_string(),
            "--min-bin-size".to_string(),
            request.min_bin_size.to_string(),
            "-t".to_string(),
            request.threads.to_string(),
            "-o".to_string(),
            request.output_dir.to_string(),
        ];
        run_tool(rosella, &args).map_err(RefineryError::RefineTool)
    }
}
