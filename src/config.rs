use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::SequenceExt;
use crate::error::RefineryError;

/// Every input the refinement loop needs, as named typed fields. Built either
/// from CLI flags or from a JSON run description, then validated once at
/// construction; the controller takes it by reference and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineryConfig {
    /// Directory holding the seed bins. Never cleared by the controller.
    pub bin_dir: Utf8PathBuf,
    /// Extension of the seed bin files, e.g. `fna` or `fa`.
    pub bin_ext: SequenceExt,
    /// Initial quality report for the seed bins.
    pub checkm_report: Utf8PathBuf,
    /// Assembly the bins were derived from.
    pub assembly: Utf8PathBuf,
    /// Per-contig coverage values consumed by the refinement tool.
    pub coverage_values: Utf8PathBuf,
    /// Per-contig kmer frequencies consumed by the refinement tool.
    pub kmer_frequencies: Utf8PathBuf,
    /// Smallest bin the refinement tool may emit, in base pairs.
    pub min_bin_size: u64,
    /// Upper bound on refinement rounds.
    pub max_iterations: u32,
    /// Worker threads handed through to both external tools.
    pub threads: u32,
    /// Thread count for the quality tool's placement stage.
    pub pplacer_threads: u32,
    /// Bins with `Contamination` above this value are re-submitted.
    pub max_contamination: f64,
    /// Root of the run workspace; staging, accumulated and per-iteration
    /// directories live under it.
    pub output_dir: Utf8PathBuf,
    /// Final-refining runs publish a report and a stable symlinked bin
    /// directory; intermediate runs only drop a `done` marker.
    pub final_refining: bool,
    /// Root the published `data/` and `bins/` paths are resolved against in
    /// final-refining mode.
    #[serde(default = "default_publish_root")]
    pub publish_root: Utf8PathBuf,
}

fn default_publish_root() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

impl RefineryConfig {
    pub fn from_file(path: &Utf8PathBuf) -> Result<Self, RefineryError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| RefineryError::ConfigRead(path.clone()))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|err| RefineryError::ConfigParse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RefineryError> {
        if self.threads == 0 {
            return Err(RefineryError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        if self.pplacer_threads == 0 {
            return Err(RefineryError::InvalidConfig(
                "pplacer threads must be at least 1".to_string(),
            ));
        }
        if self.min_bin_size == 0 {
            return Err(RefineryError::InvalidConfig(
                "min bin size must be positive".to_string(),
            ));
        }
        if !self.max_contamination.is_finite() || self.max_contamination < 0.0 {
            return Err(RefineryError::InvalidConfig(format!(
                "max contamination must be a non-negative number, got {}",
                self.max_contamination
            )));
        }
        if self.output_dir.as_str().is_empty() {
            return Err(RefineryError::InvalidConfig(
                "output directory must not be empty".to_string(),
            ));
        }
        if self.bin_dir.as_str().is_empty() {
            return Err(RefineryError::InvalidConfig(
                "bin directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
