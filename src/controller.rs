use serde::Serialize;
use tracing::{debug, info};

use crate::checkm::{AssessRequest, Assessment, QualityClient};
use crate::config::RefineryConfig;
use crate::domain::SequenceExt;
use crate::error::RefineryError;
use crate::refine::{RefineClient, RefineRequest};
use crate::report::QualityReport;
use crate::workspace::{self, Workspace};

/// First-pass bar applied to the seed report before the loop starts.
/// Intentionally a fixed constant, not `max_contamination`: the original
/// pipeline holds seed bins to this stricter bar regardless of how lax the
/// loop threshold is configured.
pub const SEED_CONTAMINATION: f64 = 10.0;

/// Why the loop stopped. All three reasons are normal completion and converge
/// on the same finalization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    NoContaminatedBins,
    NoBinsAssessed,
    MaxIterationsReached,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub termination: Termination,
    pub iterations_run: u32,
    pub refine_invocations: u32,
    /// Every finished bin record, ids disambiguated, monotonically grown
    /// across iterations. The finalizer reads this, nothing mutates it.
    pub accumulated: QualityReport,
}

/// The iteration state machine. Owns the current bin directory, extension and
/// quality report; alternates collect -> refine -> assess -> merge until no
/// contaminated bins remain, assessment finds nothing, or the iteration
/// budget runs out.
pub struct Refinery<R: RefineClient, Q: QualityClient> {
    config: RefineryConfig,
    workspace: Workspace,
    refine: R,
    quality: Q,
}

impl<R: RefineClient, Q: QualityClient> Refinery<R, Q> {
    pub fn new(config: RefineryConfig, refine: R, quality: Q) -> Result<Self, RefineryError> {
        config.validate()?;
        let workspace = Workspace::new(config.output_dir.clone());
        Ok(Self {
            config,
            workspace,
            refine,
            quality,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn run(&self) -> Result<RunOutcome, RefineryError> {
        self.workspace.create()?;
        let final_bins = self.workspace.final_bins_dir();
        let staging = self.workspace.contaminated_dir();

        let seed = QualityReport::load(&self.config.checkm_report)?;
        let (seed_finished, seed_remaining) = seed.partition(SEED_CONTAMINATION);
        info!(
            finished = seed_finished.len(),
            remaining = seed_remaining.len(),
            "seed report split at contamination {SEED_CONTAMINATION}"
        );
        let mut accumulated = workspace::move_finished_bins(
            &seed_finished,
            &self.config.bin_dir,
            &self.config.bin_ext,
            &final_bins,
            None,
        )?;

        let mut current_dir = self.config.bin_dir.clone();
        let mut current_ext = self.config.bin_ext.clone();
        let mut current_report = seed_remaining;
        let mut current_report_path = self.config.checkm_report.clone();
        let mut iteration: u32 = 0;
        let mut refine_invocations: u32 = 0;

        let termination = loop {
            if iteration >= self.config.max_iterations {
                break Termination::MaxIterationsReached;
            }

            if iteration > 0 {
                // fresh staging workspace; refined bins always carry .fna
                self.workspace.clear_staging()?;
                current_ext = SequenceExt::fna();
            }

            if !workspace::collect_contaminated(
                &current_report,
                self.config.max_contamination,
                &current_dir,
                &current_ext,
                &staging,
            )? {
                info!(iteration, "no contaminated bins remain");
                break Termination::NoContaminatedBins;
            }

            let refined_dir = self.workspace.refined_dir(iteration);
            if refined_dir.as_std_path().exists() {
                // resumed run: this round's output is already on disk
                debug!(iteration, dir = %refined_dir, "refined output present, skipping");
                iteration += 1;
                continue;
            }

            info!(iteration, "refining staged contaminated bins");
            self.refine.refine(&RefineRequest {
                assembly: self.config.assembly.clone(),
                coverage_values: self.config.coverage_values.clone(),
                kmer_frequencies: self.config.kmer_frequencies.clone(),
                bin_dir: staging.clone(),
                extension: current_ext.clone(),
                checkm_report: current_report_path.clone(),
                max_contamination: self.config.max_contamination,
                min_bin_size: self.config.min_bin_size,
                threads: self.config.threads,
                output_dir: refined_dir.clone(),
            })?;
            refine_invocations += 1;
            current_dir = refined_dir;

            let assessment = self.quality.assess(&AssessRequest {
                bin_dir: current_dir.clone(),
                threads: self.config.threads,
                pplacer_threads: self.config.pplacer_threads,
            })?;
            let report = match assessment {
                Assessment::NoBins => {
                    info!(iteration, "refinement left no bins to assess");
                    break Termination::NoBinsAssessed;
                }
                Assessment::Report(report) => report,
            };
            current_report_path = current_dir.join("checkm.out");

            let (finished, remaining) = report.partition(self.config.max_contamination);
            info!(
                iteration,
                finished = finished.len(),
                remaining = remaining.len(),
                "merged assessment results"
            );
            let moved = workspace::move_finished_bins(
                &finished,
                &current_dir,
                &SequenceExt::fna(),
                &final_bins,
                Some(iteration),
            )?;
            accumulated = accumulated.concat(&moved);
            current_report = remaining;
            iteration += 1;
        };

        info!(
            ?termination,
            iterations = iteration,
            refine_invocations,
            finished_bins = accumulated.len(),
            "refinement loop finished"
        );
        Ok(RunOutcome {
            termination,
            iterations_run: iteration,
            refine_invocations,
            accumulated,
        })
    }
}
