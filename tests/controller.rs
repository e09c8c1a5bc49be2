use std::collections::VecDeque;
use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use mag_refinery::checkm::{AssessRequest, Assessment, QualityClient};
use mag_refinery::config::RefineryConfig;
use mag_refinery::controller::{Refinery, Termination};
use mag_refinery::error::RefineryError;
use mag_refinery::refine::{RefineClient, RefineRequest};
use mag_refinery::report::QualityReport;

/// Simulates the refinement tool: records every call and materializes a
/// configured set of refined bins in the requested output directory.
struct MockRefine {
    calls: Mutex<u32>,
    outputs: Vec<Vec<&'static str>>,
}

impl MockRefine {
    fn new(outputs: Vec<Vec<&'static str>>) -> Self {
        Self {
            calls: Mutex::new(0),
            outputs,
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl RefineClient for MockRefine {
    fn refine(&self, request: &RefineRequest) -> Result<(), RefineryError> {
        let mut calls = self.calls.lock().unwrap();
        fs::create_dir_all(request.output_dir.as_std_path()).unwrap();
        if let Some(bins) = self.outputs.get(*calls as usize) {
            for bin in bins {
                let path = request.output_dir.join(format!("{bin}.fna"));
                fs::write(path.as_std_path(), b">contig\nACGT\n").unwrap();
            }
        }
        *calls += 1;
        Ok(())
    }
}

/// Replays a scripted sequence of assessments.
struct MockQuality {
    responses: Mutex<VecDeque<Assessment>>,
}

impl MockQuality {
    fn new(responses: Vec<Assessment>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    fn report(text: &str) -> Assessment {
        Assessment::Report(QualityReport::parse(text).unwrap())
    }
}

impl QualityClient for MockQuality {
    fn assess(&self, _request: &AssessRequest) -> Result<Assessment, RefineryError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected assessment call"))
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    config: RefineryConfig,
}

/// Seed bin directory plus initial report under a throwaway root.
fn fixture(seed_report: &str, seed_bins: &[&str], max_iterations: u32) -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();

    let bin_dir = root.join("seed_bins");
    fs::create_dir_all(bin_dir.as_std_path()).unwrap();
    for bin in seed_bins {
        fs::write(
            bin_dir.join(format!("{bin}.fna")).as_std_path(),
            b">contig\nACGT\n",
        )
        .unwrap();
    }

    let checkm_report = root.join("checkm.out");
    fs::write(checkm_report.as_std_path(), seed_report).unwrap();

    let config = RefineryConfig {
        bin_dir,
        bin_ext: "fna".parse().unwrap(),
        checkm_report,
        assembly: root.join("assembly.fasta"),
        coverage_values: root.join("coverage.tsv"),
        kmer_frequencies: root.join("kmers.tsv"),
        min_bin_size: 200_000,
        max_iterations,
        threads: 1,
        pplacer_threads: 1,
        max_contamination: 10.0,
        output_dir: root.join("refinery"),
        final_refining: false,
        publish_root: root.clone(),
    };
    Fixture { _temp: temp, config }
}

fn ids(report: &QualityReport) -> Vec<String> {
    report.bin_ids().map(|id| id.as_str().to_string()).collect()
}

#[test]
fn immediate_success_runs_zero_refinements() {
    let fixture = fixture(
        "Bin Id\tCompleteness\tContamination\n\
         sampleX\t98.0\t2.0\n\
         sampleY\t91.0\t9.9\n",
        &["sampleX", "sampleY"],
        3,
    );
    let refine = MockRefine::new(vec![]);
    let quality = MockQuality::new(vec![]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();

    assert_matches!(outcome.termination, Termination::NoContaminatedBins);
    assert_eq!(outcome.iterations_run, 0);
    assert_eq!(refine.calls(), 0);
    assert_eq!(ids(&outcome.accumulated), vec!["sampleX", "sampleY"]);
    let final_bins = refinery.workspace().final_bins_dir();
    assert!(final_bins.join("sampleX.fna").as_std_path().exists());
    assert!(final_bins.join("sampleY.fna").as_std_path().exists());
}

#[test]
fn immediate_success_accepts_the_name_schema() {
    let fixture = fixture(
        "Name\tContamination\nsampleX\t2.0\n",
        &["sampleX"],
        3,
    );
    let refine = MockRefine::new(vec![]);
    let quality = MockQuality::new(vec![]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();
    assert_matches!(outcome.termination, Termination::NoContaminatedBins);
    assert_eq!(ids(&outcome.accumulated), vec!["sampleX"]);
}

#[test]
fn single_refinement_round_tags_the_descendant() {
    let fixture = fixture(
        "Bin Id\tCompleteness\tContamination\n\
         good\t95.0\t2.0\n\
         dirty\t80.0\t15.0\n",
        &["good", "dirty"],
        5,
    );
    let refine = MockRefine::new(vec![vec!["dirty.1"]]);
    let quality = MockQuality::new(vec![MockQuality::report(
        "Bin Id\tCompleteness\tContamination\ndirty.1\t85.0\t5.0\n",
    )]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();

    assert_matches!(outcome.termination, Termination::NoContaminatedBins);
    assert_eq!(refine.calls(), 1);
    assert_eq!(ids(&outcome.accumulated), vec!["good", "dirty.1_0"]);
    let final_bins = refinery.workspace().final_bins_dir();
    assert!(final_bins.join("good.fna").as_std_path().exists());
    assert!(final_bins.join("dirty.1_0.fna").as_std_path().exists());
    // the contaminated original was staged, not finished
    assert!(!final_bins.join("dirty.fna").as_std_path().exists());
}

#[test]
fn exhausts_the_iteration_budget_when_nothing_improves() {
    let fixture = fixture(
        "Bin Id\tContamination\ndirty\t50.0\n",
        &["dirty"],
        2,
    );
    let refine = MockRefine::new(vec![vec!["still_dirty"], vec!["still_dirty"]]);
    let quality = MockQuality::new(vec![
        MockQuality::report("Bin Id\tContamination\nstill_dirty\t40.0\n"),
        MockQuality::report("Bin Id\tContamination\nstill_dirty\t30.0\n"),
    ]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();

    assert_matches!(outcome.termination, Termination::MaxIterationsReached);
    assert_eq!(refine.calls(), 2);
    assert_eq!(outcome.iterations_run, 2);
    assert!(outcome.accumulated.is_empty());
}

#[test]
fn terminates_gracefully_when_assessment_finds_no_bins() {
    let fixture = fixture(
        "Bin Id\tContamination\n\
         good\t1.0\n\
         dirty\t50.0\n",
        &["good", "dirty"],
        3,
    );
    let refine = MockRefine::new(vec![vec![]]);
    let quality = MockQuality::new(vec![Assessment::NoBins]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();

    assert_matches!(outcome.termination, Termination::NoBinsAssessed);
    assert_eq!(refine.calls(), 1);
    // accumulated result unchanged from before the collapsed iteration
    assert_eq!(ids(&outcome.accumulated), vec!["good"]);
}

#[test]
fn resumed_run_skips_existing_refined_output() {
    let fixture = fixture(
        "Bin Id\tContamination\ndirty\t50.0\n",
        &["dirty"],
        1,
    );
    // pretend iteration 0 already ran to completion on a previous attempt
    let refined = fixture.config.output_dir.join("rosella_refined_0");
    fs::create_dir_all(refined.as_std_path()).unwrap();

    let refine = MockRefine::new(vec![]);
    let quality = MockQuality::new(vec![]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();

    assert_matches!(outcome.termination, Termination::MaxIterationsReached);
    assert_eq!(refine.calls(), 0);
    assert_eq!(outcome.iterations_run, 1);
}

#[test]
fn ids_never_collide_and_accumulation_is_monotonic() {
    let fixture = fixture(
        "Bin Id\tContamination\n\
         sampleX\t2.0\n\
         dirty\t30.0\n",
        &["sampleX", "dirty"],
        3,
    );
    // both rounds emit a refined bin with the same name
    let refine = MockRefine::new(vec![vec!["binA", "binB"], vec!["binA"]]);
    let quality = MockQuality::new(vec![
        MockQuality::report("Bin Id\tContamination\nbinA\t5.0\nbinB\t20.0\n"),
        MockQuality::report("Bin Id\tContamination\nbinA\t4.0\n"),
    ]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    let outcome = refinery.run().unwrap();

    assert_matches!(outcome.termination, Termination::NoContaminatedBins);
    assert_eq!(refine.calls(), 2);
    let accumulated = ids(&outcome.accumulated);
    assert_eq!(accumulated, vec!["sampleX", "binA_0", "binA_1"]);
    let unique: std::collections::HashSet<_> = accumulated.iter().collect();
    assert_eq!(unique.len(), accumulated.len());

    let final_bins = refinery.workspace().final_bins_dir();
    for name in ["sampleX.fna", "binA_0.fna", "binA_1.fna"] {
        assert!(final_bins.join(name).as_std_path().exists(), "missing {name}");
    }
}

#[test]
fn malformed_seed_report_is_fatal() {
    let fixture = fixture("Genome\tPurity\nx\t1.0\n", &[], 1);
    let refine = MockRefine::new(vec![]);
    let quality = MockQuality::new(vec![]);
    let refinery = Refinery::new(fixture.config.clone(), &refine, &quality).unwrap();

    assert_matches!(refinery.run(), Err(RefineryError::ReportParse(_)));
}
