use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use mag_refinery::checkm::SystemCheckmClient;
use mag_refinery::config::RefineryConfig;
use mag_refinery::controller::Refinery;
use mag_refinery::domain::SequenceExt;
use mag_refinery::error::RefineryError;
use mag_refinery::finalize;
use mag_refinery::refine::SystemRefineClient;

#[derive(Parser)]
#[command(name = "mag-refinery")]
#[command(about = "Iteratively refine metagenomic bins until they pass a contamination threshold")]
#[command(version, author)]
struct Cli {
    /// JSON run description; replaces the individual flags below.
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// Directory holding the seed bins.
    #[arg(long, required_unless_present = "config")]
    bin_dir: Option<Utf8PathBuf>,

    /// Extension of the seed bin files.
    #[arg(long, default_value = "fna")]
    bin_ext: SequenceExt,

    /// Initial CheckM report for the seed bins.
    #[arg(long, required_unless_present = "config")]
    checkm_report: Option<Utf8PathBuf>,

    /// Assembly the bins were derived from.
    #[arg(long, required_unless_present = "config")]
    assembly: Option<Utf8PathBuf>,

    /// Per-contig coverage values.
    #[arg(long, required_unless_present = "config")]
    coverage_values: Option<Utf8PathBuf>,

    /// Per-contig kmer frequencies.
    #[arg(long, required_unless_present = "config")]
    kmer_frequencies: Option<Utf8PathBuf>,

    /// Smallest bin the refinement tool may emit, in base pairs.
    #[arg(long, default_value_t = 200_000)]
    min_bin_size: u64,

    /// Upper bound on refinement rounds.
    #[arg(long, default_value_t = 5)]
    max_iterations: u32,

    /// Worker threads for both external tools.
    #[arg(long, short = 't', default_value_t = 8)]
    threads: u32,

    /// Threads for the quality tool's placement stage.
    #[arg(long, default_value_t = 8)]
    pplacer_threads: u32,

    /// Bins above this contamination are re-submitted for refinement.
    #[arg(long, default_value_t = 10.0)]
    max_contamination: f64,

    /// Root of the run workspace.
    #[arg(long, short = 'o', required_unless_present = "config")]
    output_dir: Option<Utf8PathBuf>,

    /// Publish the merged report and a stable `bins/final_bins` symlink
    /// instead of only dropping a `done` marker.
    #[arg(long)]
    final_refining: bool,

    /// Root the published `data/` and `bins/` paths are resolved against.
    #[arg(long, default_value = ".")]
    publish_root: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(refinery) = report.downcast_ref::<RefineryError>() {
            return ExitCode::from(map_exit_code(refinery));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RefineryError) -> u8 {
    match error {
        RefineryError::InvalidConfig(_)
        | RefineryError::ConfigRead(_)
        | RefineryError::ConfigParse(_)
        | RefineryError::InvalidBinId(_)
        | RefineryError::InvalidExtension(_) => 2,
        RefineryError::MissingTool(_)
        | RefineryError::RefineTool(_)
        | RefineryError::QualityTool(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(cli).into_diagnostic()?;

    let refinery = Refinery::new(
        config.clone(),
        SystemRefineClient::new(),
        SystemCheckmClient::new(),
    )
    .into_diagnostic()?;
    let outcome = refinery.run().into_diagnostic()?;
    finalize::finalize(&config, refinery.workspace(), &outcome).into_diagnostic()?;
    Ok(())
}

fn resolve_config(cli: Cli) -> Result<RefineryConfig, RefineryError> {
    if let Some(path) = &cli.config {
        return RefineryConfig::from_file(path);
    }

    let required = |value: Option<Utf8PathBuf>, flag: &str| {
        value.ok_or_else(|| RefineryError::InvalidConfig(format!("--{flag} is required")))
    };
    let config = RefineryConfig {
        bin_dir: required(cli.bin_dir, "bin-dir")?,
        bin_ext: cli.bin_ext,
        checkm_report: required(cli.checkm_report, "checkm-report")?,
        assembly: required(cli.assembly, "assembly")?,
        coverage_values: required(cli.coverage_values, "coverage-values")?,
        kmer_frequencies: required(cli.kmer_frequencies, "kmer-frequencies")?,
        min_bin_size: cli.min_bin_size,
        max_iterations: cli.max_iterations,
        threads: cli.threads,
        pplacer_threads: cli.pplacer_threads,
        max_contamination: cli.max_contamination,
        output_dir: required(cli.output_dir, "output-dir")?,
        final_refining: cli.final_refining,
        publish_root: cli.publish_root,
    };
    config.validate()?;
    Ok(config)
}
