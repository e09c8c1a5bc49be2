use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::config::RefineryConfig;
use crate::controller::{RunOutcome, Termination};
use crate::error::RefineryError;
use crate::workspace::{self, Workspace};

/// Machine-readable record of the finished run, written next to the
/// per-iteration directories in both output modes.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub finished_at: String,
    pub termination: Termination,
    pub iterations_run: u32,
    pub refine_invocations: u32,
    pub finished_bins: usize,
    pub config: &'a RefineryConfig,
}

/// Stages the accumulated result as the run's final output. Final-refining
/// runs publish the merged report at the two fixed paths and expose the
/// finished bins through a stable symlink; intermediate runs only signal
/// completion with a zero-byte `done` marker.
pub fn finalize(
    config: &RefineryConfig,
    workspace: &Workspace,
    outcome: &RunOutcome,
) -> Result<(), RefineryError> {
    if config.final_refining {
        publish_final(config, workspace, outcome)?;
    } else {
        touch_done_marker(&workspace.done_marker())?;
    }

    let summary = RunSummary {
        finished_at: chrono::Utc::now().to_rfc3339(),
        termination: outcome.termination,
        iterations_run: outcome.iterations_run,
        refine_invocations: outcome.refine_invocations,
        finished_bins: outcome.accumulated.len(),
        config,
    };
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|err| RefineryError::Filesystem(err.to_string()))?;
    workspace::write_text_atomic(&workspace.summary_path(), &json)?;
    Ok(())
}

fn publish_final(
    config: &RefineryConfig,
    workspace: &Workspace,
    outcome: &RunOutcome,
) -> Result<(), RefineryError> {
    let tsv = outcome.accumulated.to_tsv();
    let data_report = config.publish_root.join("data").join("checkm.out");
    workspace::write_text_atomic(&data_report, &tsv)?;

    let bins_root = config.publish_root.join("bins");
    fs::create_dir_all(bins_root.as_std_path())
        .map_err(|err| RefineryError::Filesystem(format!("create {bins_root}: {err}")))?;

    let link = bins_root.join("final_bins");
    ensure_symlink(&workspace.final_bins_dir(), &link)?;
    workspace::write_text_atomic(&bins_root.join("checkm.out"), &tsv)?;
    info!(report = %data_report, bins = %link, "published final refinement results");
    Ok(())
}

/// Points `link` at the accumulated bins directory. An existing symlink is
/// left alone; an existing plain directory (assumed empty) is removed and
/// replaced by the link.
fn ensure_symlink(target: &Utf8Path, link: &Utf8Path) -> Result<(), RefineryError> {
    let target = std::path::absolute(target.as_std_path())
        .map_err(|err| RefineryError::Filesystem(format!("resolve {target}: {err}")))?;

    match fs::symlink_metadata(link.as_std_path()) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            symlink_dir(&target, link)?;
        }
        Err(err) => {
            return Err(RefineryError::Filesystem(format!("stat {link}: {err}")));
        }
        Ok(meta) if !meta.file_type().is_symlink() => {
            fs::remove_dir(link.as_std_path())
                .map_err(|err| RefineryError::Filesystem(format!("remove {link}: {err}")))?;
            symlink_dir(&target, link)?;
        }
        Ok(_) => {}
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(target: &std::path::Path, link: &Utf8Path) -> Result<(), RefineryError> {
    std::os::unix::fs::symlink(target, link.as_std_path())
        .map_err(|err| RefineryError::Filesystem(format!("symlink {link}: {err}")))
}

#[cfg(windows)]
fn symlink_dir(target: &std::path::Path, link: &Utf8Path) -> Result<(), RefineryError> {
    std::os::windows::fs::symlink_dir(target, link.as_std_path())
        .map_err(|err| RefineryError::Filesystem(format!("symlink {link}: {err}")))
}

/// Opened in append mode so re-finalizing a resumed run keeps the marker.
fn touch_done_marker(path: &Utf8Path) -> Result<(), RefineryError> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| RefineryError::Filesystem(format!("create {path}: {err}")))?;
    Ok(())
}
