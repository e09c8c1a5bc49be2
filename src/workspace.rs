use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::SequenceExt;
use crate::error::RefineryError;
use crate::report::QualityReport;

/// Outcome of a single bin copy. A missing source is the one recoverable
/// filesystem condition: it means the file was already moved by an earlier
/// pass and the copy is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    SourceMissing,
}

/// Run-scoped directory layout. Staging and per-iteration directories live
/// under one root; only the staging directory is ever cleared, the seed bin
/// directory and the accumulated `final_bins` are never touched destructively.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn contaminated_dir(&self) -> Utf8PathBuf {
        self.root.join("contaminated_bins")
    }

    pub fn final_bins_dir(&self) -> Utf8PathBuf {
        self.root.join("final_bins")
    }

    /// Output directory of the refinement tool for loop iteration
    /// `iteration`; deterministic so resumed runs can detect finished work.
    pub fn refined_dir(&self, iteration: u32) -> Utf8PathBuf {
        self.root.join(format!("rosella_refined_{iteration}"))
    }

    pub fn done_marker(&self) -> Utf8PathBuf {
        self.root.join("done")
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.root.join("run_summary.json")
    }

    pub fn create(&self) -> Result<(), RefineryError> {
        for dir in [&self.root, &self.contaminated_dir(), &self.final_bins_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| RefineryError::Filesystem(format!("create {dir}: {err}")))?;
        }
        Ok(())
    }

    /// Removes every entry inside the contaminated staging directory while
    /// keeping the directory itself.
    pub fn clear_staging(&self) -> Result<(), RefineryError> {
        let staging = self.contaminated_dir();
        let entries = fs::read_dir(staging.as_std_path())
            .map_err(|err| RefineryError::Filesystem(format!("read {staging}: {err}")))?;
        for entry in entries {
            let entry =
                entry.map_err(|err| RefineryError::Filesystem(err.to_string()))?;
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            result.map_err(|err| {
                RefineryError::Filesystem(format!("remove {}: {err}", path.display()))
            })?;
        }
        Ok(())
    }
}

/// Whole-file copy that treats a missing source as a skip, not an error.
/// Everything else (permissions, disk full, missing destination directory)
/// propagates as fatal.
pub fn copy_bin(source: &Utf8Path, dest: &Utf8Path) -> Result<CopyOutcome, RefineryError> {
    match fs::copy(source.as_std_path(), dest.as_std_path()) {
        Ok(_) => Ok(CopyOutcome::Copied),
        Err(err) if err.kind() == io::ErrorKind::NotFound && !source.as_std_path().exists() => {
            Ok(CopyOutcome::SourceMissing)
        }
        Err(err) => Err(RefineryError::Filesystem(format!(
            "copy {source} -> {dest}: {err}"
        ))),
    }
}

/// Copies every bin named by `report` from `source_dir` into `dest_dir`,
/// renaming with the iteration tag when given and normalizing the destination
/// extension to `fna`. Returns the report with its identifier column rewritten
/// to the destination ids. Re-running over already-moved bins is a no-op.
pub fn move_finished_bins(
    report: &QualityReport,
    source_dir: &Utf8Path,
    source_ext: &SequenceExt,
    dest_dir: &Utf8Path,
    iteration_tag: Option<u32>,
) -> Result<QualityReport, RefineryError> {
    let renamed = report.rename_ids(|id| match iteration_tag {
        Some(iteration) => id.tagged(iteration),
        None => id.clone(),
    });

    for (old, new) in report.bin_ids().zip(renamed.bin_ids()) {
        let source = source_dir.join(format!("{old}.{source_ext}"));
        let dest = dest_dir.join(format!("{new}.{}", SequenceExt::fna()));
        match copy_bin(&source, &dest)? {
            CopyOutcome::Copied => {}
            CopyOutcome::SourceMissing => {
                debug!(bin = %old, "bin already moved, skipping");
            }
        }
    }

    Ok(renamed)
}

/// Stages every bin with `Contamination > max_contamination` into `dest_dir`
/// under its unchanged name. Returns `false` without touching the filesystem
/// when no bin qualifies, which is the loop's natural termination signal.
pub fn collect_contaminated(
    report: &QualityReport,
    max_contamination: f64,
    source_dir: &Utf8Path,
    ext: &SequenceExt,
    dest_dir: &Utf8Path,
) -> Result<bool, RefineryError> {
    let contaminated = report.filter_above(max_contamination);
    if contaminated.is_empty() {
        return Ok(false);
    }

    for id in contaminated.bin_ids() {
        let name = format!("{id}.{ext}");
        match copy_bin(&source_dir.join(&name), &dest_dir.join(&name))? {
            CopyOutcome::Copied => {}
            CopyOutcome::SourceMissing => {
                debug!(bin = %id, "bin already staged, skipping");
            }
        }
    }

    Ok(true)
}

/// Writes via a sibling temp file and rename so a crash never leaves a
/// half-written report behind.
pub fn write_text_atomic(path: &Utf8Path, content: &str) -> Result<(), RefineryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| RefineryError::Filesystem(format!("create {parent}: {err}")))?;
    }
    let parent = path
        .parent()
        .ok_or_else(|| RefineryError::Filesystem(format!("no parent for {path}")))?;
    let temp = tempfile::Builder::new()
        .prefix(".mag-refinery")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| RefineryError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| RefineryError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| RefineryError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(text: &str) -> QualityReport {
        QualityReport::parse(text).unwrap()
    }

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn copy_bin_distinguishes_missing_source() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        let source = root.join("a.fna");
        let dest = root.join("b.fna");

        assert_eq!(copy_bin(&source, &dest).unwrap(), CopyOutcome::SourceMissing);

        fs::write(source.as_std_path(), b">contig\nACGT\n").unwrap();
        assert_eq!(copy_bin(&source, &dest).unwrap(), CopyOutcome::Copied);

        // missing destination directory is fatal, not a skip
        let bad_dest = root.join("nope").join("b.fna");
        assert!(copy_bin(&source, &bad_dest).is_err());
    }

    #[test]
    fn move_is_idempotent_and_normalizes_extension() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        let source_dir = root.join("src");
        let dest_dir = root.join("dst");
        fs::create_dir_all(source_dir.as_std_path()).unwrap();
        fs::create_dir_all(dest_dir.as_std_path()).unwrap();
        fs::write(source_dir.join("bin.1.fa").as_std_path(), b">c\nACGT\n").unwrap();

        let table = report("Bin Id\tContamination\nbin.1\t2.0\nbin.2\t3.0\n");
        let ext: SequenceExt = "fa".parse().unwrap();

        let moved =
            move_finished_bins(&table, &source_dir, &ext, &dest_dir, Some(2)).unwrap();
        assert!(dest_dir.join("bin.1_2.fna").as_std_path().exists());
        // bin.2 had no source file: skipped, still renamed in the report
        assert_eq!(
            moved.bin_ids().map(|id| id.as_str()).collect::<Vec<_>>(),
            vec!["bin.1_2", "bin.2_2"]
        );

        // second run over the same inputs neither fails nor duplicates
        fs::remove_file(source_dir.join("bin.1.fa").as_std_path()).unwrap();
        let again =
            move_finished_bins(&table, &source_dir, &ext, &dest_dir, Some(2)).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(
            fs::read_dir(dest_dir.as_std_path()).unwrap().count(),
            1
        );
    }

    #[test]
    fn untagged_move_keeps_ids() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        fs::create_dir_all(root.join("dst").as_std_path()).unwrap();

        let table = report("Name\tContamination\nsampleX\t1.0\n");
        let ext = SequenceExt::fna();
        let moved =
            move_finished_bins(&table, &root, &ext, &root.join("dst"), None).unwrap();
        assert_eq!(moved.bin_ids().next().unwrap().as_str(), "sampleX");
    }

    #[test]
    fn collect_returns_false_when_nothing_is_contaminated() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        let table = report("Bin Id\tContamination\nbin.1\t2.0\n");
        let ext = SequenceExt::fna();
        assert!(!collect_contaminated(&table, 10.0, &root, &ext, &root).unwrap());
    }

    #[test]
    fn collect_stages_only_contaminated_bins() {
        let temp = tempfile::tempdir().unwrap();
        let root = utf8(temp.path());
        let source_dir = root.join("src");
        let dest_dir = root.join("staging");
        fs::create_dir_all(source_dir.as_std_path()).unwrap();
        fs::create_dir_all(dest_dir.as_std_path()).unwrap();
        for name in ["bin.1.fna", "bin.2.fna"] {
            fs::write(source_dir.join(name).as_std_path(), b">c\nA\n").unwrap();
        }

        let table = report("Bin Id\tContamination\nbin.1\t2.0\nbin.2\t15.0\n");
        let ext = SequenceExt::fna();
        assert!(collect_contaminated(&table, 10.0, &source_dir, &ext, &dest_dir).unwrap());
        assert!(!dest_dir.join("bin.1.fna").as_std_path().exists());
        assert!(dest_dir.join("bin.2.fna").as_std_path().exists());
    }

    #[test]
    fn clear_staging_keeps_the_directory() {
        let temp = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(utf8(temp.path()).join("run"));
        workspace.create().unwrap();
        let staged = workspace.contaminated_dir().join("bin.1.fna");
        fs::write(staged.as_std_path(), b">c\nA\n").unwrap();

        workspace.clear_staging().unwrap();
        assert!(!staged.as_std_path().exists());
        assert!(workspace.contaminated_dir().as_std_path().exists());
    }

    #[test]
    fn atomic_write_creates_parents() {
        let temp = tempfile::tempdir().unwrap();
        let path = utf8(temp.path()).join("nested").join("checkm.out");
        write_text_atomic(&path, "Bin Id\tContamination\n").unwrap();
        assert_eq!(
            fs::read_to_string(path.as_std_path()).unwrap(),
            "Bin Id\tContamination\n"
        );
    }
}
