use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Runs a tool and waits for it, turning a non-zero exit into its trimmed
/// stderr (or a generic message when stderr is empty). Spawn failures come
/// back the same way; callers wrap the message in their own error variant.
pub(crate) fn run_tool(program: &Path, args: &[String]) -> Result<(), String> {
    debug!(program = %program.display(), ?args, "invoking external tool");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| format!("failed to spawn {}: {err}", program.display()))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        Err(format!("command failed: {}", program.display()))
    } else {
        Err(stderr)
    }
}

pub(crate) fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        #[cfg(windows)]
        {
            let exe = path.join(format!("{name}.exe"));
            if exe.exists() {
                return Some(exe);
            }
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
