//! Discovery checks for configured backend executables.
//!
//! Adapters report precise errors when a binary is missing, but the CLI
//! uses these checks up front to tell "never installed" apart from
//! "present but broken" when listing providers.

use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    let runnable = metadata.permissions().mode() & 0o111 != 0;
    #[cfg(not(unix))]
    let runnable = true;
    runnable
}

/// Resolve an executable name or path to a runnable file, walking PATH for
/// bare names the way the shell would.
pub fn resolve_executable(executable: &str) -> Option<PathBuf> {
    let trimmed = executable.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = Path::new(trimmed);
    if candidate.is_absolute() || trimmed.contains(std::path::MAIN_SEPARATOR) {
        return is_executable_file(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|entry| entry.join(trimmed))
        .find(|entry| is_executable_file(entry))
}

pub fn is_executable_available(executable: &str) -> bool {
    resolve_executable(executable).is_some()
}
