use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use launchpad_core::{LaunchError, LauncherConfig};
use walkdir::WalkDir;

use crate::fs_utils::absolutize;

const PATH_FALLBACK_NAMES: [&str; 2] = ["python3", "python"];
const DISTRIBUTION_DIR_PREFIX: &str = "python-";

/// File name of the interpreter for this platform. The alternate (windowless) binary
/// only exists on Windows.
pub fn interpreter_file_name(use_alternate: bool) -> &'static str {
    if cfg!(windows) {
        if use_alternate {
            "pythonw.exe"
        } else {
            "python.exe"
        }
    } else {
        "python"
    }
}

/// Walks `root` and returns the absolute path of the first non-directory entry whose
/// file name `matches` accepts.
///
/// Entries are visited in whatever order the filesystem yields them. When a tree holds
/// several candidates the winner is the first one reached by that traversal, not the
/// lexicographically smallest; results are only reproducible for a fixed on-disk order.
pub fn locate_binary<F>(root: &Path, name: &str, mut matches: F) -> Result<PathBuf, LaunchError>
where
    F: FnMut(&OsStr) -> bool,
{
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|err| LaunchError::Traversal {
            root: root.to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if matches(entry.file_name()) {
            return absolutize(entry.path()).map_err(|source| LaunchError::Traversal {
                root: root.to_path_buf(),
                source,
            });
        }
    }

    Err(LaunchError::NotFound {
        name: name.to_string(),
        root: root.to_path_buf(),
    })
}

pub fn locate_interpreter(root: &Path, use_alternate: bool) -> Result<PathBuf, LaunchError> {
    let name = interpreter_file_name(use_alternate);
    locate_binary(root, name, |candidate| {
        candidate
            .to_str()
            .is_some_and(|value| value.eq_ignore_ascii_case(name))
    })
}

/// Finds the interpreter used to create environments: the top-level binary of the first
/// `python-*` distribution under the configured interpreter tree when that tree exists,
/// otherwise the first suitable interpreter on `PATH`.
pub fn locate_base_interpreter(config: &LauncherConfig) -> Result<PathBuf, LaunchError> {
    if config.interpreter_root.exists() {
        return locate_distribution_interpreter(
            &config.interpreter_root,
            config.use_alternate_binary,
        );
    }

    for candidate in PATH_FALLBACK_NAMES {
        if let Ok(found) = which::which(candidate) {
            return Ok(found);
        }
    }

    Err(LaunchError::NotFound {
        name: interpreter_file_name(config.use_alternate_binary).to_string(),
        root: config.interpreter_root.clone(),
    })
}

/// Picks the lexicographically first `python-*` directory directly under `root` and
/// returns the interpreter at its top level. Nested copies (venv launcher stubs under
/// `Lib/venv/scripts`) are never considered.
pub fn locate_distribution_interpreter(
    root: &Path,
    use_alternate: bool,
) -> Result<PathBuf, LaunchError> {
    let name = interpreter_file_name(use_alternate);
    let traversal = |source: std::io::Error| LaunchError::Traversal {
        root: root.to_path_buf(),
        source,
    };

    let mut distributions = Vec::new();
    for entry in fs::read_dir(root).map_err(traversal)? {
        let entry = entry.map_err(traversal)?;
        let is_distribution = entry
            .file_name()
            .to_str()
            .is_some_and(|value| value.starts_with(DISTRIBUTION_DIR_PREFIX));
        if is_distribution && entry.file_type().map_err(traversal)?.is_dir() {
            distributions.push(entry.path());
        }
    }
    distributions.sort();

    let candidate = distributions
        .first()
        .map(|distribution| distribution.join(name))
        .filter(|candidate| candidate.is_file())
        .ok_or_else(|| LaunchError::NotFound {
            name: name.to_string(),
            root: root.to_path_buf(),
        })?;
    absolutize(&candidate).map_err(traversal)
}
