use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_DIR: &str = "logs";

const ERROR_LOG_FILE: &str = "launcher-error.log";
const DIAGNOSTIC_LOG_FILE: &str = "installer-stderr.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    log_dir: PathBuf,
}

impl LogLayout {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.log_dir.join(ERROR_LOG_FILE)
    }

    pub fn diagnostic_log_path(&self) -> PathBuf {
        self.log_dir.join(DIAGNOSTIC_LOG_FILE)
    }

    pub fn ensure_log_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("failed to create {}", self.log_dir.display()))
    }
}

impl Default for LogLayout {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_DIR)
    }
}
