use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::LogLayout;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_error_line(timestamp: &str, message: &str, detail: &str) -> String {
    format!("{timestamp} {message}: {detail}\n")
}

/// Append-only postmortem log of terminal launcher failures.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(layout: &LogLayout) -> Self {
        Self {
            path: layout.error_log_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str, detail: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file = open_append(&self.path)?;
        let line = format_error_line(&current_timestamp(), message, detail);
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

/// Sink that child processes write their stderr into.
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    file: File,
}

impl DiagnosticLog {
    /// Opens the log for appending and stamps the start of this run.
    pub fn open(layout: &LogLayout) -> Result<Self> {
        layout.ensure_log_dir()?;
        let path = layout.diagnostic_log_path();
        let mut file = open_append(&path)?;
        writeln!(
            file,
            "Logging stderr for run at datetime: {}",
            current_timestamp()
        )
        .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stdio(&self) -> std::io::Result<Stdio> {
        Ok(Stdio::from(self.file.try_clone()?))
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}
