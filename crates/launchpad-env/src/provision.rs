use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use launchpad_core::LaunchError;

use crate::fs_utils::remove_dir_if_exists;
use crate::process::{hide_console_window, wait_for_exit_code};
use crate::DiagnosticLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentPresence {
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionReport {
    Created,
    AlreadyPresent,
}

/// Only `NotFound` counts as absent. Any other metadata failure is an error and must
/// never lead to creation.
pub fn probe_environment(path: &Path) -> Result<EnvironmentPresence, LaunchError> {
    match fs::metadata(path) {
        Ok(_) => Ok(EnvironmentPresence::Present),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(EnvironmentPresence::Absent),
        Err(source) => Err(LaunchError::ProvisionCheckFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn build_environment_command(base_interpreter: &Path, target: &Path) -> Command {
    let mut command = Command::new(base_interpreter);
    command.arg("-m").arg("venv").arg(target);
    hide_console_window(&mut command);
    command
}

pub fn ensure_environment(
    target: &Path,
    base_interpreter: &Path,
    sink: &DiagnosticLog,
) -> Result<ProvisionReport, LaunchError> {
    ensure_environment_with_runner(target, base_interpreter, |command| {
        command.stdout(Stdio::null()).stderr(sink.stdio()?);
        wait_for_exit_code(command)
    })
}

pub fn ensure_environment_with_runner<RunCommand>(
    target: &Path,
    base_interpreter: &Path,
    mut run: RunCommand,
) -> Result<ProvisionReport, LaunchError>
where
    RunCommand: FnMut(&mut Command) -> io::Result<Option<i32>>,
{
    if probe_environment(target)? == EnvironmentPresence::Present {
        return Ok(ProvisionReport::AlreadyPresent);
    }

    let mut command = build_environment_command(base_interpreter, target);
    let code = run(&mut command).map_err(|err| LaunchError::ProvisionFailed {
        path: target.to_path_buf(),
        reason: format!("failed to start {}: {err}", base_interpreter.display()),
    })?;

    match code {
        Some(0) => Ok(ProvisionReport::Created),
        Some(code) => Err(LaunchError::ProvisionFailed {
            path: target.to_path_buf(),
            reason: format!("{} exited with status {code}", base_interpreter.display()),
        }),
        None => Err(LaunchError::ProvisionFailed {
            path: target.to_path_buf(),
            reason: format!(
                "{} was terminated without an exit code",
                base_interpreter.display()
            ),
        }),
    }
}

pub fn remove_environment(path: &Path) -> Result<()> {
    remove_dir_if_exists(path)
        .with_context(|| format!("failed to delete environment {}", path.display()))
}
