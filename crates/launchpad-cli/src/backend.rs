use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use launchpad_core::{ExecutionOutcome, LaunchError, LauncherConfig};
use launchpad_env::{
    absolutize, DiagnosticLog, EnvironmentPresence, ErrorLog, LogLayout, ProvisionReport,
};

use crate::escalation::LaunchBackend;
use crate::render::TerminalRenderer;

/// Backend wired to the real filesystem, processes and OS privilege APIs.
pub(crate) struct SystemBackend {
    config_path: PathBuf,
    layout: LogLayout,
    error_log: ErrorLog,
    diagnostics: Option<DiagnosticLog>,
    renderer: TerminalRenderer,
}

impl SystemBackend {
    pub(crate) fn new(config_path: PathBuf, layout: LogLayout, renderer: TerminalRenderer) -> Self {
        let error_log = ErrorLog::new(&layout);
        Self {
            config_path,
            layout,
            error_log,
            diagnostics: None,
            renderer,
        }
    }

    fn diagnostics(&self) -> Result<&DiagnosticLog, LaunchError> {
        self.diagnostics.as_ref().ok_or_else(|| {
            LaunchError::Fatal("diagnostic log was not opened before spawning".to_string())
        })
    }
}

impl LaunchBackend for SystemBackend {
    fn is_elevated(&mut self) -> bool {
        launchpad_env::is_elevated()
    }

    fn prepare_logs(&mut self) -> Result<()> {
        self.layout.ensure_log_dir()?;
        self.diagnostics = Some(DiagnosticLog::open(&self.layout)?);
        Ok(())
    }

    fn load_config(&mut self) -> Result<LauncherConfig> {
        LauncherConfig::load(&self.config_path)
    }

    fn remove_environment(&mut self, path: &Path) -> Result<()> {
        launchpad_env::remove_environment(path)
    }

    fn probe_environment(&mut self, path: &Path) -> Result<EnvironmentPresence, LaunchError> {
        launchpad_env::probe_environment(path)
    }

    fn locate_base_interpreter(
        &mut self,
        config: &LauncherConfig,
    ) -> Result<PathBuf, LaunchError> {
        launchpad_env::locate_base_interpreter(config)
    }

    fn ensure_environment(
        &mut self,
        path: &Path,
        base_interpreter: &Path,
    ) -> Result<ProvisionReport, LaunchError> {
        let sink = self.diagnostics()?;
        let spinner = self.renderer.start_spinner("provision");
        let report = launchpad_env::ensure_environment(path, base_interpreter, sink);
        spinner.finish();
        report
    }

    fn locate_environment_interpreter(
        &mut self,
        config: &LauncherConfig,
    ) -> Result<PathBuf, LaunchError> {
        launchpad_env::locate_interpreter(&config.environment_path, config.use_alternate_binary)
    }

    fn resolve_script(&mut self, script: &Path) -> Result<PathBuf> {
        absolutize(script)
            .with_context(|| format!("cannot resolve absolute path for {}", script.display()))
    }

    fn run_installer(&mut self, interpreter: &Path, script: &Path) -> ExecutionOutcome {
        let sink = match self.diagnostics() {
            Ok(sink) => sink,
            Err(err) => return ExecutionOutcome::LaunchFailure(err.to_string()),
        };
        let spinner = self.renderer.start_spinner("install");
        let outcome = launchpad_env::run_installer(interpreter, script, sink);
        spinner.finish();
        outcome
    }

    fn relaunch_elevated(&mut self, extra_args: &[OsString]) -> Result<(), LaunchError> {
        launchpad_env::relaunch_elevated(extra_args)
    }

    fn record_error(&mut self, message: &str, detail: &str) {
        if let Err(err) = self.error_log.append(message, detail) {
            eprintln!(
                "failed to write error log {}: {err:#}",
                self.error_log.path().display()
            );
        }
    }
}
