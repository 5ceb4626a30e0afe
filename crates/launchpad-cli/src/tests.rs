use super::*;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use launchpad_core::{ExecutionOutcome, LaunchError, LauncherConfig};
use launchpad_env::{build_relaunch_args, EnvironmentPresence, ProvisionReport};

use crate::escalation::{LaunchBackend, LaunchExit, DELETE_ENVIRONMENT_FLAG};
use crate::render::{format_elapsed, render_spinner_summary, render_status_line, OutputStyle};

/// Records every call the state machine makes; one instance models one process.
struct FakeBackend {
    elevated: bool,
    original_args: Vec<OsString>,
    config_error: Option<String>,
    environment_present: bool,
    probe_fails: bool,
    base_interpreter_missing: bool,
    provision_fails: bool,
    relaunch_refused: bool,
    installer_outcomes: VecDeque<ExecutionOutcome>,
    provision_spawns: usize,
    installer_spawns: usize,
    base_lookups: usize,
    removed_environments: Vec<PathBuf>,
    relaunches: Vec<Vec<OsString>>,
    errors: Vec<(String, String)>,
}

impl FakeBackend {
    fn new(elevated: bool, original_args: &[&str]) -> Self {
        Self {
            elevated,
            original_args: original_args.iter().map(OsString::from).collect(),
            config_error: None,
            environment_present: false,
            probe_fails: false,
            base_interpreter_missing: false,
            provision_fails: false,
            relaunch_refused: false,
            installer_outcomes: VecDeque::new(),
            provision_spawns: 0,
            installer_spawns: 0,
            base_lookups: 0,
            removed_environments: Vec::new(),
            relaunches: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn with_exit_codes(mut self, codes: &[i32]) -> Self {
        self.installer_outcomes = codes
            .iter()
            .map(|code| launchpad_core::classify_exit_code(Some(*code)))
            .collect();
        self
    }

    fn reset_requested(&self) -> bool {
        self.original_args
            .iter()
            .any(|arg| arg == DELETE_ENVIRONMENT_FLAG)
    }

    fn run(&mut self) -> LaunchExit {
        let reset = self.reset_requested();
        run_launcher(self, reset, plain_renderer())
    }
}

impl LaunchBackend for FakeBackend {
    fn is_elevated(&mut self) -> bool {
        self.elevated
    }

    fn prepare_logs(&mut self) -> Result<()> {
        Ok(())
    }

    fn load_config(&mut self) -> Result<LauncherConfig> {
        match &self.config_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(LauncherConfig::new("env")),
        }
    }

    fn remove_environment(&mut self, path: &Path) -> Result<()> {
        self.removed_environments.push(path.to_path_buf());
        self.environment_present = false;
        Ok(())
    }

    fn probe_environment(&mut self, path: &Path) -> Result<EnvironmentPresence, LaunchError> {
        if self.probe_fails {
            return Err(LaunchError::ProvisionCheckFailed {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            });
        }
        Ok(if self.environment_present {
            EnvironmentPresence::Present
        } else {
            EnvironmentPresence::Absent
        })
    }

    fn locate_base_interpreter(
        &mut self,
        config: &LauncherConfig,
    ) -> Result<PathBuf, LaunchError> {
        self.base_lookups += 1;
        if self.base_interpreter_missing {
            return Err(LaunchError::NotFound {
                name: "python".to_string(),
                root: config.interpreter_root.clone(),
            });
        }
        Ok(PathBuf::from("/opt/WPy/python-3.11/python"))
    }

    fn ensure_environment(
        &mut self,
        path: &Path,
        _base_interpreter: &Path,
    ) -> Result<ProvisionReport, LaunchError> {
        if self.environment_present {
            return Ok(ProvisionReport::AlreadyPresent);
        }
        self.provision_spawns += 1;
        if self.provision_fails {
            return Err(LaunchError::ProvisionFailed {
                path: path.to_path_buf(),
                reason: "python exited with status 1".to_string(),
            });
        }
        self.environment_present = true;
        Ok(ProvisionReport::Created)
    }

    fn locate_environment_interpreter(
        &mut self,
        config: &LauncherConfig,
    ) -> Result<PathBuf, LaunchError> {
        Ok(config.environment_path.join("bin").join("python"))
    }

    fn resolve_script(&mut self, script: &Path) -> Result<PathBuf> {
        Ok(Path::new("/srv/app").join(script))
    }

    fn run_installer(&mut self, _interpreter: &Path, _script: &Path) -> ExecutionOutcome {
        self.installer_spawns += 1;
        self.installer_outcomes
            .pop_front()
            .unwrap_or(ExecutionOutcome::OtherFailure(Some(1)))
    }

    fn relaunch_elevated(&mut self, extra_args: &[OsString]) -> Result<(), LaunchError> {
        if self.relaunch_refused {
            return Err(LaunchError::ElevationRequestFailed(
                "user declined the consent prompt".to_string(),
            ));
        }
        self.relaunches
            .push(build_relaunch_args(self.original_args.clone(), extra_args));
        Ok(())
    }

    fn record_error(&mut self, message: &str, detail: &str) {
        self.errors.push((message.to_string(), detail.to_string()));
    }
}

fn plain_renderer() -> TerminalRenderer {
    TerminalRenderer::from_style(OutputStyle::Plain)
}

fn os_args(values: &[&str]) -> Vec<OsString> {
    values.iter().map(OsString::from).collect()
}

#[test]
fn successful_install_provisions_once_and_exits_zero() {
    let mut backend = FakeBackend::new(false, &[]).with_exit_codes(&[0]);

    let exit = backend.run();

    assert_eq!(exit, LaunchExit::Completed);
    assert_eq!(exit.exit_code(), 0);
    assert_eq!(backend.provision_spawns, 1);
    assert_eq!(backend.installer_spawns, 1);
    assert!(backend.relaunches.is_empty());
    assert!(backend.removed_environments.is_empty());
}

#[test]
fn existing_environment_skips_base_lookup_and_provisioning() {
    let mut backend = FakeBackend::new(false, &[]).with_exit_codes(&[0]);
    backend.environment_present = true;

    let exit = backend.run();

    assert_eq!(exit, LaunchExit::Completed);
    assert_eq!(backend.base_lookups, 0);
    assert_eq!(backend.provision_spawns, 0);
    assert_eq!(backend.installer_spawns, 1);
}

#[test]
fn three_transient_failures_then_success_retries_in_place() {
    let mut backend = FakeBackend::new(false, &[]).with_exit_codes(&[99, 99, 99, 0]);

    let exit = backend.run();

    assert_eq!(exit, LaunchExit::Completed);
    assert_eq!(backend.installer_spawns, 4);
    assert_eq!(backend.provision_spawns, 1);
    assert!(backend.relaunches.is_empty());
    assert!(backend.removed_environments.is_empty());
}

#[test]
fn fourth_consecutive_transient_failure_escalates() {
    let mut backend = FakeBackend::new(false, &["--config", "repo.json"])
        .with_exit_codes(&[99, 99, 99, 99]);

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Relaunched {
            reset_environment: false
        }
    );
    assert_eq!(backend.installer_spawns, 4);
    assert_eq!(backend.relaunches, vec![os_args(&["--config", "repo.json"])]);
}

#[test]
fn non_transient_failure_escalates_on_first_occurrence() {
    let mut backend = FakeBackend::new(false, &[]).with_exit_codes(&[2]);

    let exit = backend.run();

    assert_eq!(exit.exit_code(), 0);
    assert_eq!(backend.installer_spawns, 1);
    assert_eq!(backend.relaunches.len(), 1);
}

#[test]
fn launch_failure_escalates_like_other_failures() {
    let mut backend = FakeBackend::new(false, &[]);
    backend
        .installer_outcomes
        .push_back(ExecutionOutcome::LaunchFailure("no such file".to_string()));

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Relaunched {
            reset_environment: false
        }
    );
    assert_eq!(backend.installer_spawns, 1);
}

#[test]
fn failure_while_unelevated_relaunches_with_original_arguments() {
    let mut backend =
        FakeBackend::new(false, &["--config", "repo.json"]).with_exit_codes(&[1]);

    let exit = backend.run();

    assert_eq!(exit.exit_code(), 0);
    assert_eq!(backend.relaunches, vec![os_args(&["--config", "repo.json"])]);
    assert!(backend.errors.is_empty());
}

#[test]
fn failure_while_elevated_relaunches_with_delete_flag() {
    let mut backend =
        FakeBackend::new(true, &["--config", "repo.json"]).with_exit_codes(&[1]);

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Relaunched {
            reset_environment: true
        }
    );
    assert_eq!(
        backend.relaunches,
        vec![os_args(&["--config", "repo.json", DELETE_ENVIRONMENT_FLAG])]
    );
    assert!(backend.removed_environments.is_empty());
}

#[test]
fn failure_after_reset_while_elevated_is_fatal() {
    let mut backend =
        FakeBackend::new(true, &[DELETE_ENVIRONMENT_FLAG]).with_exit_codes(&[1]);

    let exit = backend.run();

    assert_eq!(exit.exit_code(), 1);
    assert!(matches!(exit, LaunchExit::Failed { .. }));
    assert!(backend.relaunches.is_empty());
    assert_eq!(
        backend.removed_environments,
        vec![PathBuf::from("env")],
        "only the startup reset may touch the environment"
    );
    assert_eq!(backend.errors.len(), 1);
    assert!(backend.errors[0].0.contains("giving up"));
    assert!(backend.errors[0].1.contains("exit code 1"));
}

#[test]
fn delete_flag_resets_environment_before_provisioning() {
    let mut backend = FakeBackend::new(true, &[DELETE_ENVIRONMENT_FLAG]).with_exit_codes(&[0]);
    backend.environment_present = true;

    let exit = backend.run();

    assert_eq!(exit, LaunchExit::Completed);
    assert_eq!(backend.removed_environments, vec![PathBuf::from("env")]);
    assert_eq!(backend.provision_spawns, 1);
}

#[test]
fn persistent_failure_stops_after_exactly_two_relaunches() {
    let mut process_args: Vec<OsString> = Vec::new();
    let mut elevated = false;
    let mut relaunch_count = 0;

    let final_exit = loop {
        let args = process_args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        let arg_refs = args.iter().map(String::as_str).collect::<Vec<_>>();
        let mut backend = FakeBackend::new(elevated, &arg_refs).with_exit_codes(&[1, 1, 1, 1]);

        let exit = backend.run();
        if let LaunchExit::Relaunched { .. } = exit {
            relaunch_count += 1;
            assert!(relaunch_count <= 2, "escalation must be capped");
            process_args = backend.relaunches.pop().expect("relaunch must be recorded");
            elevated = true;
            continue;
        }
        break exit;
    };

    assert_eq!(relaunch_count, 2);
    assert_eq!(process_args, os_args(&[DELETE_ENVIRONMENT_FLAG]));
    assert_eq!(final_exit.exit_code(), 1);
}

#[test]
fn retry_budget_restarts_in_each_relaunched_process() {
    let mut first = FakeBackend::new(false, &[]).with_exit_codes(&[99, 99, 99, 99]);
    assert_eq!(first.run().exit_code(), 0);
    assert_eq!(first.installer_spawns, 4);

    let mut second = FakeBackend::new(true, &[]).with_exit_codes(&[99, 99, 99, 0]);
    assert_eq!(second.run(), LaunchExit::Completed);
    assert_eq!(second.installer_spawns, 4);
}

#[test]
fn config_error_while_unelevated_relaunches_without_reset() {
    let mut backend = FakeBackend::new(false, &[]);
    backend.config_error = Some("failed to read launcher config: repo.json".to_string());

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Relaunched {
            reset_environment: false
        }
    );
    assert_eq!(backend.relaunches, vec![Vec::<OsString>::new()]);
    assert_eq!(backend.installer_spawns, 0);
}

#[test]
fn config_error_while_elevated_is_logged_and_fatal() {
    let mut backend = FakeBackend::new(true, &[]);
    backend.config_error = Some("invalid launcher config: repo.json".to_string());

    let exit = backend.run();

    assert_eq!(exit.exit_code(), 1);
    assert!(backend.relaunches.is_empty());
    assert_eq!(
        backend.errors,
        vec![(
            "failed to load launcher config".to_string(),
            "invalid launcher config: repo.json".to_string()
        )]
    );
}

#[test]
fn provision_failure_while_unelevated_requests_reset() {
    let mut backend = FakeBackend::new(false, &["--log-dir", "logs"]);
    backend.provision_fails = true;

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Relaunched {
            reset_environment: true
        }
    );
    assert_eq!(
        backend.relaunches,
        vec![os_args(&["--log-dir", "logs", DELETE_ENVIRONMENT_FLAG])]
    );
    assert_eq!(backend.provision_spawns, 1);
    assert_eq!(backend.installer_spawns, 0);
}

#[test]
fn environment_failure_does_not_duplicate_delete_flag() {
    let mut backend = FakeBackend::new(false, &[DELETE_ENVIRONMENT_FLAG]);
    backend.probe_fails = true;

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Relaunched {
            reset_environment: true
        }
    );
    assert_eq!(backend.relaunches, vec![os_args(&[DELETE_ENVIRONMENT_FLAG])]);
}

#[test]
fn probe_failure_never_triggers_creation() {
    let mut backend = FakeBackend::new(true, &[]);
    backend.probe_fails = true;

    let exit = backend.run();

    assert_eq!(exit.exit_code(), 1);
    assert_eq!(backend.provision_spawns, 0);
    assert_eq!(backend.base_lookups, 0);
    assert_eq!(backend.errors.len(), 1);
    assert!(backend.errors[0].1.contains("denied"));
}

#[test]
fn missing_base_interpreter_while_elevated_is_fatal() {
    let mut backend = FakeBackend::new(true, &[]);
    backend.base_interpreter_missing = true;

    let exit = backend.run();

    assert_eq!(
        exit,
        LaunchExit::Failed {
            message: "failed to locate base interpreter".to_string()
        }
    );
    assert_eq!(backend.provision_spawns, 0);
    assert!(backend.errors[0].1.contains("no executable named 'python'"));
}

#[test]
fn refused_elevation_request_is_logged_and_exits_non_zero() {
    let mut backend = FakeBackend::new(false, &[]).with_exit_codes(&[1]);
    backend.relaunch_refused = true;

    let exit = backend.run();

    assert_eq!(exit.exit_code(), 1);
    assert!(backend.relaunches.is_empty());
    assert_eq!(backend.errors.len(), 1);
    assert_eq!(backend.errors[0].0, "failed to relaunch elevated");
    assert!(backend.errors[0].1.contains("user declined the consent prompt"));
}

#[test]
fn cli_defaults_match_launcher_layout() {
    let cli = Cli::try_parse_from(["launchpad"]).expect("defaults must parse");
    assert_eq!(cli.config, PathBuf::from("repo.json"));
    assert_eq!(cli.log_dir, PathBuf::from("logs"));
    assert!(!cli.delete_venv);
}

#[test]
fn cli_accepts_delete_flag_and_alias() {
    let cli = Cli::try_parse_from(["launchpad", DELETE_ENVIRONMENT_FLAG])
        .expect("delete flag must parse");
    assert!(cli.delete_venv);

    let cli = Cli::try_parse_from(["launchpad", "--delete-environment"])
        .expect("alias must parse");
    assert!(cli.delete_venv);
}

#[test]
fn cli_rejects_value_for_delete_flag() {
    assert!(Cli::try_parse_from(["launchpad", "--delete-venv=yes"]).is_err());
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "installer finished"),
        "installer finished"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "installer finished"),
        "[OK] installer finished"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "restarting elevated"),
        "[WARN] restarting elevated"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "err", "giving up"),
        "[ERR] giving up"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "step", "base interpreter: python"),
        "[..] base interpreter: python"
    );
}

#[test]
fn format_elapsed_pads_milliseconds() {
    assert_eq!(format_elapsed(Duration::from_millis(1_005)), "1.005s");
    assert_eq!(format_elapsed(Duration::from_secs(12)), "12.000s");
}

#[test]
fn spinner_summary_is_reported_in_plain_output() {
    assert_eq!(
        render_spinner_summary(OutputStyle::Plain, "install", Duration::from_millis(2_250)),
        "install complete in 2.250s"
    );
}

#[test]
fn describe_exit_reports_relaunch_and_reset() {
    let error_log = Path::new("logs").join("launcher-error.log");
    assert_eq!(
        describe_exit(
            &LaunchExit::Relaunched {
                reset_environment: true
            },
            &error_log
        ),
        "handed over to elevated launcher, environment will be recreated"
    );
    assert_eq!(
        describe_exit(
            &LaunchExit::Relaunched {
                reset_environment: false
            },
            &error_log
        ),
        "handed over to elevated launcher"
    );
    assert_eq!(exit_status(&LaunchExit::Completed), "ok");
}

#[test]
fn describe_exit_points_failures_at_error_log() {
    let error_log = Path::new("logs").join("launcher-error.log");
    let exit = LaunchExit::Failed {
        message: "failed to relaunch elevated".to_string(),
    };
    assert_eq!(exit_status(&exit), "err");
    assert_eq!(
        describe_exit(&exit, &error_log),
        format!(
            "failed to relaunch elevated, details in {}",
            error_log.display()
        )
    );
}
