use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;
use launchpad_core::{ExecutionOutcome, LaunchError, LauncherConfig, RetryState};
use launchpad_env::{EnvironmentPresence, ProvisionReport};

use crate::render::TerminalRenderer;

/// Value-less flag that makes a fresh process delete the environment before
/// provisioning. It is the only state carried from one process to the next.
pub(crate) const DELETE_ENVIRONMENT_FLAG: &str = "--delete-venv";

/// Everything the state machine needs from the outside world.
pub(crate) trait LaunchBackend {
    fn is_elevated(&mut self) -> bool;
    fn prepare_logs(&mut self) -> Result<()>;
    fn load_config(&mut self) -> Result<LauncherConfig>;
    fn remove_environment(&mut self, path: &Path) -> Result<()>;
    fn probe_environment(&mut self, path: &Path) -> Result<EnvironmentPresence, LaunchError>;
    fn locate_base_interpreter(&mut self, config: &LauncherConfig)
        -> Result<PathBuf, LaunchError>;
    fn ensure_environment(
        &mut self,
        path: &Path,
        base_interpreter: &Path,
    ) -> Result<ProvisionReport, LaunchError>;
    fn locate_environment_interpreter(
        &mut self,
        config: &LauncherConfig,
    ) -> Result<PathBuf, LaunchError>;
    fn resolve_script(&mut self, script: &Path) -> Result<PathBuf>;
    fn run_installer(&mut self, interpreter: &Path, script: &Path) -> ExecutionOutcome;
    /// Fire-and-forget; `extra_args` are appended to this process's own arguments.
    fn relaunch_elevated(&mut self, extra_args: &[OsString]) -> Result<(), LaunchError>;
    fn record_error(&mut self, message: &str, detail: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LaunchState {
    Init,
    Locate,
    Provision {
        base_interpreter: PathBuf,
    },
    LocateInEnvironment,
    Run {
        interpreter: PathBuf,
        script: PathBuf,
    },
    Retry {
        interpreter: PathBuf,
        script: PathBuf,
    },
    Escalate,
    ResetAndEscalate,
    Fatal {
        message: String,
        detail: String,
    },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LaunchExit {
    Completed,
    /// An elevated copy was requested; it owns the rest of the work.
    Relaunched {
        reset_environment: bool,
    },
    Failed {
        message: String,
    },
}

impl LaunchExit {
    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            Self::Completed | Self::Relaunched { .. } => 0,
            Self::Failed { .. } => 1,
        }
    }
}

/// A failed startup step, routed through the same escalation decision as a failed
/// installer run.
#[derive(Debug, Clone)]
struct StepFailure {
    message: String,
    detail: String,
    touches_environment: bool,
}

impl StepFailure {
    fn new(message: &str, err: impl std::fmt::Display, touches_environment: bool) -> Self {
        Self {
            message: message.to_string(),
            detail: format!("{err:#}"),
            touches_environment,
        }
    }
}

pub(crate) struct EscalationMachine<'a, B: LaunchBackend> {
    backend: &'a mut B,
    renderer: TerminalRenderer,
    retry: RetryState,
    config: Option<LauncherConfig>,
}

pub(crate) fn run_launcher<B: LaunchBackend>(
    backend: &mut B,
    environment_reset_requested: bool,
    renderer: TerminalRenderer,
) -> LaunchExit {
    let elevated = backend.is_elevated();
    renderer.print_status("step", &format!("elevated: {elevated}"));
    let mut machine = EscalationMachine {
        backend,
        renderer,
        retry: RetryState::new(elevated, environment_reset_requested),
        config: None,
    };
    machine.run()
}

impl<B: LaunchBackend> EscalationMachine<'_, B> {
    fn run(&mut self) -> LaunchExit {
        let mut state = LaunchState::Init;
        loop {
            state = match state {
                LaunchState::Init => match self.initialize() {
                    Ok(()) => LaunchState::Locate,
                    Err(failure) => return self.route_failure(failure),
                },
                LaunchState::Locate => match self.locate() {
                    Ok(next) => next,
                    Err(failure) => return self.route_failure(failure),
                },
                LaunchState::Provision { base_interpreter } => {
                    match self.provision(&base_interpreter) {
                        Ok(()) => LaunchState::LocateInEnvironment,
                        Err(failure) => return self.route_failure(failure),
                    }
                }
                LaunchState::LocateInEnvironment => match self.locate_in_environment() {
                    Ok(next) => next,
                    Err(failure) => return self.route_failure(failure),
                },
                LaunchState::Run {
                    interpreter,
                    script,
                } => {
                    let outcome = self.backend.run_installer(&interpreter, &script);
                    self.after_run(outcome, interpreter, script)
                }
                LaunchState::Retry {
                    interpreter,
                    script,
                } => {
                    self.renderer.print_status(
                        "warn",
                        &format!(
                            "installer asked for a retry, attempt {} of {}",
                            self.retry.attempt,
                            launchpad_core::MAX_TRANSIENT_RETRIES
                        ),
                    );
                    LaunchState::Run {
                        interpreter,
                        script,
                    }
                }
                LaunchState::Escalate => {
                    self.renderer
                        .print_status("warn", "restarting elevated without deleting the environment");
                    return self.relaunch(Vec::new());
                }
                LaunchState::ResetAndEscalate => {
                    self.renderer.print_status(
                        "warn",
                        "install failed even when elevated, restarting to reset the environment",
                    );
                    return self.relaunch(vec![OsString::from(DELETE_ENVIRONMENT_FLAG)]);
                }
                LaunchState::Fatal { message, detail } => return self.fail(&message, &detail),
                LaunchState::Done => {
                    self.renderer.print_status("ok", "installer finished");
                    return LaunchExit::Completed;
                }
            };
        }
    }

    fn initialize(&mut self) -> Result<(), StepFailure> {
        self.backend
            .prepare_logs()
            .map_err(|err| StepFailure::new("failed to prepare log directory", err, false))?;

        let config = self
            .backend
            .load_config()
            .map_err(|err| StepFailure::new("failed to load launcher config", err, false))?;

        if self.retry.environment_reset_requested {
            self.renderer.print_status(
                "step",
                &format!(
                    "deleting environment {}",
                    config.environment_path.display()
                ),
            );
            self.backend
                .remove_environment(&config.environment_path)
                .map_err(|err| StepFailure::new("failed to delete environment", err, true))?;
        }

        self.config = Some(config);
        Ok(())
    }

    fn config(&self) -> Result<&LauncherConfig, StepFailure> {
        self.config.as_ref().ok_or_else(|| {
            StepFailure::new(
                "launcher state error",
                "config used before it was loaded",
                false,
            )
        })
    }

    fn locate(&mut self) -> Result<LaunchState, StepFailure> {
        let config = self.config()?.clone();
        let presence = self
            .backend
            .probe_environment(&config.environment_path)
            .map_err(|err| StepFailure::new("failed to check environment directory", err, true))?;

        if presence == EnvironmentPresence::Present {
            self.renderer.print_status(
                "step",
                "environment already exists, skipping creation",
            );
            return Ok(LaunchState::LocateInEnvironment);
        }

        let base_interpreter = self
            .backend
            .locate_base_interpreter(&config)
            .map_err(|err| StepFailure::new("failed to locate base interpreter", err, false))?;
        self.renderer.print_status(
            "step",
            &format!("base interpreter: {}", base_interpreter.display()),
        );
        Ok(LaunchState::Provision { base_interpreter })
    }

    fn provision(&mut self, base_interpreter: &Path) -> Result<(), StepFailure> {
        let environment_path = self.config()?.environment_path.clone();
        let report = self
            .backend
            .ensure_environment(&environment_path, base_interpreter)
            .map_err(|err| {
                StepFailure::new(
                    "failed to create environment, see installer-stderr.log",
                    err,
                    true,
                )
            })?;

        let message = match report {
            ProvisionReport::Created => format!("created environment {}", environment_path.display()),
            ProvisionReport::AlreadyPresent => {
                format!("environment {} already present", environment_path.display())
            }
        };
        self.renderer.print_status("ok", &message);
        Ok(())
    }

    fn locate_in_environment(&mut self) -> Result<LaunchState, StepFailure> {
        let config = self.config()?.clone();
        let interpreter = self
            .backend
            .locate_environment_interpreter(&config)
            .map_err(|err| {
                StepFailure::new("failed to locate environment interpreter", err, true)
            })?;
        let script = self
            .backend
            .resolve_script(&config.installer_script)
            .map_err(|err| StepFailure::new("failed to resolve installer script path", err, false))?;

        self.renderer
            .print_status("step", &format!("installer script: {}", script.display()));
        self.renderer.print_status(
            "step",
            &format!("environment interpreter: {}", interpreter.display()),
        );
        Ok(LaunchState::Run {
            interpreter,
            script,
        })
    }

    fn after_run(
        &mut self,
        outcome: ExecutionOutcome,
        interpreter: PathBuf,
        script: PathBuf,
    ) -> LaunchState {
        match outcome {
            ExecutionOutcome::Success => LaunchState::Done,
            ExecutionOutcome::TransientFailure(_) if self.retry.try_consume_retry() => {
                LaunchState::Retry {
                    interpreter,
                    script,
                }
            }
            failed => {
                self.renderer.print_status("err", &failed.describe());
                self.escalate_installer_failure(&failed)
            }
        }
    }

    fn escalate_installer_failure(&self, outcome: &ExecutionOutcome) -> LaunchState {
        if !self.retry.elevated {
            return LaunchState::Escalate;
        }
        if !self.retry.environment_reset_requested {
            return LaunchState::ResetAndEscalate;
        }
        LaunchState::Fatal {
            message: "install failed even after resetting the environment, giving up".to_string(),
            detail: outcome.describe(),
        }
    }

    /// Startup failures: relaunch elevated when not already elevated (asking for an
    /// environment reset when the failing step concerns it), otherwise give up.
    fn route_failure(&mut self, failure: StepFailure) -> LaunchExit {
        if self.retry.elevated {
            return self.fail(&failure.message, &failure.detail);
        }

        self.renderer.print_status(
            "err",
            &format!("{}: {}", failure.message, failure.detail),
        );
        let mut extra_args = Vec::new();
        if failure.touches_environment && !self.retry.environment_reset_requested {
            self.renderer
                .print_status("warn", "restarting elevated and deleting the environment");
            extra_args.push(OsString::from(DELETE_ENVIRONMENT_FLAG));
        } else {
            self.renderer
                .print_status("warn", "restarting elevated without deleting the environment");
        }
        self.relaunch(extra_args)
    }

    fn relaunch(&mut self, extra_args: Vec<OsString>) -> LaunchExit {
        match self.backend.relaunch_elevated(&extra_args) {
            Ok(()) => LaunchExit::Relaunched {
                reset_environment: self.retry.environment_reset_requested
                    || !extra_args.is_empty(),
            },
            Err(err) => self.fail("failed to relaunch elevated", &err.to_string()),
        }
    }

    fn fail(&mut self, message: &str, detail: &str) -> LaunchExit {
        self.renderer
            .print_status("err", &format!("{message}: {detail}"));
        self.backend.record_error(message, detail);
        LaunchExit::Failed {
            message: message.to_string(),
        }
    }
}
