/// Exit code an installer uses to ask for an in-place retry with nothing changed.
pub const TRANSIENT_EXIT_CODE: i32 = 99;

/// In-place retries allowed for transient failures within one process lifetime.
pub const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Classified result of one installer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    TransientFailure(i32),
    /// `None` when the child ended without an exit code (killed by a signal).
    OtherFailure(Option<i32>),
    /// The process could not be started at all.
    LaunchFailure(String),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Success => "installer finished successfully".to_string(),
            Self::TransientFailure(code) => {
                format!("installer requested a retry (exit code {code})")
            }
            Self::OtherFailure(Some(code)) => format!("installer failed with exit code {code}"),
            Self::OtherFailure(None) => "installer was terminated without an exit code".to_string(),
            Self::LaunchFailure(reason) => format!("installer could not be started: {reason}"),
        }
    }
}

/// Maps a finished child's exit code onto an outcome. `None` means no code was reported.
pub fn classify_exit_code(code: Option<i32>) -> ExecutionOutcome {
    match code {
        Some(0) => ExecutionOutcome::Success,
        Some(TRANSIENT_EXIT_CODE) => ExecutionOutcome::TransientFailure(TRANSIENT_EXIT_CODE),
        other => ExecutionOutcome::OtherFailure(other),
    }
}

/// Per-process retry bookkeeping. A relaunch always starts from a fresh value; only
/// `environment_reset_requested` crosses the process boundary, via the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryState {
    pub attempt: u32,
    pub elevated: bool,
    pub environment_reset_requested: bool,
}

impl RetryState {
    pub fn new(elevated: bool, environment_reset_requested: bool) -> Self {
        Self {
            attempt: 0,
            elevated,
            environment_reset_requested,
        }
    }

    /// Consumes one in-place retry if the budget allows it.
    pub fn try_consume_retry(&mut self) -> bool {
        if self.attempt < MAX_TRANSIENT_RETRIES {
            self.attempt += 1;
            return true;
        }
        false
    }
}
