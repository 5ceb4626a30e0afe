mod config;
mod error;
mod outcome;

pub use config::{
    LauncherConfig, DEFAULT_CONFIG_FILE, DEFAULT_INSTALLER_SCRIPT, DEFAULT_INTERPRETER_ROOT,
};
pub use error::LaunchError;
pub use outcome::{
    classify_exit_code, ExecutionOutcome, RetryState, MAX_TRANSIENT_RETRIES, TRANSIENT_EXIT_CODE,
};
