mod fs_utils;
mod layout;
mod locate;
mod logs;
mod privilege;
mod process;
mod provision;
mod runner;

pub use fs_utils::{absolutize, remove_dir_if_exists};
pub use layout::{LogLayout, DEFAULT_LOG_DIR};
pub use locate::{
    interpreter_file_name, locate_base_interpreter, locate_binary, locate_distribution_interpreter,
    locate_interpreter,
};
pub use logs::{current_timestamp, format_error_line, DiagnosticLog, ErrorLog, TIMESTAMP_FORMAT};
#[cfg(unix)]
pub use privilege::{
    build_unix_credential_check, build_unix_elevation_command, UNIX_ELEVATION_PROGRAM,
};
pub use privilege::{
    build_relaunch_args, is_elevated, join_windows_args, quote_windows_arg, relaunch_elevated,
};
pub use provision::{
    build_environment_command, ensure_environment, ensure_environment_with_runner,
    probe_environment, remove_environment, EnvironmentPresence, ProvisionReport,
};
pub use runner::{build_installer_command, run_installer, run_installer_with_runner};
