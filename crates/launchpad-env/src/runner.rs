use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use launchpad_core::{classify_exit_code, ExecutionOutcome};

use crate::process::{hide_console_window, wait_for_exit_code};
use crate::DiagnosticLog;

pub fn build_installer_command(interpreter: &Path, script: &Path) -> Command {
    let mut command = Command::new(interpreter);
    command.arg(script);
    hide_console_window(&mut command);
    command
}

pub fn run_installer(interpreter: &Path, script: &Path, sink: &DiagnosticLog) -> ExecutionOutcome {
    run_installer_with_runner(interpreter, script, |command| {
        command.stdout(Stdio::null()).stderr(sink.stdio()?);
        wait_for_exit_code(command)
    })
}

pub fn run_installer_with_runner<RunCommand>(
    interpreter: &Path,
    script: &Path,
    mut run: RunCommand,
) -> ExecutionOutcome
where
    RunCommand: FnMut(&mut Command) -> io::Result<Option<i32>>,
{
    let mut command = build_installer_command(interpreter, script);
    match run(&mut command) {
        Ok(code) => classify_exit_code(code),
        Err(err) => ExecutionOutcome::LaunchFailure(format!("{}: {err}", interpreter.display())),
    }
}
