use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use launchpad_core::DEFAULT_CONFIG_FILE;
use launchpad_env::{LogLayout, DEFAULT_LOG_DIR};

mod backend;
mod escalation;
mod render;

use backend::SystemBackend;
use escalation::{run_launcher, LaunchExit};
use render::TerminalRenderer;

#[derive(Parser, Debug)]
#[command(name = "launchpad")]
#[command(about = "Provision an isolated environment and run its installer, escalating on failure", long_about = None)]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
    /// Delete the environment directory before provisioning.
    #[arg(long = "delete-venv", visible_alias = "delete-environment")]
    delete_venv: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let renderer = TerminalRenderer::current();
    renderer.print_section("launchpad");

    let layout = LogLayout::new(cli.log_dir);
    let error_log_path = layout.error_log_path();
    let mut backend = SystemBackend::new(cli.config, layout, renderer);
    let exit = run_launcher(&mut backend, cli.delete_venv, renderer);
    renderer.print_status(exit_status(&exit), &describe_exit(&exit, &error_log_path));
    ExitCode::from(exit.exit_code())
}

fn exit_status(exit: &LaunchExit) -> &'static str {
    match exit {
        LaunchExit::Completed => "ok",
        LaunchExit::Relaunched { .. } => "step",
        LaunchExit::Failed { .. } => "err",
    }
}

fn describe_exit(exit: &LaunchExit, error_log: &Path) -> String {
    match exit {
        LaunchExit::Completed => "launcher finished".to_string(),
        LaunchExit::Relaunched {
            reset_environment: true,
        } => "handed over to elevated launcher, environment will be recreated".to_string(),
        LaunchExit::Relaunched {
            reset_environment: false,
        } => "handed over to elevated launcher".to_string(),
        LaunchExit::Failed { message } => {
            format!("{message}, details in {}", error_log.display())
        }
    }
}

#[cfg(test)]
mod tests;
