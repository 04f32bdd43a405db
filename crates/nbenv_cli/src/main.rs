//! `nbenv` entry point.
//!
//! # Responsibility
//! - Resolve configuration and logging before any registry work.
//! - Map every failure to a one-line message and exit status 1.

mod app;
mod cli;

use app::{run, AppContext};
use clap::{CommandFactory, Parser};
use cli::Args;
use log::{error, warn};
use nbenv_core::{
    default_kernels_dir, default_log_dir, default_log_level, init_logging, KernelRegistry,
    LogTarget, SystemPython, VirtualEnv,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_logging(&level, log_target(&args)) {
        eprintln!("warning: logging disabled: {err}");
    }

    let Some(command) = args.selected_command() else {
        let mut help = Args::command();
        if let Err(err) = help.print_help() {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    let kernels_dir = match args.kernels_dir.clone().map_or_else(default_kernels_dir, Ok) {
        Ok(dir) => dir,
        Err(err) => {
            error!("event=config_load module=cli status=error error={}", err);
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let ctx = AppContext {
        registry: KernelRegistry::new(kernels_dir),
        active_env: VirtualEnv::from_env(),
        base_python: SystemPython::locate(),
    };

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    match run(command, &ctx, &mut stdout.lock(), &mut stderr.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            warn!("event=command module=cli status=error error={}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn log_target(args: &Args) -> LogTarget {
    if args.log_stderr {
        return LogTarget::Stderr;
    }
    match args.log_dir.clone().or_else(default_log_dir) {
        Some(dir) => LogTarget::Directory(dir),
        None => LogTarget::Stderr,
    }
}
