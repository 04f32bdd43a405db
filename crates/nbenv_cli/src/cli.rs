//! Command-line surface.
//!
//! Flags are parsed once into a [`Command`]; nothing past this module sees
//! raw argument strings.

use clap::Parser;
use nbenv_core::KernelSelector;
use std::path::PathBuf;

/// Manage Python virtual environments on the working notebook server.
#[derive(Debug, Parser)]
#[command(name = "nbenv", version)]
pub struct Args {
    #[command(flatten)]
    pub action: ActionArgs,

    /// Kernel registry directory (defaults to the notebook server's per-user location)
    #[arg(long, env = "NBENV_KERNELS_DIR", value_name = "PATH")]
    pub kernels_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files
    #[arg(long, value_name = "PATH", conflicts_with = "log_stderr")]
    pub log_dir: Option<PathBuf>,

    /// Write log records to stderr instead of log files
    #[arg(long)]
    pub log_stderr: bool,
}

#[derive(Debug, clap::Args)]
#[group(multiple = false)]
pub struct ActionArgs {
    /// Add the active python environment to the notebook server
    #[arg(short, long)]
    pub add: bool,

    /// Show python kernels registered with the notebook server
    #[arg(short, long)]
    pub show: bool,

    /// Remove a kernel by name or by its index in --show; without a value,
    /// remove the active python environment
    #[arg(short, long, value_name = "NAME_OR_INDEX", num_args = 0..=1)]
    pub remove: Option<Option<KernelSelector>>,

    /// Remove kernels whose interpreter no longer exists
    #[arg(short, long)]
    pub purge: bool,

    /// Remove all kernels and register the base python interpreter
    #[arg(short, long)]
    pub initialize: bool,
}

/// One registry operation selected on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add,
    Show,
    /// `None` targets the active environment.
    Remove(Option<KernelSelector>),
    Purge,
    Initialize,
}

impl Args {
    /// Returns the selected operation, or `None` when no action flag was given.
    pub fn selected_command(&self) -> Option<Command> {
        let action = &self.action;
        if action.add {
            Some(Command::Add)
        } else if action.show {
            Some(Command::Show)
        } else if let Some(selector) = &action.remove {
            Some(Command::Remove(selector.clone()))
        } else if action.purge {
            Some(Command::Purge)
        } else if action.initialize {
            Some(Command::Initialize)
        } else {
            None
        }
    }
}
