//! Command dispatch against one registry.
//!
//! # Responsibility
//! - Run exactly one `Command` per invocation.
//! - Render results on the output stream and hints on the error stream.
//!
//! # Invariants
//! - Every failure surfaces as one `AppError`; nothing here exits the process.

use crate::cli::Command;
use nbenv_core::{
    KernelRegistry, PythonEnvironment, RegistryError, SystemPython, VirtualEnv,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::path::PathBuf;

/// Collaborators resolved once at startup.
pub struct AppContext {
    pub registry: KernelRegistry,
    pub active_env: Option<VirtualEnv>,
    pub base_python: Option<SystemPython>,
}

#[derive(Debug)]
pub enum AppError {
    Registry(RegistryError),
    Output(std::io::Error),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registry(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "cannot write output: {err}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Registry(err) => Some(err),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Output(value)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Runs `command`, writing user-facing lines to `out` and hints to `err`.
pub fn run(
    command: Command,
    ctx: &AppContext,
    out: &mut impl Write,
    err: &mut impl Write,
) -> AppResult<()> {
    match command {
        Command::Add => {
            let env = active_env(ctx)?;
            let spec = ctx.registry.add(env)?;
            writeln!(
                out,
                "added kernel: {} --> {}",
                spec.name,
                spec.interpreter_path.display()
            )?;
        }
        Command::Show => show(ctx, out, err)?,
        Command::Remove(selector) => {
            let removed = match selector {
                Some(selector) => ctx.registry.remove(&selector)?,
                None => ctx.registry.remove_environment(active_env(ctx)?)?,
            };
            writeln!(out, "removed kernel: {removed}")?;
        }
        Command::Purge => {
            let removed = ctx.registry.purge()?;
            for name in &removed {
                writeln!(out, "removed broken kernel: {name}")?;
            }
        }
        Command::Initialize => {
            if let Some(env) = &ctx.active_env {
                return Err(RegistryError::EnvironmentActive(env.root().to_path_buf()).into());
            }
            let base = ctx
                .base_python
                .as_ref()
                .ok_or_else(|| RegistryError::InterpreterNotFound(PathBuf::from("python3")))?;
            let spec = ctx.registry.initialize(base)?;
            writeln!(
                out,
                "initialized kernels with: {} --> {}",
                spec.name,
                spec.interpreter_path.display()
            )?;
        }
    }
    Ok(())
}

fn active_env(ctx: &AppContext) -> AppResult<&VirtualEnv> {
    ctx.active_env
        .as_ref()
        .ok_or(AppError::Registry(RegistryError::EnvironmentNotActive))
}

fn show(ctx: &AppContext, out: &mut impl Write, err: &mut impl Write) -> AppResult<()> {
    let listing = ctx.registry.listing()?;
    for (position, kernel) in listing.kernels.iter().enumerate() {
        writeln!(
            out,
            "{}. {} --> {} ({})",
            position + 1,
            kernel.name,
            kernel.spec.display_name,
            kernel.path.display()
        )?;
    }

    if listing.skipped > 0 {
        writeln!(
            err,
            "warning: {} kernel(s) have unreadable descriptors; run `nbenv --purge` to remove them",
            listing.skipped
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run, AppContext, AppError};
    use crate::cli::Command;
    use nbenv_core::{KernelRegistry, KernelSelector, RegistryError, VirtualEnv};
    use std::fs;
    use std::path::Path;

    fn context(root: &Path, active_env: Option<VirtualEnv>) -> AppContext {
        AppContext {
            registry: KernelRegistry::new(root.join("kernels")),
            active_env,
            base_python: None,
        }
    }

    fn write_kernel(ctx: &AppContext, name: &str, interpreter: &str) {
        let dir = ctx.registry.root().join(name);
        fs::create_dir_all(&dir).unwrap();
        let descriptor = format!(
            r#"{{"argv": ["{interpreter}", "-m", "ipykernel_launcher"], "display_name": "Python ({name})", "language": "python"}}"#
        );
        fs::write(dir.join("kernel.json"), descriptor).unwrap();
    }

    fn run_captured(command: Command, ctx: &AppContext) -> (Result<(), AppError>, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run(command, ctx, &mut out, &mut err);
        (
            result,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn show_on_empty_registry_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);

        let (result, out, err) = run_captured(Command::Show, &ctx);
        result.unwrap();
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    #[test]
    fn show_lists_sorted_entries_with_indices_and_flags_broken_ones() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);
        write_kernel(&ctx, "beta", "/envs/beta/bin/python");
        write_kernel(&ctx, "alpha", "/envs/alpha/bin/python");
        let broken = ctx.registry.root().join("zeta");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("kernel.json"), "oops").unwrap();

        let (result, out, err) = run_captured(Command::Show, &ctx);
        result.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1. alpha --> Python (alpha)"));
        assert!(lines[1].starts_with("2. beta --> Python (beta)"));
        assert!(err.contains("--purge"));
    }

    #[cfg(unix)]
    #[test]
    fn show_on_unlistable_registry_fails_with_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);
        let root = ctx.registry.root().to_path_buf();
        std::os::unix::fs::symlink(&root, &root).unwrap();

        let (result, out, _err) = run_captured(Command::Show, &ctx);
        assert!(matches!(
            result,
            Err(AppError::Registry(RegistryError::Io { .. }))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn add_without_active_environment_fails_and_leaves_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);

        let (result, out, _) = run_captured(Command::Add, &ctx);
        assert!(matches!(
            result,
            Err(AppError::Registry(RegistryError::EnvironmentNotActive))
        ));
        assert!(out.is_empty());
        assert!(!ctx.registry.root().exists());
    }

    #[test]
    fn remove_first_index_removes_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);
        write_kernel(&ctx, "beta", "/envs/beta/bin/python");
        write_kernel(&ctx, "alpha", "/envs/alpha/bin/python");

        let (result, out, _) =
            run_captured(Command::Remove(Some(KernelSelector::Index(1))), &ctx);
        result.unwrap();
        assert_eq!(out, "removed kernel: alpha\n");
        assert!(!ctx.registry.root().join("alpha").exists());
        assert!(ctx.registry.root().join("beta").exists());
    }

    #[test]
    fn remove_unknown_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);

        let (result, _, _) = run_captured(
            Command::Remove(Some(KernelSelector::Name("ghost".to_string()))),
            &ctx,
        );
        assert!(matches!(
            result,
            Err(AppError::Registry(RegistryError::NotFound(_)))
        ));
    }

    #[test]
    fn remove_without_value_targets_active_environment() {
        let dir = tempfile::tempdir().unwrap();
        let env = VirtualEnv::from_root(dir.path().join("envs").join("science"));
        let ctx = context(dir.path(), Some(env));
        write_kernel(&ctx, "science", "/envs/science/bin/python");
        write_kernel(&ctx, "other", "/envs/other/bin/python");

        let (result, out, _) = run_captured(Command::Remove(None), &ctx);
        result.unwrap();
        assert_eq!(out, "removed kernel: science\n");
        assert!(ctx.registry.root().join("other").exists());
    }

    #[test]
    fn remove_without_value_requires_active_environment() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);

        let (result, _, _) = run_captured(Command::Remove(None), &ctx);
        assert!(matches!(
            result,
            Err(AppError::Registry(RegistryError::EnvironmentNotActive))
        ));
    }

    #[test]
    fn purge_reports_removed_kernels() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);
        write_kernel(&ctx, "vanished", "/nonexistent/nbenv/bin/python");

        let (result, out, _) = run_captured(Command::Purge, &ctx);
        result.unwrap();
        assert_eq!(out, "removed broken kernel: vanished\n");
        assert!(!ctx.registry.root().join("vanished").exists());
    }

    #[test]
    fn initialize_is_refused_inside_active_environment() {
        let dir = tempfile::tempdir().unwrap();
        let env = VirtualEnv::from_root(dir.path().join("envs").join("active"));
        let ctx = context(dir.path(), Some(env));
        write_kernel(&ctx, "keep", "/envs/keep/bin/python");

        let (result, _, _) = run_captured(Command::Initialize, &ctx);
        assert!(matches!(
            result,
            Err(AppError::Registry(RegistryError::EnvironmentActive(_)))
        ));
        assert!(ctx.registry.root().join("keep").exists());
    }

    #[test]
    fn initialize_without_base_interpreter_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), None);

        let (result, _, _) = run_captured(Command::Initialize, &ctx);
        assert!(matches!(
            result,
            Err(AppError::Registry(RegistryError::InterpreterNotFound(_)))
        ));
    }
}
