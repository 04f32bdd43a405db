//! Python environment collaborators.
//!
//! # Responsibility
//! - Detect the active virtual environment and the base interpreter.
//! - Install the kernel back-end package into an environment.
//!
//! # Invariants
//! - The registry only talks to environments through `PythonEnvironment`, so
//!   tests can substitute interpreters and the install step.

use log::{error, info};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

mod system;
mod virtualenv;

pub use system::SystemPython;
pub use virtualenv::{VirtualEnv, VIRTUAL_ENV_VAR};

/// Package that provides `ipykernel_launcher`.
pub const BACKEND_PACKAGE: &str = "ipykernel";

/// Python installation that can be registered as a kernel.
pub trait PythonEnvironment {
    /// Environment root directory.
    fn root(&self) -> &Path;
    /// Interpreter executable the kernel launches.
    fn interpreter(&self) -> &Path;
    /// Raw kernel name; the registry sanitizes it.
    fn kernel_name(&self) -> String;
    /// Label shown in the notebook server.
    fn display_name(&self) -> String;
    /// Makes the kernel back-end importable by `interpreter()`.
    ///
    /// Returns a human-readable reason on failure.
    fn install_backend(&self) -> Result<(), String>;
}

/// Runs `<interpreter> -m pip install ipykernel` with output discarded.
pub fn pip_install_backend(interpreter: &Path) -> Result<(), String> {
    let started_at = Instant::now();
    info!(
        "event=backend_install module=env status=start interpreter={}",
        interpreter.display()
    );

    let status = Command::new(interpreter)
        .args(["-m", "pip", "install", BACKEND_PACKAGE])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    let result = match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!("pip install {BACKEND_PACKAGE} exited with {status}")),
        Err(err) => Err(format!("failed to run pip: {err}")),
    };

    match &result {
        Ok(()) => info!(
            "event=backend_install module=env status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=backend_install module=env status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::pip_install_backend;
    use std::path::Path;

    #[test]
    fn pip_install_reports_missing_interpreter() {
        let err = pip_install_backend(Path::new("/nonexistent/nbenv/bin/python"))
            .expect_err("missing interpreter must fail");
        assert!(err.contains("failed to run pip"));
    }
}
