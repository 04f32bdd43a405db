//! Kernel registry manager and its error taxonomy.
//!
//! # Responsibility
//! - CRUD over the per-user kernel directory tree.
//! - Translate filesystem and descriptor failures into semantic errors.
//!
//! # Invariants
//! - Directory name equals kernel name; uniqueness comes from the filesystem.
//! - Every mutating operation touches exactly one kernel directory, except
//!   `purge` and `initialize` which apply the same rule per entry.
//! - No locking: concurrent invocations race and the last writer wins.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod kernel_registry;

pub use kernel_registry::{KernelIter, KernelListing, KernelRegistry};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug)]
pub enum RegistryError {
    /// No virtual environment is activated in this shell.
    EnvironmentNotActive,
    /// A virtual environment is active where the base interpreter is required.
    EnvironmentActive(PathBuf),
    /// The kernel back-end package could not be installed.
    Install { kernel: String, detail: String },
    /// A kernel with this name is already registered.
    AlreadyExists(String),
    /// No kernel matches the given name or index.
    NotFound(String),
    /// The environment name leaves no valid kernel name after sanitizing.
    InvalidName(String),
    /// The environment's interpreter executable does not exist.
    InterpreterNotFound(PathBuf),
    /// A `kernel.json` is unreadable as a kernel descriptor.
    Descriptor { path: PathBuf, reason: String },
    /// The registry directory tree cannot be read or written.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EnvironmentNotActive => "environment_not_active",
            Self::EnvironmentActive(_) => "environment_active",
            Self::Install { .. } => "install_failed",
            Self::AlreadyExists(_) => "already_exists",
            Self::NotFound(_) => "not_found",
            Self::InvalidName(_) => "invalid_name",
            Self::InterpreterNotFound(_) => "interpreter_not_found",
            Self::Descriptor { .. } => "invalid_descriptor",
            Self::Io { .. } => "registry_io",
        }
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvironmentNotActive => {
                write!(f, "no virtual environment is active; activate one first")
            }
            Self::EnvironmentActive(root) => write!(
                f,
                "virtual environment `{}` is active; deactivate it first",
                root.display()
            ),
            Self::Install { kernel, detail } => {
                write!(f, "cannot install the kernel back-end for `{kernel}`: {detail}")
            }
            Self::AlreadyExists(name) => write!(f, "kernel already registered: {name}"),
            Self::NotFound(selector) => write!(f, "kernel not found: {selector}"),
            Self::InvalidName(raw) => {
                write!(f, "cannot derive a kernel name from `{raw}`")
            }
            Self::InterpreterNotFound(path) => {
                write!(f, "interpreter does not exist: {}", path.display())
            }
            Self::Descriptor { path, reason } => {
                write!(f, "invalid kernel descriptor {}: {reason}", path.display())
            }
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RegistryError;
    use std::error::Error;
    use std::path::PathBuf;

    #[test]
    fn io_errors_expose_source_and_path() {
        let err = RegistryError::io(
            "/tmp/kernels",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("/tmp/kernels"));
        assert_eq!(err.code(), "registry_io");
    }

    #[test]
    fn semantic_errors_have_no_source() {
        let err = RegistryError::InterpreterNotFound(PathBuf::from("/env/bin/python"));
        assert!(err.source().is_none());
        assert!(err.to_string().contains("/env/bin/python"));
    }
}
