//! Active virtual environment detection.

use super::{pip_install_backend, PythonEnvironment};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Variable the activation script points at the environment root.
pub const VIRTUAL_ENV_VAR: &str = "VIRTUAL_ENV";

/// Virtual environment activated in the current shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    root: PathBuf,
    interpreter: PathBuf,
}

impl VirtualEnv {
    /// Returns the active environment, or `None` when nothing is activated.
    pub fn from_env() -> Option<Self> {
        Self::from_variable(std::env::var_os(VIRTUAL_ENV_VAR))
    }

    /// Interprets a raw `VIRTUAL_ENV` value. Empty values mean inactive.
    pub fn from_variable(value: Option<OsString>) -> Option<Self> {
        let value = value.filter(|raw| !raw.is_empty())?;
        Some(Self::from_root(PathBuf::from(value)))
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let interpreter = interpreter_in(&root);
        Self { root, interpreter }
    }

    fn dir_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(windows)]
fn interpreter_in(root: &Path) -> PathBuf {
    root.join("Scripts").join("python.exe")
}

#[cfg(not(windows))]
fn interpreter_in(root: &Path) -> PathBuf {
    root.join("bin").join("python")
}

impl PythonEnvironment for VirtualEnv {
    fn root(&self) -> &Path {
        &self.root
    }

    fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn kernel_name(&self) -> String {
        self.dir_name()
    }

    fn display_name(&self) -> String {
        format!("Python ({})", self.dir_name())
    }

    fn install_backend(&self) -> Result<(), String> {
        pip_install_backend(&self.interpreter)
    }
}

#[cfg(test)]
mod tests {
    use super::VirtualEnv;
    use crate::env::PythonEnvironment;
    use std::ffi::OsString;
    use std::path::Path;

    #[test]
    fn unset_or_empty_variable_means_inactive() {
        assert!(VirtualEnv::from_variable(None).is_none());
        assert!(VirtualEnv::from_variable(Some(OsString::new())).is_none());
    }

    #[test]
    fn names_come_from_root_directory() {
        let env = VirtualEnv::from_variable(Some(OsString::from("/home/dev/envs/Data-Lab")))
            .expect("active environment");
        assert_eq!(env.root(), Path::new("/home/dev/envs/Data-Lab"));
        assert_eq!(env.kernel_name(), "Data-Lab");
        assert_eq!(env.display_name(), "Python (Data-Lab)");
    }

    #[cfg(not(windows))]
    #[test]
    fn interpreter_lives_in_bin() {
        let env = VirtualEnv::from_root("/srv/venv");
        assert_eq!(env.interpreter(), Path::new("/srv/venv/bin/python"));
    }
}
