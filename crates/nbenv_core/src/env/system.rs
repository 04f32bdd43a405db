//! Base interpreter lookup on `PATH`.

use super::{pip_install_backend, PythonEnvironment};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const INTERPRETER_CANDIDATES: &[&str] = &["python3", "python"];

/// Interpreter found on `PATH` outside any virtual environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPython {
    root: PathBuf,
    interpreter: PathBuf,
}

impl SystemPython {
    /// Searches the process `PATH`.
    pub fn locate() -> Option<Self> {
        let path_var = std::env::var_os("PATH")?;
        Self::locate_in(&path_var)
    }

    /// Searches `path_var` for `python3`, then `python`.
    pub fn locate_in(path_var: &OsStr) -> Option<Self> {
        let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();
        INTERPRETER_CANDIDATES.iter().find_map(|candidate| {
            let file_name = format!("{candidate}{}", std::env::consts::EXE_SUFFIX);
            dirs.iter()
                .map(|dir| dir.join(&file_name))
                .find(|path| path.is_file())
                .map(Self::from_interpreter)
        })
    }

    pub fn from_interpreter(interpreter: impl Into<PathBuf>) -> Self {
        let interpreter = interpreter.into();
        let root = interpreter
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { root, interpreter }
    }
}

impl PythonEnvironment for SystemPython {
    fn root(&self) -> &Path {
        &self.root
    }

    fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn kernel_name(&self) -> String {
        self.interpreter
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn display_name(&self) -> String {
        format!("Python ({})", self.kernel_name())
    }

    fn install_backend(&self) -> Result<(), String> {
        pip_install_backend(&self.interpreter)
    }
}

#[cfg(test)]
mod tests {
    use super::SystemPython;
    use crate::env::PythonEnvironment;
    use std::ffi::OsString;

    #[test]
    fn prefers_python3_across_path_entries() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");
        let suffix = std::env::consts::EXE_SUFFIX;
        std::fs::write(first.path().join(format!("python{suffix}")), b"").expect("write");
        std::fs::write(second.path().join(format!("python3{suffix}")), b"").expect("write");

        let path_var = std::env::join_paths([first.path(), second.path()]).expect("join paths");
        let python = SystemPython::locate_in(&path_var).expect("interpreter found");

        assert_eq!(python.root(), second.path());
        assert_eq!(python.kernel_name(), "python3");
    }

    #[test]
    fn returns_none_when_no_interpreter_is_present() {
        let empty = tempfile::tempdir().expect("temp dir");
        let path_var: OsString = empty.path().as_os_str().to_os_string();
        assert!(SystemPython::locate_in(&path_var).is_none());
    }
}
