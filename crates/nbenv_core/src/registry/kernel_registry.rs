//! Filesystem-backed kernel registry.
//!
//! # Responsibility
//! - Register, list and remove kernels under one injected root directory.
//! - Write descriptors and logos in the layout the notebook server expects.
//!
//! # Invariants
//! - `add` never overwrites an existing kernel directory.
//! - A failed `add` leaves no partially written kernel behind.
//! - Listing has no side effects; a missing root lists as empty.

use super::{RegistryError, RegistryResult};
use crate::env::PythonEnvironment;
use crate::model::kernel_spec::{
    InstalledKernel, KernelDescriptor, KernelName, KernelSelector, KernelSpec,
    DESCRIPTOR_FILE_NAME,
};
use log::{debug, error, info, warn};
use std::fs::{self, ReadDir};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

const LOGO_FILES: &[(&str, &[u8])] = &[
    ("logo-32x32.png", include_bytes!("../../assets/logo-32x32.png")),
    ("logo-64x64.png", include_bytes!("../../assets/logo-64x64.png")),
];

/// Kernel registry rooted at one directory.
#[derive(Debug, Clone)]
pub struct KernelRegistry {
    root: PathBuf,
}

impl KernelRegistry {
    /// Creates a registry over `root`; the directory is created on first `add`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers `env` as a new kernel.
    ///
    /// # Errors
    /// - `InterpreterNotFound` when the interpreter executable is missing.
    /// - `InvalidName` when the environment name sanitizes to nothing.
    /// - `AlreadyExists` when the kernel directory is already present.
    /// - `Install` when the back-end package cannot be installed.
    /// - `Io` when the kernel files cannot be written.
    pub fn add(&self, env: &impl PythonEnvironment) -> RegistryResult<KernelSpec> {
        let started_at = Instant::now();
        info!(
            "event=kernel_add module=registry status=start env_root={}",
            env.root().display()
        );

        let result = self.add_inner(env);
        match &result {
            Ok(spec) => info!(
                "event=kernel_add module=registry status=ok kernel={} duration_ms={}",
                spec.name,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("kernel_add", started_at, err),
        }
        result
    }

    fn add_inner(&self, env: &impl PythonEnvironment) -> RegistryResult<KernelSpec> {
        let name = prepare_kernel_name(env)?;
        let dir = self.kernel_dir(&name);
        if path_exists(&dir)? {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        install_backend(env, &name)?;
        let spec = KernelSpec::for_interpreter(name, env.display_name(), env.interpreter());
        self.write_kernel(&dir, &spec)?;
        Ok(spec)
    }

    /// Lazily yields registered kernels in directory-listing order.
    ///
    /// Entries without a `kernel.json` are skipped. A descriptor that cannot
    /// be read or parsed yields `Descriptor` for that entry only.
    ///
    /// # Errors
    /// Returns `Io` when the registry root exists but cannot be listed.
    pub fn show(&self) -> RegistryResult<KernelIter> {
        Ok(KernelIter {
            dirs: self.kernel_dirs()?,
        })
    }

    /// Returns valid kernels sorted by name.
    ///
    /// This is the listing positional selectors refer to. Broken entries are
    /// skipped with a warning.
    pub fn list_sorted(&self) -> RegistryResult<Vec<InstalledKernel>> {
        self.listing().map(|listing| listing.kernels)
    }

    /// Same as [`list_sorted`](Self::list_sorted), also counting the broken
    /// entries it skipped in the same directory pass.
    pub fn listing(&self) -> RegistryResult<KernelListing> {
        let mut listing = KernelListing::default();
        for item in self.show()? {
            match item {
                Ok(kernel) => listing.kernels.push(kernel),
                Err(RegistryError::Descriptor { path, reason }) => {
                    warn!(
                        "event=kernel_list module=registry status=skipped path={} reason={}",
                        path.display(),
                        reason
                    );
                    listing.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        listing
            .kernels
            .sort_by(|left, right| left.name.cmp(&right.name));
        Ok(listing)
    }

    /// Deletes the kernel matching `selector`.
    ///
    /// Names match any kernel directory, even one whose descriptor is
    /// broken; indices are 1-based positions in `list_sorted()`.
    pub fn remove(&self, selector: &KernelSelector) -> RegistryResult<KernelName> {
        let started_at = Instant::now();
        info!(
            "event=kernel_remove module=registry status=start selector={}",
            selector
        );

        let result = self
            .resolve(selector)
            .and_then(|(name, path)| remove_kernel_dir(&path).map(|()| name));
        match &result {
            Ok(name) => info!(
                "event=kernel_remove module=registry status=ok kernel={} duration_ms={}",
                name,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("kernel_remove", started_at, err),
        }
        result
    }

    /// Deletes the kernel registered for `env`.
    pub fn remove_environment(&self, env: &impl PythonEnvironment) -> RegistryResult<KernelName> {
        let raw = env.kernel_name();
        let name = KernelName::sanitize(&raw).ok_or(RegistryError::InvalidName(raw))?;
        self.remove(&KernelSelector::Name(name.to_string()))
    }

    /// Deletes kernels whose descriptor is unusable or whose interpreter is
    /// no longer an executable file. Returns the removed names.
    pub fn purge(&self) -> RegistryResult<Vec<KernelName>> {
        let started_at = Instant::now();
        info!("event=kernel_purge module=registry status=start");

        let result = self.purge_inner();
        match &result {
            Ok(removed) => info!(
                "event=kernel_purge module=registry status=ok removed={} duration_ms={}",
                removed.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("kernel_purge", started_at, err),
        }
        result
    }

    fn purge_inner(&self) -> RegistryResult<Vec<KernelName>> {
        let mut broken = Vec::new();
        for item in self.kernel_dirs()? {
            let (name, path) = item?;
            if let Some(reason) = broken_reason(&name, &path) {
                debug!(
                    "event=kernel_purge module=registry status=broken kernel={} reason={}",
                    name, reason
                );
                broken.push((name, path));
            }
        }

        let mut removed = Vec::with_capacity(broken.len());
        for (name, path) in broken {
            remove_kernel_dir(&path)?;
            removed.push(name);
        }
        Ok(removed)
    }

    /// Replaces the whole registry with a single kernel for `base`.
    ///
    /// The back-end install runs before anything is deleted, so a failed
    /// install leaves the registry untouched.
    pub fn initialize(&self, base: &impl PythonEnvironment) -> RegistryResult<KernelSpec> {
        let started_at = Instant::now();
        info!(
            "event=registry_initialize module=registry status=start interpreter={}",
            base.interpreter().display()
        );

        let result = self.initialize_inner(base);
        match &result {
            Ok(spec) => info!(
                "event=registry_initialize module=registry status=ok kernel={} duration_ms={}",
                spec.name,
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("registry_initialize", started_at, err),
        }
        result
    }

    fn initialize_inner(&self, base: &impl PythonEnvironment) -> RegistryResult<KernelSpec> {
        let name = prepare_kernel_name(base)?;
        install_backend(base, &name)?;

        if path_exists(&self.root)? {
            remove_kernel_dir(&self.root)?;
        }

        let spec = KernelSpec::for_interpreter(name, base.display_name(), base.interpreter());
        self.write_kernel(&self.kernel_dir(&spec.name), &spec)?;
        Ok(spec)
    }

    fn kernel_dir(&self, name: &KernelName) -> PathBuf {
        self.root.join(name.as_str())
    }

    fn resolve(&self, selector: &KernelSelector) -> RegistryResult<(KernelName, PathBuf)> {
        let not_found = || RegistryError::NotFound(selector.to_string());
        match selector {
            KernelSelector::Name(raw) => {
                let name = KernelName::parse(raw).ok_or_else(not_found)?;
                let path = self.kernel_dir(&name);
                if is_kernel_dir(&path) {
                    Ok((name, path))
                } else {
                    Err(not_found())
                }
            }
            KernelSelector::Index(index) => {
                let position = index.checked_sub(1).ok_or_else(not_found)?;
                self.list_sorted()?
                    .into_iter()
                    .nth(position)
                    .map(|kernel| (kernel.name, kernel.path))
                    .ok_or_else(not_found)
            }
        }
    }

    fn kernel_dirs(&self) -> RegistryResult<KernelDirs> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => Some(entries),
            Err(err) if err.kind() == ErrorKind::NotFound || self.root.is_file() => {
                debug!(
                    "event=kernel_list module=registry status=empty root={}",
                    self.root.display()
                );
                None
            }
            Err(err) => return Err(RegistryError::io(&self.root, err)),
        };
        Ok(KernelDirs {
            root: self.root.clone(),
            entries,
        })
    }

    fn write_kernel(&self, dir: &Path, spec: &KernelSpec) -> RegistryResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| RegistryError::io(&self.root, err))?;
        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(RegistryError::AlreadyExists(spec.name.to_string()));
            }
            Err(err) => return Err(RegistryError::io(dir, err)),
        }

        if let Err(err) = write_kernel_files(dir, spec) {
            if let Err(cleanup_err) = fs::remove_dir_all(dir) {
                warn!(
                    "event=kernel_add module=registry status=cleanup_failed path={} error={}",
                    dir.display(),
                    cleanup_err
                );
            }
            return Err(err);
        }
        Ok(())
    }
}

/// Name-sorted valid kernels plus the number of broken entries left out.
#[derive(Debug, Default)]
pub struct KernelListing {
    pub kernels: Vec<InstalledKernel>,
    pub skipped: usize,
}

/// Lazy iterator returned by [`KernelRegistry::show`].
pub struct KernelIter {
    dirs: KernelDirs,
}

impl Iterator for KernelIter {
    type Item = RegistryResult<InstalledKernel>;

    fn next(&mut self) -> Option<Self::Item> {
        self.dirs
            .next()
            .map(|item| item.and_then(|(name, path)| load_kernel(name, path)))
    }
}

/// Kernel directories (those holding a `kernel.json`) under the root.
struct KernelDirs {
    root: PathBuf,
    entries: Option<ReadDir>,
}

impl Iterator for KernelDirs {
    type Item = RegistryResult<(KernelName, PathBuf)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entries = self.entries.as_mut()?;
        for entry in entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(RegistryError::io(&self.root, err))),
            };
            let path = entry.path();
            if !is_kernel_dir(&path) {
                continue;
            }
            let file_name = entry.file_name();
            match file_name.to_str().and_then(KernelName::parse) {
                Some(name) => return Some(Ok((name, path))),
                None => debug!(
                    "event=kernel_list module=registry status=skipped path={} reason=invalid_name",
                    path.display()
                ),
            }
        }
        None
    }
}

/// A kernel directory is a directory holding a `kernel.json` file.
fn is_kernel_dir(path: &Path) -> bool {
    path.is_dir() && path.join(DESCRIPTOR_FILE_NAME).is_file()
}

fn prepare_kernel_name(env: &impl PythonEnvironment) -> RegistryResult<KernelName> {
    let interpreter = env.interpreter();
    if !interpreter.is_file() {
        return Err(RegistryError::InterpreterNotFound(interpreter.to_path_buf()));
    }
    let raw = env.kernel_name();
    KernelName::sanitize(&raw).ok_or(RegistryError::InvalidName(raw))
}

fn install_backend(env: &impl PythonEnvironment, name: &KernelName) -> RegistryResult<()> {
    env.install_backend()
        .map_err(|detail| RegistryError::Install {
            kernel: name.to_string(),
            detail,
        })
}

fn write_kernel_files(dir: &Path, spec: &KernelSpec) -> RegistryResult<()> {
    let descriptor_path = dir.join(DESCRIPTOR_FILE_NAME);
    let json = spec
        .to_descriptor()
        .to_json()
        .map_err(|err| RegistryError::Descriptor {
            path: descriptor_path.clone(),
            reason: err.to_string(),
        })?;
    fs::write(&descriptor_path, json).map_err(|err| RegistryError::io(&descriptor_path, err))?;

    for (file_name, bytes) in LOGO_FILES {
        let logo_path = dir.join(file_name);
        fs::write(&logo_path, bytes).map_err(|err| RegistryError::io(&logo_path, err))?;
    }
    Ok(())
}

fn load_kernel(name: KernelName, path: PathBuf) -> RegistryResult<InstalledKernel> {
    let descriptor_path = path.join(DESCRIPTOR_FILE_NAME);
    let invalid = |reason: String| RegistryError::Descriptor {
        path: descriptor_path.clone(),
        reason,
    };

    let raw = fs::read_to_string(&descriptor_path).map_err(|err| invalid(err.to_string()))?;
    let descriptor = KernelDescriptor::from_json(&raw).map_err(|err| invalid(err.to_string()))?;
    let spec = KernelSpec::from_descriptor(name.clone(), descriptor).map_err(invalid)?;
    Ok(InstalledKernel { name, path, spec })
}

fn broken_reason(name: &KernelName, path: &Path) -> Option<String> {
    match load_kernel(name.clone(), path.to_path_buf()) {
        Err(err) => Some(err.to_string()),
        Ok(kernel) if !is_executable_file(&kernel.spec.interpreter_path) => Some(format!(
            "interpreter is not executable: {}",
            kernel.spec.interpreter_path.display()
        )),
        Ok(_) => None,
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

fn path_exists(path: &Path) -> RegistryResult<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(RegistryError::io(path, err)),
    }
}

/// Removes a kernel directory. Symlinks are unlinked, never followed.
fn remove_kernel_dir(path: &Path) -> RegistryResult<()> {
    let meta = fs::symlink_metadata(path).map_err(|err| RegistryError::io(path, err))?;
    let removed = if meta.file_type().is_symlink() {
        fs::remove_file(path).or_else(|_| fs::remove_dir(path))
    } else {
        fs::remove_dir_all(path)
    };
    removed.map_err(|err| RegistryError::io(path, err))
}

fn log_failure(event: &str, started_at: Instant, err: &RegistryError) {
    error!(
        "event={} module=registry status=error duration_ms={} error_code={} error={}",
        event,
        started_at.elapsed().as_millis(),
        err.code(),
        err
    );
}

#[cfg(test)]
mod tests {
    use super::{is_executable_file, path_exists, remove_kernel_dir};

    #[test]
    fn path_exists_distinguishes_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(path_exists(dir.path()).unwrap());
        assert!(!path_exists(&dir.path().join("missing")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn executable_check_requires_exec_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("python");
        std::fs::write(&file, b"").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_executable_file(&file));

        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable_file(&file));
        assert!(!is_executable_file(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn removing_symlinked_kernel_keeps_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("kernel.json"), b"{}").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        remove_kernel_dir(&link).unwrap();

        assert!(!link.exists());
        assert!(target.join("kernel.json").is_file());
    }
}
