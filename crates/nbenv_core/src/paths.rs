//! Per-user locations.
//!
//! Registry resolution order: `$JUPYTER_DATA_DIR/kernels`, then the per-user
//! data directory the notebook server reads on this platform.

use std::ffi::OsString;
use std::path::PathBuf;

/// Subdirectory of the data directory holding one folder per kernel.
pub const KERNELS_DIR_NAME: &str = "kernels";
/// Override the notebook server itself honors.
pub const JUPYTER_DATA_DIR_VAR: &str = "JUPYTER_DATA_DIR";

/// Returns the directory for rotating log files, when the platform has a
/// per-user cache directory.
pub fn default_log_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|cache| cache.join("nbenv").join("logs"))
}

/// Returns the per-user kernel registry root.
///
/// # Errors
/// Returns a message when neither the override nor a platform data
/// directory is available.
pub fn default_kernels_dir() -> Result<PathBuf, String> {
    resolve_kernels_dir(std::env::var_os(JUPYTER_DATA_DIR_VAR), platform_data_dir())
}

fn resolve_kernels_dir(
    override_dir: Option<OsString>,
    platform_dir: Option<PathBuf>,
) -> Result<PathBuf, String> {
    if let Some(dir) = override_dir.filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(dir).join(KERNELS_DIR_NAME));
    }
    platform_dir
        .map(|dir| dir.join(KERNELS_DIR_NAME))
        .ok_or_else(|| {
            format!(
                "cannot locate the notebook data directory on {}; set {JUPYTER_DATA_DIR_VAR}",
                std::env::consts::OS
            )
        })
}

#[cfg(target_os = "macos")]
fn platform_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library").join("Jupyter"))
}

#[cfg(not(target_os = "macos"))]
fn platform_data_dir() -> Option<PathBuf> {
    // XDG_DATA_HOME or ~/.local/share on Linux, roaming AppData on Windows.
    dirs::data_dir().map(|data| data.join("jupyter"))
}
