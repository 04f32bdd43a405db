//! Core logic for registering Python environments as notebook kernels.
//! This crate is the single source of truth for registry invariants.

pub mod env;
pub mod logging;
pub mod model;
pub mod paths;
pub mod registry;

pub use env::{PythonEnvironment, SystemPython, VirtualEnv};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::kernel_spec::{
    InstalledKernel, KernelDescriptor, KernelName, KernelSelector, KernelSpec,
};
pub use paths::{default_kernels_dir, default_log_dir};
pub use registry::{
    KernelIter, KernelListing, KernelRegistry, RegistryError, RegistryResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
