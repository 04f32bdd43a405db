//! Kernel registry domain model.
//!
//! # Responsibility
//! - Define the in-memory kernel spec and its `kernel.json` projection.
//! - Own kernel name validation and sanitization rules.
//!
//! # Invariants
//! - A `KernelName` only contains `[a-z0-9._-]` (any case), so it is always a
//!   single safe path component.

pub mod kernel_spec;
