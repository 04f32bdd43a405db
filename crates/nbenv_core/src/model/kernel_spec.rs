//! Kernel spec model and `kernel.json` descriptor format.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the descriptor inside every kernel directory.
pub const DESCRIPTOR_FILE_NAME: &str = "kernel.json";
/// Module the notebook server runs to start a Python kernel.
pub const KERNEL_LAUNCHER_MODULE: &str = "ipykernel_launcher";
/// Placeholder the notebook server substitutes with its connection file.
pub const CONNECTION_FILE_PLACEHOLDER: &str = "{connection_file}";
/// Language tag written into every descriptor.
pub const KERNEL_LANGUAGE: &str = "python";

static KERNEL_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._\-]+$").expect("kernel name pattern must compile")
});
static INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9._\-]").expect("invalid char pattern must compile"));

/// Validated kernel name, equal to the kernel's directory name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelName(String);

impl KernelName {
    /// Accepts `value` as-is when it only uses `[a-z0-9._-]` (any case).
    ///
    /// Dot-only values are refused since they are not real directories.
    pub fn parse(value: &str) -> Option<Self> {
        if KERNEL_NAME_PATTERN.is_match(value) && !value.chars().all(|c| c == '.') {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    /// Derives a kernel name from an environment directory name.
    ///
    /// The result is lowercase, every disallowed character becomes `_`, and
    /// separators are trimmed from both ends. Returns `None` when nothing
    /// usable is left.
    pub fn sanitize(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        let replaced = INVALID_NAME_CHARS.replace_all(&lowered, "_");
        let trimmed = replaced.trim_matches(|c: char| matches!(c, '.' | '_' | '-'));
        if trimmed.is_empty() {
            return None;
        }
        Self::parse(trimmed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for KernelName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSpec {
    pub name: KernelName,
    pub display_name: String,
    pub interpreter_path: PathBuf,
    pub argv: Vec<String>,
}

impl KernelSpec {
    /// Builds the spec the notebook server needs to launch `interpreter`.
    pub fn for_interpreter(
        name: KernelName,
        display_name: impl Into<String>,
        interpreter: &Path,
    ) -> Self {
        let argv = vec![
            interpreter.to_string_lossy().into_owned(),
            "-m".to_string(),
            KERNEL_LAUNCHER_MODULE.to_string(),
            "-f".to_string(),
            CONNECTION_FILE_PLACEHOLDER.to_string(),
        ];
        Self {
            name,
            display_name: display_name.into(),
            interpreter_path: interpreter.to_path_buf(),
            argv,
        }
    }

    /// Rebuilds a spec from a stored descriptor.
    ///
    /// Fails when the descriptor has no launch command.
    pub fn from_descriptor(name: KernelName, descriptor: KernelDescriptor) -> Result<Self, String> {
        let interpreter = descriptor
            .argv
            .first()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| "argv must name an interpreter".to_string())?;
        Ok(Self {
            name,
            display_name: descriptor.display_name,
            interpreter_path: PathBuf::from(interpreter),
            argv: descriptor.argv,
        })
    }

    pub fn to_descriptor(&self) -> KernelDescriptor {
        KernelDescriptor {
            argv: self.argv.clone(),
            display_name: self.display_name.clone(),
            language: KERNEL_LANGUAGE.to_string(),
        }
    }
}

/// On-disk `kernel.json` shape.
///
/// Keys written by other tools (`env`, `metadata`, ...) are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelDescriptor {
    pub argv: Vec<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    KERNEL_LANGUAGE.to_string()
}

impl KernelDescriptor {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Pretty JSON with two-space indentation and a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

/// Kernel reference accepted by `remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelSelector {
    /// Exact kernel name.
    Name(String),
    /// 1-based position in the name-sorted listing.
    Index(usize),
}

impl FromStr for KernelSelector {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("kernel name or index must not be empty".to_string());
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            // Out-of-range positions can never match a kernel.
            return Ok(Self::Index(trimmed.parse::<usize>().unwrap_or(usize::MAX)));
        }
        Ok(Self::Name(trimmed.to_string()))
    }
}

impl Display for KernelSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// One kernel found in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKernel {
    pub name: KernelName,
    pub path: PathBuf,
    pub spec: KernelSpec,
}
