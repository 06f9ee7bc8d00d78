//! Configuration schema for crossenv
//!
//! Global configuration lives at `~/.config/crossenv/config.toml`; a
//! project may override it with a `.crossenv.toml` next to its sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Toolchain definition and target
    pub toolchain: ToolchainConfig,

    /// Container engine settings
    pub engine: EngineConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Toolchain definition, image and target platform
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Path to the toolchain definition (Dockerfile)
    pub definition: PathBuf,

    /// Build context directory (defaults to the definition's directory)
    pub context: Option<PathBuf>,

    /// Image tag for the provisioned environment
    pub image: String,

    /// Target triple appended to every forwarded command
    pub target: String,

    /// Build tool invoked inside the environment
    pub build_tool: String,

    /// Fingerprint record path (defaults to `<definition>.fingerprint`)
    pub fingerprint: Option<PathBuf>,

    /// Generated wrapper path (defaults to `crossenv-run.sh` next to the definition)
    pub wrapper: Option<PathBuf>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            definition: PathBuf::from("docker/Dockerfile"),
            context: None,
            image: "crossenv/armv7-toolchain:latest".to_string(),
            target: "armv7-unknown-linux-gnueabihf".to_string(),
            build_tool: "cargo".to_string(),
            fingerprint: None,
            wrapper: None,
        }
    }
}

impl ToolchainConfig {
    /// Directory containing the definition
    fn definition_dir(&self) -> PathBuf {
        match self.definition.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Effective build context
    pub fn context_dir(&self) -> PathBuf {
        self.context.clone().unwrap_or_else(|| self.definition_dir())
    }

    /// Effective fingerprint record path
    pub fn fingerprint_path(&self) -> PathBuf {
        self.fingerprint
            .clone()
            .unwrap_or_else(|| crate::fingerprint::FileBackend::sidecar_for(&self.definition))
    }

    /// Effective wrapper script path
    pub fn wrapper_path(&self) -> PathBuf {
        self.wrapper
            .clone()
            .unwrap_or_else(|| self.definition_dir().join("crossenv-run.sh"))
    }

    /// Resolve relative paths against `base`
    pub(crate) fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.definition);
        if let Some(p) = self.context.as_mut() {
            join(p);
        }
        if let Some(p) = self.fingerprint.as_mut() {
            join(p);
        }
        if let Some(p) = self.wrapper.as_mut() {
            join(p);
        }
    }
}

/// Which container engine to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// First of docker, podman found on PATH
    #[default]
    Auto,
    Docker,
    Podman,
}

/// TTY allocation for delegated commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtyMode {
    /// Allocate a TTY when stdin and stdout are terminals
    #[default]
    Auto,
    Always,
    Never,
}

/// Container engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine to use
    pub kind: EngineKind,

    /// Mount point of the project directory inside the container
    pub workdir: String,

    /// Environment variables passed to delegated commands
    pub env: BTreeMap<String, String>,

    /// Extra arguments for `run`
    pub run_args: Vec<String>,

    /// `--build-arg` values for image builds
    pub build_args: BTreeMap<String, String>,

    /// TTY allocation
    pub tty: TtyMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Auto,
            workdir: "/project".to_string(),
            env: BTreeMap::new(),
            run_args: vec![],
            build_args: BTreeMap::new(),
            tty: TtyMode::Auto,
        }
    }
}
