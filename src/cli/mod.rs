//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, EnvAction};

use crate::config::Config;
use crate::ui::UiContext;
use std::path::PathBuf;

/// Everything a command needs to know about this invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Effective configuration (files merged, CLI overrides applied)
    pub config: Config,
    /// Global config file path
    pub config_path: PathBuf,
    /// Discovered project-local config, if any
    pub local_config: Option<PathBuf>,
    /// Host directory mounted into the environment
    pub project_dir: PathBuf,
    /// Force a rebuild even when the fingerprint is fresh
    pub rebuild: bool,
    /// Terminal capabilities
    pub ui: UiContext,
}

/// Convert a delegated exit code into a process exit status byte.
///
/// Codes outside 0..=255 cannot be represented and are reported as 1 so a
/// failure never wraps around to success.
pub fn exit_status_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
