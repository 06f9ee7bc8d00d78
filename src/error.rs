//! Error types for crossenv
//!
//! All modules use `CrossenvResult<T>` as their return type. Every fatal
//! error maps to a named stage so the CLI can say where things went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crossenv operations
pub type CrossenvResult<T> = Result<T, CrossenvError>;

/// Exit code used when crossenv fails before the delegated command runs.
///
/// Matches the container engines' own convention for "the engine failed,
/// not your command".
pub const ORCHESTRATOR_FAILURE_EXIT_CODE: u8 = 125;

/// All errors that can occur in crossenv
#[derive(Error, Debug)]
pub enum CrossenvError {
    // Toolchain definition
    #[error("Cannot read toolchain definition {path}: {source}")]
    DefinitionUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Provisioning
    #[error("Failed to provision environment {image}: {reason}")]
    ProvisioningFailed { image: String, reason: String },

    #[error("Failed to write entry-point wrapper {path}: {source}")]
    WrapperWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment built but fingerprint could not be recorded at {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid provisioning transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    // Engine errors
    #[error("No container engine found (looked for: {searched})")]
    EngineNotFound { searched: String },

    #[error("Failed to remove image {image}: {reason}")]
    ImageRemove { image: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CrossenvError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Name of the stage that failed, shown in diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            Self::DefinitionUnreadable { .. } => "definition",
            Self::ProvisioningFailed { .. } | Self::InvalidTransition { .. } => "provision",
            Self::WrapperWrite { .. } => "wrapper",
            Self::PersistFailed { .. } => "persist",
            Self::EngineNotFound { .. } | Self::ImageRemove { .. } => "engine",
            Self::CommandFailed { .. } => "execute",
            Self::ConfigInvalid { .. } | Self::TomlSerialize(_) => "config",
            Self::Io { .. } => "io",
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::DefinitionUnreadable { .. } => {
                Some("Set [toolchain] definition in .crossenv.toml or pass --definition")
            }
            Self::EngineNotFound { .. } => Some("Install docker or podman and make sure it is on PATH"),
            Self::PersistFailed { .. } => {
                Some("The image is usable, but the next run will rebuild it")
            }
            Self::ProvisioningFailed { .. } => Some("Re-run with -vv to see the full build output"),
            _ => None,
        }
    }

    /// Exit code the CLI reports for this error
    pub fn exit_code(&self) -> u8 {
        ORCHESTRATOR_FAILURE_EXIT_CODE
    }
}
