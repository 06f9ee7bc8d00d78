//! Configuration management for crossenv

pub mod schema;

pub use schema::{Config, EngineConfig, EngineKind, GeneralConfig, ToolchainConfig, TtyMode};

use crate::error::{CrossenvError, CrossenvResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the project-local config file
pub const LOCAL_CONFIG_NAME: &str = ".crossenv.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crossenv")
            .join("config.toml")
    }

    /// Walk up from `start` looking for a `.crossenv.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Load the global configuration, using defaults if it does not exist
    pub async fn load(&self) -> CrossenvResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> CrossenvResult<Config> {
        let table = read_table(path).await?;
        table.try_into::<Config>().map_err(|e| CrossenvError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with an optional local override merged on top.
    ///
    /// Keys in the local file win. Relative toolchain paths resolve against
    /// the local file's directory (the project root).
    pub async fn load_merged(&self, local: Option<&Path>) -> CrossenvResult<Config> {
        let Some(local_path) = local else {
            return self.load().await;
        };

        let mut merged = if self.config_path.exists() {
            read_table(&self.config_path).await?
        } else {
            toml::Table::new()
        };
        merge_tables(&mut merged, read_table(local_path).await?);

        let mut config = merged
            .try_into::<Config>()
            .map_err(|e| CrossenvError::ConfigInvalid {
                path: local_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if let Some(root) = local_path.parent() {
            config.toolchain.rebase(root);
        }
        debug!("Merged local config from {}", local_path.display());
        Ok(config)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_table(path: &Path) -> CrossenvResult<toml::Table> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| CrossenvError::io(format!("reading config from {}", path.display()), e))?;

    content
        .parse::<toml::Table>()
        .map_err(|e| CrossenvError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`; nested tables merge, other values replace
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}
