//! Runtime factory for creating the configured container engine
//!
//! `auto` picks the first engine found on `PATH`, preferring docker.

use crate::config::{Config, EngineKind};
use crate::error::{CrossenvError, CrossenvResult};
use crate::orchestration::engine::{ContainerEngine, EngineFlavor};
use crate::orchestration::runtime::EnvironmentRuntime;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Engines tried by `auto`, in order
const AUTO_ORDER: [EngineFlavor; 2] = [EngineFlavor::Docker, EngineFlavor::Podman];

/// Find `program` in the directories of `path_var`
fn find_in_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Resolve the configured engine kind against the programs on `path_var`
pub fn resolve_flavor(kind: EngineKind, path_var: &OsStr) -> CrossenvResult<EngineFlavor> {
    let candidates: &[EngineFlavor] = match kind {
        EngineKind::Auto => &AUTO_ORDER,
        EngineKind::Docker => &[EngineFlavor::Docker],
        EngineKind::Podman => &[EngineFlavor::Podman],
    };

    for flavor in candidates {
        if let Some(found) = find_in_path(flavor.program(), path_var) {
            debug!("Using {} at {}", flavor.name(), found.display());
            return Ok(*flavor);
        }
    }

    Err(CrossenvError::EngineNotFound {
        searched: candidates
            .iter()
            .map(|f| f.program())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Create the container runtime selected by `config`
pub fn create_runtime(config: &Config) -> CrossenvResult<Box<dyn EnvironmentRuntime>> {
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let flavor = resolve_flavor(config.engine.kind, &path_var)?;
    Ok(Box::new(ContainerEngine::new(flavor, config.engine.clone())))
}
