//! Generated entry-point wrapper
//!
//! A small sh script bound to the provisioned image so the environment can
//! be used without crossenv, e.g. `docker/crossenv-run.sh cargo test`.
//! Rewritten on every provisioning event.

use crate::atomic::write_atomic;
use crate::error::{CrossenvError, CrossenvResult};
use crate::fingerprint::Fingerprint;
use crate::orchestration::{EnvironmentHandle, EnvironmentRuntime};
use std::path::Path;
use tracing::debug;

/// Render the wrapper script for `handle`
pub fn render(
    runtime: &dyn EnvironmentRuntime,
    handle: &EnvironmentHandle,
    fingerprint: &Fingerprint,
) -> String {
    format!(
        "#!/bin/sh\n\
         # Generated by crossenv {version}. Regenerated whenever the toolchain\n\
         # definition changes; edits will be lost.\n\
         # image: {image}\n\
         # definition: {fingerprint}\n\
         set -e\n\
         {body}\n",
        version = env!("CARGO_PKG_VERSION"),
        image = handle.image(),
        body = runtime.wrapper_body(handle),
    )
}

/// Write the wrapper to `path` atomically with mode 0755
pub fn write(path: &Path, contents: &str) -> CrossenvResult<()> {
    write_atomic(path, contents.as_bytes(), 0o755).map_err(|source| {
        CrossenvError::WrapperWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!("Wrote wrapper {}", path.display());
    Ok(())
}

/// Remove the wrapper if present
pub fn remove(path: &Path) -> CrossenvResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CrossenvError::io(
            format!("removing wrapper {}", path.display()),
            e,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::fingerprint::compute_fingerprint;
    use crate::orchestration::{ContainerEngine, EngineFlavor};
    use tempfile::TempDir;

    #[test]
    fn render_includes_header_and_body() {
        let engine = ContainerEngine::new(EngineFlavor::Docker, EngineConfig::default());
        let handle = EnvironmentHandle::new("crossenv/test:latest");
        let fp = compute_fingerprint(b"FROM scratch\n");

        let script = render(&engine, &handle, &fp);

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("# image: crossenv/test:latest"));
        assert!(script.contains(&format!("# definition: {}", fp)));
        assert!(script.contains("set -e\n"));
        assert!(script.contains("exec docker run"));
        assert!(script.ends_with("\"$@\"\n"));
    }

    #[test]
    fn write_and_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("crossenv-run.sh");

        write(&path, "#!/bin/sh\n").unwrap();
        assert!(path.exists());

        assert!(remove(&path).unwrap());
        assert!(!remove(&path).unwrap());
    }

    #[test]
    fn write_failure_is_wrapper_error() {
        let dir = TempDir::new().unwrap();
        let err = write(&dir.path().join("missing/run.sh"), "x").unwrap_err();
        assert!(matches!(err, CrossenvError::WrapperWrite { .. }));
        assert_eq!(err.stage(), "wrapper");
    }
}
