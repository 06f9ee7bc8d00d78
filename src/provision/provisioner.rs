//! Provisioner: rebuild-or-reuse decision and delegated execution

use crate::config::Config;
use crate::error::{CrossenvError, CrossenvResult};
use crate::fingerprint::{
    compute_fingerprint, FileBackend, Fingerprint, FingerprintBackend, FingerprintStore, Freshness,
};
use crate::orchestration::{BuildRequest, EnvironmentHandle, EnvironmentRuntime, ExecRequest};
use crate::provision::state::ProvisionState;
use crate::provision::wrapper;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Whether `ensure_environment` had to rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Definition changed (or rebuild forced); environment rebuilt
    Rebuilt,
    /// Fingerprint matched; existing environment reused
    Reused,
}

/// Why an environment has to be (re)built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// No usable fingerprint recorded
    NotProvisioned,
    /// Definition changed since the last build
    DefinitionChanged,
    /// Image tag changed since the last build
    ImageChanged,
    /// Requested with `--rebuild`
    Forced,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotProvisioned => "not provisioned yet",
            Self::DefinitionChanged => "definition changed",
            Self::ImageChanged => "image tag changed",
            Self::Forced => "rebuild requested",
        };
        f.write_str(text)
    }
}

/// Rebuild-or-reuse decision for one definition
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    /// Fingerprint of the definition
    pub fingerprint: Fingerprint,
    /// `None` when the recorded environment can be reused
    pub rebuild: Option<RebuildReason>,
}

/// Result of a successful `ensure_environment`
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// Handle to run commands in
    pub handle: EnvironmentHandle,
    /// Fingerprint of the definition the environment matches
    pub fingerprint: Fingerprint,
    /// Rebuilt or reused
    pub outcome: Outcome,
}

/// Filesystem locations the provisioner works with
#[derive(Debug, Clone)]
pub struct ProvisionPaths {
    /// Toolchain definition
    pub definition: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Generated entry-point wrapper
    pub wrapper: PathBuf,
    /// Host directory mounted for delegated commands
    pub project_dir: PathBuf,
}

/// Ensures the toolchain environment is current and runs commands in it
pub struct Provisioner<'a, B: FingerprintBackend> {
    runtime: &'a dyn EnvironmentRuntime,
    store: FingerprintStore<B>,
    paths: ProvisionPaths,
    image: String,
    state: ProvisionState,
}

impl<'a> Provisioner<'a, FileBackend> {
    /// Create a provisioner from configuration with the sidecar file store
    pub fn from_config(
        runtime: &'a dyn EnvironmentRuntime,
        config: &Config,
        project_dir: &Path,
    ) -> Self {
        let toolchain = &config.toolchain;
        Self::new(
            runtime,
            FingerprintStore::new(FileBackend::new(toolchain.fingerprint_path())),
            ProvisionPaths {
                definition: toolchain.definition.clone(),
                context: toolchain.context_dir(),
                wrapper: toolchain.wrapper_path(),
                project_dir: project_dir.to_path_buf(),
            },
            toolchain.image.clone(),
        )
    }
}

impl<'a, B: FingerprintBackend> Provisioner<'a, B> {
    /// Create a provisioner over an explicit store
    pub fn new(
        runtime: &'a dyn EnvironmentRuntime,
        store: FingerprintStore<B>,
        paths: ProvisionPaths,
        image: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            store,
            paths,
            image: image.into(),
            state: ProvisionState::Unknown,
        }
    }

    /// State reached by the last `ensure_environment`
    pub fn state(&self) -> ProvisionState {
        self.state
    }

    /// Fingerprint store
    pub fn store(&self) -> &FingerprintStore<B> {
        &self.store
    }

    /// Paths in use
    pub fn paths(&self) -> &ProvisionPaths {
        &self.paths
    }

    /// Image tag environments are built as
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Read the toolchain definition bytes
    pub async fn read_definition(&self) -> CrossenvResult<Vec<u8>> {
        tokio::fs::read(&self.paths.definition)
            .await
            .map_err(|source| CrossenvError::DefinitionUnreadable {
                path: self.paths.definition.clone(),
                source,
            })
    }

    /// Decide whether `definition` needs a rebuild, reading the record once
    pub fn plan(&self, definition: &[u8], force: bool) -> ProvisionPlan {
        let fingerprint = compute_fingerprint(definition);
        let rebuild = match self.store.check(&fingerprint, &self.image) {
            Freshness::Fresh if force => Some(RebuildReason::Forced),
            Freshness::Fresh => None,
            Freshness::Missing => Some(RebuildReason::NotProvisioned),
            Freshness::DefinitionChanged => Some(RebuildReason::DefinitionChanged),
            Freshness::ImageChanged => Some(RebuildReason::ImageChanged),
        };

        ProvisionPlan {
            fingerprint,
            rebuild,
        }
    }

    /// Make sure an environment matching `definition` exists.
    ///
    /// Rebuilds only when the stored record is stale or `force` is set.
    /// A fingerprint is recorded only after the build and wrapper succeed.
    pub async fn ensure_environment(
        &mut self,
        definition: &[u8],
        force: bool,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CrossenvResult<Provisioned> {
        let plan = self.plan(definition, force);
        self.apply(plan, on_output).await
    }

    /// Carry out a plan from `plan`
    pub async fn apply(
        &mut self,
        plan: ProvisionPlan,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CrossenvResult<Provisioned> {
        let mut state = ProvisionState::Unknown;
        self.state = state;

        let ProvisionPlan {
            fingerprint,
            rebuild,
        } = plan;

        let Some(reason) = rebuild else {
            self.state = state.advance(ProvisionState::Ready)?;
            info!(
                "Environment {} is current ({})",
                self.image,
                fingerprint.short()
            );
            return Ok(Provisioned {
                handle: EnvironmentHandle::new(&self.image),
                fingerprint,
                outcome: Outcome::Reused,
            });
        };

        info!("Provisioning {}: {}", self.image, reason);
        state = state.advance(ProvisionState::Provisioning)?;
        self.state = state;

        match self.provision(&fingerprint, on_output).await {
            Ok(handle) => {
                self.state = state.advance(ProvisionState::Ready)?;
                info!("Provisioned {} ({})", handle, fingerprint.short());
                Ok(Provisioned {
                    handle,
                    fingerprint,
                    outcome: Outcome::Rebuilt,
                })
            }
            Err(e) => {
                self.state = state.advance(ProvisionState::Failed)?;
                warn!("Provisioning failed at stage {}", e.stage());
                Err(e)
            }
        }
    }

    /// Build, regenerate the wrapper, then commit the fingerprint
    async fn provision(
        &self,
        fingerprint: &Fingerprint,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CrossenvResult<EnvironmentHandle> {
        let request = BuildRequest {
            definition: self.paths.definition.clone(),
            context: self.paths.context.clone(),
            image: self.image.clone(),
        };

        let handle = self.runtime.build(&request, on_output).await?;

        let script = wrapper::render(self.runtime, &handle, fingerprint);
        wrapper::write(&self.paths.wrapper, &script)?;

        self.store.persist(fingerprint, handle.image())?;
        Ok(handle)
    }

    /// Run `command` with `args` inside the environment; returns its exit code
    pub async fn run(
        &self,
        handle: &EnvironmentHandle,
        command: &str,
        args: &[String],
    ) -> CrossenvResult<i32> {
        let request = ExecRequest {
            command: command.to_string(),
            args: args.to_vec(),
            project_dir: self.paths.project_dir.clone(),
        };

        debug!("Delegating to {}: {} {:?}", handle, command, args);
        let code = self.runtime.execute(handle, &request).await?;
        debug!("Delegated command exited with {}", code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::MemoryBackend;
    use crate::orchestration::process::run_inherited;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Runtime that records builds and runs commands on the host
    #[derive(Default)]
    struct FakeRuntime {
        builds: AtomicUsize,
        fail_build: bool,
    }

    impl FakeRuntime {
        fn failing() -> Self {
            Self {
                fail_build: true,
                ..Self::default()
            }
        }

        fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EnvironmentRuntime for FakeRuntime {
        async fn build(
            &self,
            request: &BuildRequest,
            on_output: &(dyn Fn(String) + Send + Sync),
        ) -> CrossenvResult<EnvironmentHandle> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            on_output(format!("building {}", request.image));
            if self.fail_build {
                return Err(CrossenvError::ProvisioningFailed {
                    image: request.image.clone(),
                    reason: "simulated failure".to_string(),
                });
            }
            Ok(EnvironmentHandle::new(&request.image))
        }

        async fn execute(
            &self,
            _handle: &EnvironmentHandle,
            request: &ExecRequest,
        ) -> CrossenvResult<i32> {
            let mut cmd = tokio::process::Command::new(&request.command);
            cmd.args(&request.args);
            run_inherited(cmd, &request.command).await
        }

        async fn image_exists(&self, _image: &str) -> CrossenvResult<bool> {
            Ok(self.builds() > 0)
        }

        async fn remove_image(&self, _image: &str) -> CrossenvResult<()> {
            Ok(())
        }

        fn wrapper_body(&self, handle: &EnvironmentHandle) -> String {
            format!("exec fake-run {} \"$@\"", handle.image())
        }

        fn runtime_name(&self) -> &'static str {
            "Fake"
        }
    }

    fn paths(dir: &TempDir) -> ProvisionPaths {
        ProvisionPaths {
            definition: dir.path().join("Dockerfile"),
            context: dir.path().to_path_buf(),
            wrapper: dir.path().join("crossenv-run.sh"),
            project_dir: dir.path().to_path_buf(),
        }
    }

    fn provisioner<'a>(
        runtime: &'a FakeRuntime,
        backend: MemoryBackend,
        dir: &TempDir,
    ) -> Provisioner<'a, MemoryBackend> {
        Provisioner::new(
            runtime,
            FingerprintStore::new(backend),
            paths(dir),
            "crossenv/test:latest",
        )
    }

    fn quiet(_: String) {}

    #[tokio::test]
    async fn first_run_provisions_then_fresh() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        assert!(prov.store().is_stale(b"X"));

        let result = prov.ensure_environment(b"X", false, &quiet).await.unwrap();

        assert_eq!(result.outcome, Outcome::Rebuilt);
        assert_eq!(result.handle.image(), "crossenv/test:latest");
        assert_eq!(prov.state(), ProvisionState::Ready);
        assert!(!prov.store().is_stale(b"X"));
        assert!(prov.paths().wrapper.exists());
    }

    #[tokio::test]
    async fn second_call_reuses() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        prov.ensure_environment(b"X", false, &quiet).await.unwrap();
        let second = prov.ensure_environment(b"X", false, &quiet).await.unwrap();

        assert_eq!(second.outcome, Outcome::Reused);
        assert_eq!(runtime.builds(), 1);
        assert_eq!(prov.store().backend().store_count(), 1);
        assert_eq!(prov.state(), ProvisionState::Ready);
    }

    #[tokio::test]
    async fn changed_definition_rebuilds() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        prov.ensure_environment(b"X", false, &quiet).await.unwrap();
        let f1 = prov.store().load_stored_fingerprint().unwrap();

        assert!(prov.store().is_stale(b"Y"));
        let result = prov.ensure_environment(b"Y", false, &quiet).await.unwrap();
        let f2 = prov.store().load_stored_fingerprint().unwrap();

        assert_eq!(result.outcome, Outcome::Rebuilt);
        assert_eq!(runtime.builds(), 2);
        assert_ne!(f1, f2);
        assert_eq!(f2, compute_fingerprint(b"Y"));
    }

    #[tokio::test]
    async fn changed_image_tag_rebuilds() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let record = dir.path().join("Dockerfile.fingerprint");
        let store = || FingerprintStore::new(FileBackend::new(&record));

        let mut old = Provisioner::new(&runtime, store(), paths(&dir), "old:1");
        old.ensure_environment(b"X", false, &quiet).await.unwrap();

        let mut new = Provisioner::new(&runtime, store(), paths(&dir), "new:2");
        let plan = new.plan(b"X", false);
        assert_eq!(plan.rebuild, Some(RebuildReason::ImageChanged));

        let result = new.apply(plan, &quiet).await.unwrap();
        assert_eq!(result.outcome, Outcome::Rebuilt);
        assert_eq!(result.handle.image(), "new:2");
        assert_eq!(runtime.builds(), 2);
        assert_eq!(new.store().load_record().unwrap().image, "new:2");
    }

    #[tokio::test]
    async fn plan_reports_reason() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        assert_eq!(prov.plan(b"X", false).rebuild, Some(RebuildReason::NotProvisioned));
        prov.ensure_environment(b"X", false, &quiet).await.unwrap();

        assert_eq!(prov.plan(b"X", false).rebuild, None);
        assert_eq!(prov.plan(b"X", true).rebuild, Some(RebuildReason::Forced));
        assert_eq!(prov.plan(b"Y", false).rebuild, Some(RebuildReason::DefinitionChanged));
    }

    #[tokio::test]
    async fn corrupt_record_read_once_per_ensure() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::with_contents("not json"), &dir);

        let plan = prov.plan(b"X", false);
        assert_eq!(plan.rebuild, Some(RebuildReason::NotProvisioned));
        prov.apply(plan, &quiet).await.unwrap();

        assert_eq!(prov.store().backend().load_count(), 1);
    }

    #[tokio::test]
    async fn failed_build_records_nothing() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::failing();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        let err = prov
            .ensure_environment(b"X", false, &quiet)
            .await
            .unwrap_err();

        assert!(matches!(err, CrossenvError::ProvisioningFailed { .. }));
        assert_eq!(prov.state(), ProvisionState::Failed);
        assert!(prov.store().load_stored_fingerprint().is_none());
        assert!(prov.store().is_stale(b"X"));
        assert!(!prov.paths().wrapper.exists());

        // Still stale on the next attempt
        let _ = prov.ensure_environment(b"X", false, &quiet).await;
        assert_eq!(runtime.builds(), 2);
    }

    #[tokio::test]
    async fn persist_failure_is_distinct() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::failing(), &dir);

        let err = prov
            .ensure_environment(b"X", false, &quiet)
            .await
            .unwrap_err();

        assert!(matches!(err, CrossenvError::PersistFailed { .. }));
        assert_eq!(err.stage(), "persist");
        assert_eq!(prov.state(), ProvisionState::Failed);
        assert_eq!(runtime.builds(), 1);
        assert!(prov.store().is_stale(b"X"));
    }

    #[tokio::test]
    async fn wrapper_failure_records_nothing() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut paths = paths(&dir);
        paths.wrapper = dir.path().join("missing/crossenv-run.sh");

        let mut prov = Provisioner::new(
            &runtime,
            FingerprintStore::new(MemoryBackend::new()),
            paths,
            "crossenv/test:latest",
        );

        let err = prov
            .ensure_environment(b"X", false, &quiet)
            .await
            .unwrap_err();

        assert!(matches!(err, CrossenvError::WrapperWrite { .. }));
        assert!(prov.store().is_stale(b"X"));
    }

    #[tokio::test]
    async fn forced_rebuild_when_fresh() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        prov.ensure_environment(b"X", false, &quiet).await.unwrap();
        let forced = prov.ensure_environment(b"X", true, &quiet).await.unwrap();

        assert_eq!(forced.outcome, Outcome::Rebuilt);
        assert_eq!(runtime.builds(), 2);
    }

    #[tokio::test]
    async fn wrapper_regenerated_on_rebuild() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        prov.ensure_environment(b"X", false, &quiet).await.unwrap();
        prov.ensure_environment(b"Y", false, &quiet).await.unwrap();

        let script = std::fs::read_to_string(&prov.paths().wrapper).unwrap();
        assert!(script.contains(&compute_fingerprint(b"Y").to_string()));
        assert!(script.contains("exec fake-run crossenv/test:latest \"$@\""));
    }

    #[tokio::test]
    async fn build_output_reaches_callback() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        let lines = std::sync::Mutex::new(Vec::new());
        prov.ensure_environment(b"X", false, &|line| lines.lock().unwrap().push(line))
            .await
            .unwrap();

        assert_eq!(
            lines.lock().unwrap().as_slice(),
            &["building crossenv/test:latest".to_string()]
        );
    }

    #[tokio::test]
    async fn run_passes_exit_codes_through() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let mut prov = provisioner(&runtime, MemoryBackend::new(), &dir);
        let handle = prov
            .ensure_environment(b"X", false, &quiet)
            .await
            .unwrap()
            .handle;

        assert_eq!(prov.run(&handle, "true", &[]).await.unwrap(), 0);
        assert_eq!(prov.run(&handle, "false", &[]).await.unwrap(), 1);

        let args = vec!["-c".to_string(), "exit 7".to_string()];
        assert_eq!(prov.run(&handle, "sh", &args).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn unreadable_definition() {
        let dir = TempDir::new().unwrap();
        let runtime = FakeRuntime::default();
        let prov = provisioner(&runtime, MemoryBackend::new(), &dir);

        let err = prov.read_definition().await.unwrap_err();
        assert!(matches!(err, CrossenvError::DefinitionUnreadable { .. }));
        assert_eq!(err.stage(), "definition");
        assert_eq!(runtime.builds(), 0);
    }

    #[tokio::test]
    async fn from_config_uses_sidecar_store() {
        let dir = TempDir::new().unwrap();
        let definition = dir.path().join("Dockerfile");
        std::fs::write(&definition, "FROM scratch\n").unwrap();

        let mut config = Config::default();
        config.toolchain.definition = definition.clone();

        let runtime = FakeRuntime::default();
        let mut prov = Provisioner::from_config(&runtime, &config, dir.path());

        let bytes = prov.read_definition().await.unwrap();
        prov.ensure_environment(&bytes, false, &quiet).await.unwrap();

        assert!(dir.path().join("Dockerfile.fingerprint").exists());
        assert!(dir.path().join("crossenv-run.sh").exists());
        assert!(!prov.store().is_stale(&bytes));
    }
}
