//! Docker / Podman container engine
//!
//! Implements `EnvironmentRuntime` by shelling out to the engine CLI.
//! Images are built from the toolchain definition and commands run in
//! throwaway containers with the project mounted at the configured workdir.

use crate::config::{EngineConfig, TtyMode};
use crate::error::{CrossenvError, CrossenvResult};
use crate::orchestration::process::run_inherited;
use crate::orchestration::runtime::{BuildRequest, EnvironmentHandle, EnvironmentRuntime, ExecRequest};
use crate::orchestration::{build_error_output, stream_child_output};
use async_trait::async_trait;
use std::io::IsTerminal;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supported engine CLIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFlavor {
    Docker,
    Podman,
}

impl EngineFlavor {
    /// Executable name
    pub fn program(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Docker => "Docker",
            Self::Podman => "Podman",
        }
    }
}

/// Container runtime backed by the docker or podman CLI
pub struct ContainerEngine {
    flavor: EngineFlavor,
    config: EngineConfig,
}

impl ContainerEngine {
    /// Create an engine of `flavor` with `config`
    pub fn new(flavor: EngineFlavor, config: EngineConfig) -> Self {
        Self { flavor, config }
    }

    /// Execute an engine command and capture its output
    async fn exec(&self, args: &[&str]) -> CrossenvResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.flavor.program(), args);

        Command::new(self.flavor.program())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                CrossenvError::command_failed(format!("{} {:?}", self.flavor.program(), args), e)
            })
    }

    /// Arguments for `build`
    fn build_args(&self, request: &BuildRequest) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-t".to_string(),
            request.image.clone(),
            "-f".to_string(),
            request.definition.display().to_string(),
        ];

        for (key, value) in &self.config.build_args {
            args.push("--build-arg".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(request.context.display().to_string());
        args
    }

    /// Arguments for `run`, ending with the delegated command
    fn run_args(&self, handle: &EnvironmentHandle, request: &ExecRequest, tty: bool) -> Vec<String> {
        let mut args: Vec<String> = ["run", "--rm", "--init", "-i"]
            .into_iter()
            .map(String::from)
            .collect();

        if tty {
            args.push("-t".to_string());
        }

        args.extend(self.user_args(&request.project_dir));
        args.extend(self.passthrough_options());

        args.push("-v".to_string());
        args.push(format!(
            "{}:{}",
            request.project_dir.display(),
            self.config.workdir
        ));
        args.push("-w".to_string());
        args.push(self.config.workdir.clone());

        args.push(handle.image().to_string());
        args.push(request.command.clone());
        args.extend(request.args.iter().cloned());
        args
    }

    /// Environment variables and user-supplied run arguments
    fn passthrough_options(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.config.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.extend(self.config.run_args.iter().cloned());
        args
    }

    /// Run as the owner of the project directory so build outputs match it
    fn user_args(&self, project_dir: &Path) -> Vec<String> {
        match self.flavor {
            EngineFlavor::Podman => vec!["--userns=keep-id".to_string()],
            EngineFlavor::Docker => project_owner(project_dir)
                .map(|(uid, gid)| vec!["--user".to_string(), format!("{}:{}", uid, gid)])
                .unwrap_or_default(),
        }
    }

    fn wants_tty(&self) -> bool {
        match self.config.tty {
            TtyMode::Always => true,
            TtyMode::Never => false,
            TtyMode::Auto => std::io::stdin().is_terminal() && std::io::stdout().is_terminal(),
        }
    }
}

#[cfg(unix)]
fn project_owner(project_dir: &Path) -> Option<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;

    match std::fs::metadata(project_dir) {
        Ok(meta) => Some((meta.uid(), meta.gid())),
        Err(e) => {
            debug!("Cannot stat {}: {}; running as image user", project_dir.display(), e);
            None
        }
    }
}

#[cfg(not(unix))]
fn project_owner(_project_dir: &Path) -> Option<(u32, u32)> {
    None
}

/// Quote a word for POSIX sh
pub(crate) fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[async_trait]
impl EnvironmentRuntime for ContainerEngine {
    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CrossenvResult<EnvironmentHandle> {
        let args = self.build_args(request);
        info!("Building environment image: {}", request.image);
        debug!("Running: {} {:?}", self.flavor.program(), args);

        let mut child = Command::new(self.flavor.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CrossenvError::command_failed(format!("{} build", self.flavor.program()), e)
            })?;

        let output = stream_child_output(&mut child, on_output).await;

        let status = child.wait().await.map_err(|e| {
            CrossenvError::command_failed(format!("{} build", self.flavor.program()), e)
        })?;

        if status.success() {
            Ok(EnvironmentHandle::new(&request.image))
        } else {
            Err(CrossenvError::ProvisioningFailed {
                image: request.image.clone(),
                reason: format!(
                    "{} build exited with {}\n{}",
                    self.flavor.program(),
                    status,
                    build_error_output(&output)
                ),
            })
        }
    }

    async fn execute(
        &self,
        handle: &EnvironmentHandle,
        request: &ExecRequest,
    ) -> CrossenvResult<i32> {
        let args = self.run_args(handle, request, self.wants_tty());

        let mut cmd = Command::new(self.flavor.program());
        cmd.args(&args);

        run_inherited(cmd, &format!("{} {:?}", self.flavor.program(), args)).await
    }

    async fn image_exists(&self, image: &str) -> CrossenvResult<bool> {
        let output = self.exec(&["image", "inspect", image]).await?;
        Ok(output.status.success())
    }

    async fn remove_image(&self, image: &str) -> CrossenvResult<()> {
        let output = self.exec(&["image", "rm", image]).await?;

        if output.status.success() {
            return Ok(());
        }

        // Ignore error if the image is already gone
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lowered = stderr.to_lowercase();
        if lowered.contains("no such image") || lowered.contains("image not known") {
            Ok(())
        } else {
            Err(CrossenvError::ImageRemove {
                image: image.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }

    fn wrapper_body(&self, handle: &EnvironmentHandle) -> String {
        let mut lines = Vec::new();

        let tty = match self.config.tty {
            TtyMode::Auto => {
                lines.push("TTY=\"\"".to_string());
                lines.push("if [ -t 0 ] && [ -t 1 ]; then TTY=\"-t\"; fi".to_string());
                " $TTY"
            }
            TtyMode::Always => " -t",
            TtyMode::Never => "",
        };

        let user = match self.flavor {
            EngineFlavor::Docker => " --user \"$(id -u):$(id -g)\"",
            EngineFlavor::Podman => " --userns=keep-id",
        };

        let mut options = String::new();
        for option in self.passthrough_options() {
            options.push(' ');
            options.push_str(&shell_quote(&option));
        }

        let workdir = shell_quote(&self.config.workdir);
        lines.push(format!(
            "exec {program} run --rm --init -i{tty}{user}{options} -v \"$PWD\":{workdir} -w {workdir} {image} \"$@\"",
            program = self.flavor.program(),
            image = shell_quote(handle.image()),
        ));

        lines.join("\n")
    }

    fn runtime_name(&self) -> &'static str {
        self.flavor.name()
    }
}
