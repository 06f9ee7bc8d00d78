//! Environment runtime abstraction
//!
//! The provisioner only ever talks to this trait, so the container engine
//! can be swapped (docker, podman) or faked in tests.

use crate::error::CrossenvResult;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Reference to a provisioned, runnable environment (an image tag)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentHandle {
    image: String,
}

impl EnvironmentHandle {
    /// Create a handle for `image`
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Image tag
    pub fn image(&self) -> &str {
        &self.image
    }
}

impl fmt::Display for EnvironmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.image)
    }
}

/// What to build an environment from
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Toolchain definition file
    pub definition: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Tag to give the result
    pub image: String,
}

/// A command to run inside an environment
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Program to run
    pub command: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
    /// Host directory made available as the working directory
    pub project_dir: PathBuf,
}

/// Abstract build-and-run service
#[async_trait]
pub trait EnvironmentRuntime: Send + Sync {
    /// Build the environment described by `request`.
    ///
    /// Each line of build output is passed to `on_output`.
    async fn build(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> CrossenvResult<EnvironmentHandle>;

    /// Run a command inside the environment with inherited stdio.
    ///
    /// Returns the command's exit code uninterpreted.
    async fn execute(&self, handle: &EnvironmentHandle, request: &ExecRequest)
        -> CrossenvResult<i32>;

    /// Check whether the environment image exists
    async fn image_exists(&self, image: &str) -> CrossenvResult<bool>;

    /// Remove the environment image
    async fn remove_image(&self, image: &str) -> CrossenvResult<()>;

    /// Shell lines that run `"$@"` inside `handle` from the caller's cwd.
    ///
    /// Used as the body of the generated entry-point wrapper.
    fn wrapper_body(&self, handle: &EnvironmentHandle) -> String;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
