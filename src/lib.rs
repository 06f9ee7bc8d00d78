//! crossenv - cached cross-compilation environments
//!
//! Runs build commands inside a containerized toolchain image, rebuilding
//! the image only when its definition's fingerprint changes.

pub mod atomic;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod orchestration;
pub mod provision;
pub mod ui;

pub use error::{CrossenvError, CrossenvResult};
