//! CLI command implementations
//!
//! Every command returns the exit code the process should report.

pub mod clean;
pub mod completions;
pub mod config;
pub mod forward;
pub mod provision;
pub mod status;

pub use clean::execute as clean;
pub use completions::execute as completions;
pub use config::execute as config;
pub use forward::execute as forward;
pub use provision::execute as provision;
pub use status::execute as status;
