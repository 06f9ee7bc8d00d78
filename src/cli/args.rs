//! CLI argument definitions using clap derive

use crate::config::EngineKind;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// crossenv - cached cross-compilation environments
///
/// Runs build commands inside a containerized ARM cross-compilation
/// toolchain, rebuilding the toolchain image only when its definition
/// changes. Unknown subcommands are forwarded to the build tool with the
/// target platform appended, e.g. `crossenv build --release`.
#[derive(Parser, Debug)]
#[command(name = "crossenv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CROSSENV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .crossenv.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Toolchain definition (Dockerfile) to provision from
    #[arg(long, global = true, env = "CROSSENV_DEFINITION")]
    pub definition: Option<PathBuf>,

    /// Container engine to use
    #[arg(long, global = true, value_enum)]
    pub engine: Option<EngineKind>,

    /// Rebuild the environment even if the definition is unchanged
    #[arg(long, global = true)]
    pub rebuild: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the toolchain environment itself
    Env(EnvArgs),

    /// Build tool subcommand to run in the environment (e.g. build, test)
    #[command(external_subcommand)]
    Forward(Vec<String>),
}

/// Arguments for the env command
#[derive(Parser, Debug)]
pub struct EnvArgs {
    /// Environment action
    #[command(subcommand)]
    pub action: EnvAction,
}

/// Environment management actions
#[derive(Subcommand, Debug)]
pub enum EnvAction {
    /// Provision the environment if its definition changed
    Provision,

    /// Show fingerprint and image status
    Status,

    /// Forget the recorded fingerprint and remove the wrapper
    Clean(CleanArgs),

    /// Show configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the clean action
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Also remove the environment image
    #[arg(long)]
    pub image: bool,
}

/// Arguments for the config action
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,

    /// Show configuration file paths
    Path,
}

/// Arguments for the completions action
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
