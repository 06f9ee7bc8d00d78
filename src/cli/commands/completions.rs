//! Completions command - generate shell completions

use crate::cli::args::Cli;
use crate::error::CrossenvResult;
use clap::CommandFactory;
use clap_complete::Shell;

/// Execute the completions command
pub fn execute(shell: Shell) -> CrossenvResult<i32> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "crossenv", &mut std::io::stdout());
    Ok(0)
}
