//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::Invocation;
use crate::error::CrossenvResult;

/// Execute the config command
pub async fn execute(args: ConfigArgs, inv: &Invocation) -> CrossenvResult<i32> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(inv)?,
        Some(ConfigAction::Path) => show_path(inv),
    }

    Ok(0)
}

fn show_config(inv: &Invocation) -> CrossenvResult<()> {
    let toml = toml::to_string_pretty(&inv.config)?;
    println!("{}", toml);
    Ok(())
}

fn show_path(inv: &Invocation) {
    println!("{}", inv.config_path.display());
    if let Some(ref local) = inv.local_config {
        println!("{} (local)", local.display());
    }
}
