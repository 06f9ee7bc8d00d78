//! Forward command - run a build tool subcommand inside the environment

use crate::cli::Invocation;
use crate::config::ToolchainConfig;
use crate::error::CrossenvResult;
use crate::orchestration::create_runtime;
use crate::provision::Provisioner;
use tracing::{debug, info};

/// Execute a forwarded subcommand; returns the delegated exit code
pub async fn execute(args: Vec<String>, inv: &Invocation) -> CrossenvResult<i32> {
    let runtime = create_runtime(&inv.config)?;
    debug!("Using runtime: {}", runtime.runtime_name());

    let mut provisioner = Provisioner::from_config(runtime.as_ref(), &inv.config, &inv.project_dir);
    let provisioned = super::provision::ensure(&mut provisioner, inv).await?;

    let (command, command_args) = forward_command(&inv.config.toolchain, &args);
    info!("Running {} {}", command, command_args.join(" "));

    provisioner
        .run(&provisioned.handle, &command, &command_args)
        .await
}

/// Build the delegated command line.
///
/// `<build_tool> <subcommand> --target <target> <rest...>`; everything after
/// the subcommand is passed through verbatim.
pub fn forward_command(toolchain: &ToolchainConfig, args: &[String]) -> (String, Vec<String>) {
    let mut command_args = Vec::with_capacity(args.len() + 2);

    let rest = match args.split_first() {
        Some((subcommand, rest)) => {
            command_args.push(subcommand.clone());
            rest
        }
        None => &[],
    };

    command_args.push("--target".to_string());
    command_args.push(toolchain.target.clone());
    command_args.extend(rest.iter().cloned());

    (toolchain.build_tool.clone(), command_args)
}
