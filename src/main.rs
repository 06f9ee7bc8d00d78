//! crossenv - cached cross-compilation environments
//!
//! CLI entry point that loads configuration and dispatches to subcommands.

use clap::Parser;
use console::style;
use crossenv::cli::{exit_status_byte, Cli, Commands, EnvAction, Invocation};
use crossenv::config::{Config, ConfigManager};
use crossenv::error::{CrossenvError, CrossenvResult};
use crossenv::ui::UiContext;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(exit_status_byte(code)),
        Err(e) => {
            eprintln!(
                "{} {}",
                style(format!("Error [{}]:", e.stage())).red().bold(),
                e
            );
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> CrossenvResult<i32> {
    let cli = Cli::parse();

    // Completions don't need config loading
    if let Commands::Env(ref env) = cli.command {
        if let EnvAction::Completions(ref args) = env.action {
            return crossenv::cli::commands::completions(args.shell);
        }
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    let cwd =
        std::env::current_dir().map_err(|e| CrossenvError::io("getting current directory", e))?;

    // Find local config unless --no-local is set
    let local_config = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&cwd)
    };

    let mut config = config_manager.load_merged(local_config.as_deref()).await?;
    apply_overrides(&mut config, &cli);

    init_logging(cli.verbose, &config.general.log_format);
    if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
    } else if let Some(ref path) = local_config {
        debug!("Found local config: {}", path.display());
    }

    let project_dir = local_config
        .as_deref()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or(cwd);
    debug!("Project directory: {}", project_dir.display());

    let inv = Invocation {
        config,
        config_path: config_manager.path().to_path_buf(),
        local_config,
        project_dir,
        rebuild: cli.rebuild,
        ui: UiContext::detect(),
    };

    match cli.command {
        Commands::Forward(args) => crossenv::cli::commands::forward(args, &inv).await,
        Commands::Env(env) => match env.action {
            EnvAction::Provision => crossenv::cli::commands::provision(&inv).await,
            EnvAction::Status => crossenv::cli::commands::status(&inv).await,
            EnvAction::Clean(args) => crossenv::cli::commands::clean(args, &inv).await,
            EnvAction::Config(args) => crossenv::cli::commands::config(args, &inv).await,
            EnvAction::Completions(args) => crossenv::cli::commands::completions(args.shell),
        },
    }
}

/// Command-line flags win over both config files
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref definition) = cli.definition {
        config.toolchain.definition = definition.clone();
    }
    if let Some(engine) = cli.engine {
        config.engine.kind = engine;
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug; RUST_LOG overrides
fn init_logging(verbose: u8, format: &str) {
    let default_level = match verbose {
        0 => "crossenv=warn",
        1 => "crossenv=info",
        _ => "crossenv=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
