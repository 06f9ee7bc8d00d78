//! Status command - report fingerprint, engine and image state

use crate::cli::Invocation;
use crate::error::CrossenvResult;
use crate::fingerprint::{compute_fingerprint, FileBackend, FingerprintStore};
use crate::orchestration::create_runtime;
use console::{style, Emoji};
use tokio::fs;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "[FAIL] ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "[WARN] ");

/// Execute the status command
pub async fn execute(inv: &Invocation) -> CrossenvResult<i32> {
    let toolchain = &inv.config.toolchain;

    println!("{}", style("crossenv status").bold().cyan());
    println!();

    println!("{}", style("Toolchain:").bold());
    println!("  Target:     {}", toolchain.target);
    println!("  Build tool: {}", toolchain.build_tool);
    println!("  Image:      {}", toolchain.image);
    println!();

    println!("{}", style("Definition:").bold());
    let store = FingerprintStore::new(FileBackend::new(toolchain.fingerprint_path()));
    let record = store.load_record();

    match fs::read(&toolchain.definition).await {
        Ok(bytes) => {
            let current = compute_fingerprint(&bytes);
            println!("  {}{}", CHECK, toolchain.definition.display());
            println!("  Current:  {}", current);
            match record {
                Some(ref record)
                    if record.fingerprint == current && record.image == toolchain.image =>
                {
                    println!("  Recorded: {}", record.fingerprint);
                    println!(
                        "  {}{} (recorded {})",
                        CHECK,
                        style("Up to date").green(),
                        record.recorded_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                Some(ref record) if record.fingerprint == current => {
                    println!("  Recorded: {} as {}", record.fingerprint, record.image);
                    println!(
                        "  {}{} - next command will rebuild",
                        WARN,
                        style("Image tag changed").yellow()
                    );
                }
                Some(ref record) => {
                    println!("  Recorded: {}", record.fingerprint);
                    println!(
                        "  {}{} - next command will rebuild",
                        WARN,
                        style("Stale").yellow()
                    );
                }
                None => {
                    println!("  Recorded: {}", style("none").dim());
                    println!(
                        "  {}{} - next command will provision",
                        WARN,
                        style("Not provisioned").yellow()
                    );
                }
            }
        }
        Err(e) => {
            println!(
                "  {}{}: {}",
                CROSS,
                toolchain.definition.display(),
                style(e).red()
            );
        }
    }
    println!();

    println!("{}", style("Engine:").bold());
    match create_runtime(&inv.config) {
        Ok(runtime) => {
            println!("  {}{}", CHECK, runtime.runtime_name());
            match runtime.image_exists(&toolchain.image).await {
                Ok(true) => println!("  {}Image present", CHECK),
                Ok(false) => println!("  {}Image not built", WARN),
                Err(e) => println!("  {}Image check failed: {}", CROSS, e),
            }
        }
        Err(e) => {
            println!("  {}{}", CROSS, style(&e).red());
            if let Some(hint) = e.hint() {
                println!("    {}", style(hint).dim());
            }
        }
    }
    println!();

    println!("{}", style("Wrapper:").bold());
    let wrapper = toolchain.wrapper_path();
    if wrapper.exists() {
        println!("  {}{}", CHECK, wrapper.display());
    } else {
        println!("  {}{} (not generated)", WARN, wrapper.display());
    }

    Ok(0)
}
