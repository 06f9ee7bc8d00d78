//! Clean command - forget the provisioned environment

use crate::cli::args::CleanArgs;
use crate::cli::Invocation;
use crate::error::CrossenvResult;
use crate::fingerprint::{FileBackend, FingerprintStore};
use crate::orchestration::create_runtime;
use crate::provision::wrapper;
use console::style;
use tracing::info;

/// Execute the clean command
///
/// Removing the fingerprint first means an interrupted clean still forces
/// the next command to provision.
pub async fn execute(args: CleanArgs, inv: &Invocation) -> CrossenvResult<i32> {
    let toolchain = &inv.config.toolchain;

    let store = FingerprintStore::new(FileBackend::new(toolchain.fingerprint_path()));
    store.clear()?;
    eprintln!(
        "{} Forgot fingerprint {}",
        style("✓").green(),
        store.backend().path().display()
    );

    let wrapper_path = toolchain.wrapper_path();
    if wrapper::remove(&wrapper_path)? {
        eprintln!(
            "{} Removed wrapper {}",
            style("✓").green(),
            wrapper_path.display()
        );
    }

    if args.image {
        let runtime = create_runtime(&inv.config)?;
        info!("Removing image {} via {}", toolchain.image, runtime.runtime_name());
        runtime.remove_image(&toolchain.image).await?;
        eprintln!("{} Removed image {}", style("✓").green(), toolchain.image);
    }

    Ok(0)
}
