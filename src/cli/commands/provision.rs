//! Provision command - bring the toolchain environment up to date

use crate::cli::Invocation;
use crate::error::CrossenvResult;
use crate::fingerprint::FingerprintBackend;
use crate::orchestration::create_runtime;
use crate::provision::{Outcome, Provisioned, Provisioner};
use crate::ui::TaskSpinner;
use console::style;
use tracing::debug;

/// Execute the provision command
pub async fn execute(inv: &Invocation) -> CrossenvResult<i32> {
    let runtime = create_runtime(&inv.config)?;
    debug!("Using runtime: {}", runtime.runtime_name());

    let mut provisioner = Provisioner::from_config(runtime.as_ref(), &inv.config, &inv.project_dir);
    let provisioned = ensure(&mut provisioner, inv).await?;

    match provisioned.outcome {
        Outcome::Rebuilt => {}
        Outcome::Reused => eprintln!(
            "{} {} is up to date ({})",
            style("✓").green(),
            style(provisioned.handle.image()).cyan(),
            provisioned.fingerprint.short()
        ),
    }
    eprintln!(
        "  Wrapper: {}",
        provisioner.paths().wrapper.display()
    );

    Ok(0)
}

/// Read the definition and ensure the environment, with progress feedback
pub(crate) async fn ensure<B: FingerprintBackend>(
    provisioner: &mut Provisioner<'_, B>,
    inv: &Invocation,
) -> CrossenvResult<Provisioned> {
    let definition = provisioner.read_definition().await?;

    let plan = provisioner.plan(&definition, inv.rebuild);

    let mut spinner = TaskSpinner::new(&inv.ui);
    if let Some(reason) = plan.rebuild {
        spinner.start(&format!(
            "Building toolchain image {} ({})...",
            provisioner.image(),
            reason
        ));
    }

    let result = provisioner
        .apply(plan, &|line| {
            debug!("build: {}", line);
            spinner.detail(&line);
        })
        .await;

    match result {
        Ok(provisioned) => {
            match provisioned.outcome {
                Outcome::Rebuilt => spinner.stop(&format!(
                    "Toolchain image {} ready ({})",
                    provisioned.handle.image(),
                    provisioned.fingerprint.short()
                )),
                Outcome::Reused => spinner.clear(),
            }
            Ok(provisioned)
        }
        Err(e) => {
            spinner.stop_error(&format!("Provisioning failed at stage '{}'", e.stage()));
            Err(e)
        }
    }
}
