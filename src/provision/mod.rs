//! Environment provisioning and delegated execution
//!
//! `Provisioner::ensure_environment` rebuilds the toolchain image only when
//! the definition's fingerprint is stale, then `Provisioner::run` executes
//! the delegated command inside it.
//!
//! # States
//!
//! | From | To | When |
//! |------|----|------|
//! | Unknown | Ready | Fingerprint fresh, environment reused |
//! | Unknown | Provisioning | Fingerprint or image tag stale, or rebuild forced |
//! | Provisioning | Ready | Build, wrapper and fingerprint all written |
//! | Provisioning | Failed | Any provisioning step failed |

mod provisioner;
mod state;
pub mod wrapper;

pub use provisioner::{
    Outcome, ProvisionPaths, ProvisionPlan, Provisioned, Provisioner, RebuildReason,
};
pub use state::ProvisionState;
