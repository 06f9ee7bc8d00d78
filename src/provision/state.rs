//! Provisioning state machine

use crate::error::{CrossenvError, CrossenvResult};
use std::fmt;

/// Where an `ensure_environment` call currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Freshness not yet checked
    Unknown,
    /// Building the environment, regenerating the wrapper, recording the fingerprint
    Provisioning,
    /// Environment valid and usable
    Ready,
    /// Provisioning failed; terminal for this invocation
    Failed,
}

impl ProvisionState {
    /// State name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn advance(self, next: Self) -> CrossenvResult<Self> {
        let allowed = matches!(
            (self, next),
            (Self::Unknown, Self::Provisioning)
                | (Self::Unknown, Self::Ready)
                | (Self::Provisioning, Self::Ready)
                | (Self::Provisioning, Self::Failed)
        );

        if allowed {
            Ok(next)
        } else {
            Err(CrossenvError::InvalidTransition {
                from: self.name(),
                to: next.name(),
            })
        }
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
