//! Terminal feedback for provisioning
//!
//! Spinners only appear on an interactive terminal; in CI the same
//! messages are printed as plain lines. Everything goes to stderr so the
//! delegated command owns stdout.

mod context;
mod progress;

pub use context::UiContext;
pub use progress::TaskSpinner;
