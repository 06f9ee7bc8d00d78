//! Toolchain definition fingerprints
//!
//! A fingerprint is the SHA256 digest of the toolchain definition bytes.
//! The environment built from a definition is valid exactly when the stored
//! fingerprint matches the one recomputed from the definition on disk.
//!
//! # Persistence
//!
//! | Backend | Location | Use |
//! |---------|----------|-----|
//! | `FileBackend` | `<definition>.fingerprint` | Normal operation |
//! | `MemoryBackend` | in process | Tests |

pub mod digest;
pub mod store;

pub use digest::{compute_fingerprint, DigestAlgorithm, Fingerprint};
pub use store::{
    FileBackend, FingerprintBackend, FingerprintRecord, FingerprintStore, Freshness, MemoryBackend,
};
