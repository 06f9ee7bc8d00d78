//! Fingerprint persistence
//!
//! The stored fingerprint is the commit marker for a provisioned
//! environment: it is written last, and only after the environment and its
//! wrapper exist. Storage goes through `FingerprintBackend` so tests can
//! swap the sidecar file for memory.

use crate::atomic::write_atomic;
use crate::error::{CrossenvError, CrossenvResult};
use crate::fingerprint::digest::{compute_fingerprint, Fingerprint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Raw storage for a single fingerprint record
pub trait FingerprintBackend: Send + Sync {
    /// Read the raw record, `None` if it was never written
    fn load(&self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the record. Readers never observe a partial write.
    fn store(&self, bytes: &[u8]) -> io::Result<()>;

    /// Delete the record. Missing records are not an error.
    fn remove(&self) -> io::Result<()>;

    /// Where the record lives, for diagnostics
    fn location(&self) -> PathBuf;
}

/// Sidecar file next to the toolchain definition
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend that stores the record at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default sidecar path for a definition (`Dockerfile` -> `Dockerfile.fingerprint`)
    pub fn sidecar_for(definition: &Path) -> PathBuf {
        let mut name = definition
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".fingerprint");
        definition.with_file_name(name)
    }

    /// Path of the record
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FingerprintBackend for FileBackend {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, bytes: &[u8]) -> io::Result<()> {
        write_atomic(&self.path, bytes, 0o644)
    }

    fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// In-memory backend for tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<Option<Vec<u8>>>,
    fail_store: bool,
    stores: AtomicUsize,
    loads: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose `store` always fails
    pub fn failing() -> Self {
        Self {
            fail_store: true,
            ..Self::default()
        }
    }

    /// Pre-populate the raw record
    pub fn with_contents(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(bytes.into())),
            ..Self::default()
        }
    }

    /// Number of successful stores
    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Number of loads
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn slot(&self) -> io::Result<std::sync::MutexGuard<'_, Option<Vec<u8>>>> {
        self.data
            .lock()
            .map_err(|_| io::Error::other("memory backend lock poisoned"))
    }
}

impl FingerprintBackend for MemoryBackend {
    fn load(&self) -> io::Result<Option<Vec<u8>>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.slot()?.clone())
    }

    fn store(&self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_store {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "memory backend configured to fail",
            ));
        }
        *self.slot()? = Some(bytes.to_vec());
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self) -> io::Result<()> {
        *self.slot()? = None;
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

/// Persisted fingerprint record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Fingerprint of the definition the environment was built from
    pub fingerprint: Fingerprint,

    /// Image tag that was built
    pub image: String,

    /// When the environment was provisioned
    pub recorded_at: DateTime<Utc>,
}

/// Result of comparing the stored record with the current definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Recorded fingerprint and image both match
    Fresh,
    /// Nothing usable recorded
    Missing,
    /// Definition bytes differ from the recorded build
    DefinitionChanged,
    /// Same definition, but recorded under another image tag
    ImageChanged,
}

impl Freshness {
    /// True unless the environment can be reused as is
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Computes, stores and compares toolchain fingerprints
pub struct FingerprintStore<B: FingerprintBackend> {
    backend: B,
}

impl<B: FingerprintBackend> FingerprintStore<B> {
    /// Create a store over `backend`
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Access the backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the full stored record.
    ///
    /// Unreadable or corrupt records are treated as absent so the next
    /// run rebuilds instead of trusting them.
    pub fn load_record(&self) -> Option<FingerprintRecord> {
        let bytes = match self.backend.load() {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("No fingerprint recorded at {}", self.backend.location().display());
                return None;
            }
            Err(e) => {
                warn!(
                    "Ignoring unreadable fingerprint {}: {}",
                    self.backend.location().display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_slice::<FingerprintRecord>(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    "Ignoring corrupt fingerprint {}: {}",
                    self.backend.location().display(),
                    e
                );
                None
            }
        }
    }

    /// Load the stored fingerprint, if any
    pub fn load_stored_fingerprint(&self) -> Option<Fingerprint> {
        self.load_record().map(|r| r.fingerprint)
    }

    /// True if nothing is stored or the stored fingerprint differs from
    /// the fingerprint of `definition`
    pub fn is_stale(&self, definition: &[u8]) -> bool {
        let current = compute_fingerprint(definition);
        match self.load_stored_fingerprint() {
            Some(stored) if stored == current => {
                debug!("Fingerprint {} unchanged", current.short());
                false
            }
            Some(stored) => {
                debug!(
                    "Fingerprint changed: {} -> {}",
                    stored.short(),
                    current.short()
                );
                true
            }
            None => true,
        }
    }

    /// Compare the stored record against `fingerprint` built as `image`.
    ///
    /// Loads the record once. An environment recorded under another image
    /// tag is stale even when the definition is unchanged.
    pub fn check(&self, fingerprint: &Fingerprint, image: &str) -> Freshness {
        let Some(record) = self.load_record() else {
            return Freshness::Missing;
        };

        if record.fingerprint != *fingerprint {
            debug!(
                "Fingerprint changed: {} -> {}",
                record.fingerprint.short(),
                fingerprint.short()
            );
            Freshness::DefinitionChanged
        } else if record.image != image {
            debug!("Image changed: {} -> {}", record.image, image);
            Freshness::ImageChanged
        } else {
            debug!("Fingerprint {} unchanged", fingerprint.short());
            Freshness::Fresh
        }
    }

    /// Record `fingerprint` as the definition `image` was built from
    pub fn persist(&self, fingerprint: &Fingerprint, image: &str) -> CrossenvResult<()> {
        let record = FingerprintRecord {
            fingerprint: fingerprint.clone(),
            image: image.to_string(),
            recorded_at: Utc::now(),
        };

        let persist_err = |source: io::Error| CrossenvError::PersistFailed {
            path: self.backend.location(),
            source,
        };

        let mut bytes = serde_json::to_vec_pretty(&record).map_err(|e| persist_err(e.into()))?;
        bytes.push(b'\n');

        self.backend.store(&bytes).map_err(persist_err)?;
        debug!(
            "Recorded fingerprint {} at {}",
            fingerprint.short(),
            self.backend.location().display()
        );
        Ok(())
    }

    /// Forget the stored fingerprint, forcing a rebuild next time
    pub fn clear(&self) -> CrossenvResult<()> {
        self.backend.remove().map_err(|e| {
            CrossenvError::io(
                format!("removing fingerprint {}", self.backend.location().display()),
                e,
            )
        })
    }
}
