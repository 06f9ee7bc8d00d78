//! Fingerprint computation
//!
//! Hashes toolchain definition bytes with SHA256. Same bytes = same
//! fingerprint, so any edit to the definition forces a rebuild.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest algorithms a fingerprint can be recorded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// SHA-256 (the only algorithm crossenv computes)
    Sha256,
}

impl DigestAlgorithm {
    /// Identifier used in the text form (`sha256:<hex>`)
    pub fn id(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Length of the hex-encoded digest
    fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Digest of a toolchain definition plus the algorithm that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Algorithm used for `digest`
    pub algorithm: DigestAlgorithm,
    /// Lowercase hex digest
    pub digest: String,
}

impl Fingerprint {
    /// First 12 hex chars, for display
    pub fn short(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algo, digest) = s
            .split_once(':')
            .ok_or_else(|| format!("missing algorithm prefix in '{}'", s))?;

        let algorithm = match algo {
            "sha256" => DigestAlgorithm::Sha256,
            other => return Err(format!("unsupported digest algorithm '{}'", other)),
        };

        if digest.len() != algorithm.hex_len()
            || !digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(format!("malformed {} digest '{}'", algorithm, digest));
        }

        Ok(Self {
            algorithm,
            digest: digest.to_string(),
        })
    }
}

/// Compute the fingerprint of a toolchain definition.
///
/// Pure and deterministic over `definition`.
pub fn compute_fingerprint(definition: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(definition);

    Fingerprint {
        algorithm: DigestAlgorithm::Sha256,
        digest: hex::encode(hasher.finalize()),
    }
}
