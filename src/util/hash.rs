//! Hashing utilities for digests and plan fingerprints.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether `s` looks like a hex-encoded SHA256 digest.
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Check `data` against an expected hex digest (case-insensitive).
pub fn verify_sha256(data: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_bytes(data);
    if !actual.eq_ignore_ascii_case(expected) {
        bail!(
            "sha256 mismatch:\n  expected: {}\n  actual:   {}",
            expected,
            actual
        );
    }
    Ok(())
}

/// A hasher for building fingerprints from multiple components.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    /// Create a new fingerprint builder.
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Add a string component to the fingerprint.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.update(s.as_bytes());
        self.hasher.update(b"\0");
        self
    }

    /// Add a length-prefixed list, so `["a b"]` and `["a", "b"]` differ.
    pub fn update_strs<'a>(&mut self, items: impl IntoIterator<Item = &'a str>) -> &mut Self {
        let items: Vec<&str> = items.into_iter().collect();
        self.hasher.update((items.len() as u64).to_le_bytes());
        for s in items {
            self.update_str(s);
        }
        self
    }

    /// Add a key/value pair.
    pub fn update_pair(&mut self, key: &str, value: &str) -> &mut Self {
        self.update_str(key).update_str(value)
    }

    /// Finalize and return the fingerprint as a hex string.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize and return a short fingerprint (first 16 chars).
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}
