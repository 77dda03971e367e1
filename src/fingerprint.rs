//! Content fingerprints used to decide whether a cached unit is still valid.
//!
//! Digests are SHA-256 over the exact bytes that were loaded: UTF-8 bytes for
//! source text, raw bytes for compiled artifacts. They never leave the
//! process, so the algorithm is not a compatibility contract.
use std::fmt;

use sha2::{Digest, Sha256};

use crate::source::SourceContent;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let result = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        Self(out)
    }

    pub fn of_content(content: &SourceContent) -> Self {
        Self::of(content.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_string();
        write!(f, "ContentDigest({})", &hex[..12])
    }
}

#[cfg(test)]
mod fingerprint_test;
