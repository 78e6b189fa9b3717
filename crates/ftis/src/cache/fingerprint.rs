use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic cache key: lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of a configuration alone, recorded in whole-stage artifacts.
    pub fn of_config(config_identity: &str) -> Self {
        fingerprint("", config_identity)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Digest of an item identity together with a stage configuration identity.
///
/// Each part is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
pub fn fingerprint(item_identity: &str, config_identity: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    for part in [item_identity, config_identity] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    Fingerprint(format!("{:x}", hasher.finalize()))
}
