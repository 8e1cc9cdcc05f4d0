//! Structural fingerprints of job graphs.
//!
//! Two compilations of the same plan must produce byte-identical JSON for the
//! hashed structure; every map on that path is a `BTreeMap`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A blake3 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(*blake3::hash(bytes).as_bytes())
}

/// Hash the JSON encoding of `value`.
pub fn hash_serde<T: Serialize>(value: &T) -> Result<Hash256> {
    Ok(hash_bytes(&serde_json::to_vec(value)?))
}
