//! Snapshot Identification
//!
//! Content hash of an HTML snapshot, used to tell whether the document
//! loaded into a rendering context is still the one stored on the POM.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotFingerprint(String);

impl SnapshotFingerprint {
    /// Format: blake3(html)
    pub fn of(html: &str) -> Self {
        let hash = blake3::hash(html.as_bytes());
        Self(hash.to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // short form is enough for logs
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}
