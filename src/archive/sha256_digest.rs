//! SHA-256 digest newtype for manifest provenance.
//!
//! The audit log records the digest of the raw `manifest.json` bytes so a
//! log entry can be tied back to the exact manifest that was applied.

use sha2::{Digest, Sha256};
use std::fmt;

/// A lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use updates_inbox::archive::sha256_digest::Sha256Digest;
///
/// let digest = Sha256Digest::of(b"");
/// assert_eq!(
///     digest.as_str(),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Compute the digest of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
