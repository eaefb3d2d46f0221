//! Sandbox policy constraining where package operations may read and write.
//!
//! The default policy carries the process-wide constants: only destinations
//! under `docs/` are writable, `canonical`, `locked` and `deprecated`
//! directories are off limits anywhere below that root, and the document
//! lifecycle authority files can never be overwritten. Sources must live
//! under the archive's `payload/` tree.
//!
//! Loosening any of these is a code change. The policy is a plain value
//! handed to the orchestrator so tests can exercise alternate sandboxes
//! without touching shared state.

use std::collections::BTreeSet;

/// Destination prefix under which writes are allowed.
pub const ALLOWED_DEST_PREFIX: &str = "docs/";

/// Source prefix every copy operation must read from.
pub const PAYLOAD_PREFIX: &str = "payload/";

/// Directory names that may not appear inside a destination path.
pub const FORBIDDEN_DIRS: [&str; 3] = ["canonical", "locked", "deprecated"];

/// Destination files that packages may never overwrite.
pub const FORBIDDEN_FILES: [&str; 2] = [
    "docs/document_lifecycle_v1.json",
    "docs/DOCUMENT_LIFECYCLE_V1.MD",
];

/// The set of path rules applied to every copy operation.
///
/// # Examples
///
/// ```
/// use updates_inbox::sandbox::SandboxPolicy;
///
/// let policy = SandboxPolicy::default();
/// assert_eq!(policy.allowed_prefix(), "docs/");
/// assert!(policy.is_forbidden_dir("canonical"));
/// assert!(policy.is_forbidden_file("docs/document_lifecycle_v1.json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    allowed_prefix: String,
    payload_prefix: String,
    forbidden_dirs: BTreeSet<String>,
    forbidden_files: BTreeSet<String>,
}

impl SandboxPolicy {
    /// Build a policy from explicit rules.
    ///
    /// Prefixes are matched literally against the raw path string, so they
    /// should carry their trailing `/`.
    #[must_use]
    pub fn new<D, F>(
        allowed_prefix: &str,
        payload_prefix: &str,
        forbidden_dirs: D,
        forbidden_files: F,
    ) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            allowed_prefix: allowed_prefix.to_owned(),
            payload_prefix: payload_prefix.to_owned(),
            forbidden_dirs: forbidden_dirs.into_iter().map(Into::into).collect(),
            forbidden_files: forbidden_files.into_iter().map(Into::into).collect(),
        }
    }

    /// Prefix every destination must start with.
    #[must_use]
    pub fn allowed_prefix(&self) -> &str {
        &self.allowed_prefix
    }

    /// Prefix every source must start with.
    #[must_use]
    pub fn payload_prefix(&self) -> &str {
        &self.payload_prefix
    }

    /// Directory name of the payload tree inside a staged archive.
    #[must_use]
    pub fn payload_dir_name(&self) -> &str {
        self.payload_prefix.trim_end_matches('/')
    }

    /// Returns true when `name` may not appear as an interior segment.
    #[must_use]
    pub fn is_forbidden_dir(&self, name: &str) -> bool {
        self.forbidden_dirs.contains(name)
    }

    /// Returns true when `path` is a protected destination file.
    #[must_use]
    pub fn is_forbidden_file(&self, path: &str) -> bool {
        self.forbidden_files.contains(path)
    }
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::new(
            ALLOWED_DEST_PREFIX,
            PAYLOAD_PREFIX,
            FORBIDDEN_DIRS,
            FORBIDDEN_FILES,
        )
    }
}
