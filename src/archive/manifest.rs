//! Manifest schema types for update packages.
//!
//! A package manifest names the package and lists the operations to apply,
//! in order:
//!
//! ```json
//! {
//!   "package_id": "p1",
//!   "ops": [
//!     { "op": "copy", "src": "payload/a.md", "dest": "docs/validated/A.MD" }
//!   ]
//! }
//! ```
//!
//! Operation kinds are a closed, tagged set. Unknown kinds are rejected by
//! the parser rather than skipped.

use serde::Deserialize;

/// A single file copy from the payload into the target tree.
///
/// Both paths are raw manifest strings; they are validated against the
/// sandbox only when the operation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CopyOp {
    /// Path of the source file, relative to the staging root.
    pub src: String,
    /// Path of the destination file, relative to the target root.
    pub dest: String,
}

impl CopyOp {
    /// Convenience constructor.
    #[must_use]
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }
}

/// One manifest operation, tagged by its `op` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    /// Copy one payload file into the target tree.
    Copy(CopyOp),
}

impl Operation {
    /// Every `op` value this build understands.
    pub const KINDS: &'static [&'static str] = &["copy"];
}

/// A decoded package manifest.
///
/// Immutable once parsed; operations keep manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    package_id: String,
    ops: Vec<Operation>,
}

impl Manifest {
    /// Build a manifest from its parts.
    #[must_use]
    pub const fn new(package_id: String, ops: Vec<Operation>) -> Self {
        Self { package_id, ops }
    }

    /// The descriptive package identifier.
    #[must_use]
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Operations in manifest order.
    #[must_use]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }
}
