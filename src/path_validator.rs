//! String-level validation of manifest source and destination paths.
//!
//! Both validators are pure: they never touch the filesystem and every input
//! yields either a [`NormalizedPath`] or a [`Rejected`] reason. Paths are
//! treated as POSIX paths regardless of the host platform, so a backslash is
//! always an error rather than a separator.
//!
//! Rejection messages quote the offending path verbatim because they end up
//! in the audit log `notes`.

use crate::sandbox::SandboxPolicy;
use std::fmt;

/// Which side of a copy operation a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathRole {
    /// A path inside the archive payload.
    Source,
    /// A path inside the target tree.
    Destination,
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("src"),
            Self::Destination => f.write_str("dest"),
        }
    }
}

/// Reason a path failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    /// The path contains a `\`.
    #[error("invalid {role} path (backslashes not allowed): {path}")]
    Backslash {
        /// Source or destination.
        role: PathRole,
        /// The path as written in the manifest.
        path: String,
    },

    /// The path starts at the filesystem root.
    #[error("invalid {role} path (absolute): {path}")]
    Absolute {
        /// Source or destination.
        role: PathRole,
        /// The path as written in the manifest.
        path: String,
    },

    /// The path contains a `..` segment.
    #[error("invalid {role} path (.. not allowed): {path}")]
    ParentTraversal {
        /// Source or destination.
        role: PathRole,
        /// The path as written in the manifest.
        path: String,
    },

    /// The path does not start with the required prefix.
    #[error("invalid {role} path (must start with {prefix}): {path}")]
    OutsidePrefix {
        /// Source or destination.
        role: PathRole,
        /// The prefix the path had to start with.
        prefix: String,
        /// The path as written in the manifest.
        path: String,
    },

    /// The destination names the allow-listed root itself.
    #[error("destination names no file under {prefix}: {path}")]
    NoFileName {
        /// The allow-listed root prefix.
        prefix: String,
        /// The path as written in the manifest.
        path: String,
    },

    /// The destination is a protected file.
    #[error("destination forbidden (protected file): {path}")]
    ForbiddenFile {
        /// The path as written in the manifest.
        path: String,
    },

    /// The destination passes through a forbidden directory.
    #[error("destination forbidden (directory {segment} is off limits): {path}")]
    ForbiddenDir {
        /// The forbidden directory name that matched.
        segment: String,
        /// The path as written in the manifest.
        path: String,
    },
}

impl Rejected {
    /// The offending path, exactly as supplied.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Backslash { path, .. }
            | Self::Absolute { path, .. }
            | Self::ParentTraversal { path, .. }
            | Self::OutsidePrefix { path, .. }
            | Self::NoFileName { path, .. }
            | Self::ForbiddenFile { path }
            | Self::ForbiddenDir { path, .. } => path,
        }
    }
}

/// A validated, slash-delimited relative path.
///
/// Empty and `.` segments are dropped and repeated slashes collapsed, so the
/// value is suitable for joining onto a root directory segment by segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// Return the normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a payload source path.
///
/// # Errors
///
/// Returns [`Rejected`] when the path contains a backslash, is absolute,
/// contains a `..` segment, or does not start with the payload prefix.
///
/// # Examples
///
/// ```
/// use updates_inbox::path_validator::validate_source;
/// use updates_inbox::sandbox::SandboxPolicy;
///
/// let policy = SandboxPolicy::default();
/// let src = validate_source("payload//docs/./a.md", &policy).expect("valid source");
/// assert_eq!(src.as_str(), "payload/docs/a.md");
/// assert!(validate_source("../payload/a.md", &policy).is_err());
/// ```
pub fn validate_source(path: &str, policy: &SandboxPolicy) -> Result<NormalizedPath, Rejected> {
    let segments = structural_segments(path, PathRole::Source)?;
    require_prefix(path, policy.payload_prefix(), PathRole::Source)?;
    Ok(NormalizedPath(segments.join("/")))
}

/// Validate a target-tree destination path.
///
/// # Errors
///
/// Returns [`Rejected`] for the structural failures of [`validate_source`],
/// when the path lies outside the allow-listed root or names no file below
/// it, when its normalized form is a protected file, or when an interior segment (neither the root segment
/// nor the file name) is a forbidden directory.
///
/// # Examples
///
/// ```
/// use updates_inbox::path_validator::validate_dest;
/// use updates_inbox::sandbox::SandboxPolicy;
///
/// let policy = SandboxPolicy::default();
/// assert!(validate_dest("docs/validated/A.MD", &policy).is_ok());
/// assert!(validate_dest("docs/canonical/A.MD", &policy).is_err());
/// ```
pub fn validate_dest(path: &str, policy: &SandboxPolicy) -> Result<NormalizedPath, Rejected> {
    let segments = structural_segments(path, PathRole::Destination)?;
    require_prefix(path, policy.allowed_prefix(), PathRole::Destination)?;
    if segments.len() < 2 {
        return Err(Rejected::NoFileName {
            prefix: policy.allowed_prefix().to_owned(),
            path: path.to_owned(),
        });
    }

    let normalized = segments.join("/");
    if policy.is_forbidden_file(&normalized) {
        return Err(Rejected::ForbiddenFile {
            path: path.to_owned(),
        });
    }

    let interior = segments
        .get(1..segments.len().saturating_sub(1))
        .unwrap_or_default();
    if let Some(segment) = interior.iter().find(|s| policy.is_forbidden_dir(s)) {
        return Err(Rejected::ForbiddenDir {
            segment: (*segment).to_owned(),
            path: path.to_owned(),
        });
    }

    Ok(NormalizedPath(normalized))
}

/// Apply the rules shared by sources and destinations and return the
/// meaningful segments of the path.
fn structural_segments(path: &str, role: PathRole) -> Result<Vec<&str>, Rejected> {
    if path.contains('\\') {
        return Err(Rejected::Backslash {
            role,
            path: path.to_owned(),
        });
    }
    if path.starts_with('/') {
        return Err(Rejected::Absolute {
            role,
            path: path.to_owned(),
        });
    }

    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.contains(&"..") {
        return Err(Rejected::ParentTraversal {
            role,
            path: path.to_owned(),
        });
    }
    Ok(segments)
}

fn require_prefix(path: &str, prefix: &str, role: PathRole) -> Result<(), Rejected> {
    if path.starts_with(prefix) {
        Ok(())
    } else {
        Err(Rejected::OutsidePrefix {
            role,
            prefix: prefix.to_owned(),
            path: path.to_owned(),
        })
    }
}
