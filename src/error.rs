//! Error taxonomy for package application.
//!
//! Each component reports through its own narrow error type. They all funnel
//! into [`ApplyError`], whose `Display` text is what lands in an audit
//! record's `notes` and on the operator's terminal.

use crate::archive::extraction::ExtractError;
use crate::archive::manifest_parser::ManifestError;
use crate::audit::LogWriteError;
use crate::config::ConfigError;
use crate::copy_executor::CopyError;
use crate::inbox::InboxError;
use crate::path_validator::Rejected;
use crate::validator::ValidatorError;
use thiserror::Error;

/// Errors that fail an archive or abort a batch.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The archive is unreadable or lacks `manifest.json` or `payload/`.
    #[error("{0}")]
    MalformedArchive(#[from] ExtractError),

    /// The manifest violates its schema.
    #[error("{0}")]
    MalformedManifest(#[from] ManifestError),

    /// A source or destination path escapes the sandbox.
    #[error("{rejected}")]
    PathRejected {
        /// Zero-based index of the offending operation.
        index: usize,
        /// Why the path was refused.
        rejected: Rejected,
    },

    /// A source file named by the manifest is absent from the payload.
    #[error("source file missing: {src}")]
    SourceMissing {
        /// The source path as written in the manifest.
        src: String,
    },

    /// A source file resolves outside the payload root.
    #[error("source file escapes payload/: {src}")]
    SourceEscapesSandbox {
        /// The source path as written in the manifest.
        src: String,
    },

    /// The external validator rejected the updated tree.
    #[error("docs lifecycle validation failed")]
    ExternalValidationFailed,

    /// The external validator did not finish in time.
    #[error("validator {program} timed out after {timeout_secs} seconds")]
    ValidatorTimedOut {
        /// The program that was killed.
        program: String,
        /// The bound that was exceeded.
        timeout_secs: u64,
    },

    /// The external validator could not be run at all.
    #[error("{0}")]
    ValidatorUnavailable(ValidatorError),

    /// The audit record could not be written.
    #[error("audit log write failed: {0}")]
    LogWriteFailed(#[from] LogWriteError),

    /// The inbox could not be listed or an archive could not be moved.
    #[error("{0}")]
    Inbox(#[from] InboxError),

    /// A filesystem operation on the target tree failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl From<CopyError> for ApplyError {
    fn from(err: CopyError) -> Self {
        match err {
            CopyError::InvalidPath { index, rejected } => Self::PathRejected { index, rejected },
            CopyError::SourceMissing { src } => Self::SourceMissing { src },
            CopyError::SourceEscapesSandbox { src } => Self::SourceEscapesSandbox { src },
            CopyError::Write { dest, source } => Self::Io {
                context: format!("failed to write {dest}"),
                source,
            },
        }
    }
}

impl From<ValidatorError> for ApplyError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::TimedOut { program, timeout } => Self::ValidatorTimedOut {
                program,
                timeout_secs: timeout.as_secs(),
            },
            other => Self::ValidatorUnavailable(other),
        }
    }
}

/// Result type alias using [`ApplyError`].
pub type Result<T> = std::result::Result<T, ApplyError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_validator::validate_dest;
    use crate::sandbox::SandboxPolicy;
    use std::time::Duration;

    #[test]
    fn rejected_path_message_carries_the_path() {
        let rejected = validate_dest("docs/canonical/A.MD", &SandboxPolicy::default())
            .expect_err("forbidden dir");
        let err = ApplyError::from(CopyError::InvalidPath { index: 0, rejected });
        assert!(matches!(err, ApplyError::PathRejected { index: 0, .. }));
        assert!(err.to_string().contains("docs/canonical/A.MD"));
    }

    #[test]
    fn write_failure_becomes_io_with_destination() {
        let err = ApplyError::from(CopyError::Write {
            dest: "docs/A.MD".to_owned(),
            source: std::io::Error::other("disk full"),
        });
        assert_eq!(err.to_string(), "failed to write docs/A.MD: disk full");
    }

    #[test]
    fn validator_timeout_is_distinct() {
        let err = ApplyError::from(ValidatorError::TimedOut {
            program: "python3".to_owned(),
            timeout: Duration::from_secs(300),
        });
        assert!(matches!(err, ApplyError::ValidatorTimedOut { timeout_secs: 300, .. }));
        assert_eq!(err.to_string(), "validator python3 timed out after 300 seconds");
    }

    #[test]
    fn validator_spawn_failure_is_unavailable() {
        let err = ApplyError::from(ValidatorError::EmptyCommand);
        assert!(matches!(err, ApplyError::ValidatorUnavailable(_)));
    }

    #[test]
    fn validation_failure_note_is_stable() {
        assert_eq!(
            ApplyError::ExternalValidationFailed.to_string(),
            "docs lifecycle validation failed"
        );
    }

    #[test]
    fn missing_payload_is_malformed_archive() {
        let err = ApplyError::from(ExtractError::MissingPayload {
            dir: "payload".to_owned(),
        });
        assert_eq!(err.to_string(), "missing payload/ directory at archive root");
    }

    #[test]
    fn log_write_failure_names_the_audit_log() {
        let err = ApplyError::from(LogWriteError::NamesExhausted {
            stem: "p1".to_owned(),
            timestamp: "20250212T100000Z".to_owned(),
        });
        assert!(matches!(err, ApplyError::LogWriteFailed(_)));
        assert_eq!(
            err.to_string(),
            "audit log write failed: no free audit record name for p1 at 20250212T100000Z"
        );
    }
}
