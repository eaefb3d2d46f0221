//! Per-archive audit records.
//!
//! Every processed archive, applied or failed, produces exactly one JSON file
//! in the log directory. Files are created exclusively and never rewritten:
//! when two records for the same archive land in the same second, the later
//! one gets a numeric suffix instead of replacing the earlier one.

use crate::archive::sha256_digest::Sha256Digest;
use crate::path_validator::NormalizedPath;
use crate::timestamp::UtcTimestamp;
use log::debug;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Actor recorded when none is supplied.
pub const DEFAULT_ACTOR: &str = "dm-bot";

/// Environment variable naming the actor.
pub const ACTOR_ENV: &str = "GITHUB_ACTOR";

/// Environment variable naming the CI run.
pub const RUN_ID_ENV: &str = "GITHUB_RUN_ID";

/// Upper bound on suffixed names tried for one timestamp and archive.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Outcome of processing one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    /// Every operation was written and the validator accepted the result.
    Applied,
    /// Processing stopped; the archive stays in the inbox.
    Failed,
}

/// Who applied the archive and from which run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    actor: String,
    run_id: String,
}

impl Provenance {
    /// Create provenance from explicit values.
    #[must_use]
    pub fn new(actor: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            run_id: run_id.into(),
        }
    }
}

/// What happened to one archive, as handed to [`AuditLogger::record`].
#[derive(Debug, Clone, Copy)]
pub struct ArchiveOutcome<'a> {
    /// File name of the archive in the inbox.
    pub zip_filename: &'a str,
    /// Final status.
    pub status: ApplyStatus,
    /// Digest of the manifest bytes, when they were read.
    pub manifest_sha256: Option<&'a Sha256Digest>,
    /// Destinations written, in order.
    pub files_written: &'a [NormalizedPath],
    /// Empty on success; the failure message otherwise.
    pub notes: &'a str,
}

/// The persisted record.
///
/// Fields are declared in alphabetical order so the serialized keys are
/// sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationLog {
    actor: String,
    applied_at: String,
    files_written: Vec<String>,
    manifest_sha256: String,
    notes: String,
    run_id: String,
    status: ApplyStatus,
    zip_filename: String,
}

impl ApplicationLog {
    fn new(provenance: &Provenance, at: UtcTimestamp, outcome: &ArchiveOutcome<'_>) -> Self {
        Self {
            actor: provenance.actor.clone(),
            applied_at: at.iso8601(),
            files_written: outcome
                .files_written
                .iter()
                .map(ToString::to_string)
                .collect(),
            manifest_sha256: outcome
                .manifest_sha256
                .map(ToString::to_string)
                .unwrap_or_default(),
            notes: outcome.notes.to_owned(),
            run_id: provenance.run_id.clone(),
            status: outcome.status,
            zip_filename: outcome.zip_filename.to_owned(),
        }
    }
}

/// Errors that leave an archive without an audit record.
#[derive(Debug, thiserror::Error)]
pub enum LogWriteError {
    /// The system clock could not be read.
    #[error("failed to read system clock: {0}")]
    Clock(#[from] std::time::SystemTimeError),

    /// Creating the log directory failed.
    #[error("failed to create log directory {path}: {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Serializing the record failed.
    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Creating or writing the log file failed.
    #[error("failed to write audit record {path}: {source}")]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Every candidate file name was already taken.
    #[error("no free audit record name for {stem} at {timestamp}")]
    NamesExhausted {
        /// Archive stem.
        stem: String,
        /// Compact timestamp.
        timestamp: String,
    },
}

/// Writes [`ApplicationLog`] files into a log directory.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    log_dir: PathBuf,
    provenance: Provenance,
}

impl AuditLogger {
    /// Create a logger writing into `log_dir`.
    #[must_use]
    pub const fn new(log_dir: PathBuf, provenance: Provenance) -> Self {
        Self {
            log_dir,
            provenance,
        }
    }

    /// The directory records are written to.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Write one record stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns a [`LogWriteError`] when the record could not be persisted.
    pub fn record(&self, outcome: &ArchiveOutcome<'_>) -> Result<PathBuf, LogWriteError> {
        self.record_at(UtcTimestamp::now()?, outcome)
    }

    /// Write one record stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns a [`LogWriteError`] when the record could not be persisted.
    pub fn record_at(
        &self,
        at: UtcTimestamp,
        outcome: &ArchiveOutcome<'_>,
    ) -> Result<PathBuf, LogWriteError> {
        fs::create_dir_all(&self.log_dir).map_err(|source| LogWriteError::CreateDirectory {
            path: self.log_dir.clone(),
            source,
        })?;

        let entry = ApplicationLog::new(&self.provenance, at, outcome);
        let mut json = serde_json::to_string_pretty(&entry)?;
        json.push('\n');

        let stem = archive_stem(outcome.zip_filename);
        let timestamp = at.compact();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.log_dir.join(log_file_name(&timestamp, &stem, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())
                        .map_err(|source| LogWriteError::Write {
                            path: path.clone(),
                            source,
                        })?;
                    debug!("wrote audit record {}", path.display());
                    return Ok(path);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => return Err(LogWriteError::Write { path, source }),
            }
        }
        Err(LogWriteError::NamesExhausted { stem, timestamp })
    }
}

fn archive_stem(zip_filename: &str) -> String {
    Path::new(zip_filename)
        .file_stem()
        .map_or_else(|| zip_filename.to_owned(), |s| s.to_string_lossy().into_owned())
}

fn log_file_name(timestamp: &str, stem: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{timestamp}_{stem}.json")
    } else {
        format!("{timestamp}_{stem}-{attempt}.json")
    }
}
