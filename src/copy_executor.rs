//! Application of validated copy operations into the target tree.
//!
//! Application runs in two phases. Planning walks every operation in
//! manifest order, validates both paths against the [`SandboxPolicy`],
//! resolves the source inside the staged payload and checks that its
//! canonical location is still contained in the canonical payload root.
//! Nothing is written until every operation has planned cleanly, so a
//! rejected path or a missing source leaves the target tree untouched.
//!
//! Writing then copies each source over its destination in order, creating
//! parent directories as needed. Later operations may overwrite the output
//! of earlier ones. In [`RollbackMode::Transactional`] every write is
//! recorded in a [`WriteJournal`] (overwritten files are backed up first)
//! so the caller can restore the target tree if a write fails or the
//! external validator rejects the result.

use crate::archive::manifest::{CopyOp, Operation};
use crate::path_validator::{NormalizedPath, Rejected, validate_dest, validate_source};
use crate::sandbox::SandboxPolicy;
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// How partial application is handled when an archive fails after writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackMode {
    /// Journal every write and restore the target tree on failure.
    #[default]
    Transactional,
    /// Leave completed writes in place; the audit log lists them.
    Partial,
}

/// Errors that abort application of an archive.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// A source or destination path failed sandbox validation.
    #[error("{rejected}")]
    InvalidPath {
        /// Zero-based index of the operation in the manifest.
        index: usize,
        /// Why the path was rejected.
        rejected: Rejected,
    },

    /// The source does not exist as a regular file in the payload.
    #[error("source file missing: {src}")]
    SourceMissing {
        /// The source path as written in the manifest.
        src: String,
    },

    /// The source resolves outside the payload root.
    #[error("source file escapes payload/: {src}")]
    SourceEscapesSandbox {
        /// The source path as written in the manifest.
        src: String,
    },

    /// Copying into the target tree failed.
    #[error("failed to write {dest}: {source}")]
    Write {
        /// The normalized destination path.
        dest: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A copy that passed planning.
#[derive(Debug, Clone)]
struct PlannedCopy {
    source: PathBuf,
    dest: NormalizedPath,
    dest_path: PathBuf,
}

/// One recorded write, newest last.
#[derive(Debug)]
enum JournalEntry {
    /// The destination did not exist before the write.
    Created {
        path: PathBuf,
        new_dirs: Vec<PathBuf>,
    },
    /// The destination existed; its previous bytes are in the backup dir.
    Replaced { path: PathBuf, backup: PathBuf },
}

/// Record of writes made to the target tree, used for rollback.
///
/// A disabled journal records nothing and rolls back nothing.
#[derive(Debug)]
pub struct WriteJournal {
    enabled: bool,
    backup_dir: Option<TempDir>,
    entries: Vec<JournalEntry>,
}

impl WriteJournal {
    /// A journal that records writes.
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            enabled: true,
            backup_dir: None,
            entries: Vec::new(),
        }
    }

    /// A journal that records nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            backup_dir: None,
            entries: Vec::new(),
        }
    }

    /// Returns true when no write has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the state of `dest_path` before it is written.
    fn before_write(&mut self, dest_path: &Path, target_root: &Path) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if dest_path.is_file() {
            let backup_dir = match &self.backup_dir {
                Some(dir) => dir.path().to_path_buf(),
                None => {
                    let dir = tempfile::Builder::new()
                        .prefix("updates-inbox-backup-")
                        .tempdir()?;
                    let path = dir.path().to_path_buf();
                    self.backup_dir = Some(dir);
                    path
                }
            };
            let backup = backup_dir.join(self.entries.len().to_string());
            fs::copy(dest_path, &backup)?;
            self.entries.push(JournalEntry::Replaced {
                path: dest_path.to_path_buf(),
                backup,
            });
        } else {
            self.entries.push(JournalEntry::Created {
                path: dest_path.to_path_buf(),
                new_dirs: missing_ancestors(dest_path, target_root),
            });
        }
        Ok(())
    }

    /// Undo every recorded write, newest first.
    ///
    /// Every entry is attempted even when an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error encountered.
    pub fn rollback(self) -> io::Result<()> {
        let mut first_error = None;
        for entry in self.entries.into_iter().rev() {
            if let Err(err) = undo(&entry) {
                warn!("rollback step failed for {entry:?}: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn undo(entry: &JournalEntry) -> io::Result<()> {
    match entry {
        JournalEntry::Replaced { path, backup } => {
            fs::copy(backup, path)?;
        }
        JournalEntry::Created { path, new_dirs } => {
            if path.symlink_metadata().is_ok() {
                fs::remove_file(path)?;
            }
            // Deepest first; a directory another write still uses stays.
            for dir in new_dirs {
                if fs::remove_dir(dir).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Ancestors of `dest_path` below `target_root` that do not exist yet,
/// deepest first.
fn missing_ancestors(dest_path: &Path, target_root: &Path) -> Vec<PathBuf> {
    dest_path
        .ancestors()
        .skip(1)
        .take_while(|dir| *dir != target_root && !dir.exists())
        .map(Path::to_path_buf)
        .collect()
}

/// Result of applying one archive's operations.
///
/// `files_written` is populated even on failure so the caller can log
/// exactly what changed before the error.
#[derive(Debug)]
pub struct CopyOutcome {
    /// Normalized destinations written, in order.
    pub files_written: Vec<NormalizedPath>,
    /// Journal of the writes, for rollback.
    pub journal: WriteJournal,
    /// The first error, if application stopped early.
    pub result: Result<(), CopyError>,
}

/// Applies manifest operations inside a sandbox.
#[derive(Debug, Clone, Copy)]
pub struct CopyExecutor<'a> {
    policy: &'a SandboxPolicy,
    mode: RollbackMode,
}

impl<'a> CopyExecutor<'a> {
    /// Create an executor bound to `policy`.
    #[must_use]
    pub const fn new(policy: &'a SandboxPolicy, mode: RollbackMode) -> Self {
        Self { policy, mode }
    }

    /// Plan and then write every operation.
    ///
    /// Source paths resolve against `staging_root` and must stay within
    /// `payload_root`; destinations resolve against `target_root`.
    pub fn apply(
        &self,
        staging_root: &Path,
        payload_root: &Path,
        target_root: &Path,
        ops: &[Operation],
    ) -> CopyOutcome {
        let mut journal = match self.mode {
            RollbackMode::Transactional => WriteJournal::enabled(),
            RollbackMode::Partial => WriteJournal::disabled(),
        };
        let mut files_written = Vec::new();

        let result = self
            .plan(staging_root, payload_root, target_root, ops)
            .and_then(|plan| write_all(&plan, target_root, &mut journal, &mut files_written));

        CopyOutcome {
            files_written,
            journal,
            result,
        }
    }

    fn plan(
        &self,
        staging_root: &Path,
        payload_root: &Path,
        target_root: &Path,
        ops: &[Operation],
    ) -> Result<Vec<PlannedCopy>, CopyError> {
        let canonical_payload = payload_root.canonicalize().map_err(|_| {
            CopyError::SourceEscapesSandbox {
                src: payload_root.display().to_string(),
            }
        })?;

        ops.iter()
            .enumerate()
            .map(|(index, op)| match op {
                Operation::Copy(copy) => {
                    self.plan_copy(index, copy, staging_root, &canonical_payload, target_root)
                }
            })
            .collect()
    }

    fn plan_copy(
        &self,
        index: usize,
        op: &CopyOp,
        staging_root: &Path,
        canonical_payload: &Path,
        target_root: &Path,
    ) -> Result<PlannedCopy, CopyError> {
        let src = validate_source(&op.src, self.policy)
            .map_err(|rejected| CopyError::InvalidPath { index, rejected })?;
        let dest = validate_dest(&op.dest, self.policy)
            .map_err(|rejected| CopyError::InvalidPath { index, rejected })?;

        let source = join_segments(staging_root, &src);
        if !source.is_file() {
            return Err(CopyError::SourceMissing {
                src: op.src.clone(),
            });
        }
        let contained = source
            .canonicalize()
            .is_ok_and(|resolved| resolved.starts_with(canonical_payload));
        if !contained {
            return Err(CopyError::SourceEscapesSandbox {
                src: op.src.clone(),
            });
        }

        let dest_path = join_segments(target_root, &dest);
        debug!("planned op[{index}]: {src} -> {dest}");
        Ok(PlannedCopy {
            source,
            dest,
            dest_path,
        })
    }
}

fn write_all(
    plan: &[PlannedCopy],
    target_root: &Path,
    journal: &mut WriteJournal,
    files_written: &mut Vec<NormalizedPath>,
) -> Result<(), CopyError> {
    for planned in plan {
        write_one(planned, target_root, journal).map_err(|source| CopyError::Write {
            dest: planned.dest.to_string(),
            source,
        })?;
        files_written.push(planned.dest.clone());
    }
    Ok(())
}

fn write_one(planned: &PlannedCopy, target_root: &Path, journal: &mut WriteJournal) -> io::Result<()> {
    journal.before_write(&planned.dest_path, target_root)?;
    if let Some(parent) = planned.dest_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&planned.source, &planned.dest_path)?;
    debug!("wrote {}", planned.dest);
    Ok(())
}

fn join_segments(root: &Path, path: &NormalizedPath) -> PathBuf {
    path.segments().fold(root.to_path_buf(), |acc, seg| acc.join(seg))
}

#[cfg(test)]
mod tests;
