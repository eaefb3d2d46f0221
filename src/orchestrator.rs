//! Batch driver for the inbox.
//!
//! A batch is an explicit state machine:
//!
//! ```text
//! Idle -> Listing -> Processing(0) -> ... -> Processing(n-1) -> Done
//!                         \__________________________________/-> Halted
//! ```
//!
//! Archives are processed one at a time in lexicographic order. Each one is
//! staged, its manifest parsed, its operations applied, the external
//! validator run, and finally the archive is moved into the applied store and
//! an audit record written. Any failure writes a `failed` record, leaves the
//! archive in the inbox and halts the batch without touching later archives.
//! A failure to write the audit record itself aborts the run with an error.

use crate::archive::extraction::ArchiveExtractor;
use crate::archive::manifest_parser::parse_manifest;
use crate::archive::sha256_digest::Sha256Digest;
use crate::audit::{ApplyStatus, ArchiveOutcome, AuditLogger};
use crate::copy_executor::{CopyExecutor, RollbackMode, WriteJournal};
use crate::error::{ApplyError, Result};
use crate::inbox::{ArchiveInbox, PendingArchive};
use crate::output::{applied_message, failure_message, halted_message, write_stderr_line};
use crate::path_validator::NormalizedPath;
use crate::sandbox::SandboxPolicy;
use crate::validator::Validator;
use log::{debug, info, warn};
use std::io::Write;
use std::path::PathBuf;

/// Where a batch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Not started.
    Idle,
    /// Reading the inbox.
    Listing,
    /// Working on the archive at `index` of `total`.
    Processing {
        /// Zero-based position in the pending list.
        index: usize,
        /// Number of pending archives.
        total: usize,
    },
    /// Every pending archive was applied, or there were none.
    Done,
    /// An archive failed and the batch stopped.
    Halted,
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The inbox held no archives.
    NoArchives,
    /// Every archive was applied.
    AllApplied {
        /// File names of the applied archives, in order.
        applied: Vec<String>,
    },
    /// An archive failed; later archives were not attempted.
    Halted {
        /// Archives applied before the failure.
        applied: Vec<String>,
        /// The archive that failed.
        failed: String,
        /// Why it failed, as recorded in its audit record.
        reason: String,
        /// Archives left unprocessed after the failure.
        remaining: usize,
    },
}

/// Per-archive result reported back to the batch loop.
#[derive(Debug)]
enum Verdict {
    Applied,
    Failed(String),
}

/// What has happened to an archive so far, kept for its audit record.
#[derive(Debug)]
struct Progress {
    digest: Option<Sha256Digest>,
    files_written: Vec<NormalizedPath>,
    journal: WriteJournal,
}

impl Progress {
    const fn new() -> Self {
        Self {
            digest: None,
            files_written: Vec::new(),
            journal: WriteJournal::disabled(),
        }
    }
}

/// Drives the inbox through the application pipeline.
pub struct ApplyOrchestrator<'a> {
    target_root: PathBuf,
    inbox: ArchiveInbox,
    logger: AuditLogger,
    extractor: &'a dyn ArchiveExtractor,
    validator: &'a dyn Validator,
    policy: SandboxPolicy,
    rollback: RollbackMode,
    quiet: bool,
    state: BatchState,
}

impl<'a> ApplyOrchestrator<'a> {
    /// Create an orchestrator writing into `target_root` with the default
    /// sandbox and transactional rollback.
    #[must_use]
    pub fn new(
        target_root: PathBuf,
        inbox: ArchiveInbox,
        logger: AuditLogger,
        extractor: &'a dyn ArchiveExtractor,
        validator: &'a dyn Validator,
    ) -> Self {
        Self {
            target_root,
            inbox,
            logger,
            extractor,
            validator,
            policy: SandboxPolicy::default(),
            rollback: RollbackMode::default(),
            quiet: false,
            state: BatchState::Idle,
        }
    }

    /// Replace the sandbox policy.
    #[must_use]
    pub fn with_policy(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the rollback mode.
    #[must_use]
    pub const fn with_rollback(mut self, rollback: RollbackMode) -> Self {
        self.rollback = rollback;
        self
    }

    /// Suppress progress lines; failures are still reported.
    #[must_use]
    pub const fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// The current batch state.
    #[must_use]
    pub const fn state(&self) -> BatchState {
        self.state
    }

    /// Process every pending archive until one fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Inbox`] when the inbox cannot be listed and
    /// [`ApplyError::LogWriteFailed`] when an audit record cannot be
    /// written. Per-archive failures are reported as
    /// [`BatchOutcome::Halted`], not as errors.
    pub fn run(&mut self, stderr: &mut dyn Write) -> Result<BatchOutcome> {
        self.state = BatchState::Listing;
        let pending = match self.inbox.pending() {
            Ok(pending) => pending,
            Err(err) => {
                self.state = BatchState::Halted;
                return Err(err.into());
            }
        };
        if pending.is_empty() {
            debug!("inbox {} is empty", self.inbox.inbox_dir().display());
            self.state = BatchState::Done;
            return Ok(BatchOutcome::NoArchives);
        }

        let total = pending.len();
        let mut applied = Vec::new();
        for (index, archive) in pending.iter().enumerate() {
            self.state = BatchState::Processing { index, total };
            let verdict = match self.process(archive, stderr) {
                Ok(verdict) => verdict,
                Err(err) => {
                    self.state = BatchState::Halted;
                    return Err(err);
                }
            };
            match verdict {
                Verdict::Applied => applied.push(archive.file_name().to_owned()),
                Verdict::Failed(reason) => {
                    self.state = BatchState::Halted;
                    let remaining = total - index - 1;
                    write_stderr_line(stderr, halted_message(remaining));
                    return Ok(BatchOutcome::Halted {
                        applied,
                        failed: archive.file_name().to_owned(),
                        reason,
                        remaining,
                    });
                }
            }
        }

        self.state = BatchState::Done;
        Ok(BatchOutcome::AllApplied { applied })
    }

    fn process(&self, archive: &PendingArchive, stderr: &mut dyn Write) -> Result<Verdict> {
        debug!("processing {}", archive.path().display());
        let mut progress = Progress::new();
        match self.apply_archive(archive, &mut progress) {
            Ok(()) => self.finish_applied(archive, &progress, stderr),
            Err(err) => self.finish_failed(archive, progress, &err, stderr),
        }
    }

    /// Stage, parse, copy, validate, and move one archive.
    fn apply_archive(&self, archive: &PendingArchive, progress: &mut Progress) -> Result<()> {
        let staged = self
            .extractor
            .stage(archive.path(), self.policy.payload_dir_name())?;
        progress.digest = Some(Sha256Digest::of(staged.manifest_bytes()));

        let manifest = parse_manifest(staged.manifest_bytes())?;
        debug!(
            "{}: package {} with {} operation(s)",
            archive.file_name(),
            manifest.package_id(),
            manifest.ops().len()
        );

        let outcome = CopyExecutor::new(&self.policy, self.rollback).apply(
            staged.root(),
            staged.payload_root(),
            &self.target_root,
            manifest.ops(),
        );
        progress.files_written = outcome.files_written;
        progress.journal = outcome.journal;
        outcome.result?;
        drop(staged);

        if !self.validator.check()? {
            return Err(ApplyError::ExternalValidationFailed);
        }
        self.inbox.move_to_applied(archive)?;
        Ok(())
    }

    fn finish_applied(
        &self,
        archive: &PendingArchive,
        progress: &Progress,
        stderr: &mut dyn Write,
    ) -> Result<Verdict> {
        self.logger.record(&ArchiveOutcome {
            zip_filename: archive.file_name(),
            status: ApplyStatus::Applied,
            manifest_sha256: progress.digest.as_ref(),
            files_written: &progress.files_written,
            notes: "",
        })?;
        info!(
            "applied {} ({} file(s))",
            archive.file_name(),
            progress.files_written.len()
        );
        if !self.quiet {
            write_stderr_line(
                stderr,
                applied_message(archive.file_name(), progress.files_written.len()),
            );
        }
        Ok(Verdict::Applied)
    }

    fn finish_failed(
        &self,
        archive: &PendingArchive,
        progress: Progress,
        err: &ApplyError,
        stderr: &mut dyn Write,
    ) -> Result<Verdict> {
        let mut notes = err.to_string();
        if !progress.journal.is_empty() {
            match progress.journal.rollback() {
                Ok(()) => notes.push_str(" (changes rolled back)"),
                Err(rollback_err) => {
                    notes.push_str(&format!(" (rollback incomplete: {rollback_err})"));
                }
            }
        }
        warn!("failed applying {}: {notes}", archive.file_name());

        self.logger.record(&ArchiveOutcome {
            zip_filename: archive.file_name(),
            status: ApplyStatus::Failed,
            manifest_sha256: progress.digest.as_ref(),
            files_written: &progress.files_written,
            notes: &notes,
        })?;
        write_stderr_line(stderr, failure_message(archive.file_name(), &notes));
        Ok(Verdict::Failed(notes))
    }
}
