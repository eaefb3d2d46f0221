//! Operator-facing messages.
//!
//! Everything the applier tells the operator goes through an injected
//! writer one line at a time, so the binary can point it at stderr and tests
//! can capture it in a `Vec<u8>`.

use crate::config::ApplyConfig;
use crate::inbox::PendingArchive;
use camino::Utf8Path;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;

/// Write one line, ignoring failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; a closed stderr must not fail the batch.
    }
}

/// Message for an empty inbox.
#[must_use]
pub fn no_archives_message(inbox_dir: &Path) -> String {
    format!("No packages in {}", inbox_dir.display())
}

/// Message after an archive was applied.
#[must_use]
pub fn applied_message(zip_filename: &str, files_written: usize) -> String {
    let plural = if files_written == 1 { "file" } else { "files" };
    format!("Applied {zip_filename} ({files_written} {plural} written)")
}

/// Message after an archive failed.
#[must_use]
pub fn failure_message(zip_filename: &str, notes: &str) -> String {
    format!("Failed applying {zip_filename}: {notes}")
}

/// Message when the batch stops early.
#[must_use]
pub fn halted_message(remaining: usize) -> String {
    match remaining {
        0 => "Batch halted.".to_owned(),
        1 => "Batch halted; 1 archive left unprocessed.".to_owned(),
        n => format!("Batch halted; {n} archives left unprocessed."),
    }
}

/// Print what a real run would do without touching anything.
pub fn write_dry_run(
    stderr: &mut dyn Write,
    repo_root: &Utf8Path,
    config: &ApplyConfig,
    pending: &[PendingArchive],
) {
    write_stderr_line(stderr, "Dry run - no files will be modified");
    write_stderr_line(stderr, "");
    write_stderr_line(stderr, format!("Repository root: {repo_root}"));
    write_stderr_line(stderr, format!("Inbox: {}", config.inbox_dir.display()));
    write_stderr_line(stderr, format!("Audit logs: {}", config.applied_dir.display()));
    write_stderr_line(
        stderr,
        format!("Applied archives: {}", config.applied_archives_dir.display()),
    );
    write_stderr_line(stderr, format!("Rollback: {:?}", config.rollback));
    write_stderr_line(
        stderr,
        format!(
            "Validator: {} (timeout {}s)",
            config.validator.command.join(" "),
            config.validator.timeout_secs
        ),
    );
    write_stderr_line(stderr, "");
    if pending.is_empty() {
        write_stderr_line(stderr, no_archives_message(&config.inbox_dir));
        return;
    }
    write_stderr_line(stderr, "Archives to apply:");
    for archive in pending {
        write_stderr_line(stderr, format!("  - {}", archive.file_name()));
    }
}
