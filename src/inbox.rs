//! The inbox queue and the applied-archive store.
//!
//! Pending archives are the `*.zip` files directly inside the inbox
//! directory, in lexicographic file-name order. A missing inbox is an empty
//! queue. Archives move into the applied store verbatim after success; an
//! earlier receipt with the same name is kept and the newcomer gets a
//! numeric suffix.

use log::{debug, warn};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extension of pending archives.
const ARCHIVE_EXTENSION: &str = "zip";

/// Upper bound on suffixed names tried in the applied store.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// Errors from listing or moving archives.
#[derive(Debug, thiserror::Error)]
pub enum InboxError {
    /// The inbox could not be listed.
    #[error("failed to list inbox {path}: {source}")]
    List {
        /// Inbox directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The archive could not be moved into the applied store.
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        /// Archive in the inbox.
        from: PathBuf,
        /// Destination in the applied store.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// One archive waiting in the inbox.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingArchive {
    file_name: String,
    path: PathBuf,
}

impl PendingArchive {
    /// Wrap an inbox path; `None` when it has no UTF-8 file name.
    #[must_use]
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_owned();
        Some(Self { file_name, path })
    }

    /// The archive's file name, as recorded in the audit log.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Full path in the inbox.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Inbox directory paired with the applied-archive store.
#[derive(Debug, Clone)]
pub struct ArchiveInbox {
    inbox_dir: PathBuf,
    applied_archives_dir: PathBuf,
}

impl ArchiveInbox {
    /// Create a store over `inbox_dir` moving into `applied_archives_dir`.
    #[must_use]
    pub const fn new(inbox_dir: PathBuf, applied_archives_dir: PathBuf) -> Self {
        Self {
            inbox_dir,
            applied_archives_dir,
        }
    }

    /// The inbox directory.
    #[must_use]
    pub fn inbox_dir(&self) -> &Path {
        &self.inbox_dir
    }

    /// The applied-archive store.
    #[must_use]
    pub fn applied_archives_dir(&self) -> &Path {
        &self.applied_archives_dir
    }

    /// Pending archives in processing order.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::List`] when the inbox exists but cannot be read.
    pub fn pending(&self) -> Result<Vec<PendingArchive>, InboxError> {
        let list_error = |source| InboxError::List {
            path: self.inbox_dir.clone(),
            source,
        };
        let entries = match fs::read_dir(&self.inbox_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(list_error(err)),
        };

        let mut pending = Vec::new();
        for entry in entries {
            let path = entry.map_err(list_error)?.path();
            if path.extension() != Some(OsStr::new(ARCHIVE_EXTENSION)) || !path.is_file() {
                continue;
            }
            match PendingArchive::from_path(path) {
                Some(archive) => pending.push(archive),
                None => warn!(
                    "skipping archive without a UTF-8 file name in {}",
                    self.inbox_dir.display()
                ),
            }
        }
        pending.sort();
        Ok(pending)
    }

    /// Move `archive` into the applied store, returning its new path.
    ///
    /// Existing receipts are never replaced: when the store already holds
    /// `p1.zip`, the archive lands as `p1-1.zip`, then `p1-2.zip`.
    /// Falls back to copy-and-remove when a rename is not possible, e.g.
    /// when the store lives on another filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`InboxError::Move`] when the archive could not be moved.
    pub fn move_to_applied(&self, archive: &PendingArchive) -> Result<PathBuf, InboxError> {
        let first = self.applied_archives_dir.join(archive.file_name());
        let move_error_at = |to: &Path, source: io::Error| InboxError::Move {
            from: archive.path().to_path_buf(),
            to: to.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.applied_archives_dir)
            .map_err(|err| move_error_at(&first, err))?;
        let to = (0..MAX_NAME_ATTEMPTS)
            .map(|attempt| {
                self.applied_archives_dir
                    .join(receipt_name(archive.file_name(), attempt))
            })
            .find(|candidate| fs::symlink_metadata(candidate).is_err())
            .ok_or_else(|| {
                move_error_at(
                    &first,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "no free name in the applied store",
                    ),
                )
            })?;
        let move_error = |source| move_error_at(&to, source);
        if fs::rename(archive.path(), &to).is_err() {
            fs::copy(archive.path(), &to).map_err(move_error)?;
            fs::remove_file(archive.path()).map_err(move_error)?;
        }
        debug!("moved {} to {}", archive.path().display(), to.display());
        Ok(to)
    }
}

/// `p1.zip` for the first attempt, then `p1-1.zip`, `p1-2.zip`, ...
fn receipt_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_owned();
    }
    match file_name.rsplit_once('.') {
        Some((stem, extension)) => format!("{stem}-{attempt}.{extension}"),
        None => format!("{file_name}-{attempt}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn store(temp: &TempDir) -> ArchiveInbox {
        ArchiveInbox::new(temp.path().join("inbox"), temp.path().join("applied/zips"))
    }

    fn names(pending: &[PendingArchive]) -> Vec<&str> {
        pending.iter().map(PendingArchive::file_name).collect()
    }

    #[rstest]
    fn missing_inbox_is_empty(temp: TempDir) {
        assert!(store(&temp).pending().expect("list").is_empty());
    }

    #[rstest]
    fn lists_only_zip_files_in_lexicographic_order(temp: TempDir) {
        let inbox = temp.path().join("inbox");
        fs::create_dir_all(inbox.join("nested.zip")).expect("create dir");
        for name in ["b.zip", "a.zip", "C.zip", "notes.txt", "archive.zip.part"] {
            fs::write(inbox.join(name), b"x").expect("write");
        }

        let pending = store(&temp).pending().expect("list");
        assert_eq!(names(&pending), ["C.zip", "a.zip", "b.zip"]);
    }

    #[rstest]
    fn move_to_applied_relocates_archive(temp: TempDir) {
        let store = store(&temp);
        fs::create_dir_all(store.inbox_dir()).expect("create inbox");
        fs::write(store.inbox_dir().join("p1.zip"), b"zip bytes").expect("write");
        let pending = store.pending().expect("list");
        let archive = pending.first().expect("one archive");

        let moved = store.move_to_applied(archive).expect("move");

        assert_eq!(moved, store.applied_archives_dir().join("p1.zip"));
        assert_eq!(fs::read(&moved).expect("read moved"), b"zip bytes");
        assert!(!archive.path().exists());
        assert!(store.pending().expect("list").is_empty());
    }

    #[rstest]
    fn move_to_applied_keeps_earlier_receipts(temp: TempDir) {
        let store = store(&temp);
        fs::create_dir_all(store.inbox_dir()).expect("create inbox");
        let mut moved = Vec::new();
        for content in [b"first".as_slice(), b"second", b"third"] {
            fs::write(store.inbox_dir().join("p1.zip"), content).expect("write");
            let pending = store.pending().expect("list");
            let archive = pending.first().expect("one archive");
            moved.push(store.move_to_applied(archive).expect("move"));
        }

        let applied = store.applied_archives_dir();
        assert_eq!(
            moved,
            [
                applied.join("p1.zip"),
                applied.join("p1-1.zip"),
                applied.join("p1-2.zip")
            ]
        );
        assert_eq!(fs::read(applied.join("p1.zip")).expect("read"), b"first");
        assert_eq!(fs::read(applied.join("p1-2.zip")).expect("read"), b"third");
    }

    #[rstest]
    #[case("p1.zip", 0, "p1.zip")]
    #[case("p1.zip", 3, "p1-3.zip")]
    #[case("release.v2.zip", 1, "release.v2-1.zip")]
    #[case("bare", 1, "bare-1")]
    fn receipt_names_gain_a_suffix(
        #[case] name: &str,
        #[case] attempt: u32,
        #[case] expected: &str,
    ) {
        assert_eq!(receipt_name(name, attempt), expected);
    }

    #[cfg(target_os = "linux")]
    #[rstest]
    fn non_utf8_archive_names_are_skipped(temp: TempDir) {
        use std::os::unix::ffi::OsStrExt;

        let inbox = temp.path().join("inbox");
        fs::create_dir_all(&inbox).expect("create inbox");
        fs::write(inbox.join(OsStr::from_bytes(b"bad\xff.zip")), b"x").expect("write");
        fs::write(inbox.join("good.zip"), b"x").expect("write");

        let pending = store(&temp).pending().expect("list");
        assert_eq!(names(&pending), ["good.zip"]);
    }

    #[rstest]
    fn move_failure_is_reported(temp: TempDir) {
        let store = store(&temp);
        let archive = PendingArchive::from_path(store.inbox_dir().join("ghost.zip"))
            .expect("utf-8 name");
        assert!(matches!(
            store.move_to_applied(&archive),
            Err(InboxError::Move { .. })
        ));
    }
}
