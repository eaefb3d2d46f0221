//! Archive staging for package application.
//!
//! Unpacks a ZIP package into a freshly created temporary directory that is
//! removed when the returned [`StagedArchive`] is dropped, whichever way the
//! caller leaves. Entries that are symlinks or whose names would land outside
//! the staging root are refused before anything is written.

use super::MANIFEST_FILE;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of every staging directory name.
const STAGING_PREFIX: &str = "updates-inbox-";

/// Mask and value identifying a symlink in a Unix mode.
const FILE_TYPE_MASK: u32 = 0o170_000;
const SYMLINK_TYPE: u32 = 0o120_000;

/// Trait for staging package archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Unpack `archive_path` into a new staging root.
    ///
    /// `payload_dir` names the directory that must exist at the archive
    /// root next to `manifest.json`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingManifest`] or
    /// [`ExtractError::MissingPayload`] when a required entry is absent,
    /// [`ExtractError::UnsafeEntry`] for symlinks or escaping names, and
    /// [`ExtractError::Zip`] / [`ExtractError::Io`] on read failures.
    fn stage(&self, archive_path: &Path, payload_dir: &str) -> Result<StagedArchive, ExtractError>;
}

/// Errors arising from archive staging.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// I/O error while creating the staging root or writing entries.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container could not be read as a ZIP archive.
    #[error("invalid archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An entry is a symlink or its name escapes the staging root.
    #[error("unsafe archive entry: {name}")]
    UnsafeEntry {
        /// The entry name as stored in the archive.
        name: String,
    },

    /// No `manifest.json` at the archive root.
    #[error("missing {MANIFEST_FILE} at archive root")]
    MissingManifest,

    /// No payload directory at the archive root.
    #[error("missing {dir}/ directory at archive root")]
    MissingPayload {
        /// The expected payload directory name.
        dir: String,
    },
}

/// An archive unpacked into its own staging root.
///
/// The staging directory is deleted when this value is dropped.
#[derive(Debug)]
pub struct StagedArchive {
    dir: TempDir,
    payload_root: PathBuf,
    manifest_bytes: Vec<u8>,
}

impl StagedArchive {
    /// Locate the manifest and payload in an already populated staging
    /// directory and take ownership of it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::MissingManifest`] or
    /// [`ExtractError::MissingPayload`] when either is absent, or
    /// [`ExtractError::Io`] when the manifest cannot be read.
    pub fn from_dir(dir: TempDir, payload_dir: &str) -> Result<Self, ExtractError> {
        let manifest_path = dir.path().join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ExtractError::MissingManifest);
        }
        let payload_root = dir.path().join(payload_dir);
        if !payload_root.is_dir() {
            return Err(ExtractError::MissingPayload {
                dir: payload_dir.to_owned(),
            });
        }
        let manifest_bytes = fs::read(&manifest_path)?;
        Ok(Self {
            dir,
            payload_root,
            manifest_bytes,
        })
    }

    /// The staging root the archive was unpacked into.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// The payload directory inside the staging root.
    #[must_use]
    pub fn payload_root(&self) -> &Path {
        &self.payload_root
    }

    /// Raw bytes of `manifest.json`, as hashed for the audit log.
    #[must_use]
    pub fn manifest_bytes(&self) -> &[u8] {
        &self.manifest_bytes
    }
}

/// Default extractor for ZIP packages.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use updates_inbox::archive::extraction::{ArchiveExtractor, ZipExtractor};
///
/// let staged = ZipExtractor::default().stage(Path::new("inbox/pkg.zip"), "payload")?;
/// assert!(staged.payload_root().is_dir());
/// # Ok::<(), updates_inbox::archive::extraction::ExtractError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZipExtractor {
    staging_parent: Option<PathBuf>,
}

impl ZipExtractor {
    /// Create staging roots under `parent` instead of the system temp dir.
    #[must_use]
    pub fn in_dir(parent: PathBuf) -> Self {
        Self {
            staging_parent: Some(parent),
        }
    }

    fn create_staging_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);
        match &self.staging_parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn stage(&self, archive_path: &Path, payload_dir: &str) -> Result<StagedArchive, ExtractError> {
        let dir = self.create_staging_dir()?;
        debug!(
            "staging {} into {}",
            archive_path.display(),
            dir.path().display()
        );
        unpack_zip(archive_path, dir.path())?;
        StagedArchive::from_dir(dir, payload_dir)
    }
}

/// Unpack every entry of the ZIP at `archive_path` below `dest_dir`.
fn unpack_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for idx in 0..archive.len() {
        let mut entry = archive.by_index(idx)?;

        if entry
            .unix_mode()
            .is_some_and(|mode| mode & FILE_TYPE_MASK == SYMLINK_TYPE)
        {
            return Err(ExtractError::UnsafeEntry {
                name: entry.name().to_owned(),
            });
        }
        let Some(relative) = entry.enclosed_name() else {
            return Err(ExtractError::UnsafeEntry {
                name: entry.name().to_owned(),
            });
        };

        let out_path = dest_dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}
