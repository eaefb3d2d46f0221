//! Repository-root detection.
//!
//! The applier works relative to the root of the repository it updates. The
//! root is the nearest ancestor holding an `AGENTS.md` file or a `.git`
//! entry (a directory, or a file for worktrees and submodules).

use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// File marking a repository root.
const AGENTS_FILE: &str = "AGENTS.md";

/// Directory (or file) marking a git checkout.
const GIT_ENTRY: &str = ".git";

/// Checks whether `dir` is a repository root.
#[must_use]
pub fn is_repo_root(dir: &Utf8Path) -> bool {
    dir.join(AGENTS_FILE).is_file() || dir.join(GIT_ENTRY).exists()
}

/// Walk up from `start` to the first repository root.
///
/// Returns `None` when no ancestor qualifies.
#[must_use]
pub fn find_repo_root(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .find(|dir| is_repo_root(dir))
        .map(Utf8Path::to_path_buf)
}

/// Resolve the repository root for the current directory, falling back to
/// the current directory itself.
///
/// # Errors
///
/// Returns an error when the current directory cannot be read or is not
/// valid UTF-8.
pub fn discover_repo_root() -> io::Result<Utf8PathBuf> {
    let cwd = current_dir_utf8()?;
    Ok(find_repo_root(&cwd).unwrap_or(cwd))
}

/// Returns the current working directory as a UTF-8 path.
///
/// # Errors
///
/// Returns an error when the current directory cannot be read or is not
/// valid UTF-8.
pub fn current_dir_utf8() -> io::Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::try_from(cwd).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
