//! Shared test utilities for building package archives.
//!
//! Archives are assembled in memory as a list of entries and written with
//! `zip::ZipWriter`, so tests can produce both well-formed packages and
//! hostile ones (escaping names, symlinks) without fixture files.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::ZipWriter;
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;

/// One entry of a test archive.
#[derive(Debug, Clone)]
enum Entry {
    File { name: String, content: Vec<u8> },
    Dir { name: String },
    Symlink { name: String, target: String },
}

/// Builder for ZIP archives used in tests.
///
/// # Examples
///
/// ```
/// use updates_inbox::test_utils::{ZipBuilder, write_zip};
///
/// let temp = tempfile::tempdir().expect("temp dir");
/// let path = temp.path().join("p1.zip");
/// let builder = ZipBuilder::new()
///     .file("manifest.json", br#"{"package_id":"p1","ops":[]}"#)
///     .dir("payload/");
/// write_zip(&path, builder).expect("write archive");
/// assert!(path.is_file());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
}

impl ZipBuilder {
    /// An empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a regular file.
    #[must_use]
    pub fn file(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push(Entry::File {
            name: name.to_owned(),
            content: content.to_vec(),
        });
        self
    }

    /// Add an explicit directory entry.
    #[must_use]
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push(Entry::Dir {
            name: name.to_owned(),
        });
        self
    }

    /// Add a symlink entry pointing at `target`.
    #[must_use]
    pub fn symlink(mut self, name: &str, target: &str) -> Self {
        self.entries.push(Entry::Symlink {
            name: name.to_owned(),
            target: target.to_owned(),
        });
        self
    }

    /// A package with `manifest` at the root and `payload` files under
    /// `payload/`.
    #[must_use]
    pub fn package(manifest: &str, payload: &[(&str, &[u8])]) -> Self {
        payload.iter().fold(
            Self::new()
                .file("manifest.json", manifest.as_bytes())
                .dir("payload/"),
            |builder, (name, content)| builder.file(&format!("payload/{name}"), content),
        )
    }
}

/// Write the archive described by `builder` to `path`.
///
/// # Errors
///
/// Returns a [`zip::result::ZipError`] when the file cannot be written.
pub fn write_zip(path: &Path, builder: ZipBuilder) -> ZipResult<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();
    for entry in builder.entries {
        match entry {
            Entry::File { name, content } => {
                writer.start_file(name, options)?;
                writer.write_all(&content)?;
            }
            Entry::Dir { name } => writer.add_directory(name, options)?,
            Entry::Symlink { name, target } => writer.add_symlink(name, target, options)?,
        }
    }
    writer.finish()?;
    Ok(())
}

/// A manifest document copying each `(src, dest)` pair in order.
#[must_use]
pub fn manifest_json(package_id: &str, ops: &[(&str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = ops
        .iter()
        .map(|(src, dest)| serde_json::json!({"op": "copy", "src": src, "dest": dest}))
        .collect();
    serde_json::json!({"package_id": package_id, "ops": entries}).to_string()
}
