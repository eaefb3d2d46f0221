//! Warnings emitted while listing the inbox.
//!
//! Kept in its own test binary because `logtest` installs a process-wide
//! logger.

#![cfg(target_os = "linux")]

use log::Level;
use logtest::Logger;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use updates_inbox::inbox::ArchiveInbox;

#[test]
fn archives_without_utf8_names_are_reported() {
    let mut logger = Logger::start();
    let temp = tempfile::tempdir().expect("temp dir");
    let inbox_dir = temp.path().join("inbox");
    fs::create_dir_all(&inbox_dir).expect("create inbox");
    fs::write(inbox_dir.join(OsStr::from_bytes(b"p\xff.zip")), b"x").expect("write archive");

    let pending = ArchiveInbox::new(inbox_dir, temp.path().join("applied/zips"))
        .pending()
        .expect("list inbox");
    assert!(pending.is_empty());

    let mut warned = false;
    while let Some(record) = logger.pop() {
        if record.level() == Level::Warn
            && record
                .args()
                .to_string()
                .contains("without a UTF-8 file name")
        {
            warned = true;
        }
    }
    assert!(warned, "expected a warning for the skipped archive");
}
