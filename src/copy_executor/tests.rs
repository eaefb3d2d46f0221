//! Unit tests for copy planning, writing, and rollback.

use super::*;
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

/// A staging root with a payload tree and an empty target root.
struct Sandbox {
    _temp: TempDir,
    staging: PathBuf,
    payload: PathBuf,
    target: PathBuf,
}

impl Sandbox {
    fn payload_file(&self, relative: &str, content: &[u8]) {
        let path = self.payload.join(relative);
        fs::create_dir_all(path.parent().expect("payload parent")).expect("create payload dir");
        fs::write(path, content).expect("write payload file");
    }

    fn target_file(&self, relative: &str, content: &[u8]) {
        let path = self.target.join(relative);
        fs::create_dir_all(path.parent().expect("target parent")).expect("create target dir");
        fs::write(path, content).expect("write target file");
    }

    fn read_target(&self, relative: &str) -> Vec<u8> {
        fs::read(self.target.join(relative)).expect("read target file")
    }

    fn apply(&self, mode: RollbackMode, ops: &[Operation]) -> CopyOutcome {
        let policy = SandboxPolicy::default();
        CopyExecutor::new(&policy, mode).apply(&self.staging, &self.payload, &self.target, ops)
    }
}

#[fixture]
fn sandbox() -> Sandbox {
    let temp = tempfile::tempdir().expect("temp dir");
    let staging = temp.path().join("staging");
    let payload = staging.join("payload");
    let target = temp.path().join("repo");
    fs::create_dir_all(&payload).expect("create payload");
    fs::create_dir_all(&target).expect("create target");
    Sandbox {
        _temp: temp,
        staging,
        payload,
        target,
    }
}

fn copy(src: &str, dest: &str) -> Operation {
    Operation::Copy(CopyOp::new(src, dest))
}

fn written(outcome: &CopyOutcome) -> Vec<&str> {
    outcome.files_written.iter().map(NormalizedPath::as_str).collect()
}

fn tree_is_empty(root: &Path) -> bool {
    fs::read_dir(root).expect("read dir").next().is_none()
}

#[rstest]
fn applies_operations_in_manifest_order(sandbox: Sandbox) {
    sandbox.payload_file("a.md", b"alpha");
    sandbox.payload_file("nested/b.md", b"\x00binary\xff");

    let outcome = sandbox.apply(
        RollbackMode::Transactional,
        &[
            copy("payload/a.md", "docs/validated/A.MD"),
            copy("payload/nested/b.md", "docs/B.MD"),
        ],
    );

    outcome.result.as_ref().expect("apply succeeds");
    assert_eq!(written(&outcome), ["docs/validated/A.MD", "docs/B.MD"]);
    assert_eq!(sandbox.read_target("docs/validated/A.MD"), b"alpha");
    assert_eq!(sandbox.read_target("docs/B.MD"), b"\x00binary\xff");
}

#[rstest]
fn later_operations_overwrite_earlier_output(sandbox: Sandbox) {
    sandbox.payload_file("first.md", b"first");
    sandbox.payload_file("second.md", b"second");

    let outcome = sandbox.apply(
        RollbackMode::Partial,
        &[
            copy("payload/first.md", "docs/A.MD"),
            copy("payload/second.md", "docs/A.MD"),
        ],
    );

    outcome.result.as_ref().expect("apply succeeds");
    assert_eq!(written(&outcome), ["docs/A.MD", "docs/A.MD"]);
    assert_eq!(sandbox.read_target("docs/A.MD"), b"second");
}

#[rstest]
fn normalized_destination_is_recorded(sandbox: Sandbox) {
    sandbox.payload_file("a.md", b"alpha");
    let outcome = sandbox.apply(
        RollbackMode::Transactional,
        &[copy("payload/./a.md", "docs//x/./A.MD")],
    );
    outcome.result.as_ref().expect("apply succeeds");
    assert_eq!(written(&outcome), ["docs/x/A.MD"]);
}

#[rstest]
#[case::traversal("../../etc/passwd")]
#[case::forbidden_dir("docs/canonical/A.MD")]
#[case::protected_file("docs/document_lifecycle_v1.json")]
#[case::protected_file_dot_segment("docs/./document_lifecycle_v1.json")]
#[case::root_directory("docs/")]
fn rejected_destination_prevents_every_write(sandbox: Sandbox, #[case] bad_dest: &str) {
    sandbox.payload_file("a.md", b"alpha");

    let outcome = sandbox.apply(
        RollbackMode::Partial,
        &[copy("payload/a.md", "docs/A.MD"), copy("payload/a.md", bad_dest)],
    );

    let err = outcome.result.expect_err("rejected path");
    assert!(matches!(err, CopyError::InvalidPath { index: 1, .. }));
    assert!(err.to_string().contains(bad_dest));
    assert!(outcome.files_written.is_empty());
    assert!(tree_is_empty(&sandbox.target));
}

#[rstest]
fn rejected_source_is_reported(sandbox: Sandbox) {
    let outcome = sandbox.apply(
        RollbackMode::Transactional,
        &[copy("manifest.json", "docs/A.MD")],
    );
    let err = outcome.result.expect_err("rejected source");
    assert_eq!(
        err.to_string(),
        "invalid src path (must start with payload/): manifest.json"
    );
}

#[rstest]
fn missing_source_is_reported(sandbox: Sandbox) {
    let outcome = sandbox.apply(
        RollbackMode::Transactional,
        &[copy("payload/absent.md", "docs/A.MD")],
    );
    assert!(matches!(
        outcome.result,
        Err(CopyError::SourceMissing { ref src }) if src == "payload/absent.md"
    ));
    assert!(tree_is_empty(&sandbox.target));
}

#[rstest]
fn directory_source_counts_as_missing(sandbox: Sandbox) {
    sandbox.payload_file("dir/inner.md", b"inner");
    let outcome = sandbox.apply(RollbackMode::Transactional, &[copy("payload/dir", "docs/A.MD")]);
    assert!(matches!(outcome.result, Err(CopyError::SourceMissing { .. })));
}

#[cfg(unix)]
#[rstest]
fn symlinked_source_outside_payload_is_refused(sandbox: Sandbox) {
    let secret = sandbox.staging.join("secret.txt");
    fs::write(&secret, b"secret").expect("write secret");
    std::os::unix::fs::symlink(&secret, sandbox.payload.join("link.md")).expect("symlink");

    let outcome = sandbox.apply(
        RollbackMode::Transactional,
        &[copy("payload/link.md", "docs/A.MD")],
    );

    assert!(matches!(
        outcome.result,
        Err(CopyError::SourceEscapesSandbox { .. })
    ));
    assert!(tree_is_empty(&sandbox.target));
}

/// Builds a plan whose second write fails because its parent is a file.
fn failing_batch(sandbox: &Sandbox) -> Vec<Operation> {
    sandbox.payload_file("new.md", b"new");
    sandbox.payload_file("update.md", b"updated");
    sandbox.target_file("docs/existing.md", b"original");
    sandbox.target_file("docs/blocker", b"not a directory");
    vec![
        copy("payload/update.md", "docs/existing.md"),
        copy("payload/new.md", "docs/fresh/deep/new.md"),
        copy("payload/new.md", "docs/blocker/new.md"),
    ]
}

#[rstest]
fn write_failure_reports_partial_progress(sandbox: Sandbox) {
    let ops = failing_batch(&sandbox);
    let outcome = sandbox.apply(RollbackMode::Partial, &ops);

    assert!(matches!(
        outcome.result,
        Err(CopyError::Write { ref dest, .. }) if dest == "docs/blocker/new.md"
    ));
    assert_eq!(
        written(&outcome),
        ["docs/existing.md", "docs/fresh/deep/new.md"]
    );
    assert!(outcome.journal.is_empty());
    assert_eq!(sandbox.read_target("docs/existing.md"), b"updated");
    assert_eq!(sandbox.read_target("docs/fresh/deep/new.md"), b"new");
}

#[rstest]
fn transactional_rollback_restores_target_tree(sandbox: Sandbox) {
    let ops = failing_batch(&sandbox);
    let outcome = sandbox.apply(RollbackMode::Transactional, &ops);
    assert!(outcome.result.is_err());
    assert_eq!(outcome.files_written.len(), 2);

    outcome.journal.rollback().expect("rollback");

    assert_eq!(sandbox.read_target("docs/existing.md"), b"original");
    assert!(!sandbox.target.join("docs/fresh").exists());
    assert_eq!(sandbox.read_target("docs/blocker"), b"not a directory");
}

#[rstest]
fn rollback_after_repeated_writes_restores_original(sandbox: Sandbox) {
    sandbox.payload_file("one.md", b"one");
    sandbox.payload_file("two.md", b"two");
    sandbox.target_file("docs/A.MD", b"original");

    let outcome = sandbox.apply(
        RollbackMode::Transactional,
        &[
            copy("payload/one.md", "docs/A.MD"),
            copy("payload/two.md", "docs/A.MD"),
        ],
    );
    outcome.result.expect("apply succeeds");
    assert_eq!(sandbox.read_target("docs/A.MD"), b"two");

    outcome.journal.rollback().expect("rollback");
    assert_eq!(sandbox.read_target("docs/A.MD"), b"original");
}
