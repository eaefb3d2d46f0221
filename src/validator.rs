//! External consistency check run over the target tree after copying.
//!
//! The check is owned by another tool. Only its exit status matters: zero
//! passes, anything else (including death by signal) fails. Its output is
//! passed straight through to the operator. The wait is bounded so a hung
//! checker cannot stall the batch forever.

use camino::Utf8PathBuf;
use log::debug;
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default bound on the external check (5 minutes).
pub const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(300);

/// A consistency check over the target tree.
#[cfg_attr(test, mockall::automock)]
pub trait Validator {
    /// Run the check and report whether the tree is acceptable.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidatorError`] when the check could not be run to
    /// completion. A check that runs and fails is `Ok(false)`.
    fn check(&self) -> Result<bool, ValidatorError>;
}

/// Errors that prevent the check from producing a verdict.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    /// No program was configured.
    #[error("validator command is empty")]
    EmptyCommand,

    /// The program could not be started or waited on.
    #[error("failed to run validator {program}: {source}")]
    Spawn {
        /// The program that failed.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish within the configured bound.
    #[error("validator {program} timed out after {} seconds", .timeout.as_secs())]
    TimedOut {
        /// The program that was killed.
        program: String,
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

/// Runs a command in the repository root and checks its exit status.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8PathBuf;
/// use updates_inbox::validator::{CommandValidator, Validator};
///
/// let validator = CommandValidator::new(
///     vec!["python3".to_owned(), "scripts/validate_docs_lifecycle_v1.py".to_owned()],
///     Utf8PathBuf::from("."),
/// );
/// let passed = validator.check()?;
/// # Ok::<(), updates_inbox::validator::ValidatorError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandValidator {
    command: Vec<String>,
    working_dir: Utf8PathBuf,
    timeout: Duration,
}

impl CommandValidator {
    /// Create a validator for `command` (program followed by arguments)
    /// run inside `working_dir` with the default timeout.
    #[must_use]
    pub const fn new(command: Vec<String>, working_dir: Utf8PathBuf) -> Self {
        Self {
            command,
            working_dir,
            timeout: DEFAULT_VALIDATOR_TIMEOUT,
        }
    }

    /// Replace the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Validator for CommandValidator {
    fn check(&self) -> Result<bool, ValidatorError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(ValidatorError::EmptyCommand);
        };
        let spawn_error = |source| ValidatorError::Spawn {
            program: program.clone(),
            source,
        };

        debug!("running validator {:?} in {}", self.command, self.working_dir);
        let mut child = Command::new(program)
            .args(args)
            .current_dir(self.working_dir.as_std_path())
            .stdin(Stdio::null())
            .spawn()
            .map_err(spawn_error)?;

        match child.wait_timeout(self.timeout).map_err(spawn_error)? {
            Some(status) => {
                debug!("validator {program} exited with {status}");
                Ok(status.success())
            }
            None => {
                // Timeout - kill the process
                let _ = child.kill();
                let _ = child.wait();
                Err(ValidatorError::TimedOut {
                    program: program.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rstest::rstest;

    fn shell(script: &str, dir: &std::path::Path) -> CommandValidator {
        let working_dir = Utf8PathBuf::try_from(dir.to_path_buf()).expect("UTF-8 temp path");
        CommandValidator::new(
            vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()],
            working_dir,
        )
    }

    #[rstest]
    #[case::pass("exit 0", true)]
    #[case::fail("exit 1", false)]
    #[case::other_code("exit 42", false)]
    fn exit_status_decides_verdict(#[case] script: &str, #[case] expected: bool) {
        let temp = tempfile::tempdir().expect("temp dir");
        let verdict = shell(script, temp.path()).check().expect("validator runs");
        assert_eq!(verdict, expected);
    }

    #[test]
    fn runs_inside_working_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        std::fs::write(temp.path().join("marker"), b"").expect("write marker");
        let verdict = shell("test -f marker", temp.path()).check().expect("validator runs");
        assert!(verdict);
    }

    #[test]
    fn hung_validator_times_out() {
        let temp = tempfile::tempdir().expect("temp dir");
        let validator = shell("sleep 5", temp.path()).with_timeout(Duration::from_millis(100));
        let err = validator.check().expect_err("timeout");
        assert!(matches!(err, ValidatorError::TimedOut { .. }));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let working_dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8");
        let validator =
            CommandValidator::new(vec!["definitely-not-a-validator-binary".to_owned()], working_dir);
        assert!(matches!(
            validator.check(),
            Err(ValidatorError::Spawn { .. })
        ));
    }

    #[test]
    fn empty_command_is_rejected() {
        let validator = CommandValidator::new(Vec::new(), Utf8PathBuf::from("."));
        assert!(matches!(
            validator.check(),
            Err(ValidatorError::EmptyCommand)
        ));
    }
}
