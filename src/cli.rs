//! CLI argument definitions for the updates-inbox applier.
//!
//! Kept apart from the binary so the argument surface can be parsed and
//! tested without running a batch.

use crate::audit::{ACTOR_ENV, DEFAULT_ACTOR, Provenance, RUN_ID_ENV};
use camino::Utf8PathBuf;
use clap::Parser;

/// Apply pending update packages from the inbox.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "updates-apply")]
#[command(version, about)]
#[command(long_about = concat!(
    "Apply pending update packages from the inbox.\n\n",
    "Each ZIP archive in the inbox carries a manifest.json and a payload/ tree. ",
    "Archives are applied one at a time in file-name order: every copy ",
    "operation is checked against the docs/ sandbox, the files are written, ",
    "the docs lifecycle validator is run, and the archive is moved to the ",
    "applied store. The first failure halts the batch and leaves the archive ",
    "in the inbox. Every archive, applied or failed, gets a JSON audit record.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  every archive applied, or the inbox was empty\n",
    "  1  an archive failed and the batch halted\n",
    "  2  configuration, inbox or audit-log failure\n",
))]
pub struct Cli {
    /// Repository root [default: nearest ancestor with AGENTS.md or .git].
    #[arg(long, value_name = "DIR")]
    pub repo_root: Option<Utf8PathBuf>,

    /// Configuration file [default: <repo-root>/updates-inbox.toml].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Actor recorded in audit logs.
    #[arg(long, env = ACTOR_ENV, default_value = DEFAULT_ACTOR)]
    pub actor: String,

    /// CI run identifier recorded in audit logs.
    #[arg(long, env = RUN_ID_ENV, default_value = "")]
    pub run_id: String,

    /// Seconds to wait for the validator [default: from config, 300].
    #[arg(long, value_name = "SECS")]
    pub validator_timeout: Option<u64>,

    /// Show configuration and pending archives without applying anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Audit provenance from `--actor` and `--run-id`.
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        Provenance::new(self.actor.clone(), self.run_id.clone())
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            repo_root: None,
            config: None,
            actor: DEFAULT_ACTOR.to_owned(),
            run_id: String::new(),
            validator_timeout: None,
            dry_run: false,
            quiet: false,
        }
    }
}
