//! updates-inbox applier entrypoint.
//!
//! Resolves the repository root and configuration, then applies every
//! pending archive in the inbox. Exit status distinguishes a clean run (0)
//! from a halted batch (1) and a failure outside any archive (2).

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use std::io::Write;
use updates_inbox::archive::extraction::ZipExtractor;
use updates_inbox::audit::AuditLogger;
use updates_inbox::cli::Cli;
use updates_inbox::config::ApplyConfig;
use updates_inbox::error::{ApplyError, Result};
use updates_inbox::inbox::ArchiveInbox;
use updates_inbox::orchestrator::{ApplyOrchestrator, BatchOutcome};
use updates_inbox::output::{no_archives_message, write_dry_run, write_stderr_line};
use updates_inbox::validator::CommandValidator;
use updates_inbox::workspace::discover_repo_root;

/// What a successful invocation did.
#[derive(Debug)]
enum RunOutcome {
    DryRun,
    Batch(BatchOutcome),
}

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<RunOutcome> {
    let repo_root = resolve_repo_root(cli)?;
    let config = load_config(cli, &repo_root)?;
    let inbox = ArchiveInbox::new(
        config.inbox_dir.clone(),
        config.applied_archives_dir.clone(),
    );

    if cli.dry_run {
        let pending = inbox.pending()?;
        write_dry_run(stderr, &repo_root, &config, &pending);
        return Ok(RunOutcome::DryRun);
    }

    let extractor = ZipExtractor::default();
    let validator = CommandValidator::new(config.validator.command.clone(), repo_root.clone())
        .with_timeout(config.validator.timeout());
    let logger = AuditLogger::new(config.applied_dir.clone(), cli.provenance());

    let outcome = ApplyOrchestrator::new(
        repo_root.into_std_path_buf(),
        inbox,
        logger,
        &extractor,
        &validator,
    )
    .with_rollback(config.rollback)
    .quiet(cli.quiet)
    .run(stderr)?;

    if outcome == BatchOutcome::NoArchives && !cli.quiet {
        write_stderr_line(stderr, no_archives_message(&config.inbox_dir));
    }
    Ok(RunOutcome::Batch(outcome))
}

/// Uses `--repo-root` when given, otherwise walks up from the current
/// directory.
fn resolve_repo_root(cli: &Cli) -> Result<Utf8PathBuf> {
    match &cli.repo_root {
        Some(root) => Ok(root.clone()),
        None => discover_repo_root().map_err(|source| ApplyError::Io {
            context: "failed to determine repository root".to_owned(),
            source,
        }),
    }
}

/// Loads the configuration and applies command-line overrides.
fn load_config(cli: &Cli, repo_root: &Utf8Path) -> Result<ApplyConfig> {
    let mut config = ApplyConfig::load(
        repo_root.as_std_path(),
        cli.config.as_deref().map(Utf8Path::as_std_path),
    )?;
    if let Some(timeout_secs) = cli.validator_timeout {
        config.validator.timeout_secs = timeout_secs;
    }
    Ok(config)
}

fn exit_code_for_run_result(result: Result<RunOutcome>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(RunOutcome::DryRun | RunOutcome::Batch(BatchOutcome::NoArchives)) => 0,
        Ok(RunOutcome::Batch(BatchOutcome::AllApplied { .. })) => 0,
        Ok(RunOutcome::Batch(BatchOutcome::Halted { .. })) => 1,
        Err(err) => {
            write_stderr_line(stderr, err);
            2
        }
    }
}
