//! Sandboxed application of update packages from a repository inbox.
//!
//! An update package is a ZIP archive carrying a `manifest.json` and a
//! `payload/` tree. The manifest lists copy operations from the payload into
//! the repository. Every destination must normalise into the `docs/`
//! sandbox and avoid the canonical documents; every source must resolve
//! inside the payload. After the copies, an external validator checks the
//! documentation lifecycle, and the archive is moved to the applied store
//! with a JSON audit record.
//!
//! - [`archive`] stages archives and parses manifests.
//! - [`path_validator`] and [`sandbox`] decide which paths are allowed.
//! - [`copy_executor`] performs the copy operations with rollback.
//! - [`validator`] runs the external lifecycle check.
//! - [`audit`] writes the per-archive application records.
//! - [`inbox`] lists pending archives and moves applied ones.
//! - [`orchestrator`] drives a batch through all of the above.

pub mod archive;
pub mod audit;
pub mod cli;
pub mod config;
pub mod copy_executor;
pub mod error;
pub mod inbox;
pub mod orchestrator;
pub mod output;
pub mod path_validator;
pub mod sandbox;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod timestamp;
pub mod validator;
pub mod workspace;
