//! Package archive handling: staging, manifest schema, and manifest hashing.
//!
//! # Sub-modules
//!
//! - [`extraction`]: Unpacks an archive into an auto-removed staging root.
//! - [`manifest`]: Typed manifest (`Manifest`, `Operation`, `CopyOp`).
//! - [`manifest_parser`]: Structural decoding of `manifest.json`.
//! - [`sha256_digest`]: SHA-256 digest newtype for manifest provenance.

pub mod extraction;
pub mod manifest;
pub mod manifest_parser;
pub mod sha256_digest;

/// File name of the manifest document at the archive root.
pub const MANIFEST_FILE: &str = "manifest.json";
