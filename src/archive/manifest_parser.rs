//! Structural decoding of `manifest.json`.
//!
//! The document is first read as untyped JSON so each schema violation can
//! be reported precisely: the top level must be an object, `package_id` a
//! string, `ops` a list, and every operation an object whose tagged shape
//! deserializes into [`Operation`]. Failures inside `ops` carry the index
//! of the offending element.

use super::manifest::{Manifest, Operation};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// What was wrong with a single manifest operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpIssue {
    /// The element is not a JSON object.
    NotAnObject,
    /// The `op` tag names a kind this build does not support.
    UnsupportedKind(String),
    /// The `op` tag is missing or not a string, or a field is missing or
    /// of the wrong type.
    Malformed(String),
}

impl fmt::Display for OpIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("must be an object"),
            Self::UnsupportedKind(kind) => write!(
                f,
                ".op must be one of {} (got \"{kind}\")",
                Operation::KINDS.join(", ")
            ),
            Self::Malformed(reason) => write!(f, "is malformed: {reason}"),
        }
    }
}

/// Errors arising from manifest decoding.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The bytes are not valid UTF-8 JSON.
    #[error("manifest.json is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The top-level value is not an object.
    #[error("manifest.json must be an object")]
    NotAnObject,

    /// `package_id` is missing or not a string.
    #[error("manifest.json package_id must be a string")]
    BadPackageId,

    /// `ops` is missing or not a list.
    #[error("manifest.json ops must be a list")]
    OpsNotAList,

    /// An element of `ops` is invalid.
    #[error("op[{index}] {issue}")]
    BadOp {
        /// Zero-based position of the element in `ops`.
        index: usize,
        /// What was wrong with it.
        issue: OpIssue,
    },
}

/// Decode and structurally validate manifest bytes.
///
/// # Errors
///
/// Returns the first [`ManifestError`] encountered, checking the top level
/// before walking `ops` in order.
///
/// # Examples
///
/// ```
/// use updates_inbox::archive::manifest_parser::parse_manifest;
///
/// let json = br#"{"package_id":"p1","ops":[{"op":"copy","src":"payload/a.md","dest":"docs/A.MD"}]}"#;
/// let manifest = parse_manifest(json).expect("valid manifest");
/// assert_eq!(manifest.package_id(), "p1");
/// assert_eq!(manifest.ops().len(), 1);
/// ```
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let document: Value = serde_json::from_slice(bytes)?;
    let Value::Object(fields) = document else {
        return Err(ManifestError::NotAnObject);
    };

    let package_id = fields
        .get("package_id")
        .and_then(Value::as_str)
        .ok_or(ManifestError::BadPackageId)?
        .to_owned();

    let raw_ops = fields
        .get("ops")
        .and_then(Value::as_array)
        .ok_or(ManifestError::OpsNotAList)?;

    let ops = raw_ops
        .iter()
        .enumerate()
        .map(|(index, value)| {
            parse_operation(value).map_err(|issue| ManifestError::BadOp { index, issue })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Manifest::new(package_id, ops))
}

fn parse_operation(value: &Value) -> Result<Operation, OpIssue> {
    let Value::Object(fields) = value else {
        return Err(OpIssue::NotAnObject);
    };
    let kind = fields.get("op").and_then(Value::as_str);
    if let Some(unknown) = kind.filter(|k| !Operation::KINDS.contains(k)) {
        return Err(OpIssue::UnsupportedKind(unknown.to_owned()));
    }
    Operation::deserialize(value).map_err(|e| OpIssue::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::manifest::CopyOp;
    use rstest::rstest;

    #[test]
    fn parses_ops_in_order() {
        let json = br#"{
            "package_id": "p1",
            "ops": [
                {"op": "copy", "src": "payload/a.md", "dest": "docs/A.MD"},
                {"op": "copy", "src": "payload/b.md", "dest": "docs/A.MD", "comment": "ignored"}
            ]
        }"#;
        let manifest = parse_manifest(json).expect("valid manifest");
        assert_eq!(manifest.package_id(), "p1");
        assert_eq!(
            manifest.ops(),
            &[
                Operation::Copy(CopyOp::new("payload/a.md", "docs/A.MD")),
                Operation::Copy(CopyOp::new("payload/b.md", "docs/A.MD")),
            ]
        );
    }

    #[test]
    fn empty_ops_list_is_valid() {
        let manifest = parse_manifest(br#"{"package_id":"p","ops":[]}"#).expect("valid");
        assert!(manifest.ops().is_empty());
    }

    #[rstest]
    #[case::syntax(b"{not json".as_slice())]
    #[case::not_utf8(b"\xff\xfe".as_slice())]
    fn rejects_undecodable_bytes(#[case] bytes: &[u8]) {
        assert!(matches!(
            parse_manifest(bytes),
            Err(ManifestError::InvalidJson(_))
        ));
    }

    #[rstest]
    #[case::array(r#"[]"#)]
    #[case::string(r#""manifest""#)]
    fn rejects_non_object_documents(#[case] json: &str) {
        assert!(matches!(
            parse_manifest(json.as_bytes()),
            Err(ManifestError::NotAnObject)
        ));
    }

    #[rstest]
    #[case::missing(r#"{"ops":[]}"#)]
    #[case::number(r#"{"package_id":7,"ops":[]}"#)]
    fn rejects_bad_package_id(#[case] json: &str) {
        assert!(matches!(
            parse_manifest(json.as_bytes()),
            Err(ManifestError::BadPackageId)
        ));
    }

    #[rstest]
    #[case::missing(r#"{"package_id":"p"}"#)]
    #[case::object(r#"{"package_id":"p","ops":{}}"#)]
    fn rejects_bad_ops(#[case] json: &str) {
        assert!(matches!(
            parse_manifest(json.as_bytes()),
            Err(ManifestError::OpsNotAList)
        ));
    }

    #[test]
    fn reports_index_of_non_object_op() {
        let json = br#"{"package_id":"p","ops":[{"op":"copy","src":"payload/a","dest":"docs/a"},"copy"]}"#;
        let err = parse_manifest(json).expect_err("bad op");
        assert!(matches!(
            err,
            ManifestError::BadOp { index: 1, issue: OpIssue::NotAnObject }
        ));
        assert_eq!(err.to_string(), "op[1] must be an object");
    }

    #[test]
    fn rejects_unknown_kind_explicitly() {
        let json = br#"{"package_id":"p","ops":[{"op":"delete","src":"payload/a","dest":"docs/a"}]}"#;
        let err = parse_manifest(json).expect_err("unknown kind");
        assert!(matches!(
            &err,
            ManifestError::BadOp { index: 0, issue: OpIssue::UnsupportedKind(kind) } if kind == "delete"
        ));
        assert!(err.to_string().contains("\"delete\""));
    }

    #[rstest]
    #[case::missing_tag(r#"{"src":"payload/a","dest":"docs/a"}"#)]
    #[case::numeric_tag(r#"{"op":1,"src":"payload/a","dest":"docs/a"}"#)]
    #[case::missing_dest(r#"{"op":"copy","src":"payload/a"}"#)]
    #[case::numeric_src(r#"{"op":"copy","src":3,"dest":"docs/a"}"#)]
    fn rejects_malformed_ops(#[case] op: &str) {
        let json = format!(r#"{{"package_id":"p","ops":[{op}]}}"#);
        let err = parse_manifest(json.as_bytes()).expect_err("malformed op");
        assert!(matches!(
            err,
            ManifestError::BadOp { index: 0, issue: OpIssue::Malformed(_) }
        ));
    }
}
