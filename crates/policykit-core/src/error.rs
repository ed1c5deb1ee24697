use crate::records::FrameworkId;
use thiserror::Error;

/// A convenience `Result` alias using [`PolicyKitError`].
pub type PolicyKitResult<T> = Result<T, PolicyKitError>;

/// Top-level error type for loading and querying the catalog.
#[derive(Error, Debug)]
pub enum PolicyKitError {
    /// The dataset parsed but failed one or more integrity checks.
    #[error("Integrity error: {} violation(s), first: {}", .0.len(), first_violation(.0))]
    Integrity(Vec<IntegrityViolation>),

    /// A named source (file or embedded document) could not be parsed.
    #[error("Parse error in {source_name}: {error}")]
    Parse {
        /// Name of the source, e.g. `policies/access_control_policy.json`.
        source_name: String,
        /// The underlying JSON error.
        #[source]
        error: serde_json::Error,
    },

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A lookup by key found nothing where a value was required.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of record, e.g. `policy`.
        kind: &'static str,
        /// The key that missed.
        key: String,
    },
}

fn first_violation(violations: &[IntegrityViolation]) -> String {
    violations
        .first()
        .map(ToString::to_string)
        .unwrap_or_default()
}

impl PolicyKitError {
    /// Wraps a JSON error with the name of the source it came from.
    pub fn parse(source_name: impl Into<String>, error: serde_json::Error) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            error,
        }
    }

    /// Shorthand for [`PolicyKitError::NotFound`].
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }
}

/// A single data-integrity defect in the authored content.
///
/// These are content-authoring bugs, never transient conditions: they are
/// collected in one pass at load time and surfaced together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// A control maps a policy id that no policy carries.
    #[error("control '{control}' references unknown policy '{policy_id}'")]
    UnknownPolicyReference {
        /// Id of the referencing control.
        control: String,
        /// The policy id that resolved to nothing.
        policy_id: String,
    },

    /// A control maps an evidence id absent from the evidence catalog.
    #[error("control '{control}' references unknown evidence '{evidence_id}'")]
    UnknownEvidenceReference {
        /// Id of the referencing control.
        control: String,
        /// The evidence id that resolved to nothing.
        evidence_id: String,
    },

    /// A control maps a requirement that its framework does not define.
    #[error("control '{control}' references unknown requirement {framework}/{requirement_id}")]
    UnknownRequirementReference {
        /// Id of the referencing control.
        control: String,
        /// Framework the mapping names.
        framework: FrameworkId,
        /// Requirement id missing from that framework.
        requirement_id: String,
    },

    /// A document node breaks the shape rules for its type.
    #[error("malformed node in '{document}' at {path}: {reason}")]
    MalformedNode {
        /// Catalog key of the policy.
        document: String,
        /// Location of the node, e.g. `content[2].content[0]`.
        path: String,
        /// The rule that was broken.
        reason: String,
    },

    /// Two records in the same catalog share a key.
    #[error("duplicate {catalog} key '{key}'")]
    DuplicateKey {
        /// Which catalog, e.g. `policy id` or `training video`.
        catalog: &'static str,
        /// The repeated key.
        key: String,
    },

    /// A record is filed under a key that differs from its own id.
    #[error("{catalog} filed under '{key}' carries id '{id}'")]
    KeyMismatch {
        /// Which catalog.
        catalog: &'static str,
        /// Key the record is filed under.
        key: String,
        /// Id the record carries.
        id: String,
    },

    /// A training video's url does not embed its youtube id.
    #[error("training video '{video}' url '{url}' does not match youtube id '{youtube_id}'")]
    VideoUrlMismatch {
        /// Id of the video.
        video: String,
        /// The authored url.
        url: String,
        /// The authored youtube id.
        youtube_id: String,
    },

    /// A control maps no artifact or no requirement.
    #[error("control '{control}' has no mapped {missing}")]
    EmptyControlMapping {
        /// Id of the control.
        control: String,
        /// `artifacts` or `requirements`.
        missing: &'static str,
    },

    /// Requirements exist for a framework that is not declared.
    #[error("requirements defined for undeclared framework {framework}")]
    UnknownFramework {
        /// The framework absent from the frameworks list.
        framework: FrameworkId,
    },

    /// A requirements file is named after no known framework.
    #[error("requirements file '{file}' does not name a known framework")]
    UnknownRequirementFile {
        /// Path of the file relative to the data directory.
        file: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_error_display_counts_violations() {
        let err = PolicyKitError::Integrity(vec![
            IntegrityViolation::UnknownPolicyReference {
                control: "ctl_1".to_string(),
                policy_id: "missing".to_string(),
            },
            IntegrityViolation::DuplicateKey {
                catalog: "evidence",
                key: "access_logs".to_string(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Integrity error: 2 violation(s), first: control 'ctl_1' references unknown policy 'missing'"
        );
    }

    #[test]
    fn test_requirement_violation_display() {
        let v = IntegrityViolation::UnknownRequirementReference {
            control: "ctl_9".to_string(),
            framework: FrameworkId::Gdpr,
            requirement_id: "A99".to_string(),
        };
        assert_eq!(
            v.to_string(),
            "control 'ctl_9' references unknown requirement gdpr/A99"
        );
    }

    #[test]
    fn test_parse_error_names_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PolicyKitError::parse("evidence.json", json_err);
        assert!(err.to_string().starts_with("Parse error in evidence.json:"));
    }

    #[test]
    fn test_not_found_display() {
        let err = PolicyKitError::not_found("policy", "nope_policy");
        assert_eq!(err.to_string(), "policy not found: nope_policy");
    }
}
