use crate::document::{self, Node, Walk};
use crate::error::IntegrityViolation;
use crate::placeholder::{PlaceholderKey, Substitutions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Supported compliance frameworks.
///
/// Only SOC 2 and GDPR are populated; the set is closed until another
/// framework ships with its requirement table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkId {
    /// AICPA SOC 2 Trust Services Criteria.
    Soc2,
    /// EU General Data Protection Regulation.
    Gdpr,
}

impl FrameworkId {
    /// All populated frameworks, in display order.
    pub const ALL: [FrameworkId; 2] = [FrameworkId::Soc2, FrameworkId::Gdpr];

    /// The identifier as it appears in the data (`soc2`, `gdpr`).
    pub fn as_str(self) -> &'static str {
        match self {
            FrameworkId::Soc2 => "soc2",
            FrameworkId::Gdpr => "gdpr",
        }
    }

    /// Human-facing framework label.
    pub fn label(self) -> &'static str {
        match self {
            FrameworkId::Soc2 => "SOC 2",
            FrameworkId::Gdpr => "GDPR",
        }
    }
}

impl fmt::Display for FrameworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FrameworkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soc2" => Ok(FrameworkId::Soc2),
            "gdpr" => Ok(FrameworkId::Gdpr),
            other => Err(format!("unknown framework '{other}'")),
        }
    }
}

/// How often a policy is reviewed or evidence is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Every month.
    Monthly,
    /// Every quarter.
    Quarterly,
    /// Every year.
    Yearly,
}

impl Frequency {
    /// The lowercase name used in the data.
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }
}

/// Owning department for a policy or evidence item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    /// Information technology.
    It,
    /// Human resources.
    Hr,
    /// Administration and facilities.
    Admin,
    /// Governance, risk and compliance.
    Gov,
}

impl Department {
    /// The lowercase code used in the data.
    pub fn as_str(self) -> &'static str {
        match self {
            Department::It => "it",
            Department::Hr => "hr",
            Department::Admin => "admin",
            Department::Gov => "gov",
        }
    }
}

/// Descriptive metadata carried at the root of every policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyMetadata {
    /// Join key used by controls (`mappedArtifacts[].policyId`).
    pub id: String,
    /// URL-friendly name, e.g. `access-control-policy`.
    pub slug: String,
    /// Display title.
    pub name: String,
    /// One-sentence summary.
    pub description: String,
    /// Review cadence.
    pub frequency: Frequency,
    /// Owning department.
    pub department: Department,
}

/// Discriminator of a policy root; always `"doc"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocType {
    /// The only root type.
    #[default]
    #[serde(rename = "doc")]
    Doc,
}

/// A policy template: metadata plus its rich-text document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Always [`DocType::Doc`].
    #[serde(rename = "type", default)]
    pub doc_type: DocType,
    /// Descriptive metadata.
    pub metadata: PolicyMetadata,
    /// Top-level block nodes. May be empty.
    pub content: Vec<Node>,
}

impl Policy {
    /// Shorthand for `metadata.id`.
    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Depth-first traversal of the body.
    pub fn walk(&self) -> Walk<'_> {
        document::walk(&self.content)
    }

    /// Placeholder keys used in the body.
    pub fn placeholders(&self) -> BTreeSet<PlaceholderKey> {
        document::placeholders(&self.content)
    }

    /// A copy with the supplied placeholder values filled in.
    pub fn fill(&self, substitutions: &Substitutions) -> Policy {
        Policy {
            doc_type: self.doc_type,
            metadata: self.metadata.clone(),
            content: document::fill(&self.content, substitutions),
        }
    }

    /// Plain text of the body, one line per block.
    pub fn text_content(&self) -> String {
        document::text_content(&self.content)
    }

    /// Shape violations, reported against `key`.
    pub fn validate(&self, key: &str) -> Vec<IntegrityViolation> {
        document::validate(key, &self.content)
    }
}

/// Description of the proof an auditor expects for a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Evidence {
    /// Equal to the key the item is filed under.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the evidence consists of.
    pub description: String,
    /// Collection cadence.
    pub frequency: Frequency,
    /// Department that collects it.
    pub department: Department,
}

/// A single clause of a framework (SOC 2 criterion or GDPR article).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Requirement {
    /// Clause reference and title, e.g. `CC6: Logical and Physical Access`.
    pub name: String,
    /// What the clause demands.
    pub description: String,
}

/// A compliance standard under which requirements are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Framework {
    /// Which framework.
    pub id: FrameworkId,
    /// Display name.
    pub name: String,
    /// Edition of the standard.
    pub version: String,
    /// Short summary.
    pub description: String,
}

/// A reference from a control to a policy or an evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum MappedArtifact {
    /// A policy, by `metadata.id`.
    Policy {
        /// Target policy id.
        #[serde(rename = "policyId")]
        policy_id: String,
    },
    /// An evidence item, by id.
    Evidence {
        /// Target evidence id.
        #[serde(rename = "evidenceId")]
        evidence_id: String,
    },
}

/// A reference from a control to a framework requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MappedRequirement {
    /// Framework the requirement belongs to.
    pub framework_id: FrameworkId,
    /// Requirement id within that framework.
    pub requirement_id: String,
}

impl MappedRequirement {
    /// Builds a mapping to `framework_id`/`requirement_id`.
    pub fn new(framework_id: FrameworkId, requirement_id: impl Into<String>) -> Self {
        Self {
            framework_id,
            requirement_id: requirement_id.into(),
        }
    }
}

/// A compliance objective linking policy and evidence to requirements.
///
/// Controls carry only references; resolve them against the catalog to get
/// the policy, evidence and requirement content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Control {
    /// Unique control id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The objective the control meets.
    pub description: String,
    /// Policies and evidence backing the control.
    pub mapped_artifacts: Vec<MappedArtifact>,
    /// Requirements the control satisfies.
    pub mapped_requirements: Vec<MappedRequirement>,
}

impl Control {
    /// Policy ids this control maps, in authored order.
    pub fn policy_ids(&self) -> impl Iterator<Item = &str> {
        self.mapped_artifacts.iter().filter_map(|a| match a {
            MappedArtifact::Policy { policy_id } => Some(policy_id.as_str()),
            MappedArtifact::Evidence { .. } => None,
        })
    }

    /// Evidence ids this control maps, in authored order.
    pub fn evidence_ids(&self) -> impl Iterator<Item = &str> {
        self.mapped_artifacts.iter().filter_map(|a| match a {
            MappedArtifact::Evidence { evidence_id } => Some(evidence_id.as_str()),
            MappedArtifact::Policy { .. } => None,
        })
    }

    /// Whether this control maps the given requirement.
    pub fn maps_requirement(&self, framework: FrameworkId, requirement_id: &str) -> bool {
        self.mapped_requirements
            .iter()
            .any(|r| r.framework_id == framework && r.requirement_id == requirement_id)
    }
}

/// Metadata for a security awareness training video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrainingVideo {
    /// Unique id, e.g. `sat-1`.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Topics covered.
    pub description: String,
    /// YouTube video id.
    pub youtube_id: String,
    /// Watch url derived from `youtube_id`.
    pub url: String,
}

/// Prefix every training video url starts with.
pub const YOUTUBE_WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";

impl TrainingVideo {
    /// The url this video's youtube id implies.
    pub fn expected_url(&self) -> String {
        format!("{YOUTUBE_WATCH_PREFIX}{}", self.youtube_id)
    }

    /// Whether `url` embeds `youtube_id` exactly.
    pub fn url_matches(&self) -> bool {
        self.url == self.expected_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_id_serde_and_parse() {
        assert_eq!(serde_json::to_string(&FrameworkId::Soc2).unwrap(), "\"soc2\"");
        let parsed: FrameworkId = serde_json::from_str("\"gdpr\"").unwrap();
        assert_eq!(parsed, FrameworkId::Gdpr);
        assert_eq!("SOC2".parse::<FrameworkId>().unwrap(), FrameworkId::Soc2);
        assert!("iso27001".parse::<FrameworkId>().is_err());
        assert_eq!(FrameworkId::Gdpr.label(), "GDPR");
    }

    #[test]
    fn test_stray_department_rejected() {
        let json = r#"{"id":"x","name":"X","description":"d","frequency":"yearly","department":"sales"}"#;
        assert!(serde_json::from_str::<Evidence>(json).is_err());
    }

    #[test]
    fn test_control_artifact_accessors() {
        let json = r#"{
            "id": "ctl_access_review",
            "name": "Access Review",
            "description": "Quarterly access review",
            "mappedArtifacts": [
                {"type": "policy", "policyId": "access_control"},
                {"type": "evidence", "evidenceId": "access_review_records"}
            ],
            "mappedRequirements": [{"frameworkId": "soc2", "requirementId": "CC6"}]
        }"#;
        let control: Control = serde_json::from_str(json).unwrap();
        assert_eq!(control.policy_ids().collect::<Vec<_>>(), vec!["access_control"]);
        assert_eq!(
            control.evidence_ids().collect::<Vec<_>>(),
            vec!["access_review_records"]
        );
        assert!(control.maps_requirement(FrameworkId::Soc2, "CC6"));
        assert!(!control.maps_requirement(FrameworkId::Gdpr, "CC6"));
    }

    #[test]
    fn test_unknown_artifact_type_rejected() {
        let json = r#"{"type": "procedure", "procedureId": "p1"}"#;
        assert!(serde_json::from_str::<MappedArtifact>(json).is_err());
    }

    #[test]
    fn test_video_url_matches() {
        let mut video = TrainingVideo {
            id: "sat-1".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            youtube_id: "abc123".to_string(),
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
        };
        assert!(video.url_matches());
        video.url = "https://youtu.be/abc123".to_string();
        assert!(!video.url_matches());
    }
}
