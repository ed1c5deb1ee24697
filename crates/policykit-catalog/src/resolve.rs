use crate::catalog::Catalog;
use policykit_core::{
    Control, Evidence, FrameworkId, IntegrityViolation, MappedArtifact, Policy, Requirement,
};
use serde::Serialize;

/// A requirement reached through a control mapping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequirement<'a> {
    /// Framework named by the mapping.
    pub framework_id: FrameworkId,
    /// Requirement id named by the mapping.
    pub requirement_id: &'a str,
    /// The requirement it resolved to.
    pub requirement: &'a Requirement,
}

/// A control joined against the policy, evidence and requirement catalogs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedControl<'a> {
    /// The control itself.
    pub control: &'a Control,
    /// Mapped policies, in authored order.
    pub policies: Vec<&'a Policy>,
    /// Mapped evidence items, in authored order.
    pub evidence: Vec<&'a Evidence>,
    /// Mapped requirements, in authored order.
    pub requirements: Vec<ResolvedRequirement<'a>>,
    /// References that did not resolve. Always empty on a checked catalog.
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "serialize_messages"
    )]
    pub dangling: Vec<IntegrityViolation>,
}

fn serialize_messages<S: serde::Serializer>(
    violations: &[IntegrityViolation],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(violations.iter().map(ToString::to_string))
}

impl ResolvedControl<'_> {
    /// True when every reference resolved.
    pub fn is_complete(&self) -> bool {
        self.dangling.is_empty()
    }
}

impl Catalog {
    /// Joins a control's references against this catalog, in authored order.
    pub fn resolve_control<'a>(&'a self, control: &'a Control) -> ResolvedControl<'a> {
        let mut resolved = ResolvedControl {
            control,
            policies: Vec::new(),
            evidence: Vec::new(),
            requirements: Vec::with_capacity(control.mapped_requirements.len()),
            dangling: Vec::new(),
        };

        for artifact in &control.mapped_artifacts {
            match artifact {
                MappedArtifact::Policy { policy_id } => match self.policy_by_id(policy_id) {
                    Some(policy) => resolved.policies.push(policy),
                    None => resolved
                        .dangling
                        .push(IntegrityViolation::UnknownPolicyReference {
                            control: control.id.clone(),
                            policy_id: policy_id.clone(),
                        }),
                },
                MappedArtifact::Evidence { evidence_id } => match self.evidence(evidence_id) {
                    Some(evidence) => resolved.evidence.push(evidence),
                    None => resolved
                        .dangling
                        .push(IntegrityViolation::UnknownEvidenceReference {
                            control: control.id.clone(),
                            evidence_id: evidence_id.clone(),
                        }),
                },
            }
        }

        for mapped in &control.mapped_requirements {
            match self.requirement(mapped.framework_id, &mapped.requirement_id) {
                Some(requirement) => resolved.requirements.push(ResolvedRequirement {
                    framework_id: mapped.framework_id,
                    requirement_id: &mapped.requirement_id,
                    requirement,
                }),
                None => resolved
                    .dangling
                    .push(IntegrityViolation::UnknownRequirementReference {
                        control: control.id.clone(),
                        framework: mapped.framework_id,
                        requirement_id: mapped.requirement_id.clone(),
                    }),
            }
        }

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policykit_core::MappedRequirement;

    #[test]
    fn test_resolve_builtin_control() {
        let catalog = Catalog::builtin().unwrap();
        let control = catalog.control("breach_notification").unwrap();
        let resolved = catalog.resolve_control(control);

        assert!(resolved.is_complete());
        assert_eq!(resolved.policies[0].id(), "breach_notification");
        assert_eq!(resolved.evidence[0].id, "breach_register");
        assert_eq!(
            resolved.requirements[0].requirement.name,
            "Article 33: Breach notification to supervisory authority"
        );
    }

    #[test]
    fn test_resolve_reports_dangling_references() {
        let catalog = Catalog::builtin().unwrap();
        let mut control = catalog.control("encryption").unwrap().clone();
        control
            .mapped_requirements
            .push(MappedRequirement::new(FrameworkId::Soc2, "CC99"));
        let resolved = catalog.resolve_control(&control);

        assert!(!resolved.is_complete());
        assert_eq!(resolved.dangling.len(), 1);
        assert_eq!(resolved.requirements.len(), control.mapped_requirements.len() - 1);

        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["control"]["id"], "encryption");
        assert!(json.get("dangling").is_some());
    }
}
