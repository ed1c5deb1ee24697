use crate::catalog::Catalog;
use policykit_core::{IntegrityViolation, MappedArtifact};

/// Runs every cross-catalog and shape check over a built catalog.
///
/// Duplicate keys are caught while parsing, before a catalog exists; this
/// pass covers everything that can be seen in the built value.
pub fn check(catalog: &Catalog) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();
    check_policies(catalog, &mut violations);
    check_evidence_keys(catalog, &mut violations);
    check_frameworks(catalog, &mut violations);
    check_controls(catalog, &mut violations);
    check_training_videos(catalog, &mut violations);
    violations
}

fn check_policies(catalog: &Catalog, out: &mut Vec<IntegrityViolation>) {
    for (key, policy) in catalog.policies() {
        out.extend(policy.validate(key));
    }
}

fn check_evidence_keys(catalog: &Catalog, out: &mut Vec<IntegrityViolation>) {
    for (key, evidence) in &catalog.evidence.entries {
        if *key != evidence.id {
            out.push(IntegrityViolation::KeyMismatch {
                catalog: "evidence",
                key: key.clone(),
                id: evidence.id.clone(),
            });
        }
    }
}

fn check_frameworks(catalog: &Catalog, out: &mut Vec<IntegrityViolation>) {
    for framework in catalog.requirements.keys() {
        if catalog.framework(*framework).is_none() {
            out.push(IntegrityViolation::UnknownFramework {
                framework: *framework,
            });
        }
    }
}

fn check_controls(catalog: &Catalog, out: &mut Vec<IntegrityViolation>) {
    for control in catalog.controls() {
        if control.mapped_artifacts.is_empty() {
            out.push(IntegrityViolation::EmptyControlMapping {
                control: control.id.clone(),
                missing: "artifacts",
            });
        }
        if control.mapped_requirements.is_empty() {
            out.push(IntegrityViolation::EmptyControlMapping {
                control: control.id.clone(),
                missing: "requirements",
            });
        }

        for artifact in &control.mapped_artifacts {
            match artifact {
                MappedArtifact::Policy { policy_id } => {
                    if catalog.policy_by_id(policy_id).is_none() {
                        out.push(IntegrityViolation::UnknownPolicyReference {
                            control: control.id.clone(),
                            policy_id: policy_id.clone(),
                        });
                    }
                }
                MappedArtifact::Evidence { evidence_id } => {
                    if catalog.evidence(evidence_id).is_none() {
                        out.push(IntegrityViolation::UnknownEvidenceReference {
                            control: control.id.clone(),
                            evidence_id: evidence_id.clone(),
                        });
                    }
                }
            }
        }

        for mapped in &control.mapped_requirements {
            if catalog
                .requirement(mapped.framework_id, &mapped.requirement_id)
                .is_none()
            {
                out.push(IntegrityViolation::UnknownRequirementReference {
                    control: control.id.clone(),
                    framework: mapped.framework_id,
                    requirement_id: mapped.requirement_id.clone(),
                });
            }
        }
    }
}

fn check_training_videos(catalog: &Catalog, out: &mut Vec<IntegrityViolation>) {
    for video in catalog.training_videos() {
        if !video.url_matches() {
            out.push(IntegrityViolation::VideoUrlMismatch {
                video: video.id.clone(),
                url: video.url.clone(),
                youtube_id: video.youtube_id.clone(),
            });
        }
    }
}
