use crate::catalog::Catalog;
use chrono::{DateTime, Utc};
use policykit_core::FrameworkId;
use serde::{Deserialize, Serialize};

/// How much of a framework the controls reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    /// Every requirement has a control.
    Covered,
    /// Some requirements have a control.
    PartiallyCovered,
    /// No requirement has a control.
    Uncovered,
}

/// Coverage of a single requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCoverage {
    /// Requirement id within the framework.
    pub requirement_id: String,
    /// Requirement name.
    pub name: String,
    /// Ids of the controls that map this requirement, in control order.
    pub control_ids: Vec<String>,
}

impl RequirementCoverage {
    /// True when at least one control maps the requirement.
    pub fn is_covered(&self) -> bool {
        !self.control_ids.is_empty()
    }
}

/// Per-framework requirement coverage report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    /// The framework reported on.
    pub framework: FrameworkId,
    /// Overall status.
    pub status: CoverageStatus,
    /// One entry per requirement, in authored order.
    pub requirements: Vec<RequirementCoverage>,
    /// When the report was built.
    pub generated_at: DateTime<Utc>,
    /// e.g. `SOC 2: 12/13 requirements covered`.
    pub summary: String,
}

impl CoverageReport {
    /// Builds the report for one framework from the catalog's controls.
    pub fn for_framework(catalog: &Catalog, framework: FrameworkId) -> Self {
        let requirements: Vec<RequirementCoverage> = catalog
            .requirements(framework)
            .iter()
            .map(|(id, requirement)| RequirementCoverage {
                requirement_id: id.clone(),
                name: requirement.name.clone(),
                control_ids: catalog
                    .controls_for_requirement(framework, id)
                    .into_iter()
                    .map(|c| c.id.clone())
                    .collect(),
            })
            .collect();

        let covered = requirements.iter().filter(|r| r.is_covered()).count();
        let total = requirements.len();

        let status = if covered == total {
            CoverageStatus::Covered
        } else if covered == 0 {
            CoverageStatus::Uncovered
        } else {
            CoverageStatus::PartiallyCovered
        };

        let summary = format!(
            "{}: {covered}/{total} requirements covered",
            framework.label()
        );

        Self {
            framework,
            status,
            requirements,
            generated_at: Utc::now(),
            summary,
        }
    }

    /// Reports for every framework, in display order.
    pub fn all(catalog: &Catalog) -> Vec<Self> {
        FrameworkId::ALL
            .iter()
            .map(|&framework| Self::for_framework(catalog, framework))
            .collect()
    }

    /// Requirements no control maps.
    pub fn uncovered(&self) -> Vec<&RequirementCoverage> {
        self.requirements
            .iter()
            .filter(|r| !r.is_covered())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soc2_partially_covered() {
        let catalog = Catalog::builtin().unwrap();
        let report = CoverageReport::for_framework(&catalog, FrameworkId::Soc2);
        assert_eq!(report.status, CoverageStatus::PartiallyCovered);
        assert_eq!(report.summary, "SOC 2: 12/13 requirements covered");
        let uncovered: Vec<_> = report
            .uncovered()
            .iter()
            .map(|r| r.requirement_id.as_str())
            .collect();
        assert_eq!(uncovered, vec!["PI1"]);
    }

    #[test]
    fn test_gdpr_controls_listed_per_requirement() {
        let catalog = Catalog::builtin().unwrap();
        let report = CoverageReport::for_framework(&catalog, FrameworkId::Gdpr);
        let a17 = report
            .requirements
            .iter()
            .find(|r| r.requirement_id == "A17")
            .unwrap();
        assert_eq!(a17.control_ids, vec!["right_to_erasure".to_string()]);
        assert_eq!(report.uncovered().len(), 2);
    }

    #[test]
    fn test_empty_framework_has_nothing_missing() {
        let catalog = Catalog::default();
        let report = CoverageReport::for_framework(&catalog, FrameworkId::Gdpr);
        assert_eq!(report.status, CoverageStatus::Covered);
        assert_eq!(report.summary, "GDPR: 0/0 requirements covered");
    }

    #[test]
    fn test_report_serializes_status() {
        let catalog = Catalog::builtin().unwrap();
        let reports = CoverageReport::all(&catalog);
        assert_eq!(reports.len(), 2);
        let json = serde_json::to_value(&reports[1]).unwrap();
        assert_eq!(json["framework"], "gdpr");
        assert_eq!(json["status"], "partially_covered");
    }
}
