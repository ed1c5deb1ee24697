use std::borrow::Cow;

/// Raw JSON text for every catalog, keyed the way the loader consumes it.
///
/// The embedded dataset borrows `'static` strings compiled into the binary;
/// a catalog read from disk owns its text.
#[derive(Debug, Clone, Default)]
pub struct CatalogSources {
    /// Policy catalog key to document JSON.
    pub policies: Vec<(String, Cow<'static, str>)>,
    /// Object keyed by evidence id.
    pub evidence: Cow<'static, str>,
    /// Framework id (as written in the file name) to an object keyed by requirement id.
    pub requirements: Vec<(String, Cow<'static, str>)>,
    /// List of framework descriptors.
    pub frameworks: Cow<'static, str>,
    /// Ordered list of controls.
    pub controls: Cow<'static, str>,
    /// Ordered list of training videos.
    pub training_videos: Cow<'static, str>,
}

macro_rules! embedded_policies {
    ($($key:literal),+ $(,)?) => {
        vec![$(
            (
                $key.to_string(),
                Cow::Borrowed(include_str!(concat!("../data/policies/", $key, ".json"))),
            )
        ),+]
    };
}

impl CatalogSources {
    /// The dataset compiled into this crate.
    pub fn embedded() -> Self {
        Self {
            policies: embedded_policies![
                "acceptable_use_policy",
                "access_control_policy",
                "breach_notification_procedure",
                "business_continuity_policy",
                "change_management_policy",
                "data_protection_impact_assessment_procedure",
                "data_retention_notice",
                "data_subject_rights_procedure",
                "encryption_policy",
                "human_resources_security_policy",
                "incident_response_policy",
                "information_security_policy",
                "password_policy",
                "privacy_notice",
                "risk_management_policy",
                "security_awareness_training_policy",
                "vendor_risk_management_policy",
            ],
            evidence: Cow::Borrowed(include_str!("../data/evidence.json")),
            requirements: vec![
                (
                    "soc2".to_string(),
                    Cow::Borrowed(include_str!("../data/requirements/soc2.json")),
                ),
                (
                    "gdpr".to_string(),
                    Cow::Borrowed(include_str!("../data/requirements/gdpr.json")),
                ),
            ],
            frameworks: Cow::Borrowed(include_str!("../data/frameworks.json")),
            controls: Cow::Borrowed(include_str!("../data/controls.json")),
            training_videos: Cow::Borrowed(include_str!("../data/training_videos.json")),
        }
    }

    /// Number of policy documents.
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }
}
