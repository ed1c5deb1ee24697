use crate::embedded::CatalogSources;
use crate::integrity;
use policykit_core::document::expand_placeholders;
use policykit_core::{
    Control, Evidence, Framework, FrameworkId, IntegrityViolation, Policy, PolicyKitError,
    PolicyKitResult, Requirement, TrainingVideo,
};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

static BUILTIN: OnceLock<Arc<Catalog>> = OnceLock::new();

/// Entries of a JSON object, in document order, with duplicates kept.
///
/// A plain map would keep only the last of two equal keys; the loader needs
/// to see both to report them.
pub(crate) struct OrderedEntries<T>(pub(crate) Vec<(String, T)>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedEntries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = OrderedEntries<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

/// Serializes keyed entries as a JSON object without reordering them.
pub(crate) struct EntriesRef<'a, T>(pub(crate) &'a [(String, T)]);

impl<T: Serialize> Serialize for EntriesRef<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Keyed records in authored order with an O(1) index.
#[derive(Debug, Clone)]
pub(crate) struct Keyed<T> {
    pub(crate) entries: Vec<(String, T)>,
    index: HashMap<String, usize>,
}

impl<T> Default for Keyed<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Keyed<T> {
    /// Inserts unless the key is taken. Returns `false` on a duplicate.
    fn insert(&mut self, key: String, value: T) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        true
    }

    fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The immutable compliance catalog.
///
/// Built once from [`CatalogSources`] and read-only afterwards; every
/// accessor hands out shared references, and a miss is `None`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub(crate) policies: BTreeMap<String, Policy>,
    /// `metadata.id` to catalog key.
    policy_ids: HashMap<String, String>,
    pub(crate) evidence: Keyed<Evidence>,
    pub(crate) requirements: BTreeMap<FrameworkId, Keyed<Requirement>>,
    pub(crate) frameworks: Vec<Framework>,
    pub(crate) controls: Keyed<Control>,
    pub(crate) training_videos: Keyed<TrainingVideo>,
}

impl Catalog {
    /// The embedded dataset, loaded and checked once per process.
    ///
    /// A failed load is returned to the caller and retried on the next call.
    pub fn builtin() -> PolicyKitResult<Arc<Catalog>> {
        if let Some(catalog) = BUILTIN.get() {
            return Ok(Arc::clone(catalog));
        }
        let loaded = Arc::new(Catalog::from_sources(&CatalogSources::embedded())?);
        Ok(Arc::clone(BUILTIN.get_or_init(|| loaded)))
    }

    /// Parses and checks a dataset. Any integrity violation fails the load.
    pub fn from_sources(sources: &CatalogSources) -> PolicyKitResult<Catalog> {
        let (catalog, violations) = Catalog::load_unchecked(sources)?;
        if !violations.is_empty() {
            for violation in &violations {
                warn!(%violation, "Catalog integrity violation");
            }
            return Err(PolicyKitError::Integrity(violations));
        }

        info!(
            policies = catalog.policies.len(),
            evidence = catalog.evidence.len(),
            controls = catalog.controls.len(),
            frameworks = catalog.frameworks.len(),
            training_videos = catalog.training_videos.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Parses a dataset and returns it with every integrity violation found.
    ///
    /// Only malformed JSON is an error here. Of two records sharing a key
    /// the first is kept.
    pub fn load_unchecked(
        sources: &CatalogSources,
    ) -> PolicyKitResult<(Catalog, Vec<IntegrityViolation>)> {
        let mut catalog = Catalog::default();
        let mut violations = Vec::new();

        for (key, json) in &sources.policies {
            let source_name = format!("policies/{key}.json");
            let mut policy: Policy = serde_json::from_str(json)
                .map_err(|e| PolicyKitError::parse(source_name.as_str(), e))?;
            violations.extend(expand_placeholders(key, &mut policy.content));
            debug!(source = %source_name, nodes = policy.walk().count(), "Parsed policy");

            if catalog.policies.contains_key(key) {
                violations.push(duplicate("policy", key));
                continue;
            }
            if catalog.policy_ids.contains_key(policy.id()) {
                violations.push(duplicate("policy id", policy.id()));
                continue;
            }
            catalog
                .policy_ids
                .insert(policy.id().to_string(), key.clone());
            catalog.policies.insert(key.clone(), policy);
        }

        let evidence: OrderedEntries<Evidence> = parse("evidence.json", &sources.evidence)?;
        for (key, item) in evidence.0 {
            if !catalog.evidence.insert(key.clone(), item) {
                violations.push(duplicate("evidence", &key));
            }
        }

        for (name, json) in &sources.requirements {
            let source_name = format!("requirements/{name}.json");
            let table: OrderedEntries<Requirement> = parse(&source_name, json)?;
            let framework = match name.parse::<FrameworkId>() {
                Ok(framework) => framework,
                Err(reason) => {
                    warn!(source = %source_name, %reason, "Skipping requirements file");
                    violations.push(IntegrityViolation::UnknownRequirementFile {
                        file: source_name,
                    });
                    continue;
                }
            };
            let requirements = catalog.requirements.entry(framework).or_default();
            for (id, requirement) in table.0 {
                if !requirements.insert(id.clone(), requirement) {
                    violations.push(duplicate("requirement", &format!("{framework}/{id}")));
                }
            }
        }

        let frameworks: Vec<Framework> = parse("frameworks.json", &sources.frameworks)?;
        for framework in frameworks {
            if catalog.frameworks.iter().any(|f| f.id == framework.id) {
                violations.push(duplicate("framework", framework.id.as_str()));
            } else {
                catalog.frameworks.push(framework);
            }
        }

        let controls: Vec<Control> = parse("controls.json", &sources.controls)?;
        for control in controls {
            let id = control.id.clone();
            if !catalog.controls.insert(id.clone(), control) {
                violations.push(duplicate("control", &id));
            }
        }

        let videos: Vec<TrainingVideo> =
            parse("training_videos.json", &sources.training_videos)?;
        for video in videos {
            let id = video.id.clone();
            if !catalog.training_videos.insert(id.clone(), video) {
                violations.push(duplicate("training video", &id));
            }
        }

        violations.extend(integrity::check(&catalog));
        Ok((catalog, violations))
    }

    // -----------------------------------------------------------------------
    // Policies
    // -----------------------------------------------------------------------

    /// Looks up a policy by its catalog key, e.g. `access_control_policy`.
    pub fn policy(&self, key: &str) -> Option<&Policy> {
        self.policies.get(key)
    }

    /// Looks up a policy by `metadata.id`, the id controls reference.
    pub fn policy_by_id(&self, id: &str) -> Option<&Policy> {
        self.policy_ids.get(id).and_then(|key| self.policies.get(key))
    }

    /// All policies with their catalog keys, in key order.
    pub fn policies(&self) -> impl Iterator<Item = (&str, &Policy)> {
        self.policies.iter().map(|(k, p)| (k.as_str(), p))
    }

    // -----------------------------------------------------------------------
    // Evidence
    // -----------------------------------------------------------------------

    /// Looks up an evidence item by id.
    pub fn evidence(&self, id: &str) -> Option<&Evidence> {
        self.evidence.get(id)
    }

    /// Evidence items in authored order.
    pub fn evidence_items(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence.entries.iter().map(|(_, e)| e)
    }

    // -----------------------------------------------------------------------
    // Requirements and frameworks
    // -----------------------------------------------------------------------

    /// Two-level lookup: framework, then requirement id.
    pub fn requirement(&self, framework: FrameworkId, id: &str) -> Option<&Requirement> {
        self.requirements.get(&framework).and_then(|r| r.get(id))
    }

    /// Requirements of one framework in authored order. Empty when none exist.
    pub fn requirements(&self, framework: FrameworkId) -> &[(String, Requirement)] {
        self.requirements
            .get(&framework)
            .map(|r| r.entries.as_slice())
            .unwrap_or_default()
    }

    /// SOC 2 criteria in authored order.
    pub fn soc2_requirements(&self) -> &[(String, Requirement)] {
        self.requirements(FrameworkId::Soc2)
    }

    /// GDPR articles in authored order.
    pub fn gdpr_requirements(&self) -> &[(String, Requirement)] {
        self.requirements(FrameworkId::Gdpr)
    }

    /// Declared frameworks in authored order.
    pub fn frameworks(&self) -> &[Framework] {
        &self.frameworks
    }

    /// Looks up a declared framework.
    pub fn framework(&self, id: FrameworkId) -> Option<&Framework> {
        self.frameworks.iter().find(|f| f.id == id)
    }

    // -----------------------------------------------------------------------
    // Controls
    // -----------------------------------------------------------------------

    /// Controls in authored order.
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.entries.iter().map(|(_, c)| c)
    }

    /// Looks up a control by id.
    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls.get(id)
    }

    /// Controls mapped to the given requirement.
    pub fn controls_for_requirement(
        &self,
        framework: FrameworkId,
        requirement_id: &str,
    ) -> Vec<&Control> {
        self.controls()
            .filter(|c| c.maps_requirement(framework, requirement_id))
            .collect()
    }

    /// Controls that map the policy with this `metadata.id`.
    pub fn controls_for_policy(&self, policy_id: &str) -> Vec<&Control> {
        self.controls()
            .filter(|c| c.policy_ids().any(|id| id == policy_id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Training videos
    // -----------------------------------------------------------------------

    /// Training videos in authored order.
    pub fn training_videos(&self) -> impl Iterator<Item = &TrainingVideo> {
        self.training_videos.entries.iter().map(|(_, v)| v)
    }

    /// Looks up a training video by id.
    pub fn training_video(&self, id: &str) -> Option<&TrainingVideo> {
        self.training_videos.get(id)
    }
}

fn parse<T: for<'de> Deserialize<'de>>(source_name: &str, json: &str) -> PolicyKitResult<T> {
    let value = serde_json::from_str(json).map_err(|e| PolicyKitError::parse(source_name, e))?;
    debug!(source = source_name, "Parsed catalog source");
    Ok(value)
}

fn duplicate(catalog: &'static str, key: &str) -> IntegrityViolation {
    IntegrityViolation::DuplicateKey {
        catalog,
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn minimal_sources() -> CatalogSources {
        CatalogSources {
            policies: vec![(
                "access_control_policy".to_string(),
                Cow::Borrowed(
                    r#"{"type":"doc","metadata":{"id":"access_control","slug":"access-control-policy","name":"Access Control Policy","description":"d","frequency":"yearly","department":"it"},"content":[{"type":"paragraph","content":[{"type":"text","text":"{{organization}} limits access."}]}]}"#,
                ),
            )],
            evidence: Cow::Borrowed(
                r#"{"access_review_records":{"id":"access_review_records","name":"Access Review Records","description":"d","frequency":"quarterly","department":"it"}}"#,
            ),
            requirements: vec![(
                "soc2".to_string(),
                Cow::Borrowed(r#"{"CC6":{"name":"CC6: Logical Access","description":"d"}}"#),
            )],
            frameworks: Cow::Borrowed(
                r#"[{"id":"soc2","name":"SOC 2","version":"2017","description":"d"}]"#,
            ),
            controls: Cow::Borrowed(
                r#"[{"id":"access_control_review","name":"Access Control Review","description":"d","mappedArtifacts":[{"type":"policy","policyId":"access_control"},{"type":"evidence","evidenceId":"access_review_records"}],"mappedRequirements":[{"frameworkId":"soc2","requirementId":"CC6"}]}]"#,
            ),
            training_videos: Cow::Borrowed("[]"),
        }
    }

    #[test]
    fn test_minimal_catalog_loads() {
        let catalog = Catalog::from_sources(&minimal_sources()).unwrap();
        assert!(catalog.policy("access_control_policy").is_some());
        assert!(catalog.policy("access_control").is_none());
        assert_eq!(
            catalog.policy_by_id("access_control").unwrap().metadata.name,
            "Access Control Policy"
        );
        assert_eq!(catalog.requirements(FrameworkId::Gdpr).len(), 0);
        assert_eq!(catalog.controls_for_policy("access_control").len(), 1);
    }

    #[test]
    fn test_placeholders_expanded_on_load() {
        let catalog = Catalog::from_sources(&minimal_sources()).unwrap();
        let policy = catalog.policy("access_control_policy").unwrap();
        assert_eq!(policy.placeholders().len(), 1);
    }

    #[test]
    fn test_duplicate_evidence_key_reported() {
        let mut sources = minimal_sources();
        sources.evidence = Cow::Borrowed(
            r#"{
                "access_review_records":{"id":"access_review_records","name":"A","description":"d","frequency":"quarterly","department":"it"},
                "access_review_records":{"id":"access_review_records","name":"B","description":"d","frequency":"quarterly","department":"it"}
            }"#,
        );
        let (catalog, violations) = Catalog::load_unchecked(&sources).unwrap();
        assert_eq!(
            violations,
            vec![IntegrityViolation::DuplicateKey {
                catalog: "evidence",
                key: "access_review_records".to_string(),
            }]
        );
        assert_eq!(catalog.evidence("access_review_records").unwrap().name, "A");
    }

    fn duplicates_of(sources: &CatalogSources) -> Vec<IntegrityViolation> {
        let (_, violations) = Catalog::load_unchecked(sources).unwrap();
        violations
    }

    #[test]
    fn test_duplicate_policy_key_reported() {
        let mut sources = minimal_sources();
        let again = sources.policies[0].clone();
        sources.policies.push(again);
        assert_eq!(
            duplicates_of(&sources),
            vec![duplicate("policy", "access_control_policy")]
        );
    }

    #[test]
    fn test_duplicate_policy_id_under_other_key_reported() {
        let mut sources = minimal_sources();
        let json = sources.policies[0].1.clone();
        sources.policies.push(("zz_copy".to_string(), json));
        let (catalog, violations) = Catalog::load_unchecked(&sources).unwrap();
        assert_eq!(violations, vec![duplicate("policy id", "access_control")]);
        assert!(catalog.policy("zz_copy").is_none());
        assert_eq!(catalog.policies().count(), 1);
    }

    #[test]
    fn test_duplicate_requirement_in_one_file_reported() {
        let mut sources = minimal_sources();
        sources.requirements = vec![(
            "soc2".to_string(),
            Cow::Borrowed(
                r#"{
                    "CC6":{"name":"first","description":"d"},
                    "CC6":{"name":"second","description":"d"}
                }"#,
            ),
        )];
        let (catalog, violations) = Catalog::load_unchecked(&sources).unwrap();
        assert_eq!(violations, vec![duplicate("requirement", "soc2/CC6")]);
        assert_eq!(catalog.requirements(FrameworkId::Soc2).len(), 1);
        assert_eq!(
            catalog.requirement(FrameworkId::Soc2, "CC6").unwrap().name,
            "first"
        );
    }

    #[test]
    fn test_duplicate_framework_reported() {
        let mut sources = minimal_sources();
        sources.frameworks = Cow::Borrowed(
            r#"[
                {"id":"soc2","name":"SOC 2","version":"2017","description":"d"},
                {"id":"soc2","name":"SOC 2 again","version":"2022","description":"d"}
            ]"#,
        );
        let (catalog, violations) = Catalog::load_unchecked(&sources).unwrap();
        assert_eq!(violations, vec![duplicate("framework", "soc2")]);
        assert_eq!(catalog.frameworks().len(), 1);
        assert_eq!(catalog.frameworks()[0].version, "2017");
    }

    #[test]
    fn test_duplicate_training_video_reported() {
        let mut sources = minimal_sources();
        sources.training_videos = Cow::Borrowed(
            r#"[
                {"id":"sat-1","title":"Part 1","description":"d","youtubeId":"abc","url":"https://www.youtube.com/watch?v=abc"},
                {"id":"sat-1","title":"Part 1 again","description":"d","youtubeId":"def","url":"https://www.youtube.com/watch?v=def"}
            ]"#,
        );
        let (catalog, violations) = Catalog::load_unchecked(&sources).unwrap();
        assert_eq!(violations, vec![duplicate("training video", "sat-1")]);
        assert_eq!(catalog.training_video("sat-1").unwrap().youtube_id, "abc");
    }

    #[test]
    fn test_parse_error_names_source() {
        let mut sources = minimal_sources();
        sources.controls = Cow::Borrowed("[{]");
        let err = Catalog::from_sources(&sources).unwrap_err();
        assert!(err.to_string().starts_with("Parse error in controls.json"));
    }

    #[test]
    fn test_unknown_requirement_file_reported() {
        let mut sources = minimal_sources();
        sources
            .requirements
            .push(("iso27001".to_string(), Cow::Borrowed("{}")));
        let err = Catalog::from_sources(&sources).unwrap_err();
        match err {
            PolicyKitError::Integrity(v) => assert!(matches!(
                &v[0],
                IntegrityViolation::UnknownRequirementFile { file } if file == "requirements/iso27001.json"
            )),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_entries_ref_keeps_order() {
        let entries = vec![("b".to_string(), 1), ("a".to_string(), 2)];
        let json = serde_json::to_string(&EntriesRef(&entries)).unwrap();
        assert_eq!(json, r#"{"b":1,"a":2}"#);
    }
}
