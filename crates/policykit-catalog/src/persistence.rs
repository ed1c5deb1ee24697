use crate::catalog::{Catalog, EntriesRef};
use crate::embedded::CatalogSources;
use async_trait::async_trait;
use policykit_core::{PolicyKitError, PolicyKitResult};
use serde::Serialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Storage backend for a whole catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Writes every catalog of `catalog`.
    async fn save(&self, catalog: &Catalog) -> PolicyKitResult<()>;
    /// Reads a catalog back and runs the integrity pass over it.
    async fn load(&self) -> PolicyKitResult<Catalog>;
}

// ---------------------------------------------------------------------------
// JsonCatalogStore
// ---------------------------------------------------------------------------

/// A directory of pretty-printed JSON files, laid out like the embedded data.
///
/// ```text
/// <base_dir>/
///   policies/<key>.json
///   requirements/<framework>.json
///   evidence.json  frameworks.json  controls.json  training_videos.json
/// ```
///
/// `load` reads every file under `policies/` and `requirements/`, so `save`
/// refuses to write into either directory when it already holds entries.
/// The top-level files are overwritten.
pub struct JsonCatalogStore {
    base_dir: PathBuf,
}

impl JsonCatalogStore {
    /// A store rooted at `base_dir`. Nothing is touched until `save` or `load`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The directory this store reads and writes.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Reads the raw sources without parsing them.
    pub async fn read_sources(&self) -> PolicyKitResult<CatalogSources> {
        let policies = read_json_dir(&self.base_dir.join("policies")).await?;
        let requirements = read_json_dir(&self.base_dir.join("requirements")).await?;

        Ok(CatalogSources {
            policies,
            evidence: self.read_file("evidence.json").await?,
            requirements,
            frameworks: self.read_file("frameworks.json").await?,
            controls: self.read_file("controls.json").await?,
            training_videos: self.read_file("training_videos.json").await?,
        })
    }

    async fn read_file(&self, name: &str) -> PolicyKitResult<Cow<'static, str>> {
        let content = tokio::fs::read_to_string(self.base_dir.join(name)).await?;
        Ok(Cow::Owned(content))
    }

    async fn write_json<T: Serialize + ?Sized>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> PolicyKitResult<()> {
        let json = serde_json::to_string_pretty(value)?;
        tokio::fs::write(self.base_dir.join(relative), json).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for JsonCatalogStore {
    async fn save(&self, catalog: &Catalog) -> PolicyKitResult<()> {
        ensure_empty_dir(&self.base_dir.join("policies")).await?;
        ensure_empty_dir(&self.base_dir.join("requirements")).await?;
        tokio::fs::create_dir_all(self.base_dir.join("policies")).await?;
        tokio::fs::create_dir_all(self.base_dir.join("requirements")).await?;

        for (key, policy) in catalog.policies() {
            self.write_json(format!("policies/{key}.json"), policy)
                .await?;
        }
        for (framework, requirements) in &catalog.requirements {
            self.write_json(
                format!("requirements/{framework}.json"),
                &EntriesRef(&requirements.entries),
            )
            .await?;
        }
        self.write_json("evidence.json", &EntriesRef(&catalog.evidence.entries))
            .await?;
        self.write_json("frameworks.json", catalog.frameworks())
            .await?;

        let controls: Vec<_> = catalog.controls().collect();
        self.write_json("controls.json", &controls).await?;
        let videos: Vec<_> = catalog.training_videos().collect();
        self.write_json("training_videos.json", &videos).await?;

        info!(dir = %self.base_dir.display(), "Catalog exported");
        Ok(())
    }

    async fn load(&self) -> PolicyKitResult<Catalog> {
        let sources = self.read_sources().await?;
        info!(
            dir = %self.base_dir.display(),
            policies = sources.policy_count(),
            "Loading catalog from directory"
        );
        Catalog::from_sources(&sources)
    }
}

/// Fails when `dir` exists and has any entry. A missing directory is fine.
async fn ensure_empty_dir(dir: &Path) -> PolicyKitResult<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if let Some(entry) = entries.next_entry().await? {
        warn!(
            dir = %dir.display(),
            entry = %entry.path().display(),
            "Refusing to export into a non-empty directory"
        );
        return Err(PolicyKitError::Config(format!(
            "export target '{}' is not empty",
            dir.display()
        )));
    }
    Ok(())
}

/// Every `*.json` file of a directory as `(file stem, content)`, sorted by name.
async fn read_json_dir(dir: &Path) -> PolicyKitResult<Vec<(String, Cow<'static, str>)>> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PolicyKitError::Config(format!("non UTF-8 file name: {}", path.display()))
            })?
            .to_string();
        let content = tokio::fs::read_to_string(&path).await?;
        files.push((stem, Cow::Owned(content)));
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use policykit_core::IntegrityViolation;

    #[tokio::test]
    async fn test_export_and_reload_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        let builtin = Catalog::builtin().unwrap();

        store.save(&builtin).await.unwrap();
        assert!(dir.path().join("policies/access_control_policy.json").exists());
        assert!(dir.path().join("requirements/gdpr.json").exists());

        let reloaded = store.load().await.unwrap();
        assert_eq!(
            reloaded.policies().collect::<Vec<_>>(),
            builtin.policies().collect::<Vec<_>>()
        );
        assert_eq!(
            reloaded.controls().collect::<Vec<_>>(),
            builtin.controls().collect::<Vec<_>>()
        );
        assert_eq!(reloaded.gdpr_requirements(), builtin.gdpr_requirements());
        assert_eq!(
            reloaded.evidence_items().collect::<Vec<_>>(),
            builtin.evidence_items().collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_exported_policy_carries_placeholder_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        store.save(&Catalog::builtin().unwrap()).await.unwrap();

        let path = dir
            .path()
            .join("policies/vendor_risk_management_policy.json");
        let json = tokio::fs::read_to_string(path).await.unwrap();
        assert!(json.contains(r#""type": "placeholder""#));
        assert!(!json.contains("{{supplier_name}}"));
    }

    #[tokio::test]
    async fn test_save_refuses_stale_export_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        let builtin = Catalog::builtin().unwrap();
        store.save(&builtin).await.unwrap();

        let err = store.save(&builtin).await.unwrap_err();
        assert!(matches!(&err, PolicyKitError::Config(msg) if msg.contains("policies")));

        let other = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(other.path().join("requirements"))
            .await
            .unwrap();
        tokio::fs::write(other.path().join("requirements/iso27001.json"), "{}")
            .await
            .unwrap();
        let err = JsonCatalogStore::new(other.path())
            .save(&builtin)
            .await
            .unwrap_err();
        assert!(matches!(&err, PolicyKitError::Config(msg) if msg.contains("requirements")));
        assert!(!other.path().join("policies/access_control_policy.json").exists());
    }

    #[tokio::test]
    async fn test_save_into_empty_existing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("policies"))
            .await
            .unwrap();
        let store = JsonCatalogStore::new(dir.path());
        store.save(&Catalog::builtin().unwrap()).await.unwrap();
        assert!(store.load().await.is_ok());
    }

    #[tokio::test]
    async fn test_load_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path().join("absent"));
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, PolicyKitError::Io(_)));
    }

    #[tokio::test]
    async fn test_edited_export_fails_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCatalogStore::new(dir.path());
        store.save(&Catalog::builtin().unwrap()).await.unwrap();
        tokio::fs::remove_file(dir.path().join("policies/encryption_policy.json"))
            .await
            .unwrap();

        match store.load().await.unwrap_err() {
            PolicyKitError::Integrity(violations) => {
                assert!(violations.contains(&IntegrityViolation::UnknownPolicyReference {
                    control: "encryption".to_string(),
                    policy_id: "encryption".to_string(),
                }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
