use policykit_core::{PolicyKitError, PolicyKitResult, Substitutions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "policykit.toml";

/// Log output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Contents of `policykit.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PolicyKitConfig {
    /// Load the catalog from this directory instead of the embedded data.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Values used by `show policy --fill`.
    #[serde(default)]
    pub substitutions: Substitutions,
}

impl PolicyKitConfig {
    pub fn from_toml(content: &str) -> PolicyKitResult<Self> {
        toml::from_str(content).map_err(|e| PolicyKitError::Config(e.to_string()))
    }

    /// Reads the config at `path`.
    ///
    /// A missing file yields defaults unless `required` is set. A relative
    /// `data_dir` is resolved against the file's directory.
    pub async fn load(path: &Path, required: bool) -> PolicyKitResult<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(PolicyKitError::Config(format!(
                    "failed to read config file '{}': {e}",
                    path.display()
                )))
            }
        };

        let mut config = Self::from_toml(&content)?;
        if let Some(data_dir) = config.data_dir.as_mut() {
            if data_dir.is_relative() {
                let base = path.parent().unwrap_or_else(|| Path::new("."));
                *data_dir = base.join(&*data_dir);
            }
        }
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }
}
