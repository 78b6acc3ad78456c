//! Typed configuration schema.
//!
//! Every field is optional so layered files can set only what they need.
//! Keys the schema does not know are captured rather than dropped, and
//! reported through [`StencilConfig::warnings`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::DEFAULT_PREFIX;
use crate::fetch::{ArchiveSpec, DEFAULT_TIMEOUT};

/// Default local override folder, relative to the project or an ancestor.
pub const DEFAULT_LOCAL_DIR: &str = ".stencil/templates";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StencilConfig {
    /// Where snapshots are downloaded from.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local override folder name.
    pub local_dir: Option<String>,

    /// Bundled fallback template root.
    pub bundled_dir: Option<PathBuf>,

    /// Prefix for scratch directory names.
    pub cache_prefix: Option<String>,

    /// Never touch the network.
    pub offline: Option<bool>,

    /// Keys not recognized by the schema.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

/// Remote snapshot settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteConfig {
    /// Scheme and host of the hosting service.
    pub base_url: Option<String>,
    /// Repository owner.
    pub owner: Option<String>,
    /// Repository name.
    pub repo: Option<String>,
    /// Branch to snapshot.
    pub branch: Option<String>,
    /// Folder inside the repository that holds the templates.
    pub templates_folder: Option<String>,
    /// Download bound in seconds.
    pub timeout_secs: Option<u64>,

    /// Keys not recognized by the schema.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_yaml::Value>,
}

/// An unrecognized configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Dotted key path, e.g. `remote.tokn`.
    pub key: String,
    /// File that contained the key, when known.
    pub source: Option<PathBuf>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(path) => write!(f, "Unknown config key '{}' in {}", self.key, path.display()),
            None => write!(f, "Unknown config key '{}'", self.key),
        }
    }
}

impl StencilConfig {
    /// Unknown keys, as dotted paths.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let top = self.unknown.keys().cloned();
        let remote = self.remote.unknown.keys().map(|k| format!("remote.{}", k));

        top.chain(remote)
            .map(|key| ConfigWarning { key, source: None })
            .collect()
    }

    /// Archive coordinates with defaults filled in.
    pub fn archive_spec(&self) -> ArchiveSpec {
        let defaults = ArchiveSpec::default();
        let remote = &self.remote;
        ArchiveSpec {
            base_url: remote.base_url.clone().unwrap_or(defaults.base_url),
            owner: remote.owner.clone().unwrap_or(defaults.owner),
            repo: remote.repo.clone().unwrap_or(defaults.repo),
            branch: remote.branch.clone().unwrap_or(defaults.branch),
            templates_folder: remote
                .templates_folder
                .clone()
                .unwrap_or(defaults.templates_folder),
        }
    }

    /// Download bound.
    pub fn timeout(&self) -> Duration {
        self.remote
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Local override folder name.
    pub fn local_dir(&self) -> &str {
        self.local_dir.as_deref().unwrap_or(DEFAULT_LOCAL_DIR)
    }

    /// Scratch directory prefix.
    pub fn cache_prefix(&self) -> &str {
        self.cache_prefix.as_deref().unwrap_or(DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: StencilConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.archive_spec(), ArchiveSpec::default());
        assert_eq!(config.local_dir(), DEFAULT_LOCAL_DIR);
        assert_eq!(config.cache_prefix(), "stencil");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn remote_fields_override_defaults() {
        let yaml = r#"
remote:
  owner: acme
  branch: develop
  timeout_secs: 5
"#;
        let config: StencilConfig = serde_yaml::from_str(yaml).unwrap();
        let spec = config.archive_spec();

        assert_eq!(spec.owner, "acme");
        assert_eq!(spec.branch, "develop");
        assert_eq!(spec.repo, "stencil-templates");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_keys_become_warnings() {
        let yaml = r#"
ofline: true
remote:
  tokn: abc
"#;
        let config: StencilConfig = serde_yaml::from_str(yaml).unwrap();
        let keys: Vec<_> = config.warnings().into_iter().map(|w| w.key).collect();

        assert_eq!(keys, vec!["ofline", "remote.tokn"]);
        assert_eq!(config.offline, None);
    }

    #[test]
    fn wrong_types_are_errors() {
        let result: Result<StencilConfig, _> = serde_yaml::from_str("offline: sometimes");
        assert!(result.is_err());
    }

    #[test]
    fn warning_display_names_file() {
        let warning = ConfigWarning {
            key: "remote.tokn".to_string(),
            source: Some(PathBuf::from("/p/.stencil/config.yml")),
        };
        assert_eq!(
            warning.to_string(),
            "Unknown config key 'remote.tokn' in /p/.stencil/config.yml"
        );
    }
}
