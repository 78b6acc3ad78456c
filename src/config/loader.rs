//! Configuration file discovery and loading.
//!
//! Files are layered in this order (later overrides earlier):
//! 1. User global config (`~/.stencil/config.yml`)
//! 2. Project config (`.stencil/config.yml`)
//! 3. Explicit `--config` file
//!
//! All files are optional except an explicitly requested one.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use super::schema::{ConfigWarning, StencilConfig};
use crate::error::{Result, StencilError};

/// Paths to configuration files in merge order.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// User's global config: ~/.stencil/config.yml
    pub user_global: Option<PathBuf>,

    /// Project config: .stencil/config.yml
    pub project: Option<PathBuf>,

    /// File passed on the command line.
    pub explicit: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path, explicit: Option<&Path>) -> Self {
        Self {
            user_global: dirs::home_dir()
                .map(|home| home.join(".stencil").join("config.yml"))
                .filter(|path| path.is_file()),
            project: Some(project_root.join(".stencil").join("config.yml"))
                .filter(|path| path.is_file()),
            explicit: explicit.map(Path::to_path_buf),
        }
    }

    /// Existing paths in merge order.
    pub fn all(&self) -> Vec<&PathBuf> {
        [&self.user_global, &self.project, &self.explicit]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// A merged configuration plus what was noticed while loading it.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// The effective configuration.
    pub config: StencilConfig,
    /// Unknown keys, attributed to their files.
    pub warnings: Vec<ConfigWarning>,
    /// Files that contributed, in merge order.
    pub sources: Vec<PathBuf>,
}

/// Load and merge every config file that applies to `project_root`.
pub fn load_config(project_root: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_from_paths(&ConfigPaths::discover(project_root, explicit))
}

/// Load and merge the given files.
pub fn load_from_paths(paths: &ConfigPaths) -> Result<LoadedConfig> {
    let mut merged = Value::Mapping(Default::default());
    let mut loaded = LoadedConfig::default();

    for path in paths.all() {
        let value = load_config_value(path)?;

        // Parse each layer alone so warnings point at the right file
        let layer = parse_value(value.clone(), path)?;
        loaded
            .warnings
            .extend(layer.warnings().into_iter().map(|w| ConfigWarning {
                source: Some(path.clone()),
                ..w
            }));

        merged = overlay(&merged, &value);
        loaded.sources.push(path.clone());
    }

    let fallback = paths.all().last().map(|p| p.to_path_buf()).unwrap_or_default();
    loaded.config = parse_value(merged, &fallback)?;

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    Ok(loaded)
}

/// Read a config file as raw YAML.
fn load_config_value(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Value::Mapping(Default::default()));
    }

    serde_yaml::from_str(&content).map_err(|e| StencilError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn parse_value(value: Value, path: &Path) -> Result<StencilConfig> {
    serde_yaml::from_value(value).map_err(|e| StencilError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Recursively overlay mappings; anything else in `top` replaces `base`.
fn overlay(base: &Value, top: &Value) -> Value {
    match (base, top) {
        (Value::Mapping(base_map), Value::Mapping(top_map)) => {
            let mut result = base_map.clone();
            for (key, value) in top_map {
                let merged = match base_map.get(key) {
                    Some(existing) => overlay(existing, value),
                    None => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Value::Mapping(result)
        }
        (_, top) => top.clone(),
    }
}
