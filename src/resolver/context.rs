//! Explicit inputs for one resolution.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{StencilConfig, DEFAULT_LOCAL_DIR};
use crate::fetch::{ArchiveSpec, DEFAULT_TIMEOUT};

/// Everything the resolver needs to know about its surroundings.
///
/// Built once from configuration and handed to constructors; nothing is
/// read from global state.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverContext {
    /// Project the templates are for.
    pub project_root: PathBuf,
    /// Override folder name, searched in the project and its ancestors.
    pub local_dir: String,
    /// Bundled fallback root. `None` disables the bundled step.
    pub bundled_dir: Option<PathBuf>,
    /// Remote snapshot coordinates.
    pub archive: ArchiveSpec,
    /// Download bound.
    pub timeout: Duration,
}

impl ResolverContext {
    /// Context with defaults and no bundled fallback.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            local_dir: DEFAULT_LOCAL_DIR.to_string(),
            bundled_dir: None,
            archive: ArchiveSpec::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Context from loaded configuration.
    ///
    /// Without an explicit `bundled_dir`, the tool's install location is
    /// used (see [`default_bundled_dir`]).
    pub fn from_config(project_root: impl Into<PathBuf>, config: &StencilConfig) -> Self {
        Self {
            project_root: project_root.into(),
            local_dir: config.local_dir().to_string(),
            bundled_dir: config.bundled_dir.clone().or_else(default_bundled_dir),
            archive: config.archive_spec(),
            timeout: config.timeout(),
        }
    }

    /// Set the bundled fallback root.
    pub fn with_bundled_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundled_dir = Some(dir.into());
        self
    }

    /// Set the override folder name.
    pub fn with_local_dir(mut self, name: impl Into<String>) -> Self {
        self.local_dir = name.into();
        self
    }

    /// Nearest override folder, starting at the project and walking up.
    pub fn find_local_override(&self) -> Option<PathBuf> {
        find_upwards(&self.project_root, &self.local_dir)
    }

    /// Where a user should create overrides.
    pub fn suggested_local_dir(&self) -> PathBuf {
        self.project_root.join(&self.local_dir)
    }
}

/// First `<ancestor>/<name>` directory, nearest ancestor first.
///
/// A relative `start` is resolved against the current directory first, so
/// the walk continues past it.
pub fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let start = std::path::absolute(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_dir())
}

/// Bundled templates shipped with the binary.
///
/// Looks for `templates/` next to the executable, then the per-user data
/// directory (`<data_dir>/stencil/templates`).
pub fn default_bundled_dir() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("templates")))
        .filter(|dir| dir.is_dir());

    beside_exe.or_else(|| {
        dirs::data_dir()
            .map(|dir| dir.join("stencil").join("templates"))
            .filter(|dir| dir.is_dir())
    })
}
