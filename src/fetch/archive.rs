//! Snapshot archive coordinates.

use serde::Serialize;

/// Default hosting service base URL.
pub const DEFAULT_BASE_URL: &str = "https://github.com";
/// Default repository owner.
pub const DEFAULT_OWNER: &str = "stencil-dev";
/// Default repository name.
pub const DEFAULT_REPO: &str = "stencil-templates";
/// Default branch.
pub const DEFAULT_BRANCH: &str = "main";
/// Default folder inside the repository holding the templates.
pub const DEFAULT_TEMPLATES_FOLDER: &str = "templates";

/// Where a template snapshot is downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSpec {
    /// Scheme and host, e.g. `https://github.com`.
    pub base_url: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch to snapshot.
    pub branch: String,
    /// Folder inside the repository that holds the template root.
    pub templates_folder: String,
}

impl Default for ArchiveSpec {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            templates_folder: DEFAULT_TEMPLATES_FOLDER.to_string(),
        }
    }
}

impl ArchiveSpec {
    /// Override owner and repository from an `owner/repo` string.
    ///
    /// A bare `repo` keeps the current owner.
    pub fn with_repository(mut self, repository: &str) -> Self {
        match repository.split_once('/') {
            Some((owner, repo)) => {
                self.owner = owner.to_string();
                self.repo = repo.to_string();
            }
            None => self.repo = repository.to_string(),
        }
        self
    }

    /// Override the branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// URL of the branch snapshot.
    pub fn archive_url(&self) -> String {
        format!(
            "{}/{}/{}/archive/refs/heads/{}.zip",
            self.base_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch
        )
    }

    /// Entry prefix of the templates folder inside the archive.
    ///
    /// The hosting service names the top-level folder `<repo>-<branch>`,
    /// with slashes in the branch replaced by dashes.
    pub fn extraction_prefix(&self) -> String {
        format!(
            "{}-{}/{}/",
            self.repo,
            self.branch.replace('/', "-"),
            self.templates_folder.trim_matches('/')
        )
    }
}
