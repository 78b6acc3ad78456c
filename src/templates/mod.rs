//! Categorized template roots.
//!
//! A template root is a directory holding up to four category folders,
//! each with markdown templates:
//!
//! ```text
//! <root>/
//!   chatmodes/*.md
//!   instructions/*.md
//!   prompts/*.md
//!   commands/*.md
//! ```
//!
//! - [`inventory`] enumerates which (category, filename) pairs exist
//! - [`union`] combines a local and a downloaded root with local-wins precedence
//!
//! # Example
//!
//! ```
//! use stencil::templates::{scan, Category};
//!
//! let temp = tempfile::TempDir::new().unwrap();
//! std::fs::create_dir_all(temp.path().join("prompts")).unwrap();
//! std::fs::write(temp.path().join("prompts/review.md"), "# Review").unwrap();
//!
//! let inventory = scan(temp.path()).unwrap();
//! assert!(inventory.contains(Category::Prompts, "review.md"));
//! assert_eq!(inventory.file_count(), 1);
//! ```

pub mod inventory;
pub mod union;

pub use inventory::{diff, scan, CategoryInventory};
pub use union::{MergeSummary, UnionMergeSource};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File extension recognized as a template.
pub const TEMPLATE_EXTENSION: &str = "md";

/// One of the fixed template categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Chat mode definitions.
    Chatmodes,
    /// Instruction files.
    Instructions,
    /// Reusable prompts.
    Prompts,
    /// Slash-command definitions.
    Commands,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 4] = [
        Category::Chatmodes,
        Category::Instructions,
        Category::Prompts,
        Category::Commands,
    ];

    /// Directory name for this category.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Chatmodes => "chatmodes",
            Category::Instructions => "instructions",
            Category::Prompts => "prompts",
            Category::Commands => "commands",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown template category '{}'", s))
    }
}

/// Where a template root came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// User overrides found in the project or an ancestor.
    Local,
    /// Fallback set shipped with the tool.
    Bundled,
    /// Freshly downloaded snapshot.
    Remote,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provenance::Local => "local",
            Provenance::Bundled => "bundled",
            Provenance::Remote => "remote",
        };
        f.write_str(name)
    }
}

/// A directory of categorized templates plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateRoot {
    path: PathBuf,
    provenance: Provenance,
}

impl TemplateRoot {
    /// Create a template root.
    pub fn new(path: impl Into<PathBuf>, provenance: Provenance) -> Self {
        Self {
            path: path.into(),
            provenance,
        }
    }

    /// The root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where this root came from.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Backing path of a template inside this root (may not exist).
    pub fn file_path(&self, category: Category, filename: &str) -> PathBuf {
        self.path.join(category.as_str()).join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = "agents".parse::<Category>().unwrap_err();
        assert!(err.contains("agents"));
    }

    #[test]
    fn template_root_builds_file_paths() {
        let root = TemplateRoot::new("/tmp/t", Provenance::Local);
        assert_eq!(
            root.file_path(Category::Prompts, "a.md"),
            PathBuf::from("/tmp/t/prompts/a.md")
        );
        assert_eq!(root.provenance(), Provenance::Local);
    }
}
