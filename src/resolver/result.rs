//! The outcome of one resolution.

use std::path::PathBuf;

use crate::cache::CacheHandle;
use crate::templates::{Category, CategoryInventory, TemplateRoot, UnionMergeSource};

/// Which templates back the result.
#[derive(Debug, Clone)]
pub enum ResolvedSource {
    /// Nothing usable was found.
    None,
    /// One root: local, bundled or downloaded.
    Single(TemplateRoot, CategoryInventory),
    /// Local overrides layered over a downloaded snapshot.
    Merged(UnionMergeSource),
}

impl ResolvedSource {
    /// Short label for output: `none`, `local`, `bundled`, `remote`, `merged`.
    pub fn label(&self) -> String {
        match self {
            ResolvedSource::None => "none".to_string(),
            ResolvedSource::Single(root, _) => root.provenance().to_string(),
            ResolvedSource::Merged(_) => "merged".to_string(),
        }
    }
}

/// Result handed to the installer.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    /// Backing templates.
    pub source: ResolvedSource,
    /// Whether templates are available.
    pub success: bool,
    /// What happened, for the user.
    pub message: String,
    /// A fallback (bundled or last-resort download) was tried.
    pub fallback_attempted: bool,
    /// Scratch directory holding downloaded files. Keep it until installation
    /// has read them, then release it through the allocator.
    pub cache: Option<CacheHandle>,
}

impl ResolutionResult {
    pub(crate) fn failure(message: impl Into<String>, fallback_attempted: bool) -> Self {
        Self {
            source: ResolvedSource::None,
            success: false,
            message: message.into(),
            fallback_attempted,
            cache: None,
        }
    }

    /// Every available template.
    pub fn inventory(&self) -> CategoryInventory {
        match &self.source {
            ResolvedSource::None => CategoryInventory::new(),
            ResolvedSource::Single(_, inventory) => inventory.clone(),
            ResolvedSource::Merged(merged) => merged.union(),
        }
    }

    /// Backing path of one template, regardless of source kind.
    pub fn resolve(&self, category: Category, filename: &str) -> Option<PathBuf> {
        match &self.source {
            ResolvedSource::None => None,
            ResolvedSource::Single(root, inventory) => inventory
                .contains(category, filename)
                .then(|| root.file_path(category, filename)),
            ResolvedSource::Merged(merged) => merged.resolve(category, filename),
        }
    }

    /// Total number of available templates.
    pub fn file_count(&self) -> usize {
        self.inventory().file_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Provenance;

    #[test]
    fn single_resolves_only_inventoried_files() {
        let mut inventory = CategoryInventory::new();
        inventory.insert(Category::Prompts, "a.md");
        let root = TemplateRoot::new("/t", Provenance::Bundled);
        let result = ResolutionResult {
            source: ResolvedSource::Single(root, inventory),
            success: true,
            message: String::new(),
            fallback_attempted: true,
            cache: None,
        };

        assert_eq!(
            result.resolve(Category::Prompts, "a.md"),
            Some(PathBuf::from("/t/prompts/a.md"))
        );
        assert_eq!(result.resolve(Category::Prompts, "b.md"), None);
        assert_eq!(result.source.label(), "bundled");
        assert_eq!(result.file_count(), 1);
    }

    #[test]
    fn failure_has_no_templates() {
        let result = ResolutionResult::failure("nope", true);
        assert!(!result.success);
        assert!(result.inventory().is_empty());
        assert_eq!(result.resolve(Category::Commands, "x.md"), None);
        assert_eq!(result.source.label(), "none");
    }
}
