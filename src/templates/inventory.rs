//! Template enumeration.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;

use super::{Category, TEMPLATE_EXTENSION};
use crate::error::Result;

/// Which template files exist, grouped by category.
///
/// A category with no files is never present as a key; inserting an
/// empty set is a no-op and removing the last file drops the category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryInventory {
    entries: BTreeMap<Category, BTreeSet<String>>,
}

impl CategoryInventory {
    /// Create an empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single file.
    pub fn insert(&mut self, category: Category, filename: impl Into<String>) {
        self.entries
            .entry(category)
            .or_default()
            .insert(filename.into());
    }

    /// Add a whole set of files for a category; empty sets are ignored.
    pub fn extend_category(&mut self, category: Category, files: BTreeSet<String>) {
        if files.is_empty() {
            return;
        }
        self.entries.entry(category).or_default().extend(files);
    }

    /// Remove a single file, dropping the category if it becomes empty.
    pub fn remove(&mut self, category: Category, filename: &str) -> bool {
        let Some(files) = self.entries.get_mut(&category) else {
            return false;
        };
        let removed = files.remove(filename);
        if files.is_empty() {
            self.entries.remove(&category);
        }
        removed
    }

    /// Whether a file is present.
    pub fn contains(&self, category: Category, filename: &str) -> bool {
        self.entries
            .get(&category)
            .is_some_and(|files| files.contains(filename))
    }

    /// Files in a category, if it has any.
    pub fn files(&self, category: Category) -> Option<&BTreeSet<String>> {
        self.entries.get(&category)
    }

    /// Categories that have at least one file.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.entries.keys().copied()
    }

    /// Iterate over every (category, filename) pair.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> + '_ {
        self.entries
            .iter()
            .flat_map(|(category, files)| files.iter().map(move |f| (*category, f.as_str())))
    }

    /// Total number of files across categories.
    pub fn file_count(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    /// Whether no files are present at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set union with another inventory.
    pub fn union(&self, other: &CategoryInventory) -> CategoryInventory {
        let mut merged = self.clone();
        for (category, files) in &other.entries {
            merged.extend_category(*category, files.clone());
        }
        merged
    }

    /// Pairs in `self` that are not in `other`.
    pub fn difference(&self, other: &CategoryInventory) -> CategoryInventory {
        let mut missing = CategoryInventory::new();
        for (category, files) in &self.entries {
            let remaining: BTreeSet<String> = match other.entries.get(category) {
                Some(theirs) => files.difference(theirs).cloned().collect(),
                None => files.clone(),
            };
            missing.extend_category(*category, remaining);
        }
        missing
    }
}

/// List the markdown templates directly inside each category folder of `root`.
///
/// Missing roots and missing category folders are not errors; they simply
/// contribute nothing. Subdirectories are not descended into.
pub fn scan(root: &Path) -> Result<CategoryInventory> {
    let mut inventory = CategoryInventory::new();

    for category in Category::ALL {
        let dir = root.join(category.as_str());
        let files = match list_templates(&dir) {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) if e.kind() == io::ErrorKind::NotADirectory => continue,
            Err(e) => return Err(e.into()),
        };
        inventory.extend_category(category, files);
    }

    tracing::debug!(
        "Scanned {}: {} template files",
        root.display(),
        inventory.file_count()
    );

    Ok(inventory)
}

fn list_templates(dir: &Path) -> io::Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        // Follows symlinks; dangling links are skipped
        if !fs::metadata(&path).is_ok_and(|m| m.is_file()) {
            continue;
        }

        if path
            .extension()
            .is_some_and(|ext| ext == TEMPLATE_EXTENSION)
        {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.insert(name.to_string());
            }
        }
    }

    Ok(files)
}

/// Templates present in `reference` but missing from `root`.
pub fn diff(root: &Path, reference: &Path) -> Result<CategoryInventory> {
    let current = scan(root)?;
    let wanted = scan(reference)?;
    Ok(wanted.difference(&current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let temp = TempDir::new().unwrap();
        let inventory = scan(&temp.path().join("nope")).unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn scan_lists_markdown_files_per_category() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "chatmodes/plan.md", "plan");
        write(temp.path(), "chatmodes/debug.md", "debug");
        write(temp.path(), "prompts/review.md", "review");
        write(temp.path(), "prompts/notes.txt", "ignored");

        let inventory = scan(temp.path()).unwrap();

        assert_eq!(inventory.file_count(), 3);
        assert!(inventory.contains(Category::Chatmodes, "plan.md"));
        assert!(inventory.contains(Category::Prompts, "review.md"));
        assert!(!inventory.contains(Category::Prompts, "notes.txt"));
    }

    #[test]
    fn scan_omits_empty_categories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("instructions")).unwrap();
        write(temp.path(), "commands/readme.txt", "not markdown");
        write(temp.path(), "prompts/a.md", "a");

        let inventory = scan(temp.path()).unwrap();
        let categories: Vec<_> = inventory.categories().collect();

        assert_eq!(categories, vec![Category::Prompts]);
        assert!(inventory.files(Category::Instructions).is_none());
        assert!(inventory.files(Category::Commands).is_none());
    }

    #[test]
    fn scan_is_not_recursive() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "prompts/nested/deep.md", "deep");

        let inventory = scan(temp.path()).unwrap();
        assert!(inventory.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn scan_follows_symlinked_templates() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "shared/plan.md", "plan");
        fs::create_dir_all(temp.path().join("root/chatmodes")).unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("shared/plan.md"),
            temp.path().join("root/chatmodes/plan.md"),
        )
        .unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("shared/missing.md"),
            temp.path().join("root/chatmodes/dangling.md"),
        )
        .unwrap();

        let inventory = scan(&temp.path().join("root")).unwrap();

        assert!(inventory.contains(Category::Chatmodes, "plan.md"));
        assert!(!inventory.contains(Category::Chatmodes, "dangling.md"));
    }

    #[test]
    fn scan_ignores_unknown_top_level_dirs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "agents/a.md", "a");

        assert!(scan(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn diff_reports_missing_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        let reference = temp.path().join("reference");
        write(&root, "chatmodes/custom.md", "mine");
        write(&reference, "chatmodes/custom.md", "theirs");
        write(&reference, "chatmodes/other.md", "theirs");
        write(&reference, "prompts/p1.md", "theirs");
        write(&reference, "prompts/p2.md", "theirs");

        let missing = diff(&root, &reference).unwrap();

        assert_eq!(missing.file_count(), 3);
        assert!(missing.contains(Category::Chatmodes, "other.md"));
        assert!(!missing.contains(Category::Chatmodes, "custom.md"));
        // Category absent from root contributes everything
        assert_eq!(missing.files(Category::Prompts).unwrap().len(), 2);
    }

    #[test]
    fn diff_of_identical_roots_is_empty() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "commands/a.md", "a");

        let missing = diff(temp.path(), temp.path()).unwrap();
        assert!(missing.is_empty());
        assert_eq!(missing.categories().count(), 0);
    }

    #[test]
    fn remove_last_file_drops_category() {
        let mut inventory = CategoryInventory::new();
        inventory.insert(Category::Commands, "a.md");

        assert!(inventory.remove(Category::Commands, "a.md"));
        assert!(inventory.is_empty());
        assert!(!inventory.remove(Category::Commands, "a.md"));
    }

    #[test]
    fn extend_with_empty_set_adds_no_key() {
        let mut inventory = CategoryInventory::new();
        inventory.extend_category(Category::Prompts, BTreeSet::new());
        assert!(inventory.files(Category::Prompts).is_none());
    }

    #[test]
    fn union_does_not_double_count() {
        let mut a = CategoryInventory::new();
        a.insert(Category::Chatmodes, "custom.md");
        let mut b = CategoryInventory::new();
        b.insert(Category::Chatmodes, "custom.md");
        b.insert(Category::Chatmodes, "other.md");

        let merged = a.union(&b);
        assert_eq!(merged.file_count(), 2);
    }

    #[test]
    fn iter_yields_all_pairs_in_order() {
        let mut inventory = CategoryInventory::new();
        inventory.insert(Category::Prompts, "b.md");
        inventory.insert(Category::Chatmodes, "a.md");

        let pairs: Vec<_> = inventory.iter().collect();
        assert_eq!(
            pairs,
            vec![(Category::Chatmodes, "a.md"), (Category::Prompts, "b.md")]
        );
    }
}
