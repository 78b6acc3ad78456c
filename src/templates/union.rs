//! Union-merge view over a local and a downloaded template root.
//!
//! Local files always win: a file present in both roots resolves to the
//! local copy, and the downloaded root only fills in what the local root
//! lacks. Nothing is copied; the view only answers lookups.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::inventory::{scan, CategoryInventory};
use super::{Category, TemplateRoot};
use crate::error::Result;

/// Read-only merged view of two template roots.
#[derive(Debug, Clone)]
pub struct UnionMergeSource {
    local: Option<TemplateRoot>,
    downloaded: Option<TemplateRoot>,
    local_inventory: CategoryInventory,
    downloaded_inventory: CategoryInventory,
}

/// Counts describing a merge, for user-facing transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Files provided by the local root.
    pub local_count: usize,
    /// Files provided by the downloaded root (collisions included).
    pub downloaded_count: usize,
    /// Downloaded files with no local counterpart.
    pub downloaded_only_count: usize,
    /// Distinct files in the merged view.
    pub union_count: usize,
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} local + {} downloaded = {} unique",
            self.local_count, self.downloaded_count, self.union_count
        )
    }
}

impl UnionMergeSource {
    /// Build a merged view, scanning both roots.
    pub fn new(local: Option<TemplateRoot>, downloaded: Option<TemplateRoot>) -> Result<Self> {
        let local_inventory = match &local {
            Some(root) => scan(root.path())?,
            None => CategoryInventory::new(),
        };
        let downloaded_inventory = match &downloaded {
            Some(root) => scan(root.path())?,
            None => CategoryInventory::new(),
        };

        Ok(Self {
            local,
            downloaded,
            local_inventory,
            downloaded_inventory,
        })
    }

    /// The local root, if any.
    pub fn local(&self) -> Option<&TemplateRoot> {
        self.local.as_ref()
    }

    /// The downloaded root, if any.
    pub fn downloaded(&self) -> Option<&TemplateRoot> {
        self.downloaded.as_ref()
    }

    /// Backing path for a template: local first, then downloaded.
    pub fn resolve(&self, category: Category, filename: &str) -> Option<PathBuf> {
        if let Some(root) = &self.local {
            if self.local_inventory.contains(category, filename) {
                return Some(root.file_path(category, filename));
            }
        }

        if let Some(root) = &self.downloaded {
            if self.downloaded_inventory.contains(category, filename) {
                return Some(root.file_path(category, filename));
            }
        }

        None
    }

    /// Every template available through this view.
    pub fn union(&self) -> CategoryInventory {
        self.local_inventory.union(&self.downloaded_inventory)
    }

    /// Counts for reporting.
    pub fn describe(&self) -> MergeSummary {
        let local_count = self.local_inventory.file_count();
        let downloaded_only_count = self
            .downloaded_inventory
            .difference(&self.local_inventory)
            .file_count();

        MergeSummary {
            local_count,
            downloaded_count: self.downloaded_inventory.file_count(),
            downloaded_only_count,
            union_count: local_count + downloaded_only_count,
        }
    }
}
