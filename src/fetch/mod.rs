//! Remote template snapshots.
//!
//! This module downloads a branch snapshot of the template repository as a
//! ZIP archive and extracts its templates folder:
//!
//! - [`archive`] - archive URL and extraction prefix
//! - [`fetcher`] - the staged download/validate/extract pipeline
//! - [`progress`] - throttled progress events
//!
//! # Example
//!
//! ```no_run
//! use stencil::fetch::{ArchiveSpec, SecureArchiveFetcher};
//!
//! let fetcher = SecureArchiveFetcher::new(ArchiveSpec::default()).unwrap();
//! let root = fetcher.request(std::path::Path::new("/tmp/stencil-demo"), None).unwrap();
//! println!("Templates in {}", root.path().display());
//! ```

pub mod archive;
pub mod fetcher;
pub mod progress;

pub use archive::ArchiveSpec;
pub use fetcher::{ArchiveSummary, CancelFlag, SecureArchiveFetcher, DEFAULT_TIMEOUT};
pub use progress::{Phase, ProgressEvent, ProgressSink, DEFAULT_PROGRESS_INTERVAL};

use std::path::Path;

use crate::error::Result;
use crate::templates::TemplateRoot;

/// Source of fresh template snapshots.
///
/// The resolver only depends on this trait, so policy can be exercised
/// without a network.
pub trait TemplateDownloader {
    /// Fetch a snapshot into `target_dir` and return it as a remote root.
    fn download(
        &self,
        target_dir: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TemplateRoot>;

    /// Human-readable location of the snapshot, for guidance messages.
    fn describe_source(&self) -> String;
}
