//! Template source resolution.
//!
//! [`TemplateResolver`] decides which templates to install, in priority
//! order:
//!
//! 1. `force_download`: a fresh snapshot alone, ignoring local overrides
//! 2. local overrides (merged with a fresh snapshot unless offline)
//! 3. the bundled fallback set
//! 4. offline with nothing local: fail with guidance
//! 5. a fresh snapshot as a last resort
//!
//! The first step that produces templates wins. Only invalid options and
//! scratch allocation failures are returned as errors; everything else is
//! reported through [`ResolutionResult`].

pub mod context;
pub mod result;

pub use context::{default_bundled_dir, find_upwards, ResolverContext};
pub use result::{ResolutionResult, ResolvedSource};

use crate::cache::{CacheAllocator, CacheHandle};
use crate::error::{Result, StencilError};
use crate::fetch::{ProgressSink, TemplateDownloader};
use crate::templates::{scan, CategoryInventory, Provenance, TemplateRoot, UnionMergeSource};

/// Flags for one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Never touch the network.
    pub offline: bool,
    /// Skip local overrides and download a fresh snapshot.
    pub force_download: bool,
    /// Application type. Recorded in logs; does not filter templates.
    pub app_type: Option<String>,
}

impl ResolveOptions {
    /// Fails when `offline` and `force_download` are both set.
    pub fn check_conflicts(&self) -> Result<()> {
        if self.offline && self.force_download {
            return Err(StencilError::ConflictingOptions {
                message: "--offline and --force-download cannot be used together".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a download attempt that did not fail allocation.
enum Download {
    Fetched {
        root: TemplateRoot,
        inventory: CategoryInventory,
        handle: CacheHandle,
    },
    Failed(StencilError),
}

/// Applies the resolution policy.
pub struct TemplateResolver<'a> {
    context: &'a ResolverContext,
    allocator: &'a mut CacheAllocator,
    downloader: &'a dyn TemplateDownloader,
}

impl<'a> TemplateResolver<'a> {
    /// Create a resolver for one invocation.
    pub fn new(
        context: &'a ResolverContext,
        allocator: &'a mut CacheAllocator,
        downloader: &'a dyn TemplateDownloader,
    ) -> Self {
        Self {
            context,
            allocator,
            downloader,
        }
    }

    /// Resolve without progress reporting.
    pub fn resolve(&mut self, options: &ResolveOptions) -> Result<ResolutionResult> {
        self.resolve_with_progress(options, None)
    }

    /// Resolve, forwarding download progress to `progress`.
    ///
    /// At most one download happens per call.
    pub fn resolve_with_progress(
        &mut self,
        options: &ResolveOptions,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ResolutionResult> {
        options.check_conflicts()?;

        tracing::debug!(
            "Resolving templates for {} (app type: {}, offline: {}, force download: {})",
            self.context.project_root.display(),
            options.app_type.as_deref().unwrap_or("unspecified"),
            options.offline,
            options.force_download
        );

        if options.force_download {
            return self.forced_download(progress);
        }

        if let Some((root, inventory)) = self.local_override()? {
            if options.offline {
                let message = format!(
                    "Using {} from {} (offline)",
                    count_files(inventory.file_count(), "local"),
                    root.path().display()
                );
                tracing::info!("{}", message);
                return Ok(single(root, inventory, message, false, None));
            }
            return self.merge_with_download(root, inventory, progress);
        }

        if let Some((root, inventory)) = self.bundled()? {
            let message = format!(
                "Using {} from {}",
                count_files(inventory.file_count(), "bundled"),
                root.path().display()
            );
            tracing::info!("{}", message);
            return Ok(single(root, inventory, message, true, None));
        }

        if options.offline {
            let message = format!(
                "No local templates found and offline mode is enabled. Create {} with \
                 chatmodes/, instructions/, prompts/ or commands/ folders holding .md \
                 files, or run without --offline.",
                self.context.suggested_local_dir().display()
            );
            tracing::warn!("{}", message);
            return Ok(ResolutionResult::failure(message, false));
        }

        self.last_resort_download(progress)
    }

    fn forced_download(
        &mut self,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ResolutionResult> {
        match self.download(progress)? {
            Download::Fetched {
                root,
                inventory,
                handle,
            } => {
                let message = format!(
                    "Using {} from {} (local overrides ignored)",
                    count_files(inventory.file_count(), "freshly downloaded"),
                    self.downloader.describe_source()
                );
                tracing::info!("{}", message);
                Ok(single(root, inventory, message, false, Some(handle)))
            }
            Download::Failed(err) => Ok(ResolutionResult::failure(
                self.manual_setup_message(&err),
                false,
            )),
        }
    }

    fn merge_with_download(
        &mut self,
        local: TemplateRoot,
        local_inventory: CategoryInventory,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ResolutionResult> {
        let err = match self.download(progress)? {
            Download::Fetched { root, handle, .. } => {
                match UnionMergeSource::new(Some(local.clone()), Some(root)) {
                    Ok(merged) => {
                        let message = format!(
                            "Merged templates: {} (local files take precedence)",
                            merged.describe()
                        );
                        tracing::info!("{}", message);
                        return Ok(ResolutionResult {
                            source: ResolvedSource::Merged(merged),
                            success: true,
                            message,
                            fallback_attempted: false,
                            cache: Some(handle),
                        });
                    }
                    Err(err) => {
                        self.allocator.release(&handle);
                        err
                    }
                }
            }
            Download::Failed(err) => err,
        };

        let message = format!(
            "Using {} from {} only; downloading the latest templates failed ({}: {})",
            count_files(local_inventory.file_count(), "local"),
            local.path().display(),
            err.kind(),
            err
        );
        tracing::warn!("{}", message);
        Ok(single(local, local_inventory, message, false, None))
    }

    fn last_resort_download(
        &mut self,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<ResolutionResult> {
        match self.download(progress)? {
            Download::Fetched {
                root,
                inventory,
                handle,
            } => {
                let message = format!(
                    "Downloaded {} from {}",
                    count_files(inventory.file_count(), "template"),
                    self.downloader.describe_source()
                );
                tracing::info!("{}", message);
                Ok(single(root, inventory, message, true, Some(handle)))
            }
            Download::Failed(err) => Ok(ResolutionResult::failure(
                self.manual_setup_message(&err),
                true,
            )),
        }
    }

    /// Nearest non-empty override folder.
    fn local_override(&self) -> Result<Option<(TemplateRoot, CategoryInventory)>> {
        let Some(dir) = self.context.find_local_override() else {
            tracing::debug!("No local override folder '{}'", self.context.local_dir);
            return Ok(None);
        };

        let inventory = scan(&dir)?;
        if inventory.is_empty() {
            tracing::debug!("Local override {} is empty, ignoring it", dir.display());
            return Ok(None);
        }

        Ok(Some((TemplateRoot::new(dir, Provenance::Local), inventory)))
    }

    fn bundled(&self) -> Result<Option<(TemplateRoot, CategoryInventory)>> {
        let Some(dir) = self.context.bundled_dir.as_deref() else {
            return Ok(None);
        };

        let inventory = scan(dir)?;
        if inventory.is_empty() {
            tracing::debug!("No bundled templates in {}", dir.display());
            return Ok(None);
        }

        Ok(Some((TemplateRoot::new(dir, Provenance::Bundled), inventory)))
    }

    /// Download into a fresh scratch directory.
    ///
    /// The directory is released on any failure. Cancellation is the one
    /// download failure that propagates as an error.
    fn download(&mut self, progress: Option<&mut dyn ProgressSink>) -> Result<Download> {
        let handle = self.allocator.allocate()?;
        let target = handle.path().join("templates");

        tracing::debug!(
            "Downloading templates from {} into {}",
            self.downloader.describe_source(),
            target.display()
        );

        let outcome = self
            .downloader
            .download(&target, progress)
            .and_then(|root| scan(root.path()).map(|inventory| (root, inventory)));

        match outcome {
            Ok((root, inventory)) => Ok(Download::Fetched {
                root,
                inventory,
                handle,
            }),
            Err(err) => {
                self.allocator.release(&handle);
                if matches!(err, StencilError::Cancelled) {
                    return Err(err);
                }
                tracing::warn!("Template download failed ({}): {}", err.kind(), err);
                Ok(Download::Failed(err))
            }
        }
    }

    fn manual_setup_message(&self, err: &StencilError) -> String {
        format!(
            "Could not obtain templates: {}.\nManual setup: download {} and copy its \
             template folders into {}, then run again.",
            err,
            self.downloader.describe_source(),
            self.context.suggested_local_dir().display()
        )
    }
}

fn single(
    root: TemplateRoot,
    inventory: CategoryInventory,
    message: String,
    fallback_attempted: bool,
    cache: Option<CacheHandle>,
) -> ResolutionResult {
    ResolutionResult {
        source: ResolvedSource::Single(root, inventory),
        success: true,
        message,
        fallback_attempted,
        cache,
    }
}

/// "1 local template file", "3 bundled template files".
fn count_files(count: usize, adjective: &str) -> String {
    let noun = if count == 1 { "file" } else { "files" };
    if adjective == "template" {
        format!("{} template {}", count, noun)
    } else {
        format!("{} {} template {}", count, adjective, noun)
    }
}
