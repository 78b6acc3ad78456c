//! Resolve command implementation.
//!
//! Runs one resolution and reports where each template comes from. Nothing
//! is written into the project.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cache::CacheAllocator;
use crate::cli::args::ResolveArgs;
use crate::config::LoadedConfig;
use crate::error::Result;
use crate::fetch::SecureArchiveFetcher;
use crate::resolver::{
    ResolutionResult, ResolveOptions, ResolvedSource, ResolverContext, TemplateResolver,
};
use crate::templates::{Category, MergeSummary, Provenance};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The resolve command implementation.
pub struct ResolveCommand {
    project_root: PathBuf,
    config: LoadedConfig,
    args: ResolveArgs,
}

impl ResolveCommand {
    /// Create a new resolve command.
    pub fn new(project_root: &Path, config: LoadedConfig, args: ResolveArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            config,
            args,
        }
    }

    /// Resolver inputs with command-line overrides applied.
    pub fn context(&self) -> ResolverContext {
        let mut context = ResolverContext::from_config(&self.project_root, &self.config.config);
        if let Some(repo) = &self.args.repo {
            context.archive = context.archive.with_repository(repo);
        }
        if let Some(branch) = &self.args.branch {
            context.archive = context.archive.with_branch(branch.as_str());
        }
        context
    }

    /// Resolution flags; config `offline: true` also applies.
    pub fn options(&self) -> ResolveOptions {
        ResolveOptions {
            offline: self.args.offline || self.config.config.offline.unwrap_or(false),
            force_download: self.args.force_download,
            app_type: self.args.app_type.clone(),
        }
    }
}

impl Command for ResolveCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let context = self.context();
        let options = self.options();
        // Reject before the orphan sweep touches the temp root
        options.check_conflicts()?;
        let fetcher = SecureArchiveFetcher::with_timeout(context.archive.clone(), context.timeout)?;
        let mut allocator = CacheAllocator::new(self.config.config.cache_prefix());

        let swept = allocator.reclaim_orphans();
        if !swept.reclaimed.is_empty() {
            tracing::debug!(
                "Reclaimed {} orphaned scratch directories",
                swept.reclaimed.len()
            );
        }

        let result = {
            let mut progress = ui.progress();
            let mut resolver = TemplateResolver::new(&context, &mut allocator, &fetcher);
            resolver.resolve_with_progress(&options, Some(progress.as_mut()))?
        };

        if self.args.json {
            let report = JsonReport::from_result(&result);
            ui.data(&serde_json::to_string_pretty(&report).map_err(anyhow::Error::from)?);
        } else {
            show_result(&result, ui);
        }

        // Downloaded files only live until the allocator drops
        if let Some(handle) = &result.cache {
            allocator.release(handle);
        }

        Ok(if result.success {
            CommandResult::success()
        } else {
            CommandResult::failure(1)
        })
    }
}

fn show_result(result: &ResolutionResult, ui: &mut dyn UserInterface) {
    if !result.success {
        ui.error(&result.message);
        return;
    }

    ui.success(&result.message);
    ui.show_header("Templates");
    ui.show_field("Source", &result.source.label());

    let inventory = result.inventory();
    for category in inventory.categories() {
        ui.message(&format!("{}/", category));
        for filename in inventory.files(category).into_iter().flatten() {
            let origin = origin_label(result, category, filename);
            ui.message(&format!("  {} ({})", filename, origin));
        }
    }

    if matches!(result.source, ResolvedSource::Merged(_)) {
        ui.show_hint("Run with --force-download to ignore local overrides.");
    }
}

/// Which root backs one template.
fn origin_label(result: &ResolutionResult, category: Category, filename: &str) -> String {
    match &result.source {
        ResolvedSource::Merged(merged) => {
            let is_local = merged
                .local()
                .zip(result.resolve(category, filename))
                .is_some_and(|(root, path)| path.starts_with(root.path()));
            if is_local {
                Provenance::Local.to_string()
            } else {
                Provenance::Remote.to_string()
            }
        }
        other => other.label(),
    }
}

/// Machine-readable view of a resolution.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    success: bool,
    source: String,
    message: &'a str,
    fallback_attempted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    merge: Option<MergeSummary>,
    templates: Vec<JsonTemplate>,
}

#[derive(Debug, Serialize)]
struct JsonTemplate {
    category: Category,
    name: String,
    origin: String,
    path: Option<PathBuf>,
}

impl<'a> JsonReport<'a> {
    fn from_result(result: &'a ResolutionResult) -> Self {
        let merge = match &result.source {
            ResolvedSource::Merged(merged) => Some(merged.describe()),
            _ => None,
        };

        let templates = result
            .inventory()
            .iter()
            .map(|(category, name)| JsonTemplate {
                category,
                name: name.to_string(),
                origin: origin_label(result, category, name),
                path: result.resolve(category, name),
            })
            .collect();

        Self {
            success: result.success,
            source: result.source.label(),
            message: &result.message,
            fallback_attempted: result.fallback_attempted,
            merge,
            templates,
        }
    }
}
