//! Cache command implementation.
//!
//! Provides `stencil cache list` and `stencil cache reclaim`.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cache::{directory_info, format_bytes, CacheAllocator, ScratchEntry};
use crate::config::LoadedConfig;
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// Arguments for the cache command.
#[derive(Debug, Clone, Args)]
pub struct CacheArgs {
    /// Directory holding scratch directories (defaults to the OS temp dir)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CacheSubcommand,
}

/// Cache subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum CacheSubcommand {
    /// List scratch directories and whether their owners are alive.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete scratch directories left behind by dead processes.
    Reclaim,
}

/// The cache command implementation.
pub struct CacheCommand {
    config: LoadedConfig,
    args: CacheArgs,
}

impl CacheCommand {
    /// Create a new cache command.
    pub fn new(config: LoadedConfig, args: CacheArgs) -> Self {
        Self { config, args }
    }

    fn allocator(&self) -> CacheAllocator {
        let prefix = self.config.config.cache_prefix();
        match &self.args.root {
            Some(root) => CacheAllocator::with_root(root, prefix),
            None => CacheAllocator::new(prefix),
        }
    }
}

impl Command for CacheCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mut allocator = self.allocator();

        let exit_code = match &self.args.command {
            CacheSubcommand::List { json } => list_scratch(&allocator, *json, ui)?,
            CacheSubcommand::Reclaim => reclaim(&mut allocator, ui),
        };

        Ok(if exit_code == 0 {
            CommandResult::success()
        } else {
            CommandResult::failure(exit_code)
        })
    }
}

#[derive(Debug, Serialize)]
struct ScratchRow {
    path: PathBuf,
    pid: u32,
    liveness: String,
    files: u64,
    size_bytes: u64,
}

impl From<&ScratchEntry> for ScratchRow {
    fn from(entry: &ScratchEntry) -> Self {
        let info = directory_info(&entry.path);
        Self {
            path: entry.path.clone(),
            pid: entry.pid,
            liveness: entry.liveness.to_string(),
            files: info.file_count,
            size_bytes: info.size_bytes,
        }
    }
}

fn list_scratch(allocator: &CacheAllocator, json: bool, ui: &mut dyn UserInterface) -> Result<i32> {
    let rows: Vec<ScratchRow> = allocator.scan().iter().map(ScratchRow::from).collect();

    if json {
        let output = serde_json::to_string_pretty(&rows).map_err(anyhow::Error::from)?;
        ui.data(&output);
        return Ok(0);
    }

    if rows.is_empty() {
        ui.message(&format!(
            "No scratch directories in {}",
            allocator.root().display()
        ));
        return Ok(0);
    }

    ui.message(&format!("{} scratch directories:\n", rows.len()));
    for row in &rows {
        ui.message(&format!(
            "  {} [pid {}, {}] {} files, {}",
            row.path.display(),
            row.pid,
            row.liveness,
            row.files,
            format_bytes(row.size_bytes)
        ));
    }

    Ok(0)
}

fn reclaim(allocator: &mut CacheAllocator, ui: &mut dyn UserInterface) -> i32 {
    let report = allocator.reclaim_orphans();

    for path in &report.reclaimed {
        ui.message(&format!("  removed {}", path.display()));
    }

    ui.success(&format!(
        "Reclaimed {} of {} scratch directories ({} kept)",
        report.reclaimed.len(),
        report.scanned,
        report.kept
    ));

    if report.failed > 0 {
        ui.warning(&format!(
            "{} orphaned directories could not be removed",
            report.failed
        ));
        return 1;
    }

    0
}
