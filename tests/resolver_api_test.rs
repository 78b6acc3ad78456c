//! Integration tests for template resolution through the public API.

use std::cell::Cell;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use httpmock::prelude::*;
use stencil::cache::CacheAllocator;
use stencil::fetch::{ArchiveSpec, ProgressSink, SecureArchiveFetcher, TemplateDownloader};
use stencil::resolver::{ResolveOptions, ResolvedSource, ResolverContext, TemplateResolver};
use stencil::templates::{diff, scan, Category, Provenance, TemplateRoot, UnionMergeSource};
use stencil::{Result, StencilError};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Serves a fixed file set, or fails with a network error.
struct StaticDownloader {
    files: Vec<&'static str>,
    fail: bool,
    calls: Cell<usize>,
}

impl StaticDownloader {
    fn serving(files: &[&'static str]) -> Self {
        Self {
            files: files.to_vec(),
            fail: false,
            calls: Cell::new(0),
        }
    }

    fn unreachable() -> Self {
        Self {
            files: Vec::new(),
            fail: true,
            calls: Cell::new(0),
        }
    }
}

impl TemplateDownloader for StaticDownloader {
    fn download(
        &self,
        target_dir: &Path,
        _progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TemplateRoot> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(StencilError::Network {
                url: self.describe_source(),
                message: "dns error: no such host".to_string(),
            });
        }
        for rel in &self.files {
            write_file(target_dir, rel, "# downloaded");
        }
        Ok(TemplateRoot::new(target_dir, Provenance::Remote))
    }

    fn describe_source(&self) -> String {
        "https://github.com/stencil-dev/stencil-templates/archive/refs/heads/main.zip".to_string()
    }
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

struct Workspace {
    temp: TempDir,
    project: PathBuf,
    scratch: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("project");
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&scratch).unwrap();
        Self {
            temp,
            project,
            scratch,
        }
    }

    fn local_dir(&self) -> PathBuf {
        self.project.join(".stencil/templates")
    }

    fn allocator(&self) -> CacheAllocator {
        CacheAllocator::with_root(&self.scratch, "stencil")
    }
}

#[test]
fn scenario_a_offline_local_only() {
    let ws = Workspace::new();
    write_file(&ws.local_dir(), "chatmodes/custom.md", "# mine");
    let context = ResolverContext::new(&ws.project);
    let mut allocator = ws.allocator();
    let downloader = StaticDownloader::serving(&["prompts/p1.md"]);
    let options = ResolveOptions {
        offline: true,
        ..ResolveOptions::default()
    };

    let result = TemplateResolver::new(&context, &mut allocator, &downloader)
        .resolve(&options)
        .unwrap();

    assert!(result.success);
    assert!(!result.fallback_attempted);
    assert_eq!(result.source.label(), "local");
    assert!(result.message.contains("1 local template file"));
    assert_eq!(downloader.calls.get(), 0);
}

#[test]
fn scenario_b_merge_prefers_local() {
    let ws = Workspace::new();
    write_file(&ws.local_dir(), "chatmodes/custom.md", "# mine");
    let context = ResolverContext::new(&ws.project);
    let mut allocator = ws.allocator();
    let downloader =
        StaticDownloader::serving(&["chatmodes/custom.md", "chatmodes/other.md", "prompts/p1.md"]);

    let result = TemplateResolver::new(&context, &mut allocator, &downloader)
        .resolve(&ResolveOptions::default())
        .unwrap();

    assert!(result.success);
    assert!(matches!(result.source, ResolvedSource::Merged(_)));
    assert!(result.message.contains("1 local + 3 downloaded = 3 unique"));

    let union = result.inventory();
    let chatmodes: Vec<_> = union.files(Category::Chatmodes).unwrap().iter().collect();
    assert_eq!(chatmodes, ["custom.md", "other.md"]);
    assert!(union.contains(Category::Prompts, "p1.md"));
    assert_eq!(union.file_count(), 3);

    let custom = result.resolve(Category::Chatmodes, "custom.md").unwrap();
    assert_eq!(custom, ws.local_dir().join("chatmodes/custom.md"));
    assert_eq!(fs::read_to_string(custom).unwrap(), "# mine");

    let handle = result.cache.clone().unwrap();
    let other = result.resolve(Category::Chatmodes, "other.md").unwrap();
    assert!(other.starts_with(handle.path()));

    allocator.release(&handle);
    assert!(!handle.path().exists());
}

#[test]
fn scenario_c_empty_local_falls_through_to_bundled() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.local_dir()).unwrap();
    let bundled = ws.temp.path().join("bundled");
    write_file(&bundled, "chatmodes/a.md", "# a");
    write_file(&bundled, "instructions/b.md", "# b");
    write_file(&bundled, "commands/c.md", "# c");
    let context = ResolverContext::new(&ws.project).with_bundled_dir(&bundled);
    let mut allocator = ws.allocator();
    let downloader = StaticDownloader::serving(&["prompts/p1.md"]);

    let result = TemplateResolver::new(&context, &mut allocator, &downloader)
        .resolve(&ResolveOptions::default())
        .unwrap();

    assert!(result.success);
    assert!(result.fallback_attempted);
    assert_eq!(result.source.label(), "bundled");
    assert!(result.message.contains("3 bundled template files"));
    assert_eq!(downloader.calls.get(), 0);
}

#[test]
fn scenario_d_everything_fails_online() {
    let ws = Workspace::new();
    let context = ResolverContext::new(&ws.project);
    let mut allocator = ws.allocator();
    let downloader = StaticDownloader::unreachable();

    let result = TemplateResolver::new(&context, &mut allocator, &downloader)
        .resolve(&ResolveOptions::default())
        .unwrap();

    assert!(!result.success);
    assert!(result.fallback_attempted);
    assert!(result.message.contains("Manual setup"));
    assert!(result.message.contains("archive/refs/heads/main.zip"));
    assert!(result.inventory().is_empty());
    assert!(allocator.tracked().is_empty());
}

#[test]
fn scenario_e_conflicting_flags_fail_before_any_work() {
    let ws = Workspace::new();
    write_file(&ws.local_dir(), "chatmodes/custom.md", "# mine");
    let context = ResolverContext::new(&ws.project);
    let mut allocator = ws.allocator();
    let downloader = StaticDownloader::serving(&["prompts/p1.md"]);
    let options = ResolveOptions {
        offline: true,
        force_download: true,
        app_type: None,
    };

    let err = TemplateResolver::new(&context, &mut allocator, &downloader)
        .resolve(&options)
        .unwrap_err();

    assert!(matches!(err, StencilError::ConflictingOptions { .. }));
    assert_eq!(downloader.calls.get(), 0);
    assert_eq!(fs::read_dir(&ws.scratch).unwrap().count(), 0);
}

#[test]
fn app_type_does_not_filter() {
    let ws = Workspace::new();
    write_file(&ws.local_dir(), "prompts/review.md", "# review");
    let context = ResolverContext::new(&ws.project);
    let mut allocator = ws.allocator();
    let downloader = StaticDownloader::unreachable();
    let options = ResolveOptions {
        offline: true,
        app_type: Some("web".to_string()),
        ..ResolveOptions::default()
    };

    let result = TemplateResolver::new(&context, &mut allocator, &downloader)
        .resolve(&options)
        .unwrap();

    assert_eq!(result.file_count(), 1);
}

#[test]
fn local_wins_for_every_collision() {
    let temp = TempDir::new().unwrap();
    let local = temp.path().join("local");
    let remote = temp.path().join("remote");
    for rel in ["prompts/a.md", "prompts/b.md", "commands/c.md"] {
        write_file(&local, rel, "local");
        write_file(&remote, rel, "remote");
    }
    write_file(&remote, "instructions/d.md", "remote");

    let merged = UnionMergeSource::new(
        Some(TemplateRoot::new(&local, Provenance::Local)),
        Some(TemplateRoot::new(&remote, Provenance::Remote)),
    )
    .unwrap();

    let local_inventory = scan(&local).unwrap();
    for (category, name) in local_inventory.iter() {
        let path = merged.resolve(category, name).unwrap();
        assert!(path.starts_with(&local), "{} resolved to {:?}", name, path);
    }

    let summary = merged.describe();
    assert_eq!(summary.union_count, merged.union().file_count());
    assert_eq!(
        summary.union_count,
        summary.local_count + summary.downloaded_only_count
    );
    assert_eq!(summary.downloaded_only_count, 1);
}

#[test]
fn diff_lists_what_local_is_missing() {
    let temp = TempDir::new().unwrap();
    let local = temp.path().join("local");
    let reference = temp.path().join("reference");
    write_file(&local, "prompts/a.md", "x");
    write_file(&reference, "prompts/a.md", "x");
    write_file(&reference, "prompts/b.md", "x");
    write_file(&reference, "chatmodes/c.md", "x");

    let missing = diff(&local, &reference).unwrap();

    assert!(missing.contains(Category::Prompts, "b.md"));
    assert!(missing.contains(Category::Chatmodes, "c.md"));
    assert!(!missing.contains(Category::Prompts, "a.md"));
    assert_eq!(missing.file_count(), 2);
}

#[test]
fn reclaim_is_idempotent() {
    let ws = Workspace::new();
    // No process can hold this pid
    let orphan = ws.scratch.join(format!("stencil_{}_dead", i32::MAX));
    fs::create_dir_all(&orphan).unwrap();
    let mut allocator = ws.allocator();

    let first = allocator.reclaim_orphans();
    let second = allocator.reclaim_orphans();

    if cfg!(unix) {
        assert_eq!(first.reclaimed, vec![orphan.clone()]);
        assert!(!orphan.exists());
    }
    assert!(second.reclaimed.is_empty());
}

#[test]
fn merge_with_real_fetcher_over_http() {
    let server = MockServer::start();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("tpl-main/templates/chatmodes/custom.md", "# remote custom"),
        ("tpl-main/templates/chatmodes/other.md", "# other"),
        ("tpl-main/templates/prompts/p1.md", "# p1"),
    ] {
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    let body = writer.finish().unwrap().into_inner();
    server.mock(|when, then| {
        when.method(GET).path("/acme/tpl/archive/refs/heads/main.zip");
        then.status(200).body(body);
    });

    let ws = Workspace::new();
    write_file(&ws.local_dir(), "chatmodes/custom.md", "# mine");
    let mut context = ResolverContext::new(&ws.project);
    context.archive = ArchiveSpec {
        base_url: server.base_url(),
        owner: "acme".to_string(),
        repo: "tpl".to_string(),
        ..ArchiveSpec::default()
    };
    let fetcher = SecureArchiveFetcher::new(context.archive.clone()).unwrap();
    let mut allocator = ws.allocator();

    let result = TemplateResolver::new(&context, &mut allocator, &fetcher)
        .resolve(&ResolveOptions::default())
        .unwrap();

    assert!(result.success);
    assert_eq!(result.source.label(), "merged");
    let custom = result.resolve(Category::Chatmodes, "custom.md").unwrap();
    assert_eq!(fs::read_to_string(custom).unwrap(), "# mine");
    let p1 = result.resolve(Category::Prompts, "p1.md").unwrap();
    assert_eq!(fs::read_to_string(p1).unwrap(), "# p1");
}

#[test]
fn failed_http_download_degrades_to_local() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/acme/tpl/archive/refs/heads/main.zip");
        then.status(500);
    });

    let ws = Workspace::new();
    write_file(&ws.local_dir(), "prompts/mine.md", "# mine");
    let mut context = ResolverContext::new(&ws.project);
    context.archive = ArchiveSpec {
        base_url: server.base_url(),
        owner: "acme".to_string(),
        repo: "tpl".to_string(),
        ..ArchiveSpec::default()
    };
    let fetcher = SecureArchiveFetcher::new(context.archive.clone()).unwrap();
    let mut allocator = ws.allocator();

    let result = TemplateResolver::new(&context, &mut allocator, &fetcher)
        .resolve(&ResolveOptions::default())
        .unwrap();

    assert!(result.success);
    assert_eq!(result.source.label(), "local");
    assert!(result.message.contains("api"));
    assert_eq!(fs::read_dir(&ws.scratch).unwrap().count(), 0);
}
