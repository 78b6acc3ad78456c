//! Secure snapshot download and extraction.
//!
//! The pipeline runs as a fixed sequence of stages, each failing with its
//! own error variant:
//!
//! 1. request: GET the archive URL
//! 2. stream: copy the body into a scoped temp file with progress
//! 3. validate archive: readable ZIP with entries under the templates prefix
//! 4. extract: copy entries under the prefix, refusing any that escape
//! 5. validate structure: reject empty, uncategorized or placeholder snapshots
//!
//! The temp file is removed whether the pipeline succeeds or fails. A
//! structure failure may leave extracted files in the target directory;
//! the caller owns that directory and decides whether to discard it.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use zip::ZipArchive;

use super::archive::ArchiveSpec;
use super::progress::{Phase, ProgressReporter, ProgressSink, DEFAULT_PROGRESS_INTERVAL};
use super::TemplateDownloader;
use crate::error::{Result, StencilError, StructureCheck};
use crate::templates::{Category, Provenance, TemplateRoot};

/// Default bound on a whole download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const CHUNK_SIZE: usize = 64 * 1024;

/// Shared flag for cancelling an in-flight download.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Facts established while validating an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Hex SHA-256 of the archive file.
    pub sha256: String,
    /// Total entries in the archive.
    pub entries: usize,
    /// Entries under the templates prefix.
    pub template_entries: usize,
}

/// Downloads, validates and extracts template snapshots.
pub struct SecureArchiveFetcher {
    client: Client,
    spec: ArchiveSpec,
    timeout: Duration,
    progress_interval: Duration,
    cancel: CancelFlag,
}

impl SecureArchiveFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new(spec: ArchiveSpec) -> Result<Self> {
        Self::with_timeout(spec, DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(spec: ArchiveSpec, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stencil/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            spec,
            timeout,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel: CancelFlag::new(),
        })
    }

    /// Use an externally controlled cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Change the minimum spacing between download progress events.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Archive coordinates.
    pub fn spec(&self) -> &ArchiveSpec {
        &self.spec
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Download the snapshot and extract its templates into `target_dir`.
    pub fn request(
        &self,
        target_dir: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TemplateRoot> {
        fs::create_dir_all(target_dir)?;
        let staging = target_dir.parent().unwrap_or(target_dir);

        let mut reporter = ProgressReporter::new(progress, self.progress_interval);

        // Removed on drop, on every path out of this function
        let mut archive = tempfile::Builder::new()
            .prefix("snapshot-")
            .suffix(".zip")
            .tempfile_in(staging)?;

        let bytes = self.stream(archive.as_file_mut(), &mut reporter)?;
        tracing::debug!("Downloaded {} bytes from {}", bytes, self.spec.archive_url());

        let summary = self.validate_archive(archive.path())?;
        tracing::debug!(
            "Archive sha256 {} ({} entries, {} under templates)",
            summary.sha256,
            summary.entries,
            summary.template_entries
        );

        let extracted = self.extract_reporting(archive.path(), target_dir, &mut reporter)?;
        Self::validate_structure(target_dir, &extracted)?;

        tracing::info!(
            "Fetched {} template files from {}/{}@{}",
            extracted.len(),
            self.spec.owner,
            self.spec.repo,
            self.spec.branch
        );

        Ok(TemplateRoot::new(target_dir, Provenance::Remote))
    }

    fn stream(&self, dest: &mut File, reporter: &mut ProgressReporter<'_>) -> Result<u64> {
        let url = self.spec.archive_url();
        let started = Instant::now();

        tracing::debug!("GET {}", url);
        let mut response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.transport_error(&url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(&url, status, response.headers()));
        }

        let total = response.content_length();
        reporter.begin(Phase::Downloading, total);

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut done: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(StencilError::Cancelled);
            }
            if started.elapsed() > self.timeout {
                return Err(StencilError::Timeout {
                    url,
                    duration: self.timeout,
                });
            }

            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.read_error(&url, e)),
            };

            dest.write_all(&buf[..n])?;
            done += n as u64;
            reporter.update(done);
        }

        reporter.emit(done);
        dest.flush()?;

        if let Some(expected) = total {
            if done < expected {
                return Err(StencilError::Network {
                    url,
                    message: format!("connection closed after {} of {} bytes", done, expected),
                });
            }
        }

        Ok(done)
    }

    fn transport_error(&self, url: &str, err: &reqwest::Error) -> StencilError {
        if err.is_timeout() {
            StencilError::Timeout {
                url: url.to_string(),
                duration: self.timeout,
            }
        } else {
            StencilError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    fn read_error(&self, url: &str, err: io::Error) -> StencilError {
        let timed_out = err.kind() == io::ErrorKind::TimedOut
            || err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(reqwest::Error::is_timeout);

        if timed_out {
            StencilError::Timeout {
                url: url.to_string(),
                duration: self.timeout,
            }
        } else {
            StencilError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Check that `file` is a readable archive containing the templates folder.
    pub fn validate_archive(&self, file: &Path) -> Result<ArchiveSummary> {
        let sha256 = sha256_file(file)?;
        let mut archive = open_archive(file)?;

        if archive.is_empty() {
            return Err(StencilError::ArchiveIntegrity {
                message: "archive has no entries".to_string(),
            });
        }

        let prefix = self.spec.extraction_prefix();
        let mut template_entries = 0;
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(integrity_error)?;
            if entry.name().len() > prefix.len() && entry.name().starts_with(&prefix) {
                template_entries += 1;
            }
        }

        if template_entries == 0 {
            return Err(StencilError::TemplatesFolderNotFound { prefix });
        }

        Ok(ArchiveSummary {
            sha256,
            entries: archive.len(),
            template_entries,
        })
    }

    /// Extract entries under the templates prefix into `target_dir`.
    ///
    /// Returns the extracted file paths relative to `target_dir`. Fails on
    /// the first entry that would land outside `target_dir`.
    pub fn extract(
        &self,
        file: &Path,
        target_dir: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<Vec<PathBuf>> {
        let mut reporter = ProgressReporter::new(progress, self.progress_interval);
        self.extract_reporting(file, target_dir, &mut reporter)
    }

    fn extract_reporting(
        &self,
        file: &Path,
        target_dir: &Path,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<Vec<PathBuf>> {
        let prefix = self.spec.extraction_prefix();
        let mut archive = open_archive(file)?;
        fs::create_dir_all(target_dir)?;

        let total = archive
            .file_names()
            .filter(|name| name.len() > prefix.len() && name.starts_with(&prefix))
            .count() as u64;
        reporter.begin(Phase::Extracting, Some(total));

        let mut extracted = Vec::new();
        let mut seen = HashSet::new();
        let mut done: u64 = 0;

        for index in 0..archive.len() {
            if self.cancel.is_cancelled() {
                return Err(StencilError::Cancelled);
            }

            let mut entry = archive.by_index(index).map_err(integrity_error)?;
            let name = entry.name().to_string();
            let Some(remainder) = name.strip_prefix(&prefix) else {
                continue;
            };
            if remainder.is_empty() {
                continue;
            }

            let relative = confine(remainder).ok_or_else(|| {
                tracing::warn!("Rejected archive entry outside target: {}", name);
                StencilError::PathTraversal {
                    entry: name.clone(),
                }
            })?;

            if relative.as_os_str().is_empty() {
                continue;
            }
            let dest = target_dir.join(&relative);

            if entry.is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&dest)?;
                io::copy(&mut entry, &mut out).map_err(|e| {
                    if e.kind() == io::ErrorKind::InvalidData {
                        StencilError::ArchiveIntegrity {
                            message: format!("{}: {}", name, e),
                        }
                    } else {
                        StencilError::Io(e)
                    }
                })?;
                // Repeated names overwrite the same file
                if seen.insert(relative.clone()) {
                    extracted.push(relative);
                }
            }

            done += 1;
            reporter.emit(done);
        }

        Ok(extracted)
    }

    /// Reject snapshots that extracted nothing useful.
    pub fn validate_structure(target_dir: &Path, extracted: &[PathBuf]) -> Result<()> {
        if extracted.is_empty() {
            return Err(StencilError::StructureValidation {
                check: StructureCheck::NoFiles,
                message: "no files were extracted".to_string(),
            });
        }

        let has_category = extracted.iter().any(|path| {
            let mut components = path.components();
            let top = components.next().and_then(|c| c.as_os_str().to_str());
            top.is_some_and(|t| t.parse::<Category>().is_ok()) && components.next().is_some()
        });
        if !has_category {
            let known: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
            return Err(StencilError::StructureValidation {
                check: StructureCheck::NoKnownCategory,
                message: format!("expected one of {}", known.join(", ")),
            });
        }

        let empty = extracted
            .iter()
            .filter(|path| {
                fs::metadata(target_dir.join(path))
                    .map(|m| m.len() == 0)
                    .unwrap_or(true)
            })
            .count();
        if empty * 2 > extracted.len() {
            return Err(StencilError::StructureValidation {
                check: StructureCheck::MostlyEmptyFiles,
                message: format!("{} of {} files are empty", empty, extracted.len()),
            });
        }

        Ok(())
    }
}

impl TemplateDownloader for SecureArchiveFetcher {
    fn download(
        &self,
        target_dir: &Path,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<TemplateRoot> {
        self.request(target_dir, progress)
    }

    fn describe_source(&self) -> String {
        self.spec.archive_url()
    }
}

fn open_archive(file: &Path) -> Result<ZipArchive<File>> {
    let handle = File::open(file)?;
    ZipArchive::new(handle).map_err(integrity_error)
}

fn integrity_error(err: zip::result::ZipError) -> StencilError {
    StencilError::ArchiveIntegrity {
        message: err.to_string(),
    }
}

fn sha256_file(file: &Path) -> Result<String> {
    let mut reader = File::open(file)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Map HTTP failure statuses to error variants.
fn classify_status(url: &str, status: StatusCode, headers: &HeaderMap) -> StencilError {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let exhausted = header("x-ratelimit-remaining").is_some_and(|v| v.trim() == "0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        let retry_after = header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return StencilError::RateLimited {
            url: url.to_string(),
            status: status.as_u16(),
            retry_after,
        };
    }

    StencilError::RemoteApi {
        url: url.to_string(),
        status: status.as_u16(),
    }
}

/// Normalize an archive-relative path, refusing anything that leaves its root.
///
/// Both `/` and `\` separate components. `..` may only climb back out of
/// components it entered; drive prefixes and `:` are refused outright.
fn confine(relative: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();

    for part in relative.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if !normalized.pop() {
                    return None;
                }
            }
            _ => {
                if part.contains(':') {
                    return None;
                }
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => normalized.push(part),
                    _ => return None,
                }
            }
        }
    }

    Some(normalized)
}
