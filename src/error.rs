//! Error types for Stencil operations.
//!
//! This module defines [`StencilError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Expected absence (no local override, no bundled set) is an `Option`, not an error
//! - Each fetch stage fails with its own variant so the resolver can react per class
//! - Use `anyhow::Error` (via `StencilError::Other`) for unexpected errors
//! - All errors should provide actionable messages for users

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Which structural sanity check rejected an extracted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureCheck {
    /// Nothing was extracted under the templates prefix.
    NoFiles,
    /// No top-level directory matched a known category.
    NoKnownCategory,
    /// More than half of the extracted files are empty.
    MostlyEmptyFiles,
}

impl fmt::Display for StructureCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StructureCheck::NoFiles => "no-files",
            StructureCheck::NoKnownCategory => "no-known-category",
            StructureCheck::MostlyEmptyFiles => "mostly-empty-files",
        };
        f.write_str(name)
    }
}

/// Core error type for Stencil operations.
#[derive(Debug, Error)]
pub enum StencilError {
    /// A scratch directory could not be created.
    #[error("Failed to allocate scratch directory under {root}: {source}")]
    Allocation {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level failure (DNS, connect, reset).
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The download did not finish within the configured bound.
    #[error("Timed out after {}s fetching {url}", .duration.as_secs())]
    Timeout { url: String, duration: Duration },

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    RemoteApi { url: String, status: u16 },

    /// The server refused the request because of rate limiting.
    #[error("Rate limited fetching {url}{}", retry_hint(.retry_after))]
    RateLimited {
        url: String,
        status: u16,
        retry_after: Option<Duration>,
    },

    /// The downloaded archive is empty or structurally corrupt.
    #[error("Archive is corrupt: {message}")]
    ArchiveIntegrity { message: String },

    /// The archive is valid but has nothing under the templates prefix.
    #[error("Templates folder '{prefix}' not found in archive at this ref")]
    TemplatesFolderNotFound { prefix: String },

    /// An archive entry would resolve outside the extraction directory.
    #[error("Archive entry escapes extraction directory: {entry}")]
    PathTraversal { entry: String },

    /// Extraction succeeded but the content is implausible.
    #[error("Extracted templates failed the {check} check: {message}")]
    StructureValidation {
        check: StructureCheck,
        message: String,
    },

    /// The download was cancelled by the caller.
    #[error("Download cancelled")]
    Cancelled,

    /// Mutually exclusive options were requested together.
    #[error("Conflicting options: {message}")]
    ConflictingOptions { message: String },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl StencilError {
    /// Short class name used in logs and user-facing summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            StencilError::Allocation { .. } => "allocation",
            StencilError::Network { .. } => "network",
            StencilError::Timeout { .. } => "timeout",
            StencilError::RemoteApi { .. } => "api",
            StencilError::RateLimited { .. } => "rate-limit",
            StencilError::ArchiveIntegrity { .. }
            | StencilError::TemplatesFolderNotFound { .. }
            | StencilError::PathTraversal { .. }
            | StencilError::StructureValidation { .. } => "validation",
            StencilError::Cancelled => "cancelled",
            StencilError::ConflictingOptions { .. } => "options",
            StencilError::ConfigParseError { .. } => "config",
            StencilError::Io(_) => "io",
            StencilError::Other(_) => "other",
        }
    }

    /// Whether this is a transport problem (timeouts included).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            StencilError::Network { .. } | StencilError::Timeout { .. }
        )
    }

    /// Whether the remote answered but refused the request.
    pub fn is_remote_api(&self) -> bool {
        matches!(
            self,
            StencilError::RemoteApi { .. } | StencilError::RateLimited { .. }
        )
    }

    /// HTTP status carried by API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            StencilError::RemoteApi { status, .. } | StencilError::RateLimited { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result type alias for Stencil operations.
pub type Result<T> = std::result::Result<T, StencilError>;
