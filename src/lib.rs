//! Stencil - resolve which templates a scaffolding tool should install.
//!
//! Templates come from three places: user overrides in the project (or an
//! ancestor), a set bundled with the tool, and a canonical snapshot
//! downloaded from a repository. Stencil reconciles them into one view
//! where local files always win.
//!
//! # Modules
//!
//! - [`cache`] - Process-scoped scratch directories and orphan reclamation
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Layered YAML configuration
//! - [`error`] - Error types and result aliases
//! - [`fetch`] - Secure snapshot download and extraction
//! - [`resolver`] - The source priority policy
//! - [`templates`] - Template roots, inventories and union merging
//! - [`ui`] - Terminal output and progress bars
//!
//! # Example
//!
//! ```
//! use stencil::cache::CacheAllocator;
//! use stencil::fetch::{ArchiveSpec, SecureArchiveFetcher};
//! use stencil::resolver::{ResolveOptions, ResolverContext, TemplateResolver};
//! use stencil::templates::Category;
//!
//! let project = tempfile::TempDir::new().unwrap();
//! let local = project.path().join(".stencil/templates/chatmodes");
//! std::fs::create_dir_all(&local).unwrap();
//! std::fs::write(local.join("custom.md"), "# Custom").unwrap();
//!
//! let context = ResolverContext::new(project.path());
//! let mut allocator = CacheAllocator::new("stencil-doc");
//! let fetcher = SecureArchiveFetcher::new(ArchiveSpec::default()).unwrap();
//! let options = ResolveOptions { offline: true, ..Default::default() };
//!
//! let result = TemplateResolver::new(&context, &mut allocator, &fetcher)
//!     .resolve(&options)
//!     .unwrap();
//! assert!(result.success);
//! assert!(result.resolve(Category::Chatmodes, "custom.md").is_some());
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod resolver;
pub mod templates;
pub mod ui;

pub use error::{Result, StencilError};
