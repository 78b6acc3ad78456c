//! Configuration loading.
//!
//! Stencil reads optional YAML configuration from the user's home and the
//! project. The result is a typed [`StencilConfig`] validated once at load.
//!
//! # Example
//!
//! ```
//! use stencil::config::StencilConfig;
//!
//! let config: StencilConfig = serde_yaml::from_str("remote:\n  branch: next\n").unwrap();
//! assert_eq!(config.archive_spec().branch, "next");
//! ```

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_from_paths, ConfigPaths, LoadedConfig};
pub use schema::{ConfigWarning, RemoteConfig, StencilConfig, DEFAULT_LOCAL_DIR};
