//! Terminal output.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for real terminals
//! - [`MockUI`] for capturing output in tests
//! - [`DownloadProgress`] for rendering download progress
//!
//! # Example
//!
//! ```
//! use stencil::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.success("Templates ready");
//! assert_eq!(ui.successes(), ["Templates ready"]);
//! ```

pub mod mock;
pub mod output;
pub mod progress;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use progress::DownloadProgress;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, StencilTheme};

use crate::fetch::ProgressSink;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show a contextual hint.
    fn show_hint(&mut self, hint: &str);

    /// Show a `key: value` line.
    fn show_field(&mut self, key: &str, value: &str);

    /// Print machine-readable data, regardless of output mode.
    fn data(&mut self, text: &str);

    /// A sink for download progress.
    fn progress(&mut self) -> Box<dyn ProgressSink>;
}
