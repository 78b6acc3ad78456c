//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.

use std::sync::{Arc, Mutex};

use crate::fetch::{ProgressEvent, ProgressSink};

use super::{OutputMode, UserInterface};

/// Mock UI implementation for testing.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    hints: Vec<String>,
    fields: Vec<(String, String)>,
    data: Vec<String>,
    progress_events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl MockUI {
    /// Create a new MockUI with Normal output mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Plain messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Success messages.
    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    /// Warnings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Errors.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Headers.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Hints.
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Key-value lines.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Value of the first field named `key`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Machine-readable output.
    pub fn data_lines(&self) -> &[String] {
        &self.data
    }

    /// Progress events received by sinks handed out by this UI.
    pub fn progress_events(&self) -> Vec<ProgressEvent> {
        self.progress_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Whether any output line contains `needle`.
    pub fn has_output(&self, needle: &str) -> bool {
        self.messages
            .iter()
            .chain(&self.successes)
            .chain(&self.warnings)
            .chain(&self.errors)
            .chain(&self.hints)
            .chain(&self.data)
            .any(|line| line.contains(needle))
    }
}

struct RecordingSink(Arc<Mutex<Vec<ProgressEvent>>>);

impl ProgressSink for RecordingSink {
    fn on_progress(&mut self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.0
            .lock()
            .map_err(|_| anyhow::anyhow!("progress log poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn show_hint(&mut self, hint: &str) {
        self.hints.push(hint.to_string());
    }

    fn show_field(&mut self, key: &str, value: &str) {
        self.fields.push((key.to_string(), value.to_string()));
    }

    fn data(&mut self, text: &str) {
        self.data.push(text.to_string());
    }

    fn progress(&mut self) -> Box<dyn ProgressSink> {
        Box::new(RecordingSink(Arc::clone(&self.progress_events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Phase;

    #[test]
    fn captures_messages_by_kind() {
        let mut ui = MockUI::new();
        ui.message("plain");
        ui.success("done");
        ui.warning("careful");
        ui.error("broken");

        assert_eq!(ui.messages(), ["plain"]);
        assert_eq!(ui.successes(), ["done"]);
        assert_eq!(ui.warnings(), ["careful"]);
        assert_eq!(ui.errors(), ["broken"]);
        assert!(ui.has_output("brok"));
    }

    #[test]
    fn records_fields() {
        let mut ui = MockUI::new();
        ui.show_field("Source", "merged");
        assert_eq!(ui.field("Source"), Some("merged"));
        assert_eq!(ui.field("Missing"), None);
    }

    #[test]
    fn progress_sinks_record_events() {
        let mut ui = MockUI::new();
        let mut sink = ui.progress();
        let event = ProgressEvent {
            phase: Phase::Downloading,
            bytes_done: 10,
            bytes_total: None,
            percent: None,
            throughput: 0.0,
            eta: None,
        };
        sink.on_progress(&event).unwrap();
        drop(sink);

        assert_eq!(ui.progress_events(), vec![event]);
    }
}
