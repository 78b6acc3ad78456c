//! Download progress bar.

use indicatif::{ProgressBar, ProgressStyle};

use crate::fetch::{Phase, ProgressEvent, ProgressSink};

const DOWNLOAD_TEMPLATE: &str =
    "{spinner:.cyan} Downloading templates [{bar:30.cyan/dim}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const DOWNLOAD_UNKNOWN_TEMPLATE: &str =
    "{spinner:.cyan} Downloading templates {bytes} ({bytes_per_sec})";
const EXTRACT_TEMPLATE: &str = "{spinner:.cyan} Extracting [{bar:30.cyan/dim}] {pos}/{len} entries";

/// Renders [`ProgressEvent`]s as an indicatif bar on stderr.
///
/// The bar clears itself when dropped.
pub struct DownloadProgress {
    bar: ProgressBar,
    style: Option<(Phase, bool)>,
}

impl DownloadProgress {
    /// A visible progress bar.
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::new(0),
            style: None,
        }
    }

    /// A bar that never draws (quiet modes, tests).
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            style: None,
        }
    }

    /// Current position, in the units of the active phase.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    fn restyle(&mut self, phase: Phase, known_total: bool) -> anyhow::Result<()> {
        if self.style == Some((phase, known_total)) {
            return Ok(());
        }

        let template = match (phase, known_total) {
            (Phase::Downloading, true) => DOWNLOAD_TEMPLATE,
            (Phase::Downloading, false) => DOWNLOAD_UNKNOWN_TEMPLATE,
            (Phase::Extracting, _) => EXTRACT_TEMPLATE,
        };
        self.bar
            .set_style(ProgressStyle::with_template(template)?.progress_chars("━╸ "));
        if self.style.map(|(p, _)| p) != Some(phase) {
            self.bar.reset();
        }
        self.style = Some((phase, known_total));
        Ok(())
    }
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for DownloadProgress {
    fn on_progress(&mut self, event: &ProgressEvent) -> anyhow::Result<()> {
        self.restyle(event.phase, event.bytes_total.is_some())?;
        if let Some(total) = event.bytes_total {
            self.bar.set_length(total);
        }
        self.bar.set_position(event.bytes_done);
        Ok(())
    }
}

impl Drop for DownloadProgress {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}
