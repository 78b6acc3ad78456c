//! Download and extraction progress reporting.
//!
//! Sinks receive [`ProgressEvent`]s. While downloading, events are throttled
//! to a fixed cadence; during extraction one event is sent per entry. A sink
//! that returns an error is logged once and otherwise ignored.

use std::time::{Duration, Instant};

/// Default minimum spacing between download events.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Pipeline stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Streaming the archive; counts are bytes.
    Downloading,
    /// Writing archive entries; counts are entries.
    Extracting,
}

/// A progress snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Current stage.
    pub phase: Phase,
    /// Units completed (bytes while downloading, entries while extracting).
    pub bytes_done: u64,
    /// Total units, when known.
    pub bytes_total: Option<u64>,
    /// Completion percentage, when the total is known.
    pub percent: Option<f64>,
    /// Units per second since the phase started.
    pub throughput: f64,
    /// Estimated time remaining, when computable.
    pub eta: Option<Duration>,
}

/// Receiver of progress events.
pub trait ProgressSink {
    /// Handle one event. Errors never abort the download.
    fn on_progress(&mut self, event: &ProgressEvent) -> anyhow::Result<()>;
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent) -> anyhow::Result<()>,
{
    fn on_progress(&mut self, event: &ProgressEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Throttles and forwards events to an optional sink.
pub(crate) struct ProgressReporter<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
    interval: Duration,
    phase: Phase,
    total: Option<u64>,
    started: Instant,
    last_emit: Option<Instant>,
    sink_failed: bool,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(sink: Option<&'a mut dyn ProgressSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            phase: Phase::Downloading,
            total: None,
            started: Instant::now(),
            last_emit: None,
            sink_failed: false,
        }
    }

    /// Start a new phase.
    pub(crate) fn begin(&mut self, phase: Phase, total: Option<u64>) {
        self.phase = phase;
        self.total = total;
        self.started = Instant::now();
        self.last_emit = None;
    }

    /// Report progress, dropping events that arrive faster than the interval.
    pub(crate) fn update(&mut self, done: u64) {
        let now = Instant::now();
        if let Some(last) = self.last_emit {
            if now.duration_since(last) < self.interval {
                return;
            }
        }
        self.emit(done);
    }

    /// Report progress unconditionally.
    pub(crate) fn emit(&mut self, done: u64) {
        let now = Instant::now();
        self.last_emit = Some(now);

        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        let event = build_event(self.phase, done, self.total, now.duration_since(self.started));
        if let Err(e) = sink.on_progress(&event) {
            if !self.sink_failed {
                tracing::warn!("Progress callback failed, continuing: {}", e);
                self.sink_failed = true;
            }
        }
    }
}

fn build_event(phase: Phase, done: u64, total: Option<u64>, elapsed: Duration) -> ProgressEvent {
    let secs = elapsed.as_secs_f64();
    let throughput = if secs > 0.0 { done as f64 / secs } else { 0.0 };

    let percent = total
        .filter(|t| *t > 0)
        .map(|t| (done as f64 / t as f64 * 100.0).min(100.0));

    let eta = match total {
        Some(t) if throughput > 0.0 && t >= done => {
            Some(Duration::from_secs_f64((t - done) as f64 / throughput))
        }
        _ => None,
    };

    ProgressEvent {
        phase,
        bytes_done: done,
        bytes_total: total,
        percent,
        throughput,
        eta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_computes_percent_and_eta() {
        let event = build_event(Phase::Downloading, 50, Some(100), Duration::from_secs(5));
        assert_eq!(event.percent, Some(50.0));
        assert_eq!(event.throughput, 10.0);
        assert_eq!(event.eta, Some(Duration::from_secs(5)));
    }

    #[test]
    fn event_without_total_has_no_percent() {
        let event = build_event(Phase::Downloading, 50, None, Duration::from_secs(1));
        assert!(event.percent.is_none());
        assert!(event.eta.is_none());
    }

    #[test]
    fn updates_are_throttled() {
        let mut count = 0;
        let mut sink = |_: &ProgressEvent| -> anyhow::Result<()> {
            count += 1;
            Ok(())
        };
        {
            let mut reporter = ProgressReporter::new(Some(&mut sink), Duration::from_secs(3600));
            reporter.begin(Phase::Downloading, Some(1000));
            for done in 0..1000 {
                reporter.update(done);
            }
            reporter.emit(1000);
        }
        // First update plus the forced final event
        assert_eq!(count, 2);
    }

    #[test]
    fn failing_sink_does_not_stop_reporting() {
        let mut calls = 0;
        let mut sink = |_: &ProgressEvent| -> anyhow::Result<()> {
            calls += 1;
            anyhow::bail!("terminal closed")
        };
        {
            let mut reporter = ProgressReporter::new(Some(&mut sink), Duration::ZERO);
            reporter.begin(Phase::Extracting, Some(3));
            reporter.emit(1);
            reporter.emit(2);
            reporter.emit(3);
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn reporter_without_sink_is_silent() {
        let mut reporter = ProgressReporter::new(None, Duration::ZERO);
        reporter.begin(Phase::Downloading, None);
        reporter.update(10);
        reporter.emit(20);
    }
}
