// Run statistics and human-readable time formatting

use serde::Serialize;

/// Aggregated outcome of one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Files that needed no work; already included in `succeeded`
    pub skipped: usize,
    pub stopped_by_user: bool,
}

impl RunSummary {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.succeeded += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Final console line
    pub fn done_line(&self) -> String {
        format!("Done. Success: {}, Failed: {}", self.succeeded, self.failed)
    }
}

/// Format a remaining-time estimate, e.g. `1h 1m 1s`, `1m 5s` or `42s`.
/// Negative or non-finite input is treated as zero.
pub fn format_eta(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let total_secs = seconds as u64;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Format a media duration for the per-file heading, e.g. `2m 0s`
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    format!("{}m {}s", (seconds / 60.0) as u64, (seconds % 60.0) as u64)
}
