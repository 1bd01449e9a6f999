use crate::stats::format_eta;
use regex::Regex;
use std::sync::OnceLock;

/// Smallest speed multiplier used when projecting remaining time
pub const SPEED_FLOOR: f64 = 1e-6;

/// Width of the rendered progress bar in cells
pub const BAR_WIDTH: usize = 24;

static TIME_RE: OnceLock<Regex> = OnceLock::new();
static SPEED_RE: OnceLock<Regex> = OnceLock::new();

fn time_re() -> &'static Regex {
    TIME_RE.get_or_init(|| {
        Regex::new(r"(?i)time=(\d+):(\d+):(\d+)(?:\.(\d+))?").expect("valid time regex")
    })
}

fn speed_re() -> &'static Regex {
    SPEED_RE.get_or_init(|| {
        Regex::new(r"(?i)speed=\s*(\S*?)x(?:\s|$)").expect("valid speed regex")
    })
}

/// Convert `H:M:S[.fraction]` captures to seconds.
///
/// The fraction's scale comes from its digit count: `"5"` is 0.5 and `"05"` is 0.05.
pub fn hms_to_seconds(hours: u64, minutes: u64, seconds: u64, fraction: Option<&str>) -> f64 {
    let frac = fraction
        .filter(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|f| format!("0.{}", f).parse::<f64>().ok())
        .unwrap_or(0.0);
    // Captures are unbounded digit runs, so sum in f64
    hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds as f64 + frac
}

/// Extract elapsed media seconds from a `time=HH:MM:SS.ff` token
pub fn parse_time_token(line: &str) -> Option<f64> {
    let caps = time_re().captures(line)?;
    let h = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let m = caps.get(2)?.as_str().parse::<u64>().ok()?;
    let s = caps.get(3)?.as_str().parse::<u64>().ok()?;
    Some(hms_to_seconds(h, m, s, caps.get(4).map(|f| f.as_str())))
}

/// Extract the speed multiplier from a `speed=1.23x` token.
///
/// Returns `None` when the line has no speed token. A token that is present
/// but non-positive or unparsable yields `SPEED_FLOOR`.
pub fn parse_speed_token(line: &str) -> Option<f64> {
    let caps = speed_re().captures(line)?;
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let speed = match raw.parse::<f64>() {
        Ok(s) if s.is_finite() && s > 0.0 => s,
        _ => SPEED_FLOOR,
    };
    Some(speed.max(SPEED_FLOOR))
}

/// Most recent progress signals read from the encoder's status stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub elapsed_secs: f64,
    pub speed: f64,
}

impl Default for ProgressSample {
    fn default() -> Self {
        Self {
            elapsed_secs: 0.0,
            speed: 1.0,
        }
    }
}

impl ProgressSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update from one status line. Returns true if the line carried a
    /// `time=` or `speed=` token.
    pub fn ingest(&mut self, line: &str) -> bool {
        let mut matched = false;

        if let Some(elapsed) = parse_time_token(line) {
            self.elapsed_secs = elapsed;
            matched = true;
        }

        if let Some(speed) = parse_speed_token(line) {
            self.speed = speed;
            matched = true;
        }

        matched
    }

    /// Completion fraction in `[0, 1]`
    pub fn fraction(&self, total_secs: f64) -> f64 {
        if !(total_secs > 0.0) {
            return 0.0;
        }
        (self.elapsed_secs / total_secs).clamp(0.0, 1.0)
    }

    /// Projected seconds until the encode finishes at the current speed
    pub fn remaining_secs(&self, total_secs: f64) -> f64 {
        let left = (total_secs - self.elapsed_secs).max(0.0);
        left / self.speed.max(SPEED_FLOOR)
    }

    pub fn eta(&self, total_secs: f64) -> String {
        format_eta(self.remaining_secs(total_secs))
    }

    /// Single progress line (without carriage return)
    pub fn render(&self, total_secs: Option<f64>) -> String {
        match total_secs {
            Some(total) if total > 0.0 => {
                let done = self.fraction(total);
                let filled = ((done * BAR_WIDTH as f64) as usize).min(BAR_WIDTH);
                let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
                format!(
                    "    [{}] {:5.1}%  speed {:>4.2}x  ETA {:>8}",
                    bar,
                    done * 100.0,
                    self.speed,
                    self.eta(total)
                )
            }
            _ => format!(
                "    time {:>8}  speed {:>4.2}x",
                format_eta(self.elapsed_secs),
                self.speed
            ),
        }
    }

    /// Render as if the encode reached the end of the media
    pub fn render_complete(&self, total_secs: f64) -> String {
        let finished = ProgressSample {
            elapsed_secs: total_secs,
            speed: self.speed,
        };
        finished.render(Some(total_secs))
    }
}
