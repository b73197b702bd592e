//! Progress milestones and the transcription progress line protocol.
//!
//! The transcription tool prints lines of the form
//! `PROGRESS <ratio> <processedSec> <totalSec> <speed>`; everything else on its
//! stdout is ignored.

use std::time::{Duration, Instant};

const PROGRESS_PREFIX: &str = "PROGRESS ";

/// Overall progress values reached at fixed points of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMilestones {
    /// Before extraction, for uploaded videos.
    pub upload_start: u8,
    /// Before extraction, for fetched videos.
    pub remote_start: u8,
    /// Start of transcription; lower bound of the ASR band.
    pub asr_start: u8,
    /// End of transcription; upper bound of the ASR band.
    pub asr_end: u8,
    /// Before subtitle conversion.
    pub convert_start: u8,
}

impl Default for ProgressMilestones {
    fn default() -> Self {
        Self {
            upload_start: 10,
            remote_start: 20,
            asr_start: 40,
            asr_end: 70,
            convert_start: 90,
        }
    }
}

impl ProgressMilestones {
    /// Map an ASR completion ratio onto the ASR band of overall progress.
    pub fn asr_progress(&self, ratio: f64) -> u8 {
        let low = f64::from(self.asr_start);
        let high = f64::from(self.asr_end);
        let value = (low + ratio * (high - low)).round();
        value.clamp(low, high) as u8
    }
}

/// One parsed `PROGRESS` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsrProgressLine {
    pub ratio: f64,
    pub processed_sec: f64,
    pub total_sec: f64,
    pub speed: f64,
}

impl AsrProgressLine {
    /// Parse a stdout line. Anything that is not exactly the prefix followed by
    /// four numbers yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
        let mut fields = rest.split_whitespace().map(str::parse::<f64>);

        let ratio = fields.next()?.ok()?;
        let processed_sec = fields.next()?.ok()?;
        let total_sec = fields.next()?.ok()?;
        let speed = fields.next()?.ok()?;
        if fields.next().is_some() || !ratio.is_finite() {
            return None;
        }

        Some(Self {
            ratio,
            processed_sec,
            total_sec,
            speed,
        })
    }
}

/// Rate limits for the transcription progress log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressLogConfig {
    pub min_ratio_step: f64,
    pub min_interval: Duration,
}

impl Default for ProgressLogConfig {
    fn default() -> Self {
        Self {
            min_ratio_step: 0.05,
            min_interval: Duration::from_secs(5),
        }
    }
}

/// Decides when a progress line is worth a log entry.
///
/// Only logging is throttled; job state follows every line.
#[derive(Debug)]
pub struct ProgressLogThrottle {
    config: ProgressLogConfig,
    last: Option<(f64, Instant)>,
}

impl ProgressLogThrottle {
    pub fn new(config: ProgressLogConfig) -> Self {
        Self { config, last: None }
    }

    /// Returns `true` and remembers the point if this update should be logged.
    pub fn should_log(&mut self, ratio: f64, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some((last_ratio, last_at)) => {
                ratio - last_ratio >= self.config.min_ratio_step
                    || now.saturating_duration_since(last_at) >= self.config.min_interval
            }
        };
        if due {
            self.last = Some((ratio, now));
        }
        due
    }
}
