//! Media duration probing with ffprobe.

use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use super::utils::path_arg;

/// Reports the duration of a media file in seconds.
///
/// An unknown duration is reported as `0.0`; callers treat it as "no total".
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration_secs(&self, path: &Path) -> f64;
}

pub struct FfprobeDuration {
    ffprobe_path: String,
}

impl FfprobeDuration {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn build_args(&self, path: &Path) -> Vec<String> {
        [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]
        .into_iter()
        .map(str::to_string)
        .chain(std::iter::once(path_arg(path)))
        .collect()
    }
}

/// Parse ffprobe's duration output; anything unusable is `0.0`.
fn parse_duration(stdout: &str) -> f64 {
    stdout
        .lines()
        .find_map(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0)
}

#[async_trait]
impl DurationProbe for FfprobeDuration {
    async fn duration_secs(&self, path: &Path) -> f64 {
        let args = self.build_args(path);
        match process_utils::run_capturing_stdout(&self.ffprobe_path, &args, None).await {
            Ok(stdout) => parse_duration(&stdout),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not probe media duration");
                0.0
            }
        }
    }
}
