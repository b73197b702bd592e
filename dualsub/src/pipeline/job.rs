//! The Job record: one end-to-end subtitle request for one video.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timing::StepTimings;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting in the queue.
    Queued,
    /// Remote asset fetched, waiting for processing to be authorized.
    Ready,
    /// A worker is executing one of the job's steps.
    Processing,
    /// All steps finished successfully.
    Done,
    /// A step failed; the job will not run again.
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStep {
    Upload,
    Download,
    Extract,
    Asr,
    Translate,
    Convert,
}

impl JobStep {
    /// Every step, in pipeline order.
    pub const ALL: [JobStep; 6] = [
        Self::Upload,
        Self::Download,
        Self::Extract,
        Self::Asr,
        Self::Translate,
        Self::Convert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Extract => "extract",
            Self::Asr => "asr",
            Self::Translate => "translate",
            Self::Convert => "convert",
        }
    }

    /// Human-readable name used in failure messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::Download => "Download",
            Self::Extract => "Audio extraction",
            Self::Asr => "Transcription",
            Self::Translate => "Translation",
            Self::Convert => "Subtitle conversion",
        }
    }
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the job's video comes from. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    Upload,
    Remote { url: String, max_height: u32 },
}

impl JobSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Remote { .. } => "remote",
        }
    }
}

/// Live transcription telemetry, present only while the ASR step runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AsrTelemetry {
    pub processed_sec: Option<f64>,
    pub total_sec: Option<f64>,
    pub speed: Option<f64>,
}

/// Files owned by a job, all under its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub dir: PathBuf,
    pub asset: PathBuf,
    pub audio: PathBuf,
    pub source_srt: PathBuf,
    pub source_vtt: PathBuf,
    pub target_srt: PathBuf,
    pub target_vtt: PathBuf,
}

impl JobPaths {
    /// Lay out a job directory. `asset_ext` includes the leading dot.
    pub fn new(dir: impl Into<PathBuf>, asset_ext: &str, source_lang: &str, target_lang: &str) -> Self {
        let dir = dir.into();
        Self {
            asset: dir.join(format!("source{asset_ext}")),
            audio: dir.join("audio.wav"),
            source_srt: dir.join(format!("{source_lang}.srt")),
            source_vtt: dir.join(format!("{source_lang}.vtt")),
            target_srt: dir.join(format!("{target_lang}.srt")),
            target_vtt: dir.join(format!("{target_lang}.vtt")),
            dir,
        }
    }
}

/// A unit of work tracked by the pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub step: JobStep,
    /// Overall progress, 0 to 100.
    pub progress: u8,
    pub error: Option<String>,
    pub asr: Option<AsrTelemetry>,
    pub source: JobSource,
    pub download_completed: bool,
    pub process_requested: bool,
    pub paths: JobPaths,
    /// Sanitized title without extension.
    pub display_name: String,
    /// `display_name` plus the asset extension.
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
    pub step_timings: StepTimings,
}

impl Job {
    /// Create a job for a file that has already been uploaded into `paths.asset`.
    pub fn new_upload(id: impl Into<String>, paths: JobPaths, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let display_name = Path::new(&filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.clone());

        Self {
            id: id.into(),
            state: JobState::Queued,
            step: JobStep::Upload,
            progress: 0,
            error: None,
            asr: None,
            source: JobSource::Upload,
            download_completed: true,
            process_requested: true,
            paths,
            display_name,
            filename,
            created_at: Utc::now(),
            processing_started_at: None,
            processing_finished_at: None,
            step_timings: StepTimings::default(),
        }
    }

    /// Create a job whose asset still has to be fetched from `url`.
    pub fn new_remote(
        id: impl Into<String>,
        paths: JobPaths,
        url: impl Into<String>,
        max_height: u32,
    ) -> Self {
        let filename = paths
            .asset
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let display_name = paths
            .asset
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: id.into(),
            state: JobState::Queued,
            step: JobStep::Download,
            progress: 0,
            error: None,
            asr: None,
            source: JobSource::Remote {
                url: url.into(),
                max_height,
            },
            download_completed: false,
            process_requested: false,
            paths,
            display_name,
            filename,
            created_at: Utc::now(),
            processing_started_at: None,
            processing_finished_at: None,
            step_timings: StepTimings::default(),
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match &self.source {
            JobSource::Remote { url, .. } => Some(url),
            JobSource::Upload => None,
        }
    }

    pub fn max_height(&self) -> Option<u32> {
        match &self.source {
            JobSource::Remote { max_height, .. } => Some(*max_height),
            JobSource::Upload => None,
        }
    }

    /// Raise progress to `value`; lower values are ignored.
    pub fn advance_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> JobPaths {
        JobPaths::new("/data/job-1", ".mp4", "en", "ru")
    }

    #[test]
    fn test_job_paths_layout() {
        let paths = paths();
        assert_eq!(paths.asset, PathBuf::from("/data/job-1/source.mp4"));
        assert_eq!(paths.audio, PathBuf::from("/data/job-1/audio.wav"));
        assert_eq!(paths.source_srt, PathBuf::from("/data/job-1/en.srt"));
        assert_eq!(paths.target_vtt, PathBuf::from("/data/job-1/ru.vtt"));
    }

    #[test]
    fn test_new_upload_job() {
        let job = Job::new_upload("job-1", paths(), "holiday clip.mov");
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.step, JobStep::Upload);
        assert_eq!(job.source, JobSource::Upload);
        assert!(job.download_completed);
        assert_eq!(job.display_name, "holiday clip");
        assert_eq!(job.remote_url(), None);
        assert_eq!(job.max_height(), None);
    }

    #[test]
    fn test_new_remote_job() {
        let job = Job::new_remote("job-2", paths(), "https://example.com/v", 720);
        assert_eq!(job.step, JobStep::Download);
        assert!(!job.download_completed);
        assert!(!job.process_requested);
        assert_eq!(job.remote_url(), Some("https://example.com/v"));
        assert_eq!(job.max_height(), Some(720));
        assert_eq!(job.filename, "source.mp4");
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = Job::new_upload("job-1", paths(), "a.mp4");
        job.advance_progress(40);
        job.advance_progress(20);
        assert_eq!(job.progress, 40);
        job.advance_progress(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_state_terminal() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(!JobState::Ready.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }
}
