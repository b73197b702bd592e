//! Processor trait and related types.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::Result;
use crate::pipeline::job::{AsrTelemetry, Job, JobStep};
use crate::pipeline::progress::{AsrProgressLine, ProgressLogConfig, ProgressMilestones};
use crate::pipeline::store::JobStore;

/// Changes a processor asks the manager to apply to the job once its step
/// has succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorOutput {
    /// Actual location of the video asset, if it differs from the planned one.
    pub asset_path: Option<PathBuf>,
    /// Sanitized display name (no extension).
    pub display_name: Option<String>,
    /// Download filename (display name plus extension).
    pub filename: Option<String>,
}

impl ProcessorOutput {
    /// Write the requested changes into `job`.
    pub fn apply(&self, job: &mut Job) {
        if let Some(ref asset) = self.asset_path {
            job.paths.asset = asset.clone();
        }
        if let Some(ref name) = self.display_name {
            job.display_name = name.clone();
        }
        if let Some(ref filename) = self.filename {
            job.filename = filename.clone();
        }
    }
}

/// Per-run handle given to processors.
///
/// Carries what a processor needs to publish live progress without owning the
/// job record.
#[derive(Clone)]
pub struct ProcessorContext {
    pub job_id: String,
    pub store: JobStore,
    pub milestones: ProgressMilestones,
    pub log_config: ProgressLogConfig,
}

impl ProcessorContext {
    pub fn new(
        job_id: impl Into<String>,
        store: JobStore,
        milestones: ProgressMilestones,
        log_config: ProgressLogConfig,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            store,
            milestones,
            log_config,
        }
    }

    /// Publish one transcription progress update on the job.
    ///
    /// Progress moves inside the ASR band and never backwards. Non-finite
    /// telemetry values are stored as absent.
    pub fn report_asr(&self, line: &AsrProgressLine) {
        let progress = self.milestones.asr_progress(line.ratio);
        let telemetry = AsrTelemetry {
            processed_sec: finite(line.processed_sec),
            total_sec: finite(line.total_sec),
            speed: finite(line.speed),
        };
        self.store.update(&self.job_id, |job| {
            job.advance_progress(progress);
            job.asr = Some(telemetry);
        });
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Trait for pipeline processors. One processor implements one step.
#[async_trait]
pub trait Processor: Send + Sync {
    /// The step this processor implements.
    fn step(&self) -> JobStep;

    /// Get the processor name.
    fn name(&self) -> &'static str;

    /// Run the step for `job`.
    ///
    /// The job passed in is a copy taken when the step started. Changes to the
    /// record go through the returned output or through `ctx`.
    async fn process(&self, job: &Job, ctx: &ProcessorContext) -> Result<ProcessorOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::JobPaths;

    fn context_with_job() -> ProcessorContext {
        let store = JobStore::new();
        store.insert(Job::new_upload(
            "job-1",
            JobPaths::new("/tmp/job-1", ".mp4", "en", "ru"),
            "clip.mp4",
        ));
        ProcessorContext::new(
            "job-1",
            store,
            ProgressMilestones::default(),
            ProgressLogConfig::default(),
        )
    }

    #[test]
    fn test_output_apply() {
        let mut job = Job::new_upload(
            "job-1",
            JobPaths::new("/tmp/job-1", ".mp4", "en", "ru"),
            "clip.mp4",
        );
        let output = ProcessorOutput {
            asset_path: Some(PathBuf::from("/tmp/job-1/source.webm")),
            display_name: Some("My Clip".to_string()),
            filename: Some("My Clip.webm".to_string()),
        };
        output.apply(&mut job);

        assert_eq!(job.paths.asset, PathBuf::from("/tmp/job-1/source.webm"));
        assert_eq!(job.display_name, "My Clip");
        assert_eq!(job.filename, "My Clip.webm");
    }

    #[test]
    fn test_empty_output_changes_nothing() {
        let mut job = Job::new_upload(
            "job-1",
            JobPaths::new("/tmp/job-1", ".mp4", "en", "ru"),
            "clip.mp4",
        );
        let before = job.clone();
        ProcessorOutput::default().apply(&mut job);
        assert_eq!(job.paths, before.paths);
        assert_eq!(job.filename, before.filename);
    }

    #[test]
    fn test_report_asr_updates_job() {
        let ctx = context_with_job();
        ctx.report_asr(&AsrProgressLine {
            ratio: 0.5,
            processed_sec: 60.0,
            total_sec: 120.0,
            speed: f64::NAN,
        });

        let job = ctx.store.get("job-1").unwrap();
        assert_eq!(job.progress, 55);
        let asr = job.asr.unwrap();
        assert_eq!(asr.processed_sec, Some(60.0));
        assert_eq!(asr.total_sec, Some(120.0));
        assert_eq!(asr.speed, None);
    }

    #[test]
    fn test_report_asr_never_lowers_progress() {
        let ctx = context_with_job();
        let line = |ratio| AsrProgressLine {
            ratio,
            processed_sec: 0.0,
            total_sec: 0.0,
            speed: 0.0,
        };
        ctx.report_asr(&line(0.8));
        ctx.report_asr(&line(0.2));
        assert_eq!(ctx.store.get("job-1").unwrap().progress, 64);
    }
}
