//! Read-only status projection of a job, as served to clients.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::{Job, JobState, JobStep};
use super::timing::materialize_durations;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub state: JobState,
    pub step: JobStep,
    pub progress: u8,
    pub error: Option<String>,
    pub source: &'static str,
    pub remote_url: Option<String>,
    pub max_height: Option<u32>,
    pub download_completed: bool,
    pub process_requested: bool,
    pub filename: String,
    pub asr_processed_sec: Option<f64>,
    pub asr_total_sec: Option<f64>,
    pub asr_speed: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_finished_at: Option<DateTime<Utc>>,
    /// Finish (or `now` while running) minus start.
    pub elapsed_ms: Option<u64>,
    /// Finish minus start, once both are known.
    pub total_duration_ms: Option<u64>,
    pub step_durations: BTreeMap<&'static str, Option<u64>>,
}

impl JobSnapshot {
    pub fn from_job(job: &Job, now: DateTime<Utc>) -> Self {
        let asr = job.asr.unwrap_or_default();

        let elapsed_ms = job
            .processing_started_at
            .map(|start| millis_between(start, job.processing_finished_at.unwrap_or(now)));
        let total_duration_ms = match (job.processing_started_at, job.processing_finished_at) {
            (Some(start), Some(finish)) => Some(millis_between(start, finish)),
            _ => None,
        };

        Self {
            id: job.id.clone(),
            state: job.state,
            step: job.step,
            progress: job.progress,
            error: job.error.clone(),
            source: job.source.as_str(),
            remote_url: job.remote_url().map(str::to_string),
            max_height: job.max_height(),
            download_completed: job.download_completed,
            process_requested: job.process_requested,
            filename: job.filename.clone(),
            asr_processed_sec: asr.processed_sec,
            asr_total_sec: asr.total_sec,
            asr_speed: asr.speed,
            created_at: job.created_at,
            processing_started_at: job.processing_started_at,
            processing_finished_at: job.processing_finished_at,
            elapsed_ms,
            total_duration_ms,
            step_durations: materialize_durations(job),
        }
    }
}

fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::{AsrTelemetry, JobPaths};
    use crate::pipeline::timing::{mark_end, mark_start};
    use chrono::Duration;

    fn job() -> Job {
        Job::new_upload("job-1", JobPaths::new("/tmp/j", ".mp4", "en", "ru"), "a.mp4")
    }

    #[test]
    fn test_snapshot_before_processing() {
        let snapshot = JobSnapshot::from_job(&job(), Utc::now());
        assert_eq!(snapshot.state, JobState::Queued);
        assert_eq!(snapshot.elapsed_ms, None);
        assert_eq!(snapshot.total_duration_ms, None);
        assert_eq!(snapshot.asr_speed, None);
        assert_eq!(snapshot.step_durations.len(), JobStep::ALL.len());
    }

    #[test]
    fn test_elapsed_while_running_and_total_when_finished() {
        let mut job = job();
        let start = Utc::now();
        mark_start(&mut job, JobStep::Extract, start, true);

        let running = JobSnapshot::from_job(&job, start + Duration::seconds(4));
        assert_eq!(running.elapsed_ms, Some(4000));
        assert_eq!(running.total_duration_ms, None);

        mark_end(&mut job, JobStep::Extract, start + Duration::seconds(6));
        job.processing_finished_at = Some(start + Duration::seconds(6));
        let finished = JobSnapshot::from_job(&job, start + Duration::seconds(60));
        assert_eq!(finished.elapsed_ms, Some(6000));
        assert_eq!(finished.total_duration_ms, Some(6000));
        assert_eq!(finished.step_durations["extract"], Some(6000));
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut job = job();
        job.asr = Some(AsrTelemetry {
            processed_sec: Some(60.0),
            total_sec: Some(120.0),
            speed: Some(1.5),
        });

        let value = serde_json::to_value(JobSnapshot::from_job(&job, Utc::now())).unwrap();
        assert_eq!(value["state"], "queued");
        assert_eq!(value["step"], "upload");
        assert_eq!(value["source"], "upload");
        assert_eq!(value["error"], serde_json::Value::Null);
        assert_eq!(value["remoteUrl"], serde_json::Value::Null);
        assert_eq!(value["asrTotalSec"], 120.0);
        assert_eq!(value["elapsedMs"], serde_json::Value::Null);
        assert!(value["stepDurations"]["convert"].is_null());
        assert!(value["stepDurations"].as_object().unwrap().contains_key("download"));
    }
}
