//! Per-step start/end bookkeeping for jobs.
//!
//! An interval is opened once and closed once. Re-opening a started step keeps
//! its original start, and a closed step is never touched again.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::{Job, JobStep};

/// Start/end of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTiming {
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl StepTiming {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Timing entries keyed by step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StepTimings(BTreeMap<JobStep, StepTiming>);

impl StepTimings {
    pub fn get(&self, step: JobStep) -> Option<&StepTiming> {
        self.0.get(&step)
    }

    pub fn is_open(&self, step: JobStep) -> bool {
        self.0.get(&step).is_some_and(StepTiming::is_open)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&JobStep, &StepTiming)> {
        self.0.iter()
    }

    /// Open `step` at `now`. Returns `false` if it was already started.
    fn start(&mut self, step: JobStep, now: DateTime<Utc>) -> bool {
        if self.0.contains_key(&step) {
            return false;
        }
        self.0.insert(
            step,
            StepTiming {
                started_at: now,
                ended_at: None,
                duration_ms: None,
            },
        );
        true
    }

    /// Close `step` at `now`. A step without a start is treated as starting now.
    fn end(&mut self, step: JobStep, now: DateTime<Utc>) {
        let entry = self.0.entry(step).or_insert(StepTiming {
            started_at: now,
            ended_at: None,
            duration_ms: None,
        });
        if entry.ended_at.is_some() {
            return;
        }
        let elapsed = (now - entry.started_at).num_milliseconds().max(0);
        entry.ended_at = Some(now);
        entry.duration_ms = Some(elapsed as u64);
    }

    /// Duration of every known step, `None` for steps not (fully) timed.
    pub fn durations(&self) -> BTreeMap<&'static str, Option<u64>> {
        JobStep::ALL
            .iter()
            .map(|step| {
                (
                    step.as_str(),
                    self.0.get(step).and_then(|timing| timing.duration_ms),
                )
            })
            .collect()
    }
}

/// Record the start of `step`.
///
/// With `opens_processing` set, the job's processing window starts here unless
/// it already has.
pub fn mark_start(job: &mut Job, step: JobStep, now: DateTime<Utc>, opens_processing: bool) {
    job.step_timings.start(step, now);
    if opens_processing && job.processing_started_at.is_none() {
        job.processing_started_at = Some(now);
    }
}

/// Record the end of `step`.
pub fn mark_end(job: &mut Job, step: JobStep, now: DateTime<Utc>) {
    job.step_timings.end(step, now);
}

/// Close the bookkeeping of a job whose current step just failed.
///
/// Leaves no open interval behind and stamps `processing_finished_at` once.
pub fn close_on_failure(job: &mut Job, now: DateTime<Utc>) {
    if job.step_timings.is_open(job.step) {
        job.step_timings.end(job.step, now);
        job.processing_finished_at.get_or_insert(now);
    } else if job.processing_started_at.is_some() {
        job.processing_finished_at.get_or_insert(now);
    }

    let still_open: Vec<JobStep> = job
        .step_timings
        .iter()
        .filter(|(_, timing)| timing.is_open())
        .map(|(step, _)| *step)
        .collect();
    for step in still_open {
        job.step_timings.end(step, now);
    }
}

/// Fixed-shape duration report: every step name is present.
pub fn materialize_durations(job: &Job) -> BTreeMap<&'static str, Option<u64>> {
    job.step_timings.durations()
}
