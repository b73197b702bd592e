//! Pipeline Manager implementation.
//!
//! Owns the job store and the queue, accepts new jobs, and drives the single
//! worker that runs job steps one job at a time.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{Job, JobPaths, JobState, JobStep};
use super::job_queue::{JobQueue, PushOutcome};
use super::processors::{Processor, ProcessorContext, UrlProbe};
use super::progress::{ProgressLogConfig, ProgressMilestones};
use super::status::JobSnapshot;
use super::store::JobStore;
use super::timing::{close_on_failure, mark_end, mark_start};
use crate::config::{DEFAULT_MAX_HEIGHT, MIN_MAX_HEIGHT};
use crate::utils::filename::{dotted_extension, sanitize_basename};
use crate::utils::fs::{copy_file, ensure_dir_all};
use crate::utils::url::validate_remote_url;
use crate::{Error, Result};

const DEFAULT_ASSET_EXTENSION: &str = ".mp4";
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for the Pipeline Manager.
#[derive(Debug, Clone)]
pub struct PipelineManagerConfig {
    /// Root under which every job gets its own working directory.
    pub data_dir: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
    /// Height hint used when a remote submission does not give one.
    pub default_max_height: u32,
    pub milestones: ProgressMilestones,
    pub progress_log: ProgressLogConfig,
}

impl Default for PipelineManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            source_lang: "en".to_string(),
            target_lang: "ru".to_string(),
            default_max_height: DEFAULT_MAX_HEIGHT,
            milestones: ProgressMilestones::default(),
            progress_log: ProgressLogConfig::default(),
        }
    }
}

/// The processors the manager runs, one per step.
#[derive(Clone)]
pub struct StepProcessors {
    pub fetch: Arc<dyn Processor>,
    pub probe: Arc<dyn UrlProbe>,
    pub extract: Arc<dyn Processor>,
    pub asr: Arc<dyn Processor>,
    pub translate: Arc<dyn Processor>,
    pub convert: Arc<dyn Processor>,
}

impl StepProcessors {
    /// Steps run once processing is authorized, in order.
    fn processing_plan(&self) -> [&Arc<dyn Processor>; 4] {
        [&self.extract, &self.asr, &self.translate, &self.convert]
    }
}

/// Events emitted by the Pipeline Manager.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Job id appended to the queue.
    JobQueued { job_id: String },
    /// A step began running.
    StepStarted { job_id: String, step: JobStep },
    /// Remote asset fetched; the job waits for processing to be requested.
    JobReady { job_id: String },
    /// Job completed successfully.
    JobCompleted {
        job_id: String,
        duration_ms: Option<u64>,
    },
    /// Job failed.
    JobFailed {
        job_id: String,
        step: JobStep,
        error: String,
    },
}

impl PipelineEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::JobQueued { job_id }
            | Self::StepStarted { job_id, .. }
            | Self::JobReady { job_id }
            | Self::JobCompleted { job_id, .. }
            | Self::JobFailed { job_id, .. } => job_id,
        }
    }
}

struct Inner {
    config: PipelineManagerConfig,
    store: JobStore,
    queue: JobQueue,
    processors: StepProcessors,
    event_tx: broadcast::Sender<PipelineEvent>,
}

/// The Pipeline Manager service. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct PipelineManager {
    inner: Arc<Inner>,
}

impl PipelineManager {
    pub fn new(config: PipelineManagerConfig, processors: StepProcessors) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                store: JobStore::new(),
                queue: JobQueue::new(),
                processors,
                event_tx,
            }),
        }
    }

    pub fn config(&self) -> &PipelineManagerConfig {
        &self.inner.config
    }

    /// Handle to the job records, for read-only status queries.
    pub fn store(&self) -> &JobStore {
        &self.inner.store
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        self.inner.store.snapshot(id)
    }

    pub fn list(&self) -> Vec<JobSnapshot> {
        self.inner.store.list()
    }

    /// Number of jobs waiting behind the active one.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.depth()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.inner.event_tx.send(event);
    }

    fn job_paths(&self, id: &str, asset_ext: &str) -> JobPaths {
        let config = &self.inner.config;
        JobPaths::new(
            config.data_dir.join(id),
            asset_ext,
            &config.source_lang,
            &config.target_lang,
        )
    }

    /// Accept an uploaded video file and queue it for processing.
    ///
    /// The payload is copied into the job's working directory. `filename` is
    /// the name the user uploaded it under; the payload's own name is used
    /// when absent.
    pub async fn submit_upload(&self, payload: &Path, filename: Option<&str>) -> Result<String> {
        let metadata = tokio::fs::metadata(payload)
            .await
            .map_err(|_| Error::validation(format!("No upload at {}", payload.display())))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(Error::validation("Uploaded file is empty"));
        }

        let filename = filename
            .map(str::to_string)
            .or_else(|| {
                payload
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "video".to_string());
        let ext = Path::new(&filename)
            .extension()
            .map(|e| dotted_extension(&e.to_string_lossy()))
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ASSET_EXTENSION.to_string());

        let id = Uuid::new_v4().to_string();
        let paths = self.job_paths(&id, &ext);
        ensure_dir_all(&paths.dir).await?;

        let mut job = Job::new_upload(&id, paths, filename);
        mark_start(&mut job, JobStep::Upload, Utc::now(), false);
        let bytes = copy_file(payload, &job.paths.asset).await?;
        mark_end(&mut job, JobStep::Upload, Utc::now());

        info!(job_id = %id, bytes, filename = %job.filename, "Upload accepted");
        self.inner.store.insert(job);
        self.enqueue(&id);
        Ok(id)
    }

    /// Accept a remote video URL. The URL is probed before a job exists; the
    /// job then waits in the queue for its fetch.
    pub async fn submit_remote(&self, url: &str, max_height: Option<u32>) -> Result<String> {
        self.accept_remote(url, max_height, false).await
    }

    /// Accept a remote video URL with processing already authorized. The job
    /// continues past `ready` on its own, and a fetch failure is reported on
    /// the job like any other step failure.
    pub async fn submit_remote_and_process(
        &self,
        url: &str,
        max_height: Option<u32>,
    ) -> Result<String> {
        self.accept_remote(url, max_height, true).await
    }

    async fn accept_remote(
        &self,
        url: &str,
        max_height: Option<u32>,
        process_requested: bool,
    ) -> Result<String> {
        let url = url.trim();
        validate_remote_url(url)?;
        let info = self.inner.processors.probe.probe(url).await?;

        let max_height = max_height
            .unwrap_or(self.inner.config.default_max_height)
            .max(MIN_MAX_HEIGHT);

        let id = Uuid::new_v4().to_string();
        let paths = self.job_paths(&id, DEFAULT_ASSET_EXTENSION);
        ensure_dir_all(&paths.dir).await?;

        let mut job = Job::new_remote(&id, paths, url, max_height);
        job.process_requested = process_requested;
        if let Some(ref title) = info.title {
            job.display_name = sanitize_basename(title, &job.display_name);
            job.filename = format!("{}{DEFAULT_ASSET_EXTENSION}", job.display_name);
        }

        info!(job_id = %id, %url, max_height, process_requested, "Remote job accepted");
        self.inner.store.insert(job);
        self.enqueue(&id);
        Ok(id)
    }

    /// Authorize processing of a remote job.
    ///
    /// A `ready` job is queued at once; a job whose fetch has not finished
    /// keeps the request and is queued again when it becomes `ready`.
    pub async fn request_processing(&self, id: &str) -> Result<JobSnapshot> {
        let mut verdict: Result<(JobState, bool)> = Err(Error::not_found("Job", id));
        self.inner.store.update(id, |job| {
            verdict = if !job.source.is_remote() || job.state.is_terminal() {
                Err(Error::invalid_transition(job.state, JobState::Processing))
            } else {
                job.process_requested = true;
                Ok((job.state, job.download_completed))
            };
        });

        match verdict? {
            (JobState::Ready, _) => self.enqueue(id),
            (_, false) => debug!(job_id = %id, "Processing requested before fetch finished"),
            (state, true) => {
                debug!(job_id = %id, %state, "Processing already scheduled; request recorded")
            }
        }
        self.snapshot(id).ok_or_else(|| Error::not_found("Job", id))
    }

    /// Append a job id to the queue, starting the worker if none is running.
    pub fn enqueue(&self, id: &str) {
        match self.inner.queue.push(id) {
            PushOutcome::Queued { start_worker } => {
                debug!(job_id = %id, depth = self.inner.queue.depth(), "Job queued");
                self.emit(PipelineEvent::JobQueued {
                    job_id: id.to_string(),
                });
                if start_worker {
                    self.spawn_worker();
                }
            }
            PushOutcome::Duplicate => {
                debug!(job_id = %id, "Job already queued or running");
            }
        }
    }

    fn spawn_worker(&self) {
        let manager = self.clone();
        tokio::spawn(async move { manager.worker_loop().await });
    }

    async fn worker_loop(self) {
        debug!("Pipeline worker started");
        while let Some(id) = self.inner.queue.next() {
            let run = {
                let manager = self.clone();
                let id = id.clone();
                tokio::spawn(async move { manager.run_job(&id).await })
            };
            if let Err(e) = run.await {
                self.recover_crashed_run(&id, e);
            }
            self.inner.queue.finish(&id);

            // A request that raced the end of the fetch may have been
            // dropped as a duplicate while the job was still active.
            if self
                .inner
                .store
                .get(&id)
                .is_some_and(|job| job.state == JobState::Ready && job.process_requested)
            {
                self.enqueue(&id);
            }
        }
        debug!("Pipeline worker idle");
    }

    /// A run that panicked leaves its job mid-step; close it as a failure so
    /// the queue keeps draining.
    fn recover_crashed_run(&self, id: &str, err: JoinError) {
        let reason = if err.is_panic() {
            panic_message(err.into_panic())
        } else {
            "run was cancelled".to_string()
        };
        let Some(job) = self.inner.store.get(id) else {
            return;
        };
        if job.state.is_terminal() {
            warn!(job_id = %id, %reason, "Worker run crashed after the job finished");
            return;
        }
        self.fail(
            id,
            job.step,
            Error::PipelineError(format!("worker crashed: {reason}")),
        );
    }

    async fn run_job(&self, id: &str) {
        let Some(job) = self.inner.store.get(id) else {
            warn!(job_id = %id, "Queued job no longer exists");
            return;
        };

        if job.state.is_terminal() {
            debug!(job_id = %id, state = %job.state, "Skipping finished job");
        } else if job.source.is_remote() && !job.download_completed {
            self.run_fetch(id).await;
        } else if !job.process_requested {
            self.inner.store.update(id, |job| job.state = JobState::Ready);
            debug!(job_id = %id, "Job waits for processing to be requested");
        } else {
            self.run_processing(id).await;
        }
    }

    fn context(&self, id: &str) -> ProcessorContext {
        ProcessorContext::new(
            id,
            self.inner.store.clone(),
            self.inner.config.milestones,
            self.inner.config.progress_log,
        )
    }

    /// Start `step`: make it current, raise progress and open its interval.
    fn begin_step(&self, id: &str, step: JobStep, progress: u8, opens_processing: bool) -> Option<Job> {
        let now = Utc::now();
        let job = self.inner.store.update(id, |job| {
            job.state = JobState::Processing;
            job.step = step;
            job.advance_progress(progress);
            mark_start(job, step, now, opens_processing);
        })?;

        info!(job_id = %id, step = %step, progress = job.progress, "Step started");
        self.emit(PipelineEvent::StepStarted {
            job_id: id.to_string(),
            step,
        });
        Some(job)
    }

    async fn run_fetch(&self, id: &str) {
        let processor = self.inner.processors.fetch.clone();
        let Some(job) = self.begin_step(id, JobStep::Download, 0, false) else {
            return;
        };

        match processor.process(&job, &self.context(id)).await {
            Ok(output) => {
                let now = Utc::now();
                self.inner.store.update(id, |job| {
                    output.apply(job);
                    mark_end(job, JobStep::Download, now);
                    job.download_completed = true;
                    job.state = JobState::Ready;
                    job.advance_progress(100);
                });
                info!(job_id = %id, "Remote video ready");
                self.emit(PipelineEvent::JobReady {
                    job_id: id.to_string(),
                });
            }
            Err(e) => self.fail(id, JobStep::Download, e),
        }
    }

    async fn run_processing(&self, id: &str) {
        let milestones = self.inner.config.milestones;
        let started = self.inner.store.update(id, |job| {
            let baseline = if job.source.is_remote() {
                milestones.remote_start
            } else {
                milestones.upload_start
            };
            // The fetch phase ended at 100; processing has its own scale.
            if job.state == JobState::Ready {
                job.progress = baseline;
            } else {
                job.advance_progress(baseline);
            }
            job.state = JobState::Processing;
            job.error = None;
        });
        let Some(started) = started else {
            return;
        };
        let baseline = started.progress;
        let ctx = self.context(id);

        for processor in self.inner.processors.processing_plan() {
            let step = processor.step();
            let progress = match step {
                JobStep::Asr => milestones.asr_start,
                JobStep::Translate => milestones.asr_end,
                JobStep::Convert => milestones.convert_start,
                _ => baseline,
            };
            let Some(job) = self.begin_step(id, step, progress, true) else {
                return;
            };

            match processor.process(&job, &ctx).await {
                Ok(output) => {
                    let now = Utc::now();
                    self.inner.store.update(id, |job| {
                        output.apply(job);
                        mark_end(job, step, now);
                        if step == JobStep::Asr {
                            job.asr = None;
                            job.advance_progress(milestones.asr_end);
                        }
                    });
                    debug!(job_id = %id, step = %step, processor = processor.name(), "Step finished");
                }
                Err(e) => {
                    self.fail(id, step, e);
                    return;
                }
            }
        }

        let now = Utc::now();
        let done = self.inner.store.update(id, |job| {
            job.state = JobState::Done;
            job.advance_progress(100);
            job.processing_finished_at = Some(now);
        });
        let duration_ms = done
            .as_ref()
            .and_then(|job| JobSnapshot::from_job(job, now).total_duration_ms);
        info!(job_id = %id, duration_ms, "Job completed");
        self.emit(PipelineEvent::JobCompleted {
            job_id: id.to_string(),
            duration_ms,
        });
    }

    fn fail(&self, id: &str, step: JobStep, err: Error) {
        let message = err.in_step(step.label()).to_string();
        let now = Utc::now();
        self.inner.store.update(id, |job| {
            close_on_failure(job, now);
            job.state = JobState::Error;
            job.error = Some(message.clone());
            job.asr = None;
        });

        error!(job_id = %id, step = %step, "{}", message);
        self.emit(PipelineEvent::JobFailed {
            job_id: id.to_string(),
            step,
            error: message,
        });
    }

    /// Wait until the job needs nothing more from the worker: it is `done`,
    /// `error`, or `ready` without a processing request.
    ///
    /// Returns `None` for an unknown id.
    pub async fn wait_until_settled(&self, id: &str) -> Option<JobSnapshot> {
        let mut events = self.subscribe();
        loop {
            let job = self.inner.store.get(id)?;
            if is_settled(&job) {
                return self.snapshot(id);
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.snapshot(id),
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn is_settled(job: &Job) -> bool {
    job.state.is_terminal() || (job.state == JobState::Ready && !job.process_requested)
}
