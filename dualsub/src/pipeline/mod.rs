//! Job pipeline for dual-language subtitle generation.
//!
//! The pipeline is responsible for:
//! - Keeping job records in a shared in-memory store
//! - Queueing jobs and running them one at a time on a single worker
//! - Fetching remote videos and waiting for processing to be requested
//! - Running extract, transcribe, translate and convert steps per job
//! - Timing every step and reporting live transcription progress

pub mod job;
mod job_queue;
mod manager;
pub mod processors;
pub mod progress;
mod status;
mod store;
pub mod timing;

pub use job::{AsrTelemetry, Job, JobPaths, JobSource, JobState, JobStep};
pub use job_queue::{JobQueue, PushOutcome};
pub use manager::{PipelineEvent, PipelineManager, PipelineManagerConfig, StepProcessors};
pub use processors::{Processor, ProcessorContext, ProcessorOutput, UrlProbe};
pub use progress::{AsrProgressLine, ProgressLogConfig, ProgressMilestones};
pub use status::JobSnapshot;
pub use store::JobStore;
