//! Speech recognition step.
//!
//! Runs the transcription tool as
//! `<tool> <audio.wav> <output.srt> <model> <duration_sec>` and follows its
//! `PROGRESS` lines while it runs.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::probe::DurationProbe;
use super::traits::{Processor, ProcessorContext, ProcessorOutput};
use super::utils::{ToolCommand, path_arg, require_file};
use crate::Result;
use crate::pipeline::job::{Job, JobStep};
use crate::pipeline::progress::{AsrProgressLine, ProgressLogThrottle};

pub struct TranscribeProcessor {
    tool: ToolCommand,
    model: String,
    probe: Arc<dyn DurationProbe>,
}

impl TranscribeProcessor {
    pub fn new(tool: ToolCommand, model: impl Into<String>, probe: Arc<dyn DurationProbe>) -> Self {
        Self {
            tool,
            model: model.into(),
            probe,
        }
    }

    pub fn build_args(&self, job: &Job, duration_secs: f64) -> Vec<String> {
        self.tool.args([
            path_arg(&job.paths.audio),
            path_arg(&job.paths.source_srt),
            self.model.clone(),
            format!("{duration_secs:.3}"),
        ])
    }
}

#[async_trait]
impl Processor for TranscribeProcessor {
    fn step(&self) -> JobStep {
        JobStep::Asr
    }

    fn name(&self) -> &'static str {
        "TranscribeProcessor"
    }

    async fn process(&self, job: &Job, ctx: &ProcessorContext) -> Result<ProcessorOutput> {
        require_file(&job.paths.audio, "Extracted audio")?;

        let duration = self.probe.duration_secs(&job.paths.audio).await;
        info!(job_id = %ctx.job_id, model = %self.model, duration, "Starting transcription");

        let args = self.build_args(job, duration);
        let mut throttle = ProgressLogThrottle::new(ctx.log_config);
        process_utils::run_with_line_callback(&self.tool.program, &args, None, |line| {
            let Some(progress) = AsrProgressLine::parse(line) else {
                debug!(job_id = %ctx.job_id, "asr: {}", line);
                return;
            };
            ctx.report_asr(&progress);
            if throttle.should_log(progress.ratio, Instant::now()) {
                info!(
                    job_id = %ctx.job_id,
                    "Transcription {:.0}% ({:.1}s / {:.1}s, {:.2}x)",
                    progress.ratio * 100.0,
                    progress.processed_sec,
                    progress.total_sec,
                    progress.speed
                );
            }
        })
        .await?;

        require_file(&job.paths.source_srt, "Transcript")?;
        Ok(ProcessorOutput::default())
    }
}
