//! Subtitle conversion step: writes a WebVTT file next to each SRT file.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::traits::{Processor, ProcessorContext, ProcessorOutput};
use crate::Result;
use crate::pipeline::job::{Job, JobStep};
use crate::subtitle::srt_to_vtt;
use crate::utils::fs::{read_text, write_text};

#[derive(Debug, Default)]
pub struct ConvertProcessor;

impl ConvertProcessor {
    pub fn new() -> Self {
        Self
    }

    async fn convert_file(srt: &Path, vtt: &Path) -> Result<()> {
        let text = read_text(srt).await?;
        write_text(vtt, &srt_to_vtt(&text)).await
    }
}

#[async_trait]
impl Processor for ConvertProcessor {
    fn step(&self) -> JobStep {
        JobStep::Convert
    }

    fn name(&self) -> &'static str {
        "ConvertProcessor"
    }

    async fn process(&self, job: &Job, ctx: &ProcessorContext) -> Result<ProcessorOutput> {
        let paths = &job.paths;
        Self::convert_file(&paths.source_srt, &paths.source_vtt).await?;
        Self::convert_file(&paths.target_srt, &paths.target_vtt).await?;

        info!(job_id = %ctx.job_id, "Subtitles converted to WebVTT");
        Ok(ProcessorOutput::default())
    }
}
