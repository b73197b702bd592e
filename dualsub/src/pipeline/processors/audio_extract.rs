//! Audio Extraction processor.
//!
//! Decodes the job's video into the mono 16 kHz PCM WAV the transcription
//! tool expects.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::traits::{Processor, ProcessorContext, ProcessorOutput};
use super::utils::{path_arg, require_file};
use crate::Result;
use crate::pipeline::job::{Job, JobStep};

/// Output parameters for extracted audio.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AudioExtractConfig {
    /// Sample rate in Hz.
    sample_rate: u32,
    /// Number of audio channels.
    channels: u8,
    /// Whether to overwrite an existing output file.
    overwrite: bool,
}

impl Default for AudioExtractConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            overwrite: true,
        }
    }
}

/// Processor for extracting audio from video files with ffmpeg.
pub struct AudioExtractProcessor {
    /// Path to ffmpeg binary.
    ffmpeg_path: String,
    config: AudioExtractConfig,
}

impl AudioExtractProcessor {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            config: AudioExtractConfig::default(),
        }
    }

    /// Build FFmpeg command arguments for audio extraction.
    pub fn build_args(&self, input_path: &Path, output_path: &Path) -> Vec<String> {
        let mut args = Vec::new();

        if self.config.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.extend(["-loglevel".to_string(), "error".to_string()]);

        args.extend(["-i".to_string(), path_arg(input_path)]);

        // No video output
        args.push("-vn".to_string());

        args.extend(["-ac".to_string(), self.config.channels.to_string()]);
        args.extend(["-ar".to_string(), self.config.sample_rate.to_string()]);
        args.extend(["-c:a".to_string(), "pcm_s16le".to_string()]);

        args.push(path_arg(output_path));

        args
    }
}

#[async_trait]
impl Processor for AudioExtractProcessor {
    fn step(&self) -> JobStep {
        JobStep::Extract
    }

    fn name(&self) -> &'static str {
        "AudioExtractProcessor"
    }

    async fn process(&self, job: &Job, ctx: &ProcessorContext) -> Result<ProcessorOutput> {
        let input = &job.paths.asset;
        let output = &job.paths.audio;
        require_file(input, "Input file")?;

        info!(
            job_id = %ctx.job_id,
            "Extracting audio: {} -> {}",
            input.display(),
            output.display()
        );
        let args = self.build_args(input, output);
        process_utils::run(&self.ffmpeg_path, &args, None).await?;

        require_file(output, "Extracted audio")?;
        Ok(ProcessorOutput::default())
    }
}
