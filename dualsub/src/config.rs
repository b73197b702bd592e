//! Application configuration.
//!
//! Settings come from command-line flags or the environment (a `.env` file is
//! loaded first by the binary). They are validated once into an [`AppConfig`]
//! which builds the pipeline's processors.

use std::path::PathBuf;
use std::sync::Arc;

use crate::logging::LoggingOptions;
use crate::pipeline::processors::{
    AudioExtractProcessor, ConvertProcessor, FetchProcessor, FfprobeDuration, ToolCommand,
    TranscribeProcessor, TranslateProcessor,
};
use crate::pipeline::{PipelineManagerConfig, ProgressLogConfig, ProgressMilestones, StepProcessors};
use crate::{Error, Result};

/// Height hint for remote downloads when none is given.
pub const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Smallest height hint passed to the fetch tool.
pub const MIN_MAX_HEIGHT: u32 = 144;

/// Raw settings as given on the command line or in the environment.
#[derive(Debug, Clone, clap::Args)]
pub struct Settings {
    /// Directory holding one working directory per job
    #[arg(long, env = "DUALSUB_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// ffmpeg binary used for audio extraction
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// ffprobe binary used to read media durations
    #[arg(long, env = "FFPROBE_PATH", default_value = "ffprobe")]
    pub ffprobe_path: String,

    /// Remote video fetch command (program and leading arguments)
    #[arg(long, env = "DUALSUB_FETCH_CMD", default_value = "python3 scripts/ytdlp_download.py")]
    pub fetch_cmd: String,

    /// Speech recognition command (program and leading arguments)
    #[arg(long, env = "DUALSUB_ASR_CMD", default_value = "python3 scripts/asr.py")]
    pub asr_cmd: String,

    /// Subtitle translation command (program and leading arguments)
    #[arg(long, env = "DUALSUB_TRANSLATE_CMD", default_value = "python3 scripts/translate.py")]
    pub translate_cmd: String,

    /// Speech recognition model name
    #[arg(long, env = "DUALSUB_ASR_MODEL", default_value = "small")]
    pub asr_model: String,

    /// Language spoken in the videos
    #[arg(long, env = "DUALSUB_SOURCE_LANG", default_value = "en")]
    pub source_lang: String,

    /// Language subtitles are translated into
    #[arg(long, env = "DUALSUB_TARGET_LANG", default_value = "ru")]
    pub target_lang: String,

    /// Default maximum video height for remote downloads
    #[arg(long, env = "DUALSUB_MAX_HEIGHT", default_value_t = DEFAULT_MAX_HEIGHT)]
    pub max_height: u32,

    /// Also write daily-rolling log files into this directory
    #[arg(long, env = "DUALSUB_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log to stderr as JSON
    #[arg(long, env = "DUALSUB_LOG_JSON")]
    pub log_json: bool,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub fetch: ToolCommand,
    pub asr: ToolCommand,
    pub translate: ToolCommand,
    pub asr_model: String,
    pub source_lang: String,
    pub target_lang: String,
    pub default_max_height: u32,
    pub milestones: ProgressMilestones,
    pub progress_log: ProgressLogConfig,
    pub logging: LoggingOptions,
}

fn non_empty(value: &str, name: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::config(format!("{name} must not be empty")))
    } else {
        Ok(value.to_string())
    }
}

fn tool(command_line: &str, name: &str) -> Result<ToolCommand> {
    ToolCommand::parse(command_line).map_err(|_| Error::config(format!("{name} must not be empty")))
}

impl AppConfig {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        if settings.data_dir.as_os_str().is_empty() {
            return Err(Error::config("data directory must not be empty"));
        }
        if settings.data_dir.is_file() {
            return Err(Error::config(format!(
                "data directory {} is a file",
                settings.data_dir.display()
            )));
        }

        let source_lang = non_empty(&settings.source_lang, "source language")?;
        let target_lang = non_empty(&settings.target_lang, "target language")?;
        if source_lang == target_lang {
            return Err(Error::config(format!(
                "source and target language are both '{source_lang}'"
            )));
        }

        Ok(Self {
            data_dir: settings.data_dir,
            ffmpeg_path: non_empty(&settings.ffmpeg_path, "ffmpeg path")?,
            ffprobe_path: non_empty(&settings.ffprobe_path, "ffprobe path")?,
            fetch: tool(&settings.fetch_cmd, "fetch command")?,
            asr: tool(&settings.asr_cmd, "ASR command")?,
            translate: tool(&settings.translate_cmd, "translate command")?,
            asr_model: non_empty(&settings.asr_model, "ASR model")?,
            source_lang,
            target_lang,
            default_max_height: settings.max_height.max(MIN_MAX_HEIGHT),
            milestones: ProgressMilestones::default(),
            progress_log: ProgressLogConfig::default(),
            logging: LoggingOptions {
                log_dir: settings.log_dir,
                json: settings.log_json,
            },
        })
    }

    pub fn manager_config(&self) -> PipelineManagerConfig {
        PipelineManagerConfig {
            data_dir: self.data_dir.clone(),
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            default_max_height: self.default_max_height,
            milestones: self.milestones,
            progress_log: self.progress_log,
        }
    }

    /// Processors backed by the configured external tools.
    pub fn processors(&self) -> StepProcessors {
        let fetch = Arc::new(FetchProcessor::new(self.fetch.clone()));
        StepProcessors {
            fetch: fetch.clone(),
            probe: fetch,
            extract: Arc::new(AudioExtractProcessor::new(&self.ffmpeg_path)),
            asr: Arc::new(TranscribeProcessor::new(
                self.asr.clone(),
                &self.asr_model,
                Arc::new(FfprobeDuration::new(&self.ffprobe_path)),
            )),
            translate: Arc::new(TranslateProcessor::new(self.translate.clone())),
            convert: Arc::new(ConvertProcessor::new()),
        }
    }
}
