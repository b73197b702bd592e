//! Subtitle translation step: `<tool> <source.srt> <target.srt>`.

use async_trait::async_trait;
use tracing::info;

use super::traits::{Processor, ProcessorContext, ProcessorOutput};
use super::utils::{ToolCommand, path_arg, require_file};
use crate::Result;
use crate::pipeline::job::{Job, JobStep};

pub struct TranslateProcessor {
    tool: ToolCommand,
}

impl TranslateProcessor {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    pub fn build_args(&self, job: &Job) -> Vec<String> {
        self.tool.args([
            path_arg(&job.paths.source_srt),
            path_arg(&job.paths.target_srt),
        ])
    }
}

#[async_trait]
impl Processor for TranslateProcessor {
    fn step(&self) -> JobStep {
        JobStep::Translate
    }

    fn name(&self) -> &'static str {
        "TranslateProcessor"
    }

    async fn process(&self, job: &Job, ctx: &ProcessorContext) -> Result<ProcessorOutput> {
        require_file(&job.paths.source_srt, "Transcript")?;

        info!(job_id = %ctx.job_id, "Translating {}", job.paths.source_srt.display());
        process_utils::run(&self.tool.program, &self.build_args(job), None).await?;

        require_file(&job.paths.target_srt, "Translated subtitles")?;
        Ok(ProcessorOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::pipeline::job::JobPaths;
    use crate::pipeline::progress::{ProgressLogConfig, ProgressMilestones};
    use crate::pipeline::store::JobStore;

    fn ctx() -> ProcessorContext {
        ProcessorContext::new(
            "job-1",
            JobStore::new(),
            ProgressMilestones::default(),
            ProgressLogConfig::default(),
        )
    }

    #[test]
    fn test_build_args() {
        let job = Job::new_upload("job-1", JobPaths::new("/j", ".mp4", "en", "ru"), "a.mp4");
        let processor = TranslateProcessor::new(ToolCommand::parse("python3 t.py").unwrap());
        assert_eq!(processor.build_args(&job), vec!["t.py", "/j/en.srt", "/j/ru.srt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_carries_stderr() {
        use crate::pipeline::processors::utils::shell_tool;

        let dir = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(dir.path(), ".mp4", "en", "ru");
        std::fs::write(&paths.source_srt, "1\n00:00:00,000 --> 00:00:01,000\nhi\n").unwrap();
        let job = Job::new_upload("job-1", paths, "a.mp4");

        let processor = TranslateProcessor::new(shell_tool("echo 'no model for en->ru' >&2; exit 3"));
        let err = processor.process(&job, &ctx()).await.unwrap_err();
        match err {
            Error::Command(failure) => {
                assert_eq!(failure.exit_code, Some(3));
                assert_eq!(failure.stderr, "no model for en->ru");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_writes_target() {
        use crate::pipeline::processors::utils::shell_tool;

        let dir = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(dir.path(), ".mp4", "en", "ru");
        std::fs::write(&paths.source_srt, "1\n00:00:00,000 --> 00:00:01,000\nhi\n").unwrap();
        let job = Job::new_upload("job-1", paths.clone(), "a.mp4");

        let processor = TranslateProcessor::new(shell_tool("cp \"$1\" \"$2\""));
        processor.process(&job, &ctx()).await.unwrap();
        assert!(paths.target_srt.is_file());
    }
}
