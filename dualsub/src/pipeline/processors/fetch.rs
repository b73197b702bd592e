//! Remote video fetching.
//!
//! The fetch tool is invoked as `<tool> <url> <output_path> <max_height>` and
//! reports the downloaded file as a JSON object on the last line of stdout:
//! `{"asset_path": "...", "title": "...", "ext": ".mp4"}`. In probe mode
//! (`<tool> --probe <url>`) it prints `{"ok": true, "title": "..."}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::traits::{Processor, ProcessorContext, ProcessorOutput};
use super::utils::{ToolCommand, path_arg, require_file};
use crate::pipeline::job::{Job, JobStep};
use crate::utils::filename::{dotted_extension, sanitize_basename};
use crate::utils::json::parse_last_json_object;
use crate::{Error, Result};

const DEFAULT_EXTENSION: &str = ".mp4";

#[derive(Debug, Deserialize)]
struct FetchResult {
    asset_path: Option<String>,
    title: Option<String>,
    ext: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeResult {
    #[serde(default)]
    ok: bool,
    title: Option<String>,
}

/// What a successful probe learned about a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    pub title: Option<String>,
}

/// Checks that a URL can be fetched before a job is created for it.
#[async_trait]
pub trait UrlProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeInfo>;
}

/// Downloads a remote video with the external fetch tool.
pub struct FetchProcessor {
    tool: ToolCommand,
}

impl FetchProcessor {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }

    pub fn build_args(&self, url: &str, output_path: &Path, max_height: u32) -> Vec<String> {
        self.tool.args([
            url.to_string(),
            path_arg(output_path),
            max_height.to_string(),
        ])
    }

    pub fn build_probe_args(&self, url: &str) -> Vec<String> {
        self.tool.args(["--probe", url])
    }

    /// Turn the fetch tool's stdout into the job changes it implies.
    fn interpret(stdout: &str, planned_asset: &Path) -> Result<ProcessorOutput> {
        let result: FetchResult = parse_last_json_object(stdout, "fetch").ok_or_else(|| {
            Error::PipelineError("fetch tool printed no result object".to_string())
        })?;
        let asset_path = result
            .asset_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| Error::PipelineError("fetch result has no asset_path".to_string()))?;

        let ext = result
            .ext
            .as_deref()
            .map(dotted_extension)
            .filter(|e| !e.is_empty())
            .or_else(|| extension_of(&asset_path))
            .or_else(|| extension_of(planned_asset))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        let fallback = asset_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let display_name = sanitize_basename(result.title.as_deref().unwrap_or(""), &fallback);
        let filename = format!("{display_name}{ext}");

        Ok(ProcessorOutput {
            asset_path: Some(asset_path),
            display_name: Some(display_name),
            filename: Some(filename),
        })
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| dotted_extension(&e.to_string_lossy()))
        .filter(|e| !e.is_empty())
}

#[async_trait]
impl Processor for FetchProcessor {
    fn step(&self) -> JobStep {
        JobStep::Download
    }

    fn name(&self) -> &'static str {
        "FetchProcessor"
    }

    async fn process(&self, job: &Job, ctx: &ProcessorContext) -> Result<ProcessorOutput> {
        let url = job
            .remote_url()
            .ok_or_else(|| Error::PipelineError("job has no remote URL".to_string()))?;
        let max_height = job.max_height().unwrap_or(crate::config::DEFAULT_MAX_HEIGHT);

        info!(job_id = %ctx.job_id, %url, max_height, "Fetching remote video");
        let args = self.build_args(url, &job.paths.asset, max_height);
        let stdout = process_utils::run_capturing_stdout(&self.tool.program, &args, None).await?;
        debug!(job_id = %ctx.job_id, "fetch tool output: {}", stdout);

        let output = Self::interpret(&stdout, &job.paths.asset)?;
        if let Some(ref asset) = output.asset_path {
            require_file(asset, "Fetched asset")?;
            info!(job_id = %ctx.job_id, asset = %asset.display(), "Remote video fetched");
        }
        Ok(output)
    }
}

#[async_trait]
impl UrlProbe for FetchProcessor {
    async fn probe(&self, url: &str) -> Result<ProbeInfo> {
        let args = self.build_probe_args(url);
        let stdout = process_utils::run_capturing_stdout(&self.tool.program, &args, None)
            .await
            .map_err(|e| Error::validation(format!("URL cannot be fetched: {e}")))?;

        match parse_last_json_object::<ProbeResult>(&stdout, "probe") {
            Some(result) if result.ok => Ok(ProbeInfo {
                title: result.title,
            }),
            _ => Err(Error::validation(format!(
                "URL cannot be fetched: probe did not confirm {url}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(unix)]
    use crate::pipeline::processors::utils::shell_tool;

    fn processor() -> FetchProcessor {
        FetchProcessor::new(ToolCommand::parse("python3 scripts/fetch.py").unwrap())
    }

    #[test]
    fn test_build_args() {
        let args = processor().build_args(
            "https://example.com/v",
            Path::new("/data/j/source.mp4"),
            720,
        );
        assert_eq!(
            args,
            vec![
                "scripts/fetch.py",
                "https://example.com/v",
                "/data/j/source.mp4",
                "720"
            ]
        );
    }

    #[test]
    fn test_build_probe_args() {
        assert_eq!(
            processor().build_probe_args("https://example.com/v"),
            vec!["scripts/fetch.py", "--probe", "https://example.com/v"]
        );
    }

    #[test]
    fn test_interpret_full_result() {
        let stdout = "[download] 100%\n{\"asset_path\":\"/data/j/source.webm\",\"title\":\"Cats: the movie?\",\"ext\":\".webm\"}";
        let output = FetchProcessor::interpret(stdout, Path::new("/data/j/source.mp4")).unwrap();
        assert_eq!(output.asset_path, Some(PathBuf::from("/data/j/source.webm")));
        assert_eq!(output.display_name.as_deref(), Some("Cats_ the movie"));
        assert_eq!(output.filename.as_deref(), Some("Cats_ the movie.webm"));
    }

    #[test]
    fn test_interpret_defaults() {
        let stdout = "{\"asset_path\":\"/data/j/source\"}";
        let output = FetchProcessor::interpret(stdout, Path::new("/data/j/source.mkv")).unwrap();
        assert_eq!(output.display_name.as_deref(), Some("source"));
        assert_eq!(output.filename.as_deref(), Some("source.mkv"));

        let output = FetchProcessor::interpret(stdout, Path::new("/data/j/source")).unwrap();
        assert_eq!(output.filename.as_deref(), Some("source.mp4"));
    }

    #[test]
    fn test_interpret_missing_asset_path() {
        assert!(matches!(
            FetchProcessor::interpret("{\"title\":\"x\"}", Path::new("/a.mp4")),
            Err(Error::PipelineError(_))
        ));
        assert!(matches!(
            FetchProcessor::interpret("no json here", Path::new("/a.mp4")),
            Err(Error::PipelineError(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_with_shell_tool() {
        let ok = FetchProcessor::new(shell_tool(
            "echo noise; echo '{\"ok\":true,\"title\":\"Clip\"}'",
        ));
        let info = ok.probe("https://example.com/v").await.unwrap();
        assert_eq!(info.title.as_deref(), Some("Clip"));

        let refused = FetchProcessor::new(shell_tool("echo '{\"ok\":false}'"));
        assert!(matches!(
            refused.probe("https://example.com/v").await,
            Err(Error::Validation(_))
        ));

        let failing = FetchProcessor::new(shell_tool("echo boom >&2; exit 1"));
        let err = failing.probe("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, Error::Validation(ref msg) if msg.contains("boom")));
    }
}
