use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use dualsub::config::{AppConfig, Settings};
use dualsub::logging::{LOG_RETENTION_DAYS, cleanup_old_logs, init_logging};
use dualsub::pipeline::{JobSnapshot, JobState, PipelineEvent, PipelineManager, UrlProbe};

/// How often running jobs are reported between events.
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "dualsub", version, about = "Generate dual-language subtitles for videos")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate subtitles for local video files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Download remote videos, optionally continuing into subtitle generation
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Maximum video height to download
        #[arg(long)]
        max_height: Option<u32>,
        /// Generate subtitles once the download is ready
        #[arg(long)]
        process: bool,
    },
    /// Check whether URLs can be downloaded
    Probe {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("Application error: {:#}", e);
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn print_line(value: &serde_json::Value) {
    println!("{value}");
}

fn print_snapshot(event: &str, snapshot: &JobSnapshot) {
    print_line(&json!({ "event": event, "job": snapshot }));
}

/// Returns `Ok(false)` when any job or submission failed.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = AppConfig::from_settings(cli.settings)?;
    let _guard = init_logging(&config.logging)?;
    if let Some(ref dir) = config.logging.log_dir
        && let Err(e) = cleanup_old_logs(dir, LOG_RETENTION_DAYS).await
    {
        warn!(error = %e, "Log retention cleanup failed");
    }

    if let Commands::Probe { ref urls } = cli.command {
        return Ok(probe(&config, urls).await);
    }

    let manager = PipelineManager::new(config.manager_config(), config.processors());
    let reporter = tokio::spawn(report(manager.clone(), manager.subscribe()));
    info!(data_dir = %config.data_dir.display(), "Pipeline ready");

    let mut ok = true;
    let mut ids = Vec::new();
    let mut process_after_fetch = false;

    match cli.command {
        Commands::Upload { files } => {
            for file in files {
                match manager.submit_upload(&file, None).await {
                    Ok(id) => ids.push(id),
                    Err(e) => {
                        ok = false;
                        print_line(&json!({ "event": "rejected", "input": file, "error": e.to_string() }));
                    }
                }
            }
        }
        Commands::Fetch {
            urls,
            max_height,
            process,
        } => {
            process_after_fetch = process;
            for url in urls {
                let submitted = if process {
                    manager.submit_remote_and_process(&url, max_height).await
                } else {
                    manager.submit_remote(&url, max_height).await
                };
                match submitted {
                    Ok(id) => ids.push(id),
                    Err(e) => {
                        ok = false;
                        print_line(&json!({ "event": "rejected", "input": url, "error": e.to_string() }));
                    }
                }
            }
        }
        Commands::Probe { .. } => {}
    }

    for id in &ids {
        let Some(snapshot) = manager.wait_until_settled(id).await else {
            continue;
        };
        if snapshot.state == JobState::Error {
            ok = false;
        }
        if snapshot.state == JobState::Ready && process_after_fetch {
            warn!(job_id = %id, "Job stopped in ready state");
        }
    }

    reporter.abort();
    for snapshot in manager.list() {
        print_snapshot("final", &snapshot);
    }
    Ok(ok)
}

/// Print a snapshot for every pipeline event, and for running jobs at a
/// fixed interval so transcription progress is visible.
async fn report(manager: PipelineManager, mut events: broadcast::Receiver<PipelineEvent>) {
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let name = match event {
                        PipelineEvent::JobQueued { .. } => "queued",
                        PipelineEvent::StepStarted { .. } => "step",
                        PipelineEvent::JobReady { .. } => "ready",
                        PipelineEvent::JobCompleted { .. } => "completed",
                        PipelineEvent::JobFailed { .. } => "failed",
                    };
                    if let Some(snapshot) = manager.snapshot(event.job_id()) {
                        print_snapshot(name, &snapshot);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Status reporter fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                let queue_depth = manager.queue_depth();
                for snapshot in manager.list() {
                    if snapshot.state == JobState::Processing {
                        print_line(&json!({
                            "event": "status",
                            "queueDepth": queue_depth,
                            "job": snapshot,
                        }));
                    }
                }
            }
        }
    }
}

async fn probe(config: &AppConfig, urls: &[String]) -> bool {
    let probe = config.processors().probe;
    let mut ok = true;
    for url in urls {
        let result = match dualsub::utils::url::validate_remote_url(url) {
            Ok(_) => probe.probe(url).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(info) => print_line(&json!({ "url": url, "ok": true, "title": info.title })),
            Err(e) => {
                ok = false;
                print_line(&json!({ "url": url, "ok": false, "error": e.to_string() }));
            }
        }
    }
    ok
}
