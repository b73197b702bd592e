//! Launching external tools and mapping their exit to success or failure.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr};
use tracing::{debug, warn};

use crate::lines::LineSplitter;
use crate::tokio_command;

/// Captured stderr kept in a failure, counted in characters from the end.
const STDERR_TAIL_CHARS: usize = 2000;

const READ_CHUNK_SIZE: usize = 8192;

/// A tool that could not be launched or exited unsuccessfully.
///
/// Launch failures carry no exit code and the OS error text in `stderr`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("`{program}` {outcome}: {stderr}", outcome = describe_exit(.exit_code))]
pub struct CommandFailure {
    pub program: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "failed".to_string(),
    }
}

impl CommandFailure {
    fn new(program: &str, exit_code: Option<i32>, stderr: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stderr);
        let text = tail_chars(text.trim(), STDERR_TAIL_CHARS);
        Self {
            program: program.to_string(),
            exit_code,
            stderr: if text.is_empty() {
                "no diagnostic output".to_string()
            } else {
                text
            },
        }
    }

    fn launch(program: &str, err: std::io::Error) -> Self {
        Self {
            program: program.to_string(),
            exit_code: None,
            stderr: format!("failed to launch: {err}"),
        }
    }
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

fn spawn(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdout: Stdio,
) -> Result<Child, CommandFailure> {
    debug!(program, ?args, "Spawning process");

    let mut cmd = tokio_command(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    cmd.spawn().map_err(|e| CommandFailure::launch(program, e))
}

/// Run a tool to completion, discarding stdout.
pub async fn run(program: &str, args: &[String], cwd: Option<&Path>) -> Result<(), CommandFailure> {
    let child = spawn(program, args, cwd, Stdio::null())?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| CommandFailure::launch(program, e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(CommandFailure::new(program, output.status.code(), &output.stderr))
    }
}

/// Run a tool to completion and return its trimmed stdout.
pub async fn run_capturing_stdout(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<String, CommandFailure> {
    let child = spawn(program, args, cwd, Stdio::piped())?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| CommandFailure::launch(program, e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(CommandFailure::new(program, output.status.code(), &output.stderr))
    }
}

/// Run a tool, handing every complete stdout line to `on_line` as it arrives.
///
/// Lines are dispatched in order and synchronously from the reading task. An
/// unterminated last line is dispatched once stdout closes.
pub async fn run_with_line_callback<F>(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    mut on_line: F,
) -> Result<(), CommandFailure>
where
    F: FnMut(&str),
{
    let mut child = spawn(program, args, cwd, Stdio::piped())?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let read_stdout = async {
        let Some(mut stdout) = stdout else {
            return;
        };
        let mut splitter = LineSplitter::new();
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        on_line(&line);
                    }
                }
                Err(e) => {
                    warn!(program, error = %e, "Failed to read stdout");
                    break;
                }
            }
        }
        if let Some(line) = splitter.finish() {
            on_line(&line);
        }
    };

    let ((), stderr_bytes) = tokio::join!(read_stdout, read_all(stderr));

    let status = child
        .wait()
        .await
        .map_err(|e| CommandFailure::launch(program, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandFailure::new(program, status.code(), &stderr_bytes))
    }
}

async fn read_all(stream: Option<ChildStderr>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream
        && let Err(e) = stream.read_to_end(&mut buf).await
    {
        warn!(error = %e, "Failed to read stderr");
    }
    buf
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_run_success() {
        assert!(run("sh", &sh("exit 0"), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_failure_captures_stderr() {
        let err = run("sh", &sh("echo 'model missing' >&2; exit 3"), None)
            .await
            .unwrap_err();
        assert_eq!(err.program, "sh");
        assert_eq!(err.exit_code, Some(3));
        assert_eq!(err.stderr, "model missing");
        assert_eq!(err.to_string(), "`sh` exited with code 3: model missing");
    }

    #[tokio::test]
    async fn test_launch_failure_is_command_failure() {
        let err = run("definitely-not-a-real-tool-xyz", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code, None);
        assert!(err.stderr.starts_with("failed to launch"));
    }

    #[tokio::test]
    async fn test_capturing_stdout_is_trimmed() {
        let out = run_capturing_stdout("sh", &sh("printf '  12.5\\n\\n'"), None)
            .await
            .unwrap();
        assert_eq!(out, "12.5");
    }

    #[tokio::test]
    async fn test_cwd_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = run_capturing_stdout("sh", &sh("ls"), Some(dir.path()))
            .await
            .unwrap();
        assert_eq!(out, "marker.txt");
    }

    #[tokio::test]
    async fn test_line_callback_in_order_with_unterminated_tail() {
        let mut seen = Vec::new();
        run_with_line_callback(
            "sh",
            &sh("printf 'one\\n'; printf 'tw'; sleep 0.05; printf 'o\\nthree'"),
            None,
            |line| seen.push(line.to_string()),
        )
        .await
        .unwrap();
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_line_callback_failure_keeps_lines_seen() {
        let mut seen = Vec::new();
        let err = run_with_line_callback(
            "sh",
            &sh("echo started; echo boom >&2; exit 1"),
            None,
            |line| seen.push(line.to_string()),
        )
        .await
        .unwrap_err();
        assert_eq!(seen, vec!["started"]);
        assert_eq!(err.exit_code, Some(1));
        assert_eq!(err.stderr, "boom");
    }

    #[test]
    fn test_stderr_tail_is_limited() {
        let long = "x".repeat(STDERR_TAIL_CHARS + 10);
        let failure = CommandFailure::new("tool", Some(1), long.as_bytes());
        assert_eq!(failure.stderr.chars().count(), STDERR_TAIL_CHARS);
    }

    #[test]
    fn test_empty_stderr_gets_placeholder() {
        let failure = CommandFailure::new("tool", Some(2), b"  \n");
        assert_eq!(failure.stderr, "no diagnostic output");
    }
}
