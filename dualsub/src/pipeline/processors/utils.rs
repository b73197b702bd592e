//! Utility functions for processors.

use std::path::Path;

use crate::{Error, Result};

/// An external tool invocation prefix, e.g. `python3 scripts/asr.py`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Split a command line on whitespace into program and leading arguments.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::config("tool command must not be empty"))?;
        Ok(Self {
            program,
            leading_args: parts.collect(),
        })
    }

    /// Leading arguments followed by `extra`.
    pub fn args<I, S>(&self, extra: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args
            .iter()
            .cloned()
            .chain(extra.into_iter().map(Into::into))
            .collect()
    }
}

/// Render a path as a command argument.
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Fail with a pipeline error if `path` is not an existing file.
pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::PipelineError(format!(
            "{what} does not exist: {}",
            path.display()
        )))
    }
}

/// A tool that runs `script` under `sh`, with call arguments as `$1`, `$2`, ...
#[cfg(all(test, unix))]
pub(crate) fn shell_tool(script: &str) -> ToolCommand {
    ToolCommand {
        program: "sh".to_string(),
        leading_args: vec!["-c".to_string(), script.to_string(), "tool".to_string()],
    }
}
