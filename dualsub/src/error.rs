//! Application-wide error types.

use process_utils::CommandFailure;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error while {op} {}: {source}", .path.display())]
    IoPath {
        op: &'static str,
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Command(#[from] CommandFailure),

    #[error("{0}")]
    PipelineError(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Prefix the error with the name of the step that produced it.
    pub fn in_step(self, label: &str) -> Self {
        Self::PipelineError(format!("{label} failed: {self}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_step_wraps_command_failure() {
        let err = Error::from(CommandFailure {
            program: "ffmpeg".to_string(),
            exit_code: Some(1),
            stderr: "No such file".to_string(),
        })
        .in_step("Audio extraction");
        assert_eq!(
            err.to_string(),
            "Audio extraction failed: `ffmpeg` exited with code 1: No such file"
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("Job", "abc");
        assert_eq!(err.to_string(), "Entity not found: Job with id abc");
    }
}
