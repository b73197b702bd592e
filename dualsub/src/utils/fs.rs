//! Filesystem helpers with operation + path context on errors.

use std::path::Path;

use crate::{Error, Result};

/// Convert an IO error into an application error with operation + path context.
pub fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::io_path(op, path, source)
}

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| io_error("creating directory", path, e))
}

/// Read a UTF-8 text file.
pub async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error("reading", path, e))
}

/// Write a text file, replacing any previous content.
pub async fn write_text(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| io_error("writing", path, e))
}

/// Copy `from` to `to`, returning the number of bytes copied.
pub async fn copy_file(from: &Path, to: &Path) -> Result<u64> {
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| io_error("copying", from, e))
}
