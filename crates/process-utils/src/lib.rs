//! Process helpers shared across the workspace.
//!
//! - [`tokio_command`] builds a child process command that never opens a
//!   console window on Windows.
//! - [`LineSplitter`] turns arbitrary stdout chunks into complete lines.
//! - [`run`], [`run_capturing_stdout`] and [`run_with_line_callback`] launch an
//!   external tool and resolve to success or a [`CommandFailure`].

use std::ffi::OsStr;

mod lines;
mod runner;

pub use lines::{LineSplitter, split_lines};
pub use runner::{CommandFailure, run, run_capturing_stdout, run_with_line_callback};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}
