//! dualsub library crate.
//!
//! Turns a video (uploaded or fetched from a URL) into subtitles in two
//! languages through a queue of external tool invocations.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod subtitle;
pub mod utils;

pub use error::{Error, Result};
