//! Pipeline processors, one per job step.

mod audio_extract;
mod convert;
mod fetch;
mod probe;
mod traits;
mod transcribe;
mod translate;
pub(crate) mod utils;

pub use audio_extract::AudioExtractProcessor;
pub use convert::ConvertProcessor;
pub use fetch::{FetchProcessor, ProbeInfo, UrlProbe};
pub use probe::{DurationProbe, FfprobeDuration};
pub use traits::{Processor, ProcessorContext, ProcessorOutput};
pub use transcribe::TranscribeProcessor;
pub use translate::TranslateProcessor;
pub use utils::ToolCommand;
