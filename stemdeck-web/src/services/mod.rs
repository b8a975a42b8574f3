//! External tool adapters
//!
//! Both tools are black boxes invoked as subprocesses: FFmpeg for media
//! work, Demucs for stem separation.

pub mod command;
pub mod separator;
pub mod transcoder;

pub use command::{CommandError, CommandOutput, CommandSpec};
pub use separator::{SeparationError, SeparationOutput, Separator};
pub use transcoder::{MixTrack, TranscodeError, Transcoder};
