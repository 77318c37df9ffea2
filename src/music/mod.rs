//! Music loading and loop points
//!
//! Music streams are sniffed like sound effects, minus the legacy check.
//! Chiptune containers become a [`ChiptuneSession`](crate::ChiptuneSession)
//! rendered live from the audio callback; everything else is handed to the
//! transport's stream decoder, and its embedded loop-point tags are parsed.

mod loader;
mod loop_point;

pub use loader::{LoadedMusic, MusicLoader};
pub use loop_point::{parse_loop_point, LoopMetadata, LoopUnit};
