//! Chiptune library boundary
//!
//! Chiptunes are programmatic music (chip register sequences) that need an
//! emulator to become PCM. This crate does not emulate any chip; it drives
//! an external library through [`ChiptuneLibrary`] and [`ChiptuneEmulator`]
//! and owns the session state around it:
//!
//! - [`ChiptuneSession`]: the single long-lived music session (track
//!   selection, tempo, live rendering from the audio callback)
//! - [`TransientSession`]: a one-shot session used to render a sound effect,
//!   torn down as soon as the buffer is produced

mod session;

pub use session::{ChiptuneSession, TrackChange, TransientSession};

use crate::Result;
use serde::{Deserialize, Serialize};

/// Treble applied to every chiptune session
pub const DEFAULT_TREBLE: f64 = 5.0;

/// Bass applied to every chiptune session
pub const DEFAULT_BASS: f64 = 1.0;

/// Equalizer knobs passed to the emulation library
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equalizer {
    /// Treble level
    pub treble: f64,
    /// Bass level
    pub bass: f64,
}

impl Default for Equalizer {
    fn default() -> Self {
        Equalizer {
            treble: DEFAULT_TREBLE,
            bass: DEFAULT_BASS,
        }
    }
}

/// Per-track information reported by the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackInfo {
    /// Length of one play-through in milliseconds
    pub play_length_ms: u32,
}

/// An emulation library able to open chiptune containers
pub trait ChiptuneLibrary: Send + Sync {
    /// Open a container, rendering at `sample_rate` Hz stereo
    ///
    /// Implementations copy what they need from `data`.
    fn open(&self, data: &[u8], sample_rate: u32) -> Result<Box<dyn ChiptuneEmulator>>;

    /// Whether the library accepts `data`
    ///
    /// The default opens the data and discards the handle; libraries with a
    /// cheap header check should override it.
    fn probe(&self, data: &[u8]) -> bool {
        self.open(data, crate::TARGET_SAMPLE_RATE).is_ok()
    }

    /// Library name for diagnostics
    fn name(&self) -> &str {
        "chiptune"
    }
}

/// One open emulation handle; closed on drop
pub trait ChiptuneEmulator: Send {
    /// Number of tracks in the container
    fn track_count(&self) -> usize;

    /// Start (or restart) a track from its beginning
    fn start_track(&mut self, index: usize) -> Result<()>;

    /// Apply equalizer settings
    fn set_equalizer(&mut self, equalizer: Equalizer);

    /// Set the tempo multiplier (1.0 = normal speed)
    fn set_tempo(&mut self, tempo: f32);

    /// Information for one track
    fn track_info(&self, index: usize) -> Result<TrackInfo>;

    /// Render interleaved stereo samples into `out`
    fn play(&mut self, out: &mut [i16]) -> Result<()>;

    /// True once the current track has played out
    fn track_ended(&self) -> bool;
}
