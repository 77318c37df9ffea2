//! Game sound lump resolver and music controller
//!
//! Turns loosely-typed game audio assets (sound-effect lumps and music
//! streams of unknown encoding) into 16-bit stereo PCM at 44100 Hz, and
//! drives the runtime state of the current music: sample-accurate loop
//! restarts and multi-track chiptune sessions.
//!
//! # Features
//! - Legacy 8-bit mono sample lumps (version 3 header) resampled to 44100 Hz
//!   stereo with fast paths for 44100/22050/11025 Hz sources
//! - Gzip-wrapped and raw chiptune containers rendered through a pluggable
//!   emulation library ([`chiptune::ChiptuneLibrary`])
//! - Generic containers (WAV/OGG/FLAC/MP3) decoded through rodio
//! - `LOOPPOINT=` / `LOOPMS=` loop metadata embedded in music streams
//! - A playback state machine safe to drive while the audio callback renders
//!
//! # Crate feature flags
//! - `streaming` (opt-in): rodio-backed [`AudioTransport`] and the CLI player
//!
//! # Quick start
//! ```no_run
//! use lumpsound::{MixerConfig, SfxResolver};
//!
//! let data = std::fs::read("DSPISTOL.lmp").unwrap();
//! let resolver = SfxResolver::new(&MixerConfig::default());
//! let chunk = resolver.resolve(&data).unwrap();
//! assert_eq!(chunk.samples().len(), chunk.frames() * 2);
//! ```

#![warn(missing_docs)]

pub mod chiptune; // Chiptune library boundary and session adapter
pub mod chunk; // Decoded sound-effect buffers
pub mod compression; // Gzip container unpacking
pub mod config; // Mixer configuration and capabilities
pub mod decoder; // Generic container decoding
pub mod format; // Container sniffing
pub mod music; // Music loading and loop points
pub mod playback; // Music state machine
pub mod resample; // Legacy sample rate conversion
pub mod sfx; // Sound-effect resolution
#[cfg(feature = "streaming")]
pub mod streaming; // rodio audio output
pub mod system; // Sound system facade
pub mod transport; // Audio transport boundary
pub mod zone; // Tagged sample allocation

/// Output sample rate of every decoded buffer and of the audio device (Hz)
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// Output channel count (interleaved stereo)
pub const OUTPUT_CHANNELS: u16 = 2;

/// Error types for sound resolution and playback
#[derive(thiserror::Error, Debug)]
pub enum SoundError {
    /// No decoder recognised the asset
    #[error("Unrecognized sound format")]
    FormatUnrecognized,

    /// Output size would exceed a 32-bit byte length
    #[error("Output of {requested} bytes exceeds representable length")]
    CapacityOverflow {
        /// Requested size in bytes
        requested: u64,
    },

    /// Legacy sample header declares an unusable sample rate
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u16),

    /// Decompression library could not be set up for the stream
    #[error("Encountered {class} when running inflateInit: {message}")]
    DecompressionInitFailed {
        /// zlib-style error class name
        class: &'static str,
        /// Library message
        message: String,
    },

    /// Inflate did not reach the end of the stream
    #[error("Encountered {class} when running inflate: {message}")]
    DecompressionFailed {
        /// zlib-style error class name
        class: &'static str,
        /// Library message
        message: String,
    },

    /// Chiptune library rejected the buffer
    #[error("Chiptune open failed: {0}")]
    ChiptuneOpenFailed(String),

    /// Chiptune library failed to start or render a track
    #[error("Chiptune error: {0}")]
    ChiptuneTrackFailed(String),

    /// Stream decoder rejected the music bytes
    #[error("Transport failed to load stream: {0}")]
    TransportLoadFailed(String),

    /// Transport could not start playback
    #[error("Transport failed to play: {0}")]
    TransportPlayFailed(String),

    /// Requested track outside the session's track range
    #[error("Track index {index} out of range (track count: {count})")]
    TrackIndexInvalid {
        /// Requested track
        index: usize,
        /// Number of tracks reported by the library
        count: usize,
    },

    /// Operation needs a chiptune music session but none is loaded
    #[error("No chiptune session loaded")]
    NoChiptuneSession,

    /// Transport command issued with no open device
    #[error("Audio device is not open")]
    DeviceNotOpen,

    /// Audio device error
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for SoundError {
    fn from(msg: String) -> Self {
        SoundError::Other(msg)
    }
}

impl From<&str> for SoundError {
    fn from(msg: &str) -> Self {
        SoundError::Other(msg.to_string())
    }
}

/// Result type for sound operations
pub type Result<T> = std::result::Result<T, SoundError>;

// Public API exports
pub use chiptune::{
    ChiptuneEmulator, ChiptuneLibrary, ChiptuneSession, Equalizer, TrackChange, TrackInfo,
};
pub use chunk::{ChunkOwner, DecodedChunk};
pub use compression::unpack_gzip;
pub use config::{Capabilities, MixerConfig};
pub use decoder::{ChunkDecoder, RodioChunkDecoder};
pub use format::{ContainerKind, ContainerSniffer, LegacyHeader};
pub use music::{parse_loop_point, LoadedMusic, LoopMetadata, MusicLoader};
pub use playback::{ControllerState, MusicRenderer, PlaybackController};
pub use resample::convert_legacy;
pub use sfx::SfxResolver;
#[cfg(feature = "streaming")]
pub use streaming::RodioTransport;
pub use system::{AssetCache, SoundSystem};
pub use transport::{
    AudioTransport, ChannelHandle, MusicHook, MusicKind, Repeat, StreamHandle, TransportEvent,
};
pub use zone::{PurgeTag, SampleZone};
