//! Mixer configuration
//!
//! Output format, voice count, and the runtime capability flags that select
//! which decode paths are live (chiptune rendering, gzip unpacking).

use crate::chiptune::Equalizer;
use crate::{Result, SoundError, OUTPUT_CHANNELS, TARGET_SAMPLE_RATE};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Default device buffer size in frames
pub const DEFAULT_BUFFER_FRAMES: u16 = 2048;

/// Default number of simultaneous sound-effect voices
pub const DEFAULT_MIX_CHANNELS: usize = 256;

/// Upper bound for chiptune tempo multipliers
pub const MAX_TEMPO: f32 = 250.0;

/// Maximum inflated size of a gzip container: 100MB
/// Chiptune containers are typically a few hundred KB.
pub const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

bitflags! {
    /// Optional decode backends available at runtime
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Capabilities: u8 {
        /// A chiptune emulation library is wired in
        const CHIPTUNE = 0x01;
        /// Gzip-wrapped chiptune containers can be inflated
        const GZIP = 0x02;
    }
}

impl Capabilities {
    /// True if raw chiptune containers may be probed
    pub fn chiptune(&self) -> bool {
        self.contains(Capabilities::CHIPTUNE)
    }

    /// True if gzip-wrapped chiptune containers may be unpacked
    pub fn gzip_chiptune(&self) -> bool {
        self.contains(Capabilities::CHIPTUNE | Capabilities::GZIP)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities::all()
    }
}

/// Configuration for the sound system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Device sample rate in Hz
    pub sample_rate: u32,
    /// Device channel count
    pub channels: u16,
    /// Device buffer size in frames
    pub buffer_frames: u16,
    /// Number of sound-effect voices
    pub mix_channels: usize,
    /// Live decode backends
    pub capabilities: Capabilities,
    /// Equalizer applied to every chiptune session
    pub equalizer: Equalizer,
    /// Chiptune tempo ceiling
    pub max_tempo: f32,
    /// Largest accepted inflated container size in bytes
    pub max_decompressed_size: usize,
    /// Hold native MIDI music at full volume (volume changes are ignored)
    pub pin_midi_volume: bool,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            sample_rate: TARGET_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
            mix_channels: DEFAULT_MIX_CHANNELS,
            capabilities: Capabilities::default(),
            equalizer: Equalizer::default(),
            max_tempo: MAX_TEMPO,
            max_decompressed_size: MAX_DECOMPRESSED_SIZE,
            pin_midi_volume: cfg!(windows),
        }
    }
}

impl MixerConfig {
    /// Configuration with every chiptune path disabled
    pub fn without_chiptune() -> Self {
        Self::default().with_capabilities(Capabilities::empty())
    }

    /// Replace the capability flags
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Replace the voice count
    pub fn with_mix_channels(mut self, mix_channels: usize) -> Self {
        self.mix_channels = mix_channels;
        self
    }

    /// Replace the chiptune equalizer
    pub fn with_equalizer(mut self, equalizer: Equalizer) -> Self {
        self.equalizer = equalizer;
        self
    }

    /// Parse a configuration from JSON, falling back to defaults for
    /// missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MixerConfig = serde_json::from_str(json)
            .map_err(|e| SoundError::ConfigError(format!("malformed mixer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the mixer cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SoundError::ConfigError("sample_rate must be non-zero".into()));
        }
        if self.channels != OUTPUT_CHANNELS {
            return Err(SoundError::ConfigError(format!(
                "only stereo output is supported (got {} channels)",
                self.channels
            )));
        }
        if self.mix_channels == 0 {
            return Err(SoundError::ConfigError("mix_channels must be non-zero".into()));
        }
        if self.max_tempo.is_nan() || self.max_tempo <= 0.0 {
            return Err(SoundError::ConfigError("max_tempo must be positive".into()));
        }
        Ok(())
    }
}
