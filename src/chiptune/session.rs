//! Chiptune sessions
//!
//! Music sessions live as long as the loaded song and are read by the audio
//! callback; callers must hold the music lock around every `&mut` method.
//! Transient sessions exist only inside a single sound-effect resolve.

use super::{ChiptuneEmulator, ChiptuneLibrary, Equalizer};
use crate::chunk::{ChunkOwner, DecodedChunk};
use crate::{Result, SoundError, TARGET_SAMPLE_RATE};
use tracing::{debug, error};

/// Outcome of a track switch request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChange {
    /// The requested track is now playing
    Switched,
    /// The requested track was already current; nothing was done
    Unchanged,
}

/// The long-lived chiptune music session
pub struct ChiptuneSession {
    emulator: Box<dyn ChiptuneEmulator>,
    current_track: Option<usize>,
    equalizer: Equalizer,
    tempo: f32,
}

impl std::fmt::Debug for ChiptuneSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChiptuneSession")
            .field("current_track", &self.current_track)
            .field("equalizer", &self.equalizer)
            .field("tempo", &self.tempo)
            .finish_non_exhaustive()
    }
}

impl ChiptuneSession {
    /// Open a music session positioned at track 0
    pub fn open_music(
        library: &dyn ChiptuneLibrary,
        data: &[u8],
        equalizer: Equalizer,
    ) -> Result<Self> {
        let mut emulator = library.open(data, TARGET_SAMPLE_RATE)?;
        emulator.start_track(0)?;
        emulator.set_equalizer(equalizer);
        debug!(
            "Opened {} music session ({} tracks)",
            library.name(),
            emulator.track_count()
        );
        Ok(ChiptuneSession {
            emulator,
            current_track: Some(0),
            equalizer,
            tempo: 1.0,
        })
    }

    /// Restart playback from track 0
    pub fn restart(&mut self) -> Result<()> {
        self.emulator.start_track(0)?;
        self.current_track = Some(0);
        Ok(())
    }

    /// Mark that no track is active (music stopped)
    pub fn clear_track(&mut self) {
        self.current_track = None;
    }

    /// Switch to `index`
    ///
    /// Asking for the track that is already playing is reported as
    /// [`TrackChange::Unchanged`], not an error.
    pub fn set_track(&mut self, index: usize) -> Result<TrackChange> {
        if self.current_track == Some(index) {
            return Ok(TrackChange::Unchanged);
        }
        let count = self.emulator.track_count();
        if index >= count {
            return Err(SoundError::TrackIndexInvalid { index, count });
        }
        if let Err(e) = self.emulator.start_track(index) {
            error!("Chiptune error starting track {}: {}", index, e);
            return Err(e);
        }
        self.current_track = Some(index);
        Ok(TrackChange::Switched)
    }

    /// Set the tempo multiplier, clamped to `max_tempo`; returns the
    /// applied value
    pub fn set_tempo(&mut self, tempo: f32, max_tempo: f32) -> f32 {
        let tempo = tempo.min(max_tempo);
        self.emulator.set_tempo(tempo);
        self.tempo = tempo;
        tempo
    }

    /// True once the current track has played out
    pub fn is_track_finished(&self) -> bool {
        self.emulator.track_ended()
    }

    /// Render interleaved stereo samples for the live callback
    pub fn render_into(&mut self, out: &mut [i16]) -> Result<()> {
        self.emulator.play(out)
    }

    /// Currently selected track, `None` while stopped
    pub fn current_track(&self) -> Option<usize> {
        self.current_track
    }

    /// Track count reported by the library
    pub fn track_count(&self) -> usize {
        self.emulator.track_count()
    }

    /// Current tempo multiplier
    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Equalizer applied at open
    pub fn equalizer(&self) -> Equalizer {
        self.equalizer
    }
}

/// A one-shot session that renders a chiptune sound effect
pub struct TransientSession {
    emulator: Box<dyn ChiptuneEmulator>,
}

impl TransientSession {
    /// Open `data` for one-shot rendering
    pub fn open(library: &dyn ChiptuneLibrary, data: &[u8], equalizer: Equalizer) -> Result<Self> {
        let mut emulator = library.open(data, TARGET_SAMPLE_RATE)?;
        emulator.start_track(0)?;
        emulator.set_equalizer(equalizer);
        Ok(TransientSession { emulator })
    }

    /// Render the whole of track 0 and close the session
    ///
    /// The buffer holds `play_length_ms * 44.1` stereo frames.
    pub fn render_one_shot(mut self) -> Result<DecodedChunk> {
        let info = self.emulator.track_info(0)?;
        let frames = u64::from(info.play_length_ms) * 441 / 10;
        let samples = frames * 2;
        let bytes = samples * 2;
        if bytes > u64::from(u32::MAX) {
            return Err(SoundError::CapacityOverflow { requested: bytes });
        }
        let mut buffer = vec![0i16; samples as usize];
        self.emulator.play(&mut buffer)?;
        Ok(DecodedChunk::new(buffer, ChunkOwner::Emulator))
    }
}
