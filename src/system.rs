//! Sound system facade
//!
//! [`SoundSystem`] ties a transport to the sound-effect resolver and the
//! music controller. It is what a game loop talks to: start it once, load
//! and fire sound effects, drive the one music track, and shut it down.

use crate::chiptune::{ChiptuneLibrary, TrackChange};
use crate::chunk::DecodedChunk;
use crate::config::MixerConfig;
use crate::playback::{ControllerState, PlaybackController, MAX_MUSIC_VOLUME};
use crate::sfx::SfxResolver;
use crate::transport::{AudioTransport, ChannelHandle, MusicKind};
use crate::zone::SampleZone;
use crate::{Result, SoundError};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of raw asset bytes
pub trait AssetCache {
    /// Bytes of the asset named `id`, or `None` if there is no such asset
    fn fetch(&self, id: &str) -> Option<Cow<'_, [u8]>>;
}

/// Voice volume for an effect volume (0..=255) at `sfx_volume` (0..=31)
///
/// Full scale is `(256 * 31) / 62 = 128`.
pub fn sfx_channel_volume(vol: u8, sfx_volume: u8) -> u8 {
    ((u16::from(vol) + 1) * u16::from(sfx_volume.min(MAX_MUSIC_VOLUME)) / 62) as u8
}

/// Left/right gains for a stereo separation (0 = hard left, 255 = hard
/// right)
pub fn sfx_panning(sep: u8) -> (u8, u8) {
    let left = ((255 - u16::from(sep)) << 1).min(255) as u8;
    let right = (u16::from(sep) << 1).min(255) as u8;
    (left, right)
}

/// Running sound system on top of a transport
pub struct SoundSystem<T: AudioTransport> {
    config: MixerConfig,
    transport: T,
    resolver: SfxResolver,
    controller: PlaybackController,
    zone: Arc<SampleZone>,
    sfx_volume: u8,
    started: bool,
}

impl<T: AudioTransport> SoundSystem<T> {
    /// Validate `config`, open the device and allocate the voices
    ///
    /// Both volumes start at 0.
    pub fn startup(
        config: MixerConfig,
        mut transport: T,
        library: Option<Arc<dyn ChiptuneLibrary>>,
    ) -> Result<Self> {
        config.validate()?;
        if let Err(e) =
            transport.open_device(config.sample_rate, config.channels, config.buffer_frames)
        {
            error!("Error starting audio device: {}", e);
            return Err(e);
        }
        transport.allocate_channels(config.mix_channels);

        let zone = Arc::new(SampleZone::new());
        let mut resolver = SfxResolver::new(&config).with_zone(Arc::clone(&zone));
        let mut controller = PlaybackController::new(&config, Arc::clone(&zone));
        if let Some(library) = library {
            resolver = resolver.with_library(Arc::clone(&library));
            controller = controller.with_library(library);
        }
        info!(
            "Sound system started: {} Hz, {} channels, {} voices",
            config.sample_rate, config.channels, config.mix_channels
        );
        Ok(SoundSystem {
            config,
            transport,
            resolver,
            controller,
            zone,
            sfx_volume: 0,
            started: true,
        })
    }

    /// Unload music and close the device; calling it again does nothing
    pub fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        self.controller.unload(&mut self.transport);
        self.transport.close_device();
        debug!("Sound system shut down");
    }

    /// Whether the device is open
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Active configuration
    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Zone holding converted sound and inflated music buffers
    pub fn zone(&self) -> &Arc<SampleZone> {
        &self.zone
    }

    /// Music controller
    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    fn ensure_open(&self) -> Result<()> {
        debug_assert!(self.started, "sound system used after shutdown");
        if self.started && self.transport.is_open() {
            Ok(())
        } else {
            Err(SoundError::DeviceNotOpen)
        }
    }

    // Sound effects

    /// Decode a sound-effect lump
    pub fn load_sfx(&self, data: &[u8]) -> Result<DecodedChunk> {
        self.resolver.resolve(data).map_err(|e| {
            warn!("Failed to decode sound ({} bytes): {}", data.len(), e);
            e
        })
    }

    /// Fetch `id` from `cache` and decode it
    pub fn load_sfx_asset(&self, cache: &dyn AssetCache, id: &str) -> Result<DecodedChunk> {
        let Some(data) = cache.fetch(id) else {
            warn!("Sound asset {} not found", id);
            return Err(SoundError::FormatUnrecognized);
        };
        self.load_sfx(&data)
    }

    /// Release a chunk returned by [`SoundSystem::load_sfx`]
    pub fn free_sfx(&self, chunk: DecodedChunk) {
        self.resolver.release(chunk);
    }

    /// Play `chunk` on `channel` (or any free voice)
    ///
    /// `vol` and `sep` are 0..=255. Pitch and priority are accepted for
    /// interface compatibility; voice management belongs to the caller.
    pub fn start_sound(
        &mut self,
        chunk: &DecodedChunk,
        vol: u8,
        sep: u8,
        _pitch: u8,
        _priority: u8,
        channel: Option<usize>,
    ) -> Result<ChannelHandle> {
        self.ensure_open()?;
        let handle = self
            .transport
            .play_chunk(channel, chunk.shared_samples())?;
        self.apply_sound_params(handle, vol, sep);
        Ok(handle)
    }

    /// Update volume and panning of a playing voice
    pub fn update_sound_params(&mut self, handle: ChannelHandle, vol: u8, sep: u8, _pitch: u8) {
        if self.ensure_open().is_ok() {
            self.apply_sound_params(handle, vol, sep);
        }
    }

    fn apply_sound_params(&mut self, handle: ChannelHandle, vol: u8, sep: u8) {
        let (left, right) = sfx_panning(sep);
        self.transport
            .set_channel_volume(handle, sfx_channel_volume(vol, self.sfx_volume));
        self.transport.set_panning(handle, left, right);
    }

    /// Stop a voice
    pub fn stop_sound(&mut self, handle: ChannelHandle) {
        if self.ensure_open().is_ok() {
            self.transport.halt_channel(handle);
        }
    }

    /// Whether a voice is still sounding
    pub fn sound_is_playing(&self, handle: ChannelHandle) -> bool {
        self.ensure_open().is_ok() && self.transport.is_playing(handle)
    }

    /// Set the sound-effect volume (0..=31) used by later starts and updates
    pub fn set_sfx_volume(&mut self, volume: u8) {
        self.sfx_volume = volume.min(MAX_MUSIC_VOLUME);
    }

    /// Current sound-effect volume
    pub fn sfx_volume(&self) -> u8 {
        self.sfx_volume
    }

    // Music

    /// Load a song, replacing the current one
    pub fn load_song(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.controller.load(data, &mut self.transport)
    }

    /// Fetch `id` from `cache` and load it as a song
    pub fn load_song_asset(&mut self, cache: &dyn AssetCache, id: &str) -> Result<()> {
        let Some(data) = cache.fetch(id) else {
            warn!("Music asset {} not found", id);
            return Err(SoundError::FormatUnrecognized);
        };
        self.load_song(&data)
    }

    /// Stop and release the current song
    pub fn unload_song(&mut self) {
        self.controller.unload(&mut self.transport);
    }

    /// Start the loaded song
    pub fn play_song(&mut self, looping: bool) -> Result<()> {
        self.ensure_open()?;
        self.controller.play(looping, &mut self.transport)
    }

    /// Stop the song; does nothing when none is loaded
    pub fn stop_song(&mut self) {
        self.controller.stop(&mut self.transport);
    }

    /// Pause music
    pub fn pause_song(&mut self) {
        self.controller.pause(&mut self.transport);
    }

    /// Resume music
    pub fn resume_song(&mut self) {
        self.controller.resume(&mut self.transport);
    }

    /// Switch chiptune track
    pub fn set_song_track(&mut self, track: usize) -> Result<TrackChange> {
        self.controller.set_track(track)
    }

    /// Set chiptune tempo; false without a chiptune session
    pub fn set_song_speed(&mut self, speed: f32) -> bool {
        self.controller.set_tempo(speed)
    }

    /// Set the music volume (0..=31)
    pub fn set_music_volume(&mut self, volume: u8) {
        self.controller.set_volume(volume, &mut self.transport);
    }

    /// Kind of the loaded song
    pub fn song_type(&self) -> MusicKind {
        self.controller.song_kind()
    }

    /// True while a song is loaded
    pub fn song_playing(&self) -> bool {
        self.controller.is_loaded()
    }

    /// Pause flag
    pub fn song_paused(&self) -> bool {
        self.controller.is_paused()
    }

    /// Music controller state
    pub fn song_state(&self) -> ControllerState {
        self.controller.state()
    }

    /// True once the chiptune track has played out
    pub fn song_track_finished(&self) -> bool {
        self.controller.is_track_finished()
    }

    /// Handle pending transport events; call once per game tic
    pub fn pump(&mut self) -> usize {
        self.controller.pump(&mut self.transport)
    }
}

impl<T: AudioTransport> Drop for SoundSystem<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
