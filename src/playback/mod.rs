//! Music state machine
//!
//! [`PlaybackController`] owns the one loaded song and drives the transport:
//!
//! ```text
//! Empty --load--> Loaded --play--> Playing <--pause/resume--> Paused
//!   ^               |  ^              |
//!   +----unload-----+  +-----stop-----+
//! ```
//!
//! Chiptune music is rendered by a [`MusicRenderer`] hook the transport
//! calls from its audio thread. Streams with a non-zero loop point are
//! restarted by hand when the transport reports the end of the stream,
//! then seeked to the loop point; the transport's native repeat can only
//! loop from the very start.

mod renderer;

pub use renderer::{scale_volume, MusicRenderer, MAX_MUSIC_VOLUME};

use crate::chiptune::{ChiptuneLibrary, TrackChange};
use crate::config::MixerConfig;
use crate::music::{LoadedMusic, LoopMetadata, MusicLoader};
use crate::transport::{AudioTransport, MusicKind, Repeat, StreamHandle, TransportEvent};
use crate::zone::SampleZone;
use crate::{Result, SoundError};
use crossbeam_channel::{Receiver, Sender};
use renderer::MusicShared;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Nothing loaded
    Empty,
    /// Music loaded, not playing
    Loaded,
    /// Music playing
    Playing,
    /// Music paused
    Paused,
}

/// How a finished stream continues, chosen at load time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopMode {
    /// Play once, or loop natively from the start
    NoLoop,
    /// Restart and seek to the loop point when the stream ends
    SamplePositionLoop,
}

#[derive(Debug, Clone, Copy)]
struct LoadedStream {
    handle: StreamHandle,
    kind: MusicKind,
    loop_point: LoopMetadata,
}

/// Scale a 0..=31 volume to the transport's 0..=128 range
pub fn transport_volume(volume: u8) -> u8 {
    (u32::from(volume.min(MAX_MUSIC_VOLUME)) * 128 / u32::from(MAX_MUSIC_VOLUME)) as u8
}

/// Owner of the current music and its playback state
#[derive(Debug)]
pub struct PlaybackController {
    loader: MusicLoader,
    zone: Arc<SampleZone>,
    max_tempo: f32,
    pin_midi_volume: bool,
    shared: Arc<MusicShared>,
    stream: Option<LoadedStream>,
    state: ControllerState,
    loop_mode: LoopMode,
    restart_armed: bool,
    volume: u8,
    events_tx: Sender<TransportEvent>,
    events_rx: Receiver<TransportEvent>,
}

impl PlaybackController {
    /// Create an empty controller
    pub fn new(config: &MixerConfig, zone: Arc<SampleZone>) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        PlaybackController {
            loader: MusicLoader::new(config),
            zone,
            max_tempo: config.max_tempo,
            pin_midi_volume: config.pin_midi_volume,
            shared: Arc::new(MusicShared::default()),
            stream: None,
            state: ControllerState::Empty,
            loop_mode: LoopMode::NoLoop,
            restart_armed: false,
            volume: 0,
            events_tx,
            events_rx,
        }
    }

    /// Attach a chiptune emulation library
    pub fn with_library(mut self, library: Arc<dyn ChiptuneLibrary>) -> Self {
        self.loader = self.loader.with_library(library);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// True while any music is loaded
    pub fn is_loaded(&self) -> bool {
        self.state != ControllerState::Empty
    }

    /// Pause flag
    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Music volume on the 0..=31 scale
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Kind of the loaded music
    pub fn song_kind(&self) -> MusicKind {
        if self.shared.session.lock().is_some() {
            return MusicKind::Chiptune;
        }
        self.stream.map_or(MusicKind::None, |s| s.kind)
    }

    /// Loop point of the loaded stream; zero for chiptunes
    pub fn loop_point(&self) -> LoopMetadata {
        self.stream.map(|s| s.loop_point).unwrap_or_default()
    }

    /// A render hook sharing this controller's music state
    pub fn renderer(&self) -> MusicRenderer {
        MusicRenderer::new(Arc::clone(&self.shared))
    }

    /// Load `data`, replacing whatever was loaded
    ///
    /// On failure the controller is left [`ControllerState::Empty`].
    pub fn load(&mut self, data: &[u8], transport: &mut dyn AudioTransport) -> Result<()> {
        if self.is_loaded() {
            self.unload(transport);
        }
        match self.loader.load(data, transport, &self.zone)? {
            LoadedMusic::Chiptune(session) => {
                *self.shared.session.lock() = Some(session);
                self.loop_mode = LoopMode::NoLoop;
            }
            LoadedMusic::Stream {
                handle,
                kind,
                loop_point,
            } => {
                self.loop_mode = if loop_point.is_zero() {
                    LoopMode::NoLoop
                } else {
                    LoopMode::SamplePositionLoop
                };
                self.stream = Some(LoadedStream {
                    handle,
                    kind,
                    loop_point,
                });
            }
        }
        self.state = ControllerState::Loaded;
        Ok(())
    }

    /// Stop and release the loaded music
    pub fn unload(&mut self, transport: &mut dyn AudioTransport) {
        self.stop(transport);
        // The hook is gone, so the callback can no longer reach the session.
        if let Some(session) = self.shared.session.lock().take() {
            debug!("Closing chiptune session ({} tracks)", session.track_count());
        }
        if let Some(stream) = self.stream.take() {
            transport.free_stream(stream.handle);
        }
        self.loop_mode = LoopMode::NoLoop;
        self.state = ControllerState::Empty;
    }

    /// Start the loaded music
    ///
    /// A transport failure leaves the controller [`ControllerState::Loaded`].
    pub fn play(&mut self, looping: bool, transport: &mut dyn AudioTransport) -> Result<()> {
        {
            let mut session = self.shared.session.lock();
            if let Some(session) = session.as_mut() {
                if let Err(e) = session.restart() {
                    warn!("Chiptune error restarting track 0: {}", e);
                }
            }
        }
        if self.song_kind() == MusicKind::Chiptune {
            transport.hook_music(Some(Arc::new(self.renderer())));
            self.enter_playing();
            return Ok(());
        }

        let Some(stream) = self.stream else {
            return Err(SoundError::TransportPlayFailed("no music loaded".into()));
        };
        let repeat = if looping && self.loop_mode == LoopMode::NoLoop {
            Repeat::Forever
        } else {
            Repeat::Once
        };
        if let Err(e) = transport.play_stream(stream.handle, repeat) {
            error!("Failed to play music stream: {}", e);
            return Err(match e {
                SoundError::TransportPlayFailed(_) => e,
                other => SoundError::TransportPlayFailed(other.to_string()),
            });
        }
        transport.set_music_volume(transport_volume(self.volume));
        if self.loop_mode == LoopMode::SamplePositionLoop {
            transport.notify_finished(Some(self.events_tx.clone()));
            self.restart_armed = true;
        }
        self.enter_playing();
        Ok(())
    }

    /// Stop playback; a no-op when nothing is loaded
    pub fn stop(&mut self, transport: &mut dyn AudioTransport) {
        if !self.is_loaded() {
            return;
        }
        if self.song_kind() == MusicKind::Chiptune {
            // Unhook before taking the lock; the audio thread may be inside
            // the hook waiting for it.
            transport.hook_music(None);
            if let Some(session) = self.shared.session.lock().as_mut() {
                session.clear_track();
            }
        }
        if self.stream.is_some() {
            transport.notify_finished(None);
            self.restart_armed = false;
            // Completions already queued belong to the play being stopped
            while self.events_rx.try_recv().is_ok() {}
            transport.halt_music();
        }
        self.state = ControllerState::Loaded;
    }

    /// Pause music output
    pub fn pause(&mut self, transport: &mut dyn AudioTransport) {
        transport.pause_music();
        self.shared.paused.store(true, Ordering::Release);
        if self.state == ControllerState::Playing {
            self.state = ControllerState::Paused;
        }
    }

    /// Resume music output
    pub fn resume(&mut self, transport: &mut dyn AudioTransport) {
        transport.resume_music();
        self.shared.paused.store(false, Ordering::Release);
        if self.state == ControllerState::Paused {
            self.state = ControllerState::Playing;
        }
    }

    /// Switch the chiptune session to `index`
    ///
    /// Safe while the render hook is active; the switch happens under the
    /// session lock.
    pub fn set_track(&mut self, index: usize) -> Result<TrackChange> {
        let mut session = self.shared.session.lock();
        match session.as_mut() {
            Some(session) => session.set_track(index),
            None => Err(SoundError::NoChiptuneSession),
        }
    }

    /// Set the chiptune tempo, clamped to the configured ceiling
    ///
    /// Returns false when no chiptune session is loaded.
    pub fn set_tempo(&mut self, tempo: f32) -> bool {
        let mut session = self.shared.session.lock();
        match session.as_mut() {
            Some(session) => {
                session.set_tempo(tempo, self.max_tempo);
                true
            }
            None => false,
        }
    }

    /// True once the chiptune track has played out
    pub fn is_track_finished(&self) -> bool {
        self.shared
            .session
            .lock()
            .as_ref()
            .is_some_and(|s| s.is_track_finished())
    }

    /// Set the music volume (0..=31)
    ///
    /// The value is kept for the next song; the transport is only told
    /// while something is loaded. With `pin_midi_volume`, MIDI music stays
    /// at full volume.
    pub fn set_volume(&mut self, volume: u8, transport: &mut dyn AudioTransport) {
        let mut volume = volume.min(MAX_MUSIC_VOLUME);
        if self.pin_midi_volume && self.song_kind() == MusicKind::Midi {
            volume = MAX_MUSIC_VOLUME;
        }
        self.volume = volume;
        self.shared.volume.store(volume, Ordering::Relaxed);
        if self.is_loaded() {
            transport.set_music_volume(transport_volume(volume));
        }
    }

    /// Apply one transport event
    pub fn handle_event(&mut self, event: TransportEvent, transport: &mut dyn AudioTransport) {
        match event {
            TransportEvent::StreamFinished(handle) => {
                let Some(stream) = self.stream.filter(|s| s.handle == handle) else {
                    debug!("Ignoring end of stale stream {:?}", handle);
                    return;
                };
                if !self.restart_armed {
                    if self.state != ControllerState::Empty {
                        self.state = ControllerState::Loaded;
                    }
                    return;
                }
                self.restart_at_loop_point(stream, transport);
            }
        }
    }

    /// Drain pending transport events; returns how many were handled
    pub fn pump(&mut self, transport: &mut dyn AudioTransport) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event, transport);
            handled += 1;
        }
        handled
    }

    fn restart_at_loop_point(&mut self, stream: LoadedStream, transport: &mut dyn AudioTransport) {
        if let Err(e) = transport.play_stream(stream.handle, Repeat::Once) {
            error!("Failed to restart music stream: {}", e);
            self.restart_armed = false;
            transport.notify_finished(None);
            self.state = ControllerState::Loaded;
            return;
        }
        if let Err(e) = transport.seek_stream(stream.handle, stream.loop_point.seconds) {
            warn!(
                "Failed to seek music stream to {:.3}s: {}",
                stream.loop_point.seconds, e
            );
        }
    }

    fn enter_playing(&mut self) {
        self.state = if self.is_paused() {
            ControllerState::Paused
        } else {
            ControllerState::Playing
        };
    }
}
