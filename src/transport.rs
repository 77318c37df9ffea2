//! Audio transport boundary
//!
//! The transport is the playback engine behind this crate: it owns the
//! device, mixes sound-effect voices, decodes and plays music streams, and
//! calls the music hook from its own audio thread. Everything here is the
//! contract between the sound system and such an engine.

use crate::Result;
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Identifies one sound-effect voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub usize);

/// Identifies one loaded music stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Repeat policy for stream playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Play through once
    Once,
    /// Loop natively from the start forever
    Forever,
}

/// Notifications emitted by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// A stream played through to its end
    StreamFinished(StreamHandle),
}

/// Kind of music currently loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MusicKind {
    /// Nothing loaded
    #[default]
    None,
    /// Standard MIDI file
    Midi,
    /// Tracker module (MOD/S3M/XM/IT)
    Module,
    /// MPEG audio
    Mp3,
    /// Ogg container
    Ogg,
    /// RIFF WAVE
    Wav,
    /// FLAC
    Flac,
    /// Chiptune rendered through the emulation library
    Chiptune,
    /// Something the transport decodes but does not name
    Other,
}

impl MusicKind {
    /// Guess the kind of a music stream from its leading bytes
    pub fn detect(data: &[u8]) -> MusicKind {
        if data.starts_with(b"MThd") {
            MusicKind::Midi
        } else if data.starts_with(b"OggS") {
            MusicKind::Ogg
        } else if data.starts_with(b"fLaC") {
            MusicKind::Flac
        } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            MusicKind::Wav
        } else if data.starts_with(b"ID3") || is_mpeg_sync(data) {
            MusicKind::Mp3
        } else if is_module(data) {
            MusicKind::Module
        } else {
            MusicKind::Other
        }
    }
}

fn is_mpeg_sync(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0
}

fn is_module(data: &[u8]) -> bool {
    if data.starts_with(b"Extended Module:") || data.starts_with(b"IMPM") {
        return true;
    }
    if data.len() >= 48 && &data[44..48] == b"SCRM" {
        return true;
    }
    data.len() >= 1084
        && matches!(
            &data[1080..1084],
            b"M.K." | b"M!K!" | b"FLT4" | b"4CHN" | b"6CHN" | b"8CHN"
        )
}

/// Live render callback for music the transport does not decode itself
///
/// Called from the audio thread with an interleaved stereo buffer; it must
/// fill the whole buffer and must not block for long.
pub trait MusicHook: Send + Sync {
    /// Fill `out` with the next samples
    fn render(&self, out: &mut [i16]);
}

/// Playback engine contract
pub trait AudioTransport: Send {
    /// Open the output device
    fn open_device(&mut self, sample_rate: u32, channels: u16, buffer_frames: u16) -> Result<()>;

    /// Close the output device, halting everything
    fn close_device(&mut self);

    /// Whether the device is open
    fn is_open(&self) -> bool;

    /// Reserve `count` sound-effect voices
    fn allocate_channels(&mut self, count: usize);

    /// Play interleaved stereo samples on `channel`, or on any free voice
    fn play_chunk(
        &mut self,
        channel: Option<usize>,
        samples: Arc<Vec<i16>>,
    ) -> Result<ChannelHandle>;

    /// Voice volume, 0..=128
    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: u8);

    /// Voice panning, each side 0..=255
    fn set_panning(&mut self, channel: ChannelHandle, left: u8, right: u8);

    /// Whether the voice is still sounding
    fn is_playing(&self, channel: ChannelHandle) -> bool;

    /// Stop the voice
    fn halt_channel(&mut self, channel: ChannelHandle);

    /// Decode a music stream; the bytes are copied
    fn load_stream(&mut self, data: &[u8]) -> Result<StreamHandle>;

    /// Release a stream loaded with [`AudioTransport::load_stream`]
    fn free_stream(&mut self, stream: StreamHandle);

    /// Kind of a loaded stream
    fn stream_kind(&self, stream: StreamHandle) -> MusicKind;

    /// Start a stream from its beginning
    fn play_stream(&mut self, stream: StreamHandle, repeat: Repeat) -> Result<()>;

    /// Seek the playing stream, in seconds from its start
    fn seek_stream(&mut self, stream: StreamHandle, seconds: f32) -> Result<()>;

    /// Pause music output
    fn pause_music(&mut self);

    /// Resume music output
    fn resume_music(&mut self);

    /// Stop the playing stream
    fn halt_music(&mut self);

    /// Music volume, 0..=128
    fn set_music_volume(&mut self, volume: u8);

    /// Install or remove the live music render hook
    fn hook_music(&mut self, hook: Option<Arc<dyn MusicHook>>);

    /// Install or remove the stream-finished notifier
    fn notify_finished(&mut self, sender: Option<Sender<TransportEvent>>);
}
