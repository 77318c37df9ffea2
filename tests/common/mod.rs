//! Shared test doubles: an in-memory chiptune library and a recording
//! transport.

#![allow(dead_code)]

use crossbeam_channel::Sender;
use flate2::write::GzEncoder;
use flate2::Compression;
use lumpsound::{
    AudioTransport, ChannelHandle, ChiptuneEmulator, ChiptuneLibrary, Equalizer, MusicHook,
    MusicKind, Repeat, Result, SoundError, StreamHandle, TrackInfo, TransportEvent,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Magic prefix of fake chiptune containers
pub const CHIP_MAGIC: &[u8] = b"FAKECHIP";

/// Constant sample value rendered by the fake emulator
pub const TONE: i16 = 1000;

/// Build a fake chiptune container
pub fn chip_container(tracks: u8, play_length_ms: u32) -> Vec<u8> {
    let mut data = CHIP_MAGIC.to_vec();
    data.push(tracks);
    data.extend_from_slice(&play_length_ms.to_le_bytes());
    data
}

/// Gzip `payload` (the trailer carries the inflated size)
pub fn gzip(payload: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

/// Legacy version-3 sample lump
pub fn legacy_lump(rate: u16, samples: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&3u16.to_le_bytes());
    data.extend_from_slice(&rate.to_le_bytes());
    data.extend_from_slice(&(samples.len() as u32).to_le_bytes());
    data.extend_from_slice(samples);
    data
}

/// 16-bit PCM WAV bytes
pub fn wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// What the fake emulators did
#[derive(Debug, Default)]
pub struct ChipLog {
    pub opens: AtomicUsize,
    pub renders: AtomicUsize,
    pub starts: Mutex<Vec<usize>>,
    pub tempo: Mutex<Option<f32>>,
    pub equalizer: Mutex<Option<Equalizer>>,
    pub ended: AtomicBool,
}

/// Chiptune library accepting [`chip_container`] data
#[derive(Debug, Default, Clone)]
pub struct FakeChiptuneLibrary {
    pub log: Arc<ChipLog>,
}

impl FakeChiptuneLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn ChiptuneLibrary> {
        Arc::new(self.clone())
    }
}

struct FakeEmulator {
    tracks: usize,
    play_length_ms: u32,
    log: Arc<ChipLog>,
}

impl ChiptuneLibrary for FakeChiptuneLibrary {
    fn open(&self, data: &[u8], _sample_rate: u32) -> Result<Box<dyn ChiptuneEmulator>> {
        if !data.starts_with(CHIP_MAGIC) || data.len() < CHIP_MAGIC.len() + 5 {
            return Err(SoundError::ChiptuneOpenFailed("Wrong file type for this emulator".into()));
        }
        let header = &data[CHIP_MAGIC.len()..];
        let mut length = [0u8; 4];
        length.copy_from_slice(&header[1..5]);
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEmulator {
            tracks: usize::from(header[0]),
            play_length_ms: u32::from_le_bytes(length),
            log: Arc::clone(&self.log),
        }))
    }

    fn probe(&self, data: &[u8]) -> bool {
        data.starts_with(CHIP_MAGIC)
    }

    fn name(&self) -> &str {
        "fake"
    }
}

impl ChiptuneEmulator for FakeEmulator {
    fn track_count(&self) -> usize {
        self.tracks
    }

    fn start_track(&mut self, index: usize) -> Result<()> {
        if index >= self.tracks {
            return Err(SoundError::ChiptuneTrackFailed("Invalid track".into()));
        }
        self.log.starts.lock().push(index);
        self.log.ended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_equalizer(&mut self, equalizer: Equalizer) {
        *self.log.equalizer.lock() = Some(equalizer);
    }

    fn set_tempo(&mut self, tempo: f32) {
        *self.log.tempo.lock() = Some(tempo);
    }

    fn track_info(&self, _index: usize) -> Result<TrackInfo> {
        Ok(TrackInfo {
            play_length_ms: self.play_length_ms,
        })
    }

    fn play(&mut self, out: &mut [i16]) -> Result<()> {
        self.log.renders.fetch_add(1, Ordering::SeqCst);
        out.fill(TONE);
        Ok(())
    }

    fn track_ended(&self) -> bool {
        self.log.ended.load(Ordering::SeqCst)
    }
}

/// Transport that records every call
#[derive(Default)]
pub struct FakeTransport {
    pub open: bool,
    pub fail_open: bool,
    pub fail_play: bool,
    pub voices: usize,
    pub chunks: HashMap<usize, Arc<Vec<i16>>>,
    pub playing: HashSet<usize>,
    pub volumes: HashMap<usize, u8>,
    pub pans: HashMap<usize, (u8, u8)>,
    pub streams: HashMap<u64, MusicKind>,
    pub next_stream: u64,
    pub freed: Vec<StreamHandle>,
    pub plays: Vec<(StreamHandle, Repeat)>,
    pub seeks: Vec<(StreamHandle, f32)>,
    pub music_paused: bool,
    pub music_volume: Option<u8>,
    pub hook: Option<Arc<dyn MusicHook>>,
    pub finished: Option<Sender<TransportEvent>>,
    pub calls: Vec<&'static str>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened() -> Self {
        let mut transport = Self::new();
        transport.open = true;
        transport
    }

    /// Stream most recently started
    pub fn current_stream(&self) -> Option<StreamHandle> {
        self.plays.last().map(|(h, _)| *h)
    }

    /// Report the end of the current stream, as the audio thread would
    pub fn finish_stream(&self) -> bool {
        match (&self.finished, self.current_stream()) {
            (Some(tx), Some(handle)) => tx.send(TransportEvent::StreamFinished(handle)).is_ok(),
            _ => false,
        }
    }

    /// Pull samples from the installed hook
    pub fn render_hook(&self, frames: usize) -> Option<Vec<i16>> {
        let hook = self.hook.as_ref()?;
        let mut out = vec![0i16; frames * 2];
        hook.render(&mut out);
        Some(out)
    }
}

impl AudioTransport for FakeTransport {
    fn open_device(&mut self, _sample_rate: u32, _channels: u16, _buffer_frames: u16) -> Result<()> {
        self.calls.push("open_device");
        if self.fail_open {
            return Err(SoundError::AudioDeviceError("no audio device".into()));
        }
        self.open = true;
        Ok(())
    }

    fn close_device(&mut self) {
        self.calls.push("close_device");
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn allocate_channels(&mut self, count: usize) {
        self.voices = count;
    }

    fn play_chunk(
        &mut self,
        channel: Option<usize>,
        samples: Arc<Vec<i16>>,
    ) -> Result<ChannelHandle> {
        assert!(self.open, "play_chunk on a closed device");
        let index = match channel {
            Some(index) => index,
            None => (0..self.voices)
                .find(|i| !self.playing.contains(i))
                .ok_or_else(|| SoundError::AudioDeviceError("no free channel".into()))?,
        };
        self.chunks.insert(index, samples);
        self.playing.insert(index);
        Ok(ChannelHandle(index))
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: u8) {
        self.volumes.insert(channel.0, volume);
    }

    fn set_panning(&mut self, channel: ChannelHandle, left: u8, right: u8) {
        self.pans.insert(channel.0, (left, right));
    }

    fn is_playing(&self, channel: ChannelHandle) -> bool {
        self.playing.contains(&channel.0)
    }

    fn halt_channel(&mut self, channel: ChannelHandle) {
        self.playing.remove(&channel.0);
    }

    fn load_stream(&mut self, data: &[u8]) -> Result<StreamHandle> {
        self.calls.push("load_stream");
        let kind = MusicKind::detect(data);
        if kind == MusicKind::Other {
            return Err(SoundError::TransportLoadFailed("Unrecognized audio format".into()));
        }
        self.next_stream += 1;
        self.streams.insert(self.next_stream, kind);
        Ok(StreamHandle(self.next_stream))
    }

    fn free_stream(&mut self, stream: StreamHandle) {
        self.calls.push("free_stream");
        self.streams.remove(&stream.0);
        self.freed.push(stream);
    }

    fn stream_kind(&self, stream: StreamHandle) -> MusicKind {
        self.streams.get(&stream.0).copied().unwrap_or_default()
    }

    fn play_stream(&mut self, stream: StreamHandle, repeat: Repeat) -> Result<()> {
        self.calls.push("play_stream");
        if self.fail_play {
            return Err(SoundError::TransportPlayFailed("device lost".into()));
        }
        self.plays.push((stream, repeat));
        Ok(())
    }

    fn seek_stream(&mut self, stream: StreamHandle, seconds: f32) -> Result<()> {
        self.calls.push("seek_stream");
        self.seeks.push((stream, seconds));
        Ok(())
    }

    fn pause_music(&mut self) {
        self.music_paused = true;
    }

    fn resume_music(&mut self) {
        self.music_paused = false;
    }

    fn halt_music(&mut self) {
        self.calls.push("halt_music");
    }

    fn set_music_volume(&mut self, volume: u8) {
        self.music_volume = Some(volume);
    }

    fn hook_music(&mut self, hook: Option<Arc<dyn MusicHook>>) {
        self.calls.push(if hook.is_some() { "hook_music" } else { "unhook_music" });
        self.hook = hook;
    }

    fn notify_finished(&mut self, sender: Option<Sender<TransportEvent>>) {
        self.calls.push(if sender.is_some() { "notify_finished" } else { "clear_finished" });
        self.finished = sender;
    }
}
