//! Audio transport backed by rodio
//!
//! The output stream lives on its own thread (it cannot move between
//! threads); everything else talks to it through the stream handle.

use super::sources::{HookSlot, HookSource, PanGains, PanningSource};
use crate::transport::{
    AudioTransport, ChannelHandle, MusicHook, MusicKind, Repeat, StreamHandle, TransportEvent,
};
use crate::{Result, SoundError};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use rodio::source::EmptyCallback;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Keeps the rodio output stream alive on a dedicated thread
struct OutputThread {
    handle: OutputStreamHandle,
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl OutputThread {
    fn spawn() -> Result<Self> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let thread = std::thread::Builder::new()
            .name("lumpsound-output".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        // Blocks until shutdown is sent or the sender is dropped
                        let _ = shutdown_rx.recv();
                    }
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })?;
        let handle = ready_rx
            .recv()
            .map_err(|e| SoundError::AudioDeviceError(e.to_string()))?
            .map_err(|e| {
                SoundError::AudioDeviceError(format!("Failed to create audio stream: {}", e))
            })?;
        Ok(OutputThread {
            handle,
            shutdown,
            thread: Some(thread),
        })
    }

    fn sink(&self) -> Result<Sink> {
        Sink::try_new(&self.handle).map_err(|e| {
            SoundError::AudioDeviceError(format!("Failed to create audio sink: {}", e))
        })
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[derive(Default)]
struct Voice {
    sink: Option<Sink>,
    gains: Arc<PanGains>,
}

struct LoadedStream {
    data: Arc<[u8]>,
    kind: MusicKind,
}

struct MusicSink {
    sink: Sink,
    stream: StreamHandle,
}

/// [`AudioTransport`] playing through the default output device
pub struct RodioTransport {
    output: Option<OutputThread>,
    voices: Vec<Voice>,
    streams: HashMap<u64, LoadedStream>,
    next_stream: u64,
    music: Option<MusicSink>,
    music_volume: f32,
    music_paused: bool,
    hook: HookSlot,
    hook_sink: Option<(Sink, Arc<AtomicBool>)>,
    finished_tx: Arc<Mutex<Option<Sender<TransportEvent>>>>,
    generation: Arc<AtomicU64>,
}

impl Default for RodioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioTransport {
    /// Create a transport; the device opens in
    /// [`AudioTransport::open_device`]
    pub fn new() -> Self {
        RodioTransport {
            output: None,
            voices: Vec::new(),
            streams: HashMap::new(),
            next_stream: 1,
            music: None,
            music_volume: 1.0,
            music_paused: false,
            hook: Arc::new(Mutex::new(None)),
            hook_sink: None,
            finished_tx: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn output(&self) -> Result<&OutputThread> {
        self.output.as_ref().ok_or(SoundError::DeviceNotOpen)
    }

    fn voice(&self, channel: ChannelHandle) -> Option<&Voice> {
        self.voices.get(channel.0)
    }

    fn free_voice(&self) -> Option<usize> {
        self.voices
            .iter()
            .position(|v| v.sink.as_ref().map_or(true, Sink::empty))
    }

    /// Stop the music sink and invalidate its completion callback
    fn drop_music_sink(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(music) = self.music.take() {
            music.sink.stop();
        }
    }

    fn completion_callback(&self, stream: StreamHandle) -> EmptyCallback<f32> {
        let generation = self.generation.load(Ordering::Acquire);
        let current = Arc::clone(&self.generation);
        let finished_tx = Arc::clone(&self.finished_tx);
        EmptyCallback::new(Box::new(move || {
            if current.load(Ordering::Acquire) != generation {
                return;
            }
            if let Some(tx) = finished_tx.lock().as_ref() {
                let _ = tx.send(TransportEvent::StreamFinished(stream));
            }
        }))
    }
}

impl AudioTransport for RodioTransport {
    fn open_device(&mut self, sample_rate: u32, channels: u16, buffer_frames: u16) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }
        self.output = Some(OutputThread::spawn()?);
        debug!(
            "Audio device open (requested {} Hz, {} channels, {} frames; rodio resamples)",
            sample_rate, channels, buffer_frames
        );
        Ok(())
    }

    fn close_device(&mut self) {
        self.hook_music(None);
        self.drop_music_sink();
        self.voices.clear();
        self.streams.clear();
        self.output = None;
    }

    fn is_open(&self) -> bool {
        self.output.is_some()
    }

    fn allocate_channels(&mut self, count: usize) {
        self.voices.resize_with(count, Voice::default);
    }

    fn play_chunk(
        &mut self,
        channel: Option<usize>,
        samples: Arc<Vec<i16>>,
    ) -> Result<ChannelHandle> {
        let index = match channel {
            Some(index) if index < self.voices.len() => index,
            Some(index) => {
                return Err(SoundError::AudioDeviceError(format!(
                    "channel {} not allocated ({} voices)",
                    index,
                    self.voices.len()
                )))
            }
            None => self
                .free_voice()
                .ok_or_else(|| SoundError::AudioDeviceError("no free channel".into()))?,
        };
        let sink = self.output()?.sink()?;
        let voice = &mut self.voices[index];
        voice.gains.set(255, 255);
        sink.append(PanningSource::new(samples, Arc::clone(&voice.gains)));
        // Replacing the sink stops whatever the voice was playing
        voice.sink = Some(sink);
        Ok(ChannelHandle(index))
    }

    fn set_channel_volume(&mut self, channel: ChannelHandle, volume: u8) {
        if let Some(sink) = self.voice(channel).and_then(|v| v.sink.as_ref()) {
            sink.set_volume(f32::from(volume.min(128)) / 128.0);
        }
    }

    fn set_panning(&mut self, channel: ChannelHandle, left: u8, right: u8) {
        if let Some(voice) = self.voice(channel) {
            voice.gains.set(left, right);
        }
    }

    fn is_playing(&self, channel: ChannelHandle) -> bool {
        self.voice(channel)
            .and_then(|v| v.sink.as_ref())
            .is_some_and(|s| !s.empty())
    }

    fn halt_channel(&mut self, channel: ChannelHandle) {
        if let Some(voice) = self.voices.get_mut(channel.0) {
            if let Some(sink) = voice.sink.take() {
                sink.stop();
            }
        }
    }

    fn load_stream(&mut self, data: &[u8]) -> Result<StreamHandle> {
        let data: Arc<[u8]> = Arc::from(data);
        Decoder::new(Cursor::new(Arc::clone(&data)))
            .map_err(|e| SoundError::TransportLoadFailed(e.to_string()))?;
        let handle = StreamHandle(self.next_stream);
        self.next_stream += 1;
        let kind = MusicKind::detect(&data);
        self.streams.insert(handle.0, LoadedStream { data, kind });
        Ok(handle)
    }

    fn free_stream(&mut self, stream: StreamHandle) {
        if self.music.as_ref().is_some_and(|m| m.stream == stream) {
            self.drop_music_sink();
        }
        self.streams.remove(&stream.0);
    }

    fn stream_kind(&self, stream: StreamHandle) -> MusicKind {
        self.streams
            .get(&stream.0)
            .map_or(MusicKind::None, |s| s.kind)
    }

    fn play_stream(&mut self, stream: StreamHandle, repeat: Repeat) -> Result<()> {
        let data = self
            .streams
            .get(&stream.0)
            .map(|s| Arc::clone(&s.data))
            .ok_or_else(|| {
                SoundError::TransportPlayFailed(format!("unknown stream {:?}", stream))
            })?;
        let source = Decoder::new(Cursor::new(data))
            .map_err(|e| SoundError::TransportPlayFailed(e.to_string()))?;

        self.drop_music_sink();
        let sink = self.output()?.sink()?;
        sink.set_volume(self.music_volume);
        match repeat {
            Repeat::Forever => sink.append(source.repeat_infinite()),
            Repeat::Once => {
                sink.append(source);
                sink.append(self.completion_callback(stream));
            }
        }
        if self.music_paused {
            sink.pause();
        }
        self.music = Some(MusicSink { sink, stream });
        Ok(())
    }

    fn seek_stream(&mut self, stream: StreamHandle, seconds: f32) -> Result<()> {
        let music = self
            .music
            .as_ref()
            .filter(|m| m.stream == stream)
            .ok_or_else(|| {
                SoundError::TransportPlayFailed(format!("stream {:?} is not playing", stream))
            })?;
        music
            .sink
            .try_seek(Duration::from_secs_f32(seconds.max(0.0)))
            .map_err(|e| SoundError::TransportPlayFailed(format!("seek failed: {}", e)))
    }

    fn pause_music(&mut self) {
        self.music_paused = true;
        if let Some(music) = &self.music {
            music.sink.pause();
        }
        if let Some((sink, _)) = &self.hook_sink {
            sink.pause();
        }
    }

    fn resume_music(&mut self) {
        self.music_paused = false;
        if let Some(music) = &self.music {
            music.sink.play();
        }
        if let Some((sink, _)) = &self.hook_sink {
            sink.play();
        }
    }

    fn halt_music(&mut self) {
        self.drop_music_sink();
    }

    fn set_music_volume(&mut self, volume: u8) {
        self.music_volume = f32::from(volume.min(128)) / 128.0;
        if let Some(music) = &self.music {
            music.sink.set_volume(self.music_volume);
        }
    }

    fn hook_music(&mut self, hook: Option<Arc<dyn MusicHook>>) {
        let install = hook.is_some();
        *self.hook.lock() = hook;
        if !install {
            if let Some((sink, finished)) = self.hook_sink.take() {
                finished.store(true, Ordering::Relaxed);
                sink.stop();
            }
            return;
        }
        if self.hook_sink.is_some() {
            return;
        }
        match self.output().and_then(OutputThread::sink) {
            Ok(sink) => {
                let finished = Arc::new(AtomicBool::new(false));
                sink.append(HookSource::new(Arc::clone(&self.hook), Arc::clone(&finished)));
                if self.music_paused {
                    sink.pause();
                }
                self.hook_sink = Some((sink, finished));
            }
            Err(e) => warn!("Cannot hook music output: {}", e),
        }
    }

    fn notify_finished(&mut self, sender: Option<Sender<TransportEvent>>) {
        *self.finished_tx.lock() = sender;
    }
}

impl Drop for RodioTransport {
    fn drop(&mut self) {
        self.close_device();
    }
}
