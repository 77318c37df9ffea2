//! rodio sources for voices and hooked music

use crate::transport::MusicHook;
use crate::{OUTPUT_CHANNELS, TARGET_SAMPLE_RATE};
use parking_lot::Mutex;
use rodio::Source;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Samples pulled from the hook per batch
pub(crate) const HOOK_BATCH_SAMPLES: usize = 4096;

/// Per-voice stereo gains, 0..=255 each
#[derive(Debug)]
pub(crate) struct PanGains {
    left: AtomicU8,
    right: AtomicU8,
}

impl Default for PanGains {
    fn default() -> Self {
        PanGains {
            left: AtomicU8::new(255),
            right: AtomicU8::new(255),
        }
    }
}

impl PanGains {
    pub(crate) fn set(&self, left: u8, right: u8) {
        self.left.store(left, Ordering::Relaxed);
        self.right.store(right, Ordering::Relaxed);
    }
}

/// Plays a shared stereo chunk with live panning
pub(crate) struct PanningSource {
    samples: Arc<Vec<i16>>,
    pos: usize,
    gains: Arc<PanGains>,
}

impl PanningSource {
    pub(crate) fn new(samples: Arc<Vec<i16>>, gains: Arc<PanGains>) -> Self {
        PanningSource {
            samples,
            pos: 0,
            gains,
        }
    }
}

impl Iterator for PanningSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = *self.samples.get(self.pos)?;
        let gain = if self.pos % 2 == 0 {
            self.gains.left.load(Ordering::Relaxed)
        } else {
            self.gains.right.load(Ordering::Relaxed)
        };
        self.pos += 1;
        Some((i32::from(sample) * i32::from(gain) / 255) as i16)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl Source for PanningSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len() - self.pos)
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len() / usize::from(OUTPUT_CHANNELS);
        Some(Duration::from_secs_f64(
            frames as f64 / f64::from(TARGET_SAMPLE_RATE),
        ))
    }
}

/// Slot holding the installed music hook
pub(crate) type HookSlot = Arc<Mutex<Option<Arc<dyn MusicHook>>>>;

/// Endless source that pulls the music hook in batches
pub(crate) struct HookSource {
    slot: HookSlot,
    finished: Arc<AtomicBool>,
    /// Batch buffer (reduces lock traffic on the slot)
    buffer: Vec<i16>,
    buffer_pos: usize,
}

impl HookSource {
    pub(crate) fn new(slot: HookSlot, finished: Arc<AtomicBool>) -> Self {
        HookSource {
            slot,
            finished,
            buffer: vec![0; HOOK_BATCH_SAMPLES],
            buffer_pos: HOOK_BATCH_SAMPLES, // render on first pull
        }
    }

    fn refill(&mut self) {
        // Clone out of the slot so the hook runs without the slot lock held
        let hook = self.slot.lock().clone();
        match hook {
            Some(hook) => hook.render(&mut self.buffer),
            None => self.buffer.fill(0),
        }
        self.buffer_pos = 0;
    }
}

impl Iterator for HookSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }
        if self.buffer_pos >= self.buffer.len() {
            self.refill();
        }
        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

impl Source for HookSource {
    fn current_frame_len(&self) -> Option<usize> {
        let remaining = self.buffer.len().saturating_sub(self.buffer_pos);
        Some(if remaining == 0 {
            self.buffer.len()
        } else {
            remaining
        })
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        TARGET_SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
