//! Decoded sound-effect buffers
//!
//! A [`DecodedChunk`] is interleaved 16-bit stereo PCM at 44100 Hz. Each
//! chunk remembers who allocated its samples so release is a plain dispatch
//! on [`ChunkOwner`] instead of a guess.

use crate::zone::{PurgeTag, SampleZone};
use std::sync::Arc;

/// Bytes per stereo 16-bit frame
pub const BYTES_PER_FRAME: usize = 4;

/// Allocator responsible for a chunk's sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOwner {
    /// Resampler output charged to the sample zone under a purge tag
    Zone(PurgeTag),
    /// Buffer produced by the generic decoding library
    Decoder,
    /// Buffer rendered by a one-shot chiptune session
    Emulator,
}

/// Playable 16-bit stereo PCM
///
/// Not `Clone`: a chunk is released exactly once. Voices share the samples
/// through [`DecodedChunk::shared_samples`].
#[derive(Debug)]
pub struct DecodedChunk {
    samples: Arc<Vec<i16>>,
    owner: ChunkOwner,
    charged: usize,
}

impl DecodedChunk {
    /// Wrap a resampled buffer that was allocated from the sample zone
    pub(crate) fn from_zone(samples: Vec<i16>, tag: PurgeTag) -> Self {
        let charged = samples.capacity() * std::mem::size_of::<i16>();
        Self::build(samples, ChunkOwner::Zone(tag), charged)
    }

    /// Wrap a buffer produced by a decoder or emulator
    pub fn new(samples: Vec<i16>, owner: ChunkOwner) -> Self {
        Self::build(samples, owner, 0)
    }

    fn build(mut samples: Vec<i16>, owner: ChunkOwner, charged: usize) -> Self {
        // A dangling half frame cannot be played; keep whole frames only.
        if samples.len() % 2 != 0 {
            samples.pop();
        }
        DecodedChunk {
            samples: Arc::new(samples),
            owner,
            charged,
        }
    }

    /// Interleaved left/right samples
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Shared handle to the samples for handing to a transport voice
    pub fn shared_samples(&self) -> Arc<Vec<i16>> {
        Arc::clone(&self.samples)
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Buffer length in bytes (`frames * 4`)
    pub fn byte_len(&self) -> usize {
        self.frames() * BYTES_PER_FRAME
    }

    /// Playback length in seconds at 44100 Hz
    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / crate::TARGET_SAMPLE_RATE as f32
    }

    /// Who allocated the samples
    pub fn owner(&self) -> ChunkOwner {
        self.owner
    }

    /// True for a chunk with no audio
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Release the chunk through the allocator that produced it
    pub fn release(self, zone: &SampleZone) {
        match self.owner {
            ChunkOwner::Zone(tag) => zone.release(self.charged, tag),
            ChunkOwner::Decoder | ChunkOwner::Emulator => {}
        }
    }
}
