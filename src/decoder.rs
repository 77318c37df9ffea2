//! Generic container decoding
//!
//! Anything the sniffer cannot place goes to a [`ChunkDecoder`]. The default
//! implementation uses rodio's format probing (WAV, OGG/Vorbis, FLAC, MP3)
//! and converts the result to 16-bit stereo at 44100 Hz.

use crate::chunk::{ChunkOwner, DecodedChunk};
use crate::{Result, SoundError, OUTPUT_CHANNELS, TARGET_SAMPLE_RATE};
use rodio::source::UniformSourceIterator;
use rodio::Decoder;
use std::io::Cursor;
use tracing::debug;

/// Decoder for containers not handled by the sniffer's own paths
pub trait ChunkDecoder: Send + Sync {
    /// Decode a whole asset into a playable chunk
    ///
    /// Returns [`SoundError::FormatUnrecognized`] when the bytes are not a
    /// container the decoder understands.
    fn decode(&self, data: &[u8]) -> Result<DecodedChunk>;
}

/// rodio-backed decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioChunkDecoder;

impl RodioChunkDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        RodioChunkDecoder
    }
}

impl ChunkDecoder for RodioChunkDecoder {
    fn decode(&self, data: &[u8]) -> Result<DecodedChunk> {
        let source = Decoder::new(Cursor::new(data.to_vec())).map_err(|e| {
            debug!("Generic decode rejected {} bytes: {}", data.len(), e);
            SoundError::FormatUnrecognized
        })?;
        let uniform: UniformSourceIterator<_, i16> =
            UniformSourceIterator::new(source, OUTPUT_CHANNELS, TARGET_SAMPLE_RATE);
        let samples: Vec<i16> = uniform.collect();
        Ok(DecodedChunk::new(samples, ChunkOwner::Decoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_stereo_wav() {
        let samples: Vec<i16> = (0..200).map(|i| (i * 10) as i16).collect();
        let data = wav(44_100, 2, &samples);
        let chunk = RodioChunkDecoder::new().decode(&data).unwrap();
        assert_eq!(chunk.owner(), ChunkOwner::Decoder);
        assert_eq!(chunk.frames(), 100);
        assert_eq!(chunk.samples(), samples.as_slice());
    }

    #[test]
    fn test_decode_mono_wav_duplicates_channels() {
        let samples = vec![1000i16; 50];
        let data = wav(44_100, 1, &samples);
        let chunk = RodioChunkDecoder::new().decode(&data).unwrap();
        assert_eq!(chunk.frames(), 50);
        for frame in chunk.samples().chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn test_garbage_unrecognized() {
        let result = RodioChunkDecoder::new().decode(b"definitely not audio");
        assert!(matches!(result, Err(SoundError::FormatUnrecognized)));
    }
}
