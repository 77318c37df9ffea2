//! Legacy sample rate conversion
//!
//! Converts unsigned 8-bit mono samples at the lump's declared rate into
//! interleaved signed 16-bit stereo at 44100 Hz.
//!
//! - 44100 Hz: one frame per source sample
//! - 22050 Hz: two identical frames per source sample
//! - 11025 Hz: four identical frames per source sample
//! - anything else: 16.16 fixed-point stepping (see [`convert_fractional`])
//!
//! Every path checks up front that the output byte length fits in 32 bits.
//! Wrapping there would under-allocate and the conversion would then write
//! past the end of the buffer.

use crate::chunk::DecodedChunk;
use crate::format::LegacyHeader;
use crate::zone::{PurgeTag, SampleZone};
use crate::{Result, SoundError, TARGET_SAMPLE_RATE};
use tracing::debug;

/// Fractional bits of the fixed-point step accumulator
pub const FRACBITS: u32 = 16;

/// 1.0 in 16.16 fixed point
pub const FRACUNIT: u32 = 1 << FRACBITS;

/// Widen an unsigned 8-bit sample (bias 128) to signed 16-bit
#[inline]
pub fn widen(sample: u8) -> i16 {
    (i16::from(sample) - 0x80) << 8
}

/// Number of output frames for `sample_count` source samples at `rate`
///
/// Fails with [`SoundError::CapacityOverflow`] when `frames * 4` bytes would
/// not fit in a `u32`.
pub fn output_frames(rate: u16, sample_count: u32) -> Result<u32> {
    let count = u64::from(sample_count);
    let overflow = |frames: u64| SoundError::CapacityOverflow {
        requested: frames * 4,
    };
    let frames = match u32::from(rate) {
        44_100 => {
            if sample_count >= u32::MAX >> 2 {
                return Err(overflow(count));
            }
            count
        }
        22_050 => {
            if sample_count >= u32::MAX >> 3 {
                return Err(overflow(count << 1));
            }
            count << 1
        }
        11_025 => {
            if sample_count >= u32::MAX >> 4 {
                return Err(overflow(count << 2));
            }
            count << 2
        }
        0 => return Err(SoundError::InvalidSampleRate(rate)),
        other => {
            let ratio = (u64::from(TARGET_SAMPLE_RATE) << FRACBITS) / u64::from(other);
            let frames = if ratio & u64::from(FRACUNIT - 1) == 0 {
                // other exact multiples of the source rate
                count * (ratio >> FRACBITS)
            } else {
                // +1 counters truncation of the fractional ratio
                count * u64::from(TARGET_SAMPLE_RATE) / u64::from(other) + 1
            };
            if frames >= u64::from(u32::MAX >> 2) {
                return Err(overflow(frames));
            }
            frames
        }
    };
    Ok(frames as u32)
}

/// Convert a whole legacy lump into a zone-owned chunk
///
/// The declared sample count is checked for overflow before anything is
/// allocated; conversion then uses at most the samples actually present.
pub fn convert_legacy(data: &[u8], zone: &SampleZone, tag: PurgeTag) -> Result<DecodedChunk> {
    let (header, payload) = LegacyHeader::parse(data).ok_or(SoundError::FormatUnrecognized)?;
    output_frames(header.sample_rate, header.sample_count)?;

    let available = payload.len().min(header.sample_count as usize);
    if available < header.sample_count as usize {
        debug!(
            "Legacy lump declares {} samples but carries {}",
            header.sample_count, available
        );
    }
    let source = &payload[..available];
    let frames = output_frames(header.sample_rate, available as u32)?;

    let mut out = zone.reserve_samples(frames as usize * 2, tag);
    convert_samples(header.sample_rate, source, &mut out);
    Ok(DecodedChunk::from_zone(out, tag))
}

/// Convert `source` at `rate` Hz, appending stereo frames to `out`
pub fn convert_samples(rate: u16, source: &[u8], out: &mut Vec<i16>) {
    match u32::from(rate) {
        44_100 => repeat_frames(source, 1, out),
        22_050 => repeat_frames(source, 2, out),
        11_025 => repeat_frames(source, 4, out),
        0 => {}
        _ => convert_fractional(rate, source, out),
    }
}

fn repeat_frames(source: &[u8], times: usize, out: &mut Vec<i16>) {
    for &sample in source {
        let o = widen(sample);
        for _ in 0..times {
            out.push(o); // left
            out.push(o); // right
        }
    }
}

/// Arbitrary-rate conversion with a 16.16 step accumulator
///
/// The step is `floor(rate * 65536 / 44100) + 1`; the `+1` biases it
/// upwards so truncation can never make the output outgrow
/// [`output_frames`]. Frames of the current sample are emitted while the
/// accumulator is below 1.0, then whole units are rolled over, advancing one
/// source sample per unit.
///
/// The bias also makes the output run short by up to `1/step` of a frame
/// per source sample, so the frame count is only within one of
/// `n * 44100 / rate` for short lumps. 44100 samples at 8 kHz come out
/// 7 frames short.
pub fn convert_fractional(rate: u16, source: &[u8], out: &mut Vec<i16>) {
    if rate == 0 {
        return;
    }
    let step = (u32::from(rate) << FRACBITS) / TARGET_SAMPLE_RATE + 1;
    let mut frac: u32 = 0;
    let mut i = 0;
    while i < source.len() {
        let o = widen(source[i]);
        while frac < FRACUNIT {
            out.push(o);
            out.push(o);
            frac += step;
        }
        loop {
            i += 1;
            frac -= FRACUNIT;
            if frac < FRACUNIT {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkOwner;

    fn lump(rate: u16, samples: &[u8]) -> Vec<u8> {
        lump_with_count(rate, samples.len() as u32, samples)
    }

    fn lump_with_count(rate: u16, count: u32, samples: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&rate.to_le_bytes());
        data.extend_from_slice(&count.to_le_bytes());
        data.extend_from_slice(samples);
        data
    }

    fn convert(rate: u16, samples: &[u8]) -> DecodedChunk {
        let zone = SampleZone::new();
        convert_legacy(&lump(rate, samples), &zone, PurgeTag::Sound).unwrap()
    }

    #[test]
    fn test_widen() {
        assert_eq!(widen(0x80), 0);
        assert_eq!(widen(0xFF), 127 << 8);
        assert_eq!(widen(0x00), i16::MIN);
        assert_eq!(widen(0x81), 256);
    }

    #[test]
    fn test_fast_path_frame_counts() {
        let source: Vec<u8> = (0..=255).collect();
        for (rate, factor) in [(44_100u16, 1usize), (22_050, 2), (11_025, 4)] {
            let chunk = convert(rate, &source);
            assert_eq!(chunk.frames(), source.len() * factor, "rate {rate}");
            for frame in chunk.samples().chunks(2) {
                assert_eq!(frame[0], frame[1]);
            }
        }
    }

    #[test]
    fn test_pattern_widened_in_both_channels() {
        let pattern = [0x00u8, 0x40, 0x80, 0xC0, 0xFF];
        let source: Vec<u8> = pattern.iter().copied().cycle().take(50).collect();
        let chunk = convert(22_050, &source);
        for (i, frame) in chunk.samples().chunks(2).enumerate() {
            let expected = ((i16::from(source[i / 2])) - 128) << 8;
            assert_eq!(frame, &[expected, expected]);
        }
    }

    // Short lumps only; the step bias drifts linearly with length
    #[test]
    fn test_fractional_frame_count_within_one() {
        let cases = [
            (8_000u16, 800usize),
            (8_000, 1_000),
            (48_000, 1_000),
            (32_000, 500),
            (6_000, 50),
        ];
        for (rate, n) in cases {
            let source = vec![0x90u8; n];
            let chunk = convert(rate, &source);
            let expected = n as f64 * 44_100.0 / f64::from(rate);
            let diff = (chunk.frames() as f64 - expected).abs();
            assert!(diff <= 1.0, "rate {rate}: {} frames vs {expected}", chunk.frames());
        }
    }

    #[test]
    fn test_fractional_drift_on_long_input() {
        for rate in [8_000u16, 48_000] {
            let n = 44_100usize;
            let chunk = convert(rate, &vec![0x90u8; n]);
            let expected = n as f64 * 44_100.0 / f64::from(rate);
            let short = expected - chunk.frames() as f64;
            assert!(short >= -1.0, "rate {rate}: {} frames vs {expected}", chunk.frames());
            assert!(short / expected < 1e-4, "rate {rate}: {short} frames short");
        }
        // 243101.25 expected
        assert_eq!(convert(8_000, &vec![0x90u8; 44_100]).frames(), 243_094);
    }

    #[test]
    fn test_fractional_never_exceeds_allocation() {
        for rate in [4_000u16, 7_350, 14_700, 16_000, 30_000, 48_000, 65_535] {
            let source = vec![0x80u8; 777];
            let mut out = Vec::new();
            convert_samples(rate, &source, &mut out);
            let frames = output_frames(rate, 777).unwrap() as usize;
            assert!(out.len() / 2 <= frames, "rate {rate}");
        }
    }

    #[test]
    fn test_integer_multiple_rate() {
        // 14700 * 3 == 44100
        assert_eq!(output_frames(14_700, 100).unwrap(), 300);
        let chunk = convert(14_700, &[0x80; 100]);
        assert_eq!(chunk.frames(), 300);
    }

    #[test]
    fn test_capacity_guard_fast_paths() {
        let cases = [
            (44_100u16, u32::MAX >> 2),
            (22_050, u32::MAX >> 3),
            (11_025, u32::MAX >> 4),
        ];
        let zone = SampleZone::new();
        for (rate, count) in cases {
            let data = lump_with_count(rate, count, &[0x80; 16]);
            let result = convert_legacy(&data, &zone, PurgeTag::Sound);
            assert!(
                matches!(result, Err(SoundError::CapacityOverflow { .. })),
                "rate {rate}"
            );
            // one below the limit is accepted
            assert!(output_frames(rate, count - 1).is_ok());
        }
        assert_eq!(zone.bytes_in_use(PurgeTag::Sound), 0);
    }

    #[test]
    fn test_capacity_guard_fractional() {
        assert!(matches!(
            output_frames(8_000, u32::MAX / 4),
            Err(SoundError::CapacityOverflow { .. })
        ));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let zone = SampleZone::new();
        let result = convert_legacy(&lump(0, &[1, 2, 3]), &zone, PurgeTag::Sound);
        assert!(matches!(result, Err(SoundError::InvalidSampleRate(0))));
    }

    #[test]
    fn test_short_payload_clamped() {
        let zone = SampleZone::new();
        let data = lump_with_count(44_100, 10, &[0x80; 4]);
        let chunk = convert_legacy(&data, &zone, PurgeTag::Sound).unwrap();
        assert_eq!(chunk.frames(), 4);
        assert_eq!(chunk.owner(), ChunkOwner::Zone(PurgeTag::Sound));
        chunk.release(&zone);
        assert_eq!(zone.bytes_in_use(PurgeTag::Sound), 0);
    }
}
