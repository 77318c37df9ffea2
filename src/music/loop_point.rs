//! Loop-point metadata
//!
//! Music streams may carry a loop start in their embedded text tags:
//!
//! - `LOOPPOINT=<n>`: sample offset, assumed to be at 44100 Hz, converted as
//!   `(44.1 + n) / 44100` seconds
//! - `LOOPMS=<n>`: milliseconds, converted as `n / 1000` seconds
//!
//! The whole buffer is scanned. A `LOOP` that is followed by neither suffix
//! does not stop the scan, and when several markers are present the last
//! one wins.

const LOOP_KEY: &[u8] = b"LOOP";
const POINT_KEY: &[u8] = b"POINT=";
const MS_KEY: &[u8] = b"MS=";

/// Unit the loop point was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopUnit {
    /// No marker found
    #[default]
    None,
    /// `LOOPPOINT=` sample offset
    Samples,
    /// `LOOPMS=` milliseconds
    Milliseconds,
}

/// Loop start parsed from a music stream
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopMetadata {
    /// Loop start in seconds; 0.0 loops from the start
    pub seconds: f32,
    /// Marker the value came from
    pub unit: LoopUnit,
}

impl LoopMetadata {
    /// True when playback should restart from the very beginning
    pub fn is_zero(&self) -> bool {
        self.seconds == 0.0
    }
}

/// Scan `data` for `LOOPPOINT=` / `LOOPMS=` markers
pub fn parse_loop_point(data: &[u8]) -> LoopMetadata {
    let mut found = LoopMetadata::default();
    let mut p = 0;
    while p < data.len() {
        if !data[p..].starts_with(LOOP_KEY) {
            p += 1;
            continue;
        }
        p += LOOP_KEY.len();
        let rest = &data[p..];
        if rest.starts_with(POINT_KEY) {
            p += POINT_KEY.len();
            let samples = f64::from(atoi(&data[p..]));
            found = LoopMetadata {
                seconds: ((44.1 + samples) / 44_100.0) as f32,
                unit: LoopUnit::Samples,
            };
        } else if rest.starts_with(MS_KEY) {
            p += MS_KEY.len();
            let millis = f64::from(atoi(&data[p..]));
            found = LoopMetadata {
                seconds: (millis / 1000.0) as f32,
                unit: LoopUnit::Milliseconds,
            };
        }
    }
    found
}

/// C-style `atoi`: leading whitespace, optional sign, decimal digits;
/// anything unparsable is 0, out-of-range values saturate
fn atoi(text: &[u8]) -> i32 {
    let mut i = 0;
    while i < text.len() && matches!(text[i], b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C) {
        i += 1;
    }
    let negative = match text.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };
    let mut value: i64 = 0;
    while let Some(&c) = text.get(i) {
        if !c.is_ascii_digit() {
            break;
        }
        value = (value * 10 + i64::from(c - b'0')).min(i64::from(i32::MAX) + 1);
        i += 1;
    }
    if negative {
        value = -value;
    }
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
