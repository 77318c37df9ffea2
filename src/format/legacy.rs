//! Legacy sample lump header
//!
//! Layout (little-endian):
//! - u16 format version, always 3
//! - u16 sample rate in Hz
//! - u32 sample count
//! - unsigned 8-bit mono samples

use nom::number::complete::{le_u16, le_u32};
use nom::sequence::tuple;
use nom::IResult;

/// The only version number a legacy sample lump carries
pub const LEGACY_FORMAT_VERSION: u16 = 3;

/// Size of the fixed header in bytes
pub const LEGACY_HEADER_LEN: usize = 8;

/// Header fields of a legacy 8-bit mono sample lump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyHeader {
    /// Source sample rate in Hz
    pub sample_rate: u16,
    /// Declared number of 8-bit samples
    pub sample_count: u32,
}

fn raw_header(input: &[u8]) -> IResult<&[u8], (u16, u16, u32)> {
    tuple((le_u16, le_u16, le_u32))(input)
}

impl LegacyHeader {
    /// Parse the header and return it with the sample payload
    ///
    /// Returns `None` unless the version field is exactly 3; any other value
    /// means the rate and count fields would be garbage.
    pub fn parse(data: &[u8]) -> Option<(LegacyHeader, &[u8])> {
        let (payload, (version, sample_rate, sample_count)) = raw_header(data).ok()?;
        if version != LEGACY_FORMAT_VERSION {
            return None;
        }
        Some((
            LegacyHeader {
                sample_rate,
                sample_count,
            },
            payload,
        ))
    }

    /// Quick check on the version field alone
    pub fn is_legacy(data: &[u8]) -> bool {
        Self::parse(data).is_some()
    }
}
