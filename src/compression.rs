//! Gzip container unpacking
//!
//! Compressed chiptune containers are plain gzip streams whose last four
//! bytes (the gzip `ISIZE` trailer, little-endian) give the inflated size.
//! The unpacker allocates exactly that much from the sample zone, inflates
//! to the end of the stream, and hands the bytes to a consumer.
//!
//! The inflated buffer is always returned to the zone afterwards, whether
//! the consumer succeeded or any step failed. Failures are reported with a
//! zlib-style error class so they can be logged and the asset skipped.

use crate::zone::{PurgeTag, SampleZone};
use crate::{Result, SoundError};
use flate2::bufread::GzDecoder;
use std::io::{ErrorKind, Read};
use tracing::{debug, error};

/// Length of the trailing size field
const SIZE_TRAILER_LEN: usize = 4;

/// Inflated size declared by the container's last four bytes
pub fn declared_size(data: &[u8]) -> Option<u32> {
    let start = data.len().checked_sub(SIZE_TRAILER_LEN)?;
    let mut trailer = [0u8; SIZE_TRAILER_LEN];
    trailer.copy_from_slice(&data[start..]);
    Some(u32::from_le_bytes(trailer))
}

/// zlib error class name for an I/O failure raised by the inflater
fn error_class(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::InvalidData => "Z_DATA_ERROR",
        ErrorKind::UnexpectedEof | ErrorKind::WriteZero => "Z_BUF_ERROR",
        ErrorKind::OutOfMemory => "Z_MEM_ERROR",
        _ => "Z_ERRNO",
    }
}

/// Inflate a gzip container into a zone buffer of its declared size
///
/// The caller owns the returned buffer and must give it back with
/// [`SampleZone::free_bytes`]; [`unpack_gzip`] does that automatically.
pub fn inflate_container(
    data: &[u8],
    zone: &SampleZone,
    tag: PurgeTag,
    max_size: usize,
) -> Result<Vec<u8>> {
    let declared = declared_size(data).ok_or_else(|| SoundError::DecompressionInitFailed {
        class: "Z_BUF_ERROR",
        message: format!("container of {} bytes has no size trailer", data.len()),
    })? as usize;
    if declared > max_size {
        return Err(SoundError::CapacityOverflow {
            requested: declared as u64,
        });
    }

    let mut decoder = GzDecoder::new(data);
    if decoder.header().is_none() {
        return Err(SoundError::DecompressionInitFailed {
            class: "Z_DATA_ERROR",
            message: "incorrect header check".into(),
        });
    }

    let mut inflated = zone.alloc_bytes(declared, tag);
    match inflate_into(&mut decoder, &mut inflated) {
        Ok(produced) => {
            if produced < declared {
                debug!(
                    "Gzip stream ended after {} of {} declared bytes",
                    produced, declared
                );
            }
            Ok(inflated)
        }
        Err(e) => {
            zone.free_bytes(inflated, tag);
            Err(e)
        }
    }
}

fn inflate_into<R: Read>(decoder: &mut R, out: &mut [u8]) -> Result<usize> {
    let failed = |e: std::io::Error| SoundError::DecompressionFailed {
        class: error_class(e.kind()),
        message: e.to_string(),
    };

    let mut filled = 0;
    while filled < out.len() {
        match decoder.read(&mut out[filled..]) {
            Ok(0) => return Ok(filled),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(failed(e)),
        }
    }

    // Output is full; the stream must end here.
    let mut probe = [0u8; 1];
    loop {
        match decoder.read(&mut probe) {
            Ok(0) => return Ok(filled),
            Ok(_) => {
                return Err(SoundError::DecompressionFailed {
                    class: "Z_BUF_ERROR",
                    message: "stream longer than its declared size".into(),
                })
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(failed(e)),
        }
    }
}

/// Inflate `data` and pass the bytes to `consume`
///
/// The inflated buffer is released before returning on every path.
pub fn unpack_gzip<T, F>(
    data: &[u8],
    zone: &SampleZone,
    tag: PurgeTag,
    max_size: usize,
    consume: F,
) -> Result<T>
where
    F: FnOnce(&[u8]) -> Result<T>,
{
    let inflated = match inflate_container(data, zone, tag, max_size) {
        Ok(inflated) => inflated,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };
    let result = consume(&inflated);
    zone.free_bytes(inflated, tag);
    result
}
