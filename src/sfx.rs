//! Sound-effect resolution
//!
//! [`SfxResolver`] turns one sound-effect lump into a [`DecodedChunk`]:
//!
//! - legacy lumps go through the rate converter
//! - gzip and raw chiptune containers are rendered once through a transient
//!   session
//! - everything else, including chiptune data the library rejects, is
//!   handed to the generic decoder
//!
//! The resolver caches nothing. The caller owns each chunk and gives it back
//! with [`SfxResolver::release`].

use crate::chiptune::{ChiptuneLibrary, Equalizer, TransientSession};
use crate::chunk::DecodedChunk;
use crate::compression::unpack_gzip;
use crate::config::{Capabilities, MixerConfig};
use crate::decoder::{ChunkDecoder, RodioChunkDecoder};
use crate::format::{ContainerKind, ContainerSniffer};
use crate::resample::convert_legacy;
use crate::zone::{PurgeTag, SampleZone};
use crate::{Result, SoundError};
use std::sync::Arc;
use tracing::{debug, error};

/// Resolves sound-effect lumps into playable chunks
pub struct SfxResolver {
    capabilities: Capabilities,
    equalizer: Equalizer,
    max_decompressed_size: usize,
    library: Option<Arc<dyn ChiptuneLibrary>>,
    decoder: Box<dyn ChunkDecoder>,
    zone: Arc<SampleZone>,
}

impl std::fmt::Debug for SfxResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SfxResolver")
            .field("capabilities", &self.capabilities)
            .field("has_library", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

impl SfxResolver {
    /// Resolver with the rodio decoder, a private zone and no chiptune
    /// library
    pub fn new(config: &MixerConfig) -> Self {
        SfxResolver {
            capabilities: config.capabilities,
            equalizer: config.equalizer,
            max_decompressed_size: config.max_decompressed_size,
            library: None,
            decoder: Box::new(RodioChunkDecoder::new()),
            zone: Arc::new(SampleZone::new()),
        }
    }

    /// Attach a chiptune emulation library
    pub fn with_library(mut self, library: Arc<dyn ChiptuneLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    /// Replace the generic decoder
    pub fn with_decoder(mut self, decoder: Box<dyn ChunkDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Allocate converted samples from a shared zone
    pub fn with_zone(mut self, zone: Arc<SampleZone>) -> Self {
        self.zone = zone;
        self
    }

    /// Zone the resampler allocates from
    pub fn zone(&self) -> &Arc<SampleZone> {
        &self.zone
    }

    /// Decode one sound-effect lump
    pub fn resolve(&self, data: &[u8]) -> Result<DecodedChunk> {
        let sniffer = ContainerSniffer::new(self.capabilities, self.library.as_deref());
        match sniffer.classify(data) {
            ContainerKind::Unrecognized => Err(SoundError::FormatUnrecognized),
            ContainerKind::LegacySample => convert_legacy(data, &self.zone, PurgeTag::Sound),
            ContainerKind::GzipChiptune => {
                if !self.capabilities.gzip_chiptune() {
                    error!("Cannot decompress gzip sound: gzip support is disabled");
                    return Err(SoundError::FormatUnrecognized);
                }
                if let Some(library) = sniffer.library() {
                    match self.render_gzip(library, data) {
                        Ok(chunk) => return Ok(chunk),
                        Err(e) => debug!("Gzip chiptune sound not usable: {}", e),
                    }
                }
                self.decode_generic(data)
            }
            ContainerKind::RawChiptune => {
                if let Some(library) = sniffer.library() {
                    match self.render(library, data) {
                        Ok(chunk) => return Ok(chunk),
                        Err(e) => debug!("Chiptune sound not usable: {}", e),
                    }
                }
                self.decode_generic(data)
            }
            ContainerKind::GenericContainer => self.decode_generic(data),
        }
    }

    /// Give a chunk back to whichever allocator produced it
    pub fn release(&self, chunk: DecodedChunk) {
        chunk.release(&self.zone);
    }

    fn render(&self, library: &dyn ChiptuneLibrary, data: &[u8]) -> Result<DecodedChunk> {
        TransientSession::open(library, data, self.equalizer)?.render_one_shot()
    }

    fn render_gzip(&self, library: &dyn ChiptuneLibrary, data: &[u8]) -> Result<DecodedChunk> {
        unpack_gzip(
            data,
            &self.zone,
            PurgeTag::Sound,
            self.max_decompressed_size,
            |inflated| self.render(library, inflated),
        )
    }

    fn decode_generic(&self, data: &[u8]) -> Result<DecodedChunk> {
        self.decoder.decode(data)
    }
}
