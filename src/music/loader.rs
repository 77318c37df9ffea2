use super::loop_point::{parse_loop_point, LoopMetadata};
use crate::chiptune::{ChiptuneLibrary, ChiptuneSession, Equalizer};
use crate::compression::unpack_gzip;
use crate::config::{Capabilities, MixerConfig};
use crate::format::{ContainerKind, ContainerSniffer};
use crate::transport::{AudioTransport, MusicKind, StreamHandle};
use crate::zone::{PurgeTag, SampleZone};
use crate::{Result, SoundError};
use std::sync::Arc;
use tracing::{debug, error};

/// Music ready for the playback controller
#[derive(Debug)]
pub enum LoadedMusic {
    /// Stream decoded by the transport
    Stream {
        /// Transport handle
        handle: StreamHandle,
        /// Kind reported by the transport
        kind: MusicKind,
        /// Parsed loop start
        loop_point: LoopMetadata,
    },
    /// Live chiptune session positioned at track 0
    Chiptune(ChiptuneSession),
}

impl LoadedMusic {
    /// Kind of the loaded music
    pub fn kind(&self) -> MusicKind {
        match self {
            LoadedMusic::Stream { kind, .. } => *kind,
            LoadedMusic::Chiptune(_) => MusicKind::Chiptune,
        }
    }
}

/// Classifies music bytes and opens them on the right backend
pub struct MusicLoader {
    capabilities: Capabilities,
    equalizer: Equalizer,
    max_decompressed_size: usize,
    library: Option<Arc<dyn ChiptuneLibrary>>,
}

impl std::fmt::Debug for MusicLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicLoader")
            .field("capabilities", &self.capabilities)
            .field("has_library", &self.library.is_some())
            .finish_non_exhaustive()
    }
}

impl MusicLoader {
    /// Loader without a chiptune library
    pub fn new(config: &MixerConfig) -> Self {
        MusicLoader {
            capabilities: config.capabilities,
            equalizer: config.equalizer,
            max_decompressed_size: config.max_decompressed_size,
            library: None,
        }
    }

    /// Attach a chiptune emulation library
    pub fn with_library(mut self, library: Arc<dyn ChiptuneLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    /// Open `data` as music
    ///
    /// Gzip and chiptune failures fall through to the transport's stream
    /// decoder. Loop points are only parsed for transport streams.
    pub fn load(
        &self,
        data: &[u8],
        transport: &mut dyn AudioTransport,
        zone: &SampleZone,
    ) -> Result<LoadedMusic> {
        let sniffer = ContainerSniffer::for_music(self.capabilities, self.library.as_deref());
        match sniffer.classify(data) {
            ContainerKind::Unrecognized => return Err(SoundError::FormatUnrecognized),
            ContainerKind::GzipChiptune => {
                if !self.capabilities.gzip_chiptune() {
                    error!("Cannot decompress gzip music: gzip support is disabled");
                    return Err(SoundError::FormatUnrecognized);
                }
                if let Some(library) = sniffer.library() {
                    let opened = unpack_gzip(
                        data,
                        zone,
                        PurgeTag::Music,
                        self.max_decompressed_size,
                        |inflated| ChiptuneSession::open_music(library, inflated, self.equalizer),
                    );
                    match opened {
                        Ok(session) => return Ok(LoadedMusic::Chiptune(session)),
                        Err(e) => debug!("Gzip chiptune music not usable: {}", e),
                    }
                }
            }
            ContainerKind::RawChiptune => {
                if let Some(library) = sniffer.library() {
                    match ChiptuneSession::open_music(library, data, self.equalizer) {
                        Ok(session) => return Ok(LoadedMusic::Chiptune(session)),
                        Err(e) => error!("Chiptune error: {}", e),
                    }
                }
            }
            ContainerKind::LegacySample | ContainerKind::GenericContainer => {}
        }
        self.load_stream(data, transport)
    }

    fn load_stream(&self, data: &[u8], transport: &mut dyn AudioTransport) -> Result<LoadedMusic> {
        let handle = transport.load_stream(data).map_err(|e| {
            error!("Failed to load music stream: {}", e);
            match e {
                SoundError::TransportLoadFailed(_) => e,
                other => SoundError::TransportLoadFailed(other.to_string()),
            }
        })?;
        let loop_point = parse_loop_point(data);
        let kind = transport.stream_kind(handle);
        debug!(
            "Loaded {:?} music stream, loop point {:.3}s",
            kind, loop_point.seconds
        );
        Ok(LoadedMusic::Stream {
            handle,
            kind,
            loop_point,
        })
    }
}
