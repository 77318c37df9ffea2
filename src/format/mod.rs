//! Container sniffing
//!
//! Decides which decode path an opaque asset takes. The order is fixed:
//!
//! 1. legacy sample lump (version field == 3)
//! 2. gzip-wrapped chiptune container (`1F 8B`)
//! 3. raw chiptune container (library accepts the bytes)
//! 4. generic container, left to the decoding library
//!
//! The legacy header is not self-describing, so its version check always
//! runs first and is the only guard against misreading other formats.

pub mod legacy;

pub use legacy::{LegacyHeader, LEGACY_FORMAT_VERSION, LEGACY_HEADER_LEN};

use crate::chiptune::ChiptuneLibrary;
use crate::config::Capabilities;

/// Gzip stream magic bytes
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Decode path chosen for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Legacy 8-bit mono sample lump
    LegacySample,
    /// Gzip-wrapped chiptune container
    GzipChiptune,
    /// Chiptune container the library opens directly
    RawChiptune,
    /// Anything else; the generic decoder gets a try
    GenericContainer,
    /// Nothing to decode
    Unrecognized,
}

/// True if `data` starts with the gzip magic
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= GZIP_MAGIC.len() && data[..2] == GZIP_MAGIC
}

/// Stateless classifier over asset bytes
#[derive(Clone, Copy)]
pub struct ContainerSniffer<'a> {
    library: Option<&'a dyn ChiptuneLibrary>,
    legacy: bool,
}

impl<'a> ContainerSniffer<'a> {
    /// Sniffer for sound-effect lumps
    ///
    /// The chiptune steps only run when `capabilities` enables chiptune
    /// support and a library is present.
    pub fn new(capabilities: Capabilities, library: Option<&'a dyn ChiptuneLibrary>) -> Self {
        ContainerSniffer {
            library: library.filter(|_| capabilities.chiptune()),
            legacy: true,
        }
    }

    /// Sniffer for music streams, which never carry legacy sample headers
    pub fn for_music(capabilities: Capabilities, library: Option<&'a dyn ChiptuneLibrary>) -> Self {
        ContainerSniffer {
            legacy: false,
            ..Self::new(capabilities, library)
        }
    }

    /// Chiptune library in use, if chiptune support is live
    pub fn library(&self) -> Option<&'a dyn ChiptuneLibrary> {
        self.library
    }

    /// Classify `data`
    pub fn classify(&self, data: &[u8]) -> ContainerKind {
        if data.is_empty() {
            return ContainerKind::Unrecognized;
        }
        if self.legacy && LegacyHeader::is_legacy(data) {
            return ContainerKind::LegacySample;
        }
        if let Some(library) = self.library {
            if is_gzip(data) {
                return ContainerKind::GzipChiptune;
            }
            if library.probe(data) {
                return ContainerKind::RawChiptune;
            }
        }
        ContainerKind::GenericContainer
    }
}
