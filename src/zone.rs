//! Tagged sample allocation
//!
//! Buffers produced by this crate (resampled chunks, inflated containers)
//! are allocated through a [`SampleZone`] under a purge tag so the owning
//! asset cache can see how much memory each class of asset holds and reclaim
//! it when the class is flushed.

use parking_lot::Mutex;

/// Purge class of a zone allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeTag {
    /// Sound-effect data
    Sound,
    /// Music data
    Music,
}

impl PurgeTag {
    fn index(self) -> usize {
        match self {
            PurgeTag::Sound => 0,
            PurgeTag::Music => 1,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TagUsage {
    bytes: usize,
    blocks: usize,
}

/// Byte-accounted allocator shared with the asset cache
#[derive(Debug, Default)]
pub struct SampleZone {
    usage: Mutex<[TagUsage; 2]>,
}

impl SampleZone {
    /// Create an empty zone
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed 16-bit sample buffer of `len` samples
    pub fn alloc_samples(&self, len: usize, tag: PurgeTag) -> Vec<i16> {
        let buffer = vec![0; len];
        self.charge(buffer.capacity() * std::mem::size_of::<i16>(), tag);
        buffer
    }

    /// Reserve capacity for `len` samples without initialising them
    ///
    /// The buffer must not grow past its capacity before it is freed.
    pub fn reserve_samples(&self, len: usize, tag: PurgeTag) -> Vec<i16> {
        let buffer = Vec::with_capacity(len);
        self.charge(buffer.capacity() * std::mem::size_of::<i16>(), tag);
        buffer
    }

    /// Allocate a zeroed byte buffer
    pub fn alloc_bytes(&self, len: usize, tag: PurgeTag) -> Vec<u8> {
        let buffer = vec![0; len];
        self.charge(buffer.capacity(), tag);
        buffer
    }

    /// Return a sample buffer to the zone
    pub fn free_samples(&self, buffer: Vec<i16>, tag: PurgeTag) {
        self.refund(buffer.capacity() * std::mem::size_of::<i16>(), tag);
    }

    /// Return a byte buffer to the zone
    pub fn free_bytes(&self, buffer: Vec<u8>, tag: PurgeTag) {
        self.refund(buffer.capacity(), tag);
    }

    /// Return `bytes` previously charged under `tag` whose buffer has
    /// already changed hands
    pub fn release(&self, bytes: usize, tag: PurgeTag) {
        self.refund(bytes, tag);
    }

    /// Bytes currently held under `tag`
    pub fn bytes_in_use(&self, tag: PurgeTag) -> usize {
        self.usage.lock()[tag.index()].bytes
    }

    /// Live allocations under `tag`
    pub fn blocks_in_use(&self, tag: PurgeTag) -> usize {
        self.usage.lock()[tag.index()].blocks
    }

    /// Forget every allocation under `tag`; returns the bytes released
    pub fn purge(&self, tag: PurgeTag) -> usize {
        let mut usage = self.usage.lock();
        std::mem::take(&mut usage[tag.index()]).bytes
    }

    fn charge(&self, bytes: usize, tag: PurgeTag) {
        let mut usage = self.usage.lock();
        let entry = &mut usage[tag.index()];
        entry.bytes += bytes;
        entry.blocks += 1;
    }

    fn refund(&self, bytes: usize, tag: PurgeTag) {
        let mut usage = self.usage.lock();
        let entry = &mut usage[tag.index()];
        entry.bytes = entry.bytes.saturating_sub(bytes);
        entry.blocks = entry.blocks.saturating_sub(1);
    }
}
