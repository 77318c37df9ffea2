//! Real-time output through rodio
//!
//! [`RodioTransport`] implements [`AudioTransport`](crate::AudioTransport)
//! on the default output device: one sink per sound-effect voice, one sink
//! for the music stream, and one endless sink that pulls the music hook.

mod audio_device;
mod sources;

pub use audio_device::RodioTransport;
