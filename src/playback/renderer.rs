//! Live chiptune render callback

use crate::chiptune::ChiptuneSession;
use crate::transport::MusicHook;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Highest music volume on the 0..=31 scale
pub const MAX_MUSIC_VOLUME: u8 = 31;

/// State shared between the controller and the audio callback
///
/// The session lock is the audio lock: every mutation of the session
/// happens under it, so the callback either sees a whole update or waits.
#[derive(Debug, Default)]
pub(crate) struct MusicShared {
    pub(crate) session: Mutex<Option<ChiptuneSession>>,
    pub(crate) paused: AtomicBool,
    pub(crate) volume: AtomicU8,
}

/// Render hook handed to the transport while chiptune music plays
#[derive(Debug, Clone)]
pub struct MusicRenderer {
    shared: Arc<MusicShared>,
}

impl MusicRenderer {
    pub(crate) fn new(shared: Arc<MusicShared>) -> Self {
        MusicRenderer { shared }
    }
}

/// Apply a 0..=31 music volume to rendered samples
///
/// Full volume is slightly louder than unity (`31 * 2 / 42`); results are
/// saturated to the i16 range.
pub fn scale_volume(out: &mut [i16], volume: u8) {
    let gain = i32::from(volume) * 2;
    for sample in out.iter_mut() {
        let scaled = i32::from(*sample) * gain / 42;
        *sample = scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
    }
}

impl MusicHook for MusicRenderer {
    fn render(&self, out: &mut [i16]) {
        let mut session = self.shared.session.lock();
        let Some(session) = session.as_mut() else {
            out.fill(0);
            return;
        };
        if self.shared.paused.load(Ordering::Acquire) || session.is_track_finished() {
            out.fill(0);
            return;
        }
        if let Err(e) = session.render_into(out) {
            trace!("Chiptune render failed: {}", e);
            out.fill(0);
            return;
        }
        scale_volume(out, self.shared.volume.load(Ordering::Relaxed));
    }
}
