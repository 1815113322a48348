//! Latest-frame cache.
//!
//! Pull-model access for consumers that only want the most recent frame
//! (preview rendering, snapshots). Older frames are simply replaced.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::components::frame::DecodedFrame;

/// Single-slot cache holding the newest delivered frame.
///
/// The internal mutex is only held for a pointer swap and is never held
/// across user code, so contention is negligible.
#[derive(Debug, Default)]
pub struct LatestFrameCache {
    slot: Mutex<Option<Arc<DecodedFrame>>>,
}

impl LatestFrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned mutex only means a panicking thread held it mid-swap;
    // the Option inside is still coherent, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, Option<Arc<DecodedFrame>>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the cached frame with a newer one.
    pub fn publish(&self, frame: Arc<DecodedFrame>) {
        *self.lock() = Some(frame);
    }

    /// Cheap handle to the most recent frame, `None` when nothing has been
    /// published since the last `clear`.
    pub fn snapshot(&self) -> Option<Arc<DecodedFrame>> {
        self.lock().clone()
    }

    /// Drop the cached frame. Called on session stop.
    pub fn clear(&self) {
        *self.lock() = None;
    }
}
