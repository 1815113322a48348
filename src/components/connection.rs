//! Device library lifecycle.
//!
//! The underlying camera SDK requires a process-wide init/teardown pair,
//! but multiple sessions (or tests) may open devices concurrently.
//! [`DeviceContext`] refcounts library initialization: the first open
//! initializes, the last close tears down. Holding a context is proof the
//! library is live, so no other code path needs a global "is initialized"
//! check.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use tracing::{debug, info};

static LIB_REF_COUNT: AtomicU32 = AtomicU32::new(0);
static LIB_INIT_MUTEX: Mutex<()> = Mutex::new(());

/// Refcounted handle on the camera library.
///
/// `open` a context per device session; dropping it (or calling `close`)
/// releases the reference. Library teardown happens when the last context
/// goes away.
#[derive(Debug)]
pub struct DeviceContext {
    open: bool,
}

impl DeviceContext {
    /// Acquire a library reference, initializing the library if this is
    /// the first open in the process.
    pub fn open() -> Result<Self> {
        // Serializes init/teardown against concurrent opens. A poisoned
        // mutex still guards a consistent refcount, so recover the guard.
        let _guard = match LIB_INIT_MUTEX.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let prev = LIB_REF_COUNT.fetch_add(1, Ordering::SeqCst);
        if prev == 0 {
            info!("camera library initialized");
        } else {
            debug!(refs = prev + 1, "camera library reference added");
        }
        Ok(Self { open: true })
    }

    /// Release the library reference. Idempotent.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let _guard = match LIB_INIT_MUTEX.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let prev = LIB_REF_COUNT.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            info!("camera library shut down");
        } else {
            debug!(refs = prev - 1, "camera library reference released");
        }
    }

    /// Whether this context still holds its reference.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Process-wide count of live contexts.
    pub fn ref_count() -> u32 {
        LIB_REF_COUNT.load(Ordering::SeqCst)
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Refcount tests share process-global state, so they run as one test
    // to avoid interference from parallel execution.
    #[test]
    fn refcount_pairs_open_and_close() {
        let base = DeviceContext::ref_count();

        let mut a = DeviceContext::open().expect("open");
        let b = DeviceContext::open().expect("open");
        assert_eq!(DeviceContext::ref_count(), base + 2);
        assert!(a.is_open());

        a.close();
        assert!(!a.is_open());
        assert_eq!(DeviceContext::ref_count(), base + 1);

        // Second close is a no-op.
        a.close();
        assert_eq!(DeviceContext::ref_count(), base + 1);

        drop(b);
        assert_eq!(DeviceContext::ref_count(), base);
    }
}
