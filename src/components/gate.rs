//! Single-slot backpressure gate.
//!
//! At most one frame is in flight between the driver callback and the
//! dispatch worker. Frames arriving while the slot is busy are dropped at
//! the gate; the newest frame always wins once the slot frees up.

use std::sync::atomic::{AtomicBool, Ordering};

/// Lock-free admit/release pair over a single busy flag.
///
/// `try_admit` runs on the driver thread and never blocks. `release` is
/// called exactly once per successful admit, from the worker's tail.
#[derive(Debug, Default)]
pub struct BackpressureGate {
    busy: AtomicBool,
}

impl BackpressureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. Returns `false` without side effects when a prior
    /// frame is still in flight.
    pub fn try_admit(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Free the slot after the worker finishes.
    pub fn release(&self) {
        let was_busy = self.busy.swap(false, Ordering::AcqRel);
        debug_assert!(was_busy, "release without matching admit");
    }

    /// Whether a frame is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    #[test]
    fn second_admit_fails_until_release() {
        let gate = BackpressureGate::new();
        assert!(gate.try_admit());
        assert!(!gate.try_admit());
        assert!(gate.is_busy());
        gate.release();
        assert!(!gate.is_busy());
        assert!(gate.try_admit());
    }

    #[test]
    fn exactly_one_thread_wins_the_slot() {
        let gate = Arc::new(BackpressureGate::new());
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let winners = Arc::clone(&winners);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    if gate.try_admit() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread");
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(gate.is_busy());
    }
}
