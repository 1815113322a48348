//! Pipeline counters and throughput measurement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Point-in-time view of the pipeline counters.
///
/// `received == admitted + dropped` holds at every instant; `delivered`
/// trails `admitted` by the frames still in flight (at most one).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Raw frames presented by the driver.
    pub received: u64,
    /// Frames that won the backpressure gate.
    pub admitted: u64,
    /// Frames rejected at the gate or failed to decode.
    pub dropped: u64,
    /// Frames whose user handler completed without fault.
    pub delivered: u64,
    /// Smoothed frames-per-second over the meter window.
    pub fps: f64,
}

/// Monotonic frame accounting, shared between the driver callback and the
/// dispatch workers.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub received: AtomicU64,
    pub admitted: AtomicU64,
    pub dropped: AtomicU64,
    pub delivered: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all counters. Called on session start.
    pub fn reset(&self) {
        self.received.store(0, Ordering::Relaxed);
        self.admitted.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
    }

    /// Snapshot the counters together with a rate reading.
    pub fn snapshot(&self, fps: f64) -> PipelineStats {
        PipelineStats {
            received: self.received.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            fps,
        }
    }
}

#[derive(Debug)]
struct MeterWindow {
    count: u64,
    started: Instant,
}

/// Windowed frames-per-second meter.
///
/// Counts delivered frames and recomputes the rate each time the window
/// elapses; between recomputations `current_rate` returns the last value.
/// The default 2 s window smooths over per-frame jitter without hiding
/// rate changes for long.
#[derive(Debug)]
pub struct ThroughputMeter {
    window: Duration,
    state: Mutex<MeterWindow>,
    /// f64 bits of the last computed rate, readable without the lock.
    rate_bits: AtomicU64,
}

impl ThroughputMeter {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(MeterWindow {
                count: 0,
                started: Instant::now(),
            }),
            rate_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MeterWindow> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Count one delivered frame, recomputing the rate if the window has
    /// elapsed.
    pub fn record_frame(&self) {
        let mut state = self.lock();
        state.count += 1;
        let elapsed = state.started.elapsed();
        if elapsed >= self.window {
            let rate = state.count as f64 / elapsed.as_secs_f64();
            self.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
            state.count = 0;
            state.started = Instant::now();
        }
    }

    /// The most recently computed rate; 0.0 before the first full window.
    pub fn current_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    /// Begin a fresh measurement window. Called on session start.
    pub fn restart(&self) {
        let mut state = self.lock();
        state.count = 0;
        state.started = Instant::now();
        self.rate_bits.store(0f64.to_bits(), Ordering::Relaxed);
    }

    /// Zero the reported rate. Called on session stop.
    pub fn halt(&self) {
        self.rate_bits.store(0f64.to_bits(), Ordering::Relaxed);
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot() {
        let counters = PipelineCounters::new();
        counters.received.fetch_add(10, Ordering::Relaxed);
        counters.admitted.fetch_add(4, Ordering::Relaxed);
        counters.dropped.fetch_add(6, Ordering::Relaxed);
        counters.delivered.fetch_add(4, Ordering::Relaxed);

        let stats = counters.snapshot(12.5);
        assert_eq!(stats.received, stats.admitted + stats.dropped);
        assert_eq!(stats.delivered, 4);
        assert!((stats.fps - 12.5).abs() < f64::EPSILON);

        counters.reset();
        assert_eq!(counters.snapshot(0.0).received, 0);
    }

    #[test]
    fn rate_is_zero_before_first_window_elapses() {
        let meter = ThroughputMeter::new(Duration::from_secs(60));
        meter.record_frame();
        meter.record_frame();
        assert_eq!(meter.current_rate(), 0.0);
    }

    #[test]
    fn rate_computed_after_window() {
        let meter = ThroughputMeter::new(Duration::from_millis(20));
        for _ in 0..5 {
            meter.record_frame();
        }
        std::thread::sleep(Duration::from_millis(25));
        meter.record_frame();

        let rate = meter.current_rate();
        assert!(rate > 0.0, "rate should be computed, got {rate}");

        meter.halt();
        assert_eq!(meter.current_rate(), 0.0);
    }

    #[test]
    fn restart_discards_window_progress() {
        let meter = ThroughputMeter::new(Duration::from_millis(10));
        meter.record_frame();
        std::thread::sleep(Duration::from_millis(15));
        meter.record_frame();
        assert!(meter.current_rate() > 0.0);

        meter.restart();
        assert_eq!(meter.current_rate(), 0.0);
    }

    #[test]
    fn stats_serialize_to_json() {
        let stats = PipelineStats {
            received: 100,
            admitted: 40,
            dropped: 60,
            delivered: 40,
            fps: 19.5,
        };
        let json = serde_json::to_string(&stats).expect("serialize");
        assert!(json.contains("\"received\":100"));
        assert!(json.contains("\"fps\":19.5"));
    }
}
