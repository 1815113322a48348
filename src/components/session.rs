//! Acquisition session: wiring from driver callback to user code.
//!
//! The session owns the decode → gate → dispatch path. The driver-facing
//! callback runs decode and gate admission only (lock-free, non-blocking);
//! every admitted frame is handed to a detached blocking worker that runs
//! the user handler off the driver thread, then publishes, meters and
//! releases the gate in a guaranteed-execution tail.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::components::decoder::{decode, UnknownFormatPolicy};
use crate::components::features::{FeatureId, FeatureStore, FeatureTable, SESSION_REQUIRED};
use crate::components::frame::{DecodedFrame, RawFrameView, ReadoutDepth};
use crate::components::gate::BackpressureGate;
use crate::components::latest::LatestFrameCache;
use crate::components::stats::{PipelineCounters, PipelineStats, ThroughputMeter};
use crate::error::AcquisitionError;

/// Driver-side frame callback. Called once per captured frame on the
/// driver's thread; the view is invalid after the call returns.
pub type RawFrameHandler = Box<dyn FnMut(RawFrameView<'_>) + Send>;

/// User-side frame handler, run on a blocking worker per admitted frame.
/// May block; a panic is caught at the worker boundary and costs only
/// that frame.
pub type FrameHandler = Arc<dyn Fn(Arc<DecodedFrame>) + Send + Sync>;

/// Start/stop control over the device's streaming engine.
pub trait AcquisitionControl: Send + Sync {
    fn set_buffer_count(&self, count: u32) -> Result<(), AcquisitionError>;
    fn start_grabbing(&self) -> Result<(), AcquisitionError>;
    fn stop_grabbing(&self) -> Result<(), AcquisitionError>;
    fn is_grabbing(&self) -> bool;
}

/// Source of raw frame callbacks.
pub trait FrameSource: Send + Sync {
    /// Register the callback invoked per captured frame. Replaces any
    /// previously attached handler.
    fn attach(&self, handler: RawFrameHandler);
}

/// Everything a camera backend provides to the session.
pub trait CameraBackend: FeatureStore + AcquisitionControl + FrameSource + 'static {}

impl<T: FeatureStore + AcquisitionControl + FrameSource + 'static> CameraBackend for T {}

/// Session tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Driver-side frame buffers, handed to `set_buffer_count` on start.
    pub buffer_count: u32,
    /// What to do with unknown pixel-format codes.
    pub unknown_format_policy: UnknownFormatPolicy,
    /// Throughput meter window.
    pub fps_window: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_count: 3,
            unknown_format_policy: UnknownFormatPolicy::default(),
            fps_window: ThroughputMeter::DEFAULT_WINDOW,
        }
    }
}

/// The acquisition pipeline for one camera.
///
/// Idle → Capturing on [`start`](Self::start), back to Idle on
/// [`stop`](Self::stop). Both transitions are synchronous; neither is
/// called from the frame path.
pub struct AcquisitionSession<B: CameraBackend> {
    backend: Arc<B>,
    config: SessionConfig,
    capturing: AtomicBool,
    gate: Arc<BackpressureGate>,
    latest: Arc<LatestFrameCache>,
    counters: Arc<PipelineCounters>,
    meter: Arc<ThroughputMeter>,
    frame_tx: broadcast::Sender<Arc<DecodedFrame>>,
    handler: Mutex<Option<FrameHandler>>,
    features: Mutex<Option<FeatureTable>>,
}

impl<B: CameraBackend> AcquisitionSession<B> {
    pub fn new(backend: Arc<B>, config: SessionConfig) -> Self {
        let (frame_tx, _) = broadcast::channel(16);
        let meter = Arc::new(ThroughputMeter::new(config.fps_window));
        Self {
            backend,
            config,
            capturing: AtomicBool::new(false),
            gate: Arc::new(BackpressureGate::new()),
            latest: Arc::new(LatestFrameCache::new()),
            counters: Arc::new(PipelineCounters::new()),
            meter,
            frame_tx,
            handler: Mutex::new(None),
            features: Mutex::new(None),
        }
    }

    fn lock_handler(&self) -> MutexGuard<'_, Option<FrameHandler>> {
        match self.handler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_features(&self) -> MutexGuard<'_, Option<FeatureTable>> {
        match self.features.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register the per-frame handler. Takes effect at the next `start`.
    pub fn on_frame(&self, handler: FrameHandler) {
        *self.lock_handler() = Some(handler);
    }

    /// Begin capturing.
    ///
    /// Validates the capability table, reads the readout depth, configures
    /// driver buffering, attaches the frame callback and starts the
    /// device's streaming engine. Any failure surfaces here and leaves the
    /// session Idle. Requires a tokio runtime context for worker dispatch.
    pub fn start(&self) -> Result<(), AcquisitionError> {
        if self.capturing.load(Ordering::Acquire) {
            return Err(AcquisitionError::AlreadyGrabbing);
        }

        let runtime = Handle::try_current().map_err(|e| AcquisitionError::ControlRejected {
            operation: "start",
            reason: format!("no async runtime for frame dispatch: {e}"),
        })?;

        let table = FeatureTable::validate(self.backend.as_ref(), SESSION_REQUIRED)?;
        let mode = table.get_enum(self.backend.as_ref(), FeatureId::ReadoutMode)?;
        let depth = ReadoutDepth::from_mode(mode);

        self.backend.set_buffer_count(self.config.buffer_count)?;
        self.backend
            .attach(self.frame_callback(runtime, depth));
        self.backend.start_grabbing()?;

        // Past the last fallible call: only now disturb the previous
        // run's statistics.
        self.counters.reset();
        self.meter.restart();

        *self.lock_features() = Some(table);
        self.capturing.store(true, Ordering::Release);
        info!(readout = depth.as_str(), buffers = self.config.buffer_count, "acquisition started");
        Ok(())
    }

    /// Stop capturing. Idempotent: a stop while Idle is a no-op.
    ///
    /// Clears the latest-frame cache and halts the meter; the monotonic
    /// counters keep their values for post-run inspection. If the control
    /// rejects the stop, the session stays Capturing and the call can be
    /// retried.
    pub fn stop(&self) -> Result<(), AcquisitionError> {
        if !self.capturing.load(Ordering::Acquire) {
            return Ok(());
        }
        // Stay Capturing until the device actually stopped: a rejected
        // stop must leave the session retryable, not claiming Idle over
        // a still-grabbing device.
        self.backend.stop_grabbing()?;
        self.capturing.store(false, Ordering::Release);
        self.latest.clear();
        self.meter.halt();
        info!(stats = ?self.stats(), "acquisition stopped");
        Ok(())
    }

    /// Build the driver-side callback. Runs decode and gate admission on
    /// the driver thread; admitted frames are dispatched to a blocking
    /// worker on the captured runtime handle.
    fn frame_callback(&self, runtime: Handle, depth: ReadoutDepth) -> RawFrameHandler {
        let policy = self.config.unknown_format_policy;
        let gate = Arc::clone(&self.gate);
        let latest = Arc::clone(&self.latest);
        let counters = Arc::clone(&self.counters);
        let meter = Arc::clone(&self.meter);
        let frame_tx = self.frame_tx.clone();
        let handler = self.lock_handler().clone();

        Box::new(move |raw: RawFrameView<'_>| {
            let received = counters.received.fetch_add(1, Ordering::Relaxed) + 1;

            let frame = match decode(&raw, depth, policy) {
                Ok(frame) => frame,
                Err(e) => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(block_id = raw.block_id, error = %e, "frame decode failed");
                    return;
                }
            };

            if !gate.try_admit() {
                let dropped = counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if received % 100 == 0 {
                    debug!(received, dropped, "consumer lagging, dropping at the gate");
                }
                return;
            }
            counters.admitted.fetch_add(1, Ordering::Relaxed);

            let frame = frame.into_shared();
            let gate = Arc::clone(&gate);
            let latest = Arc::clone(&latest);
            let counters = Arc::clone(&counters);
            let meter = Arc::clone(&meter);
            let frame_tx = frame_tx.clone();
            let handler = handler.clone();

            runtime.spawn_blocking(move || {
                let ok = match &handler {
                    Some(h) => {
                        let h = Arc::clone(h);
                        let f = Arc::clone(&frame);
                        catch_unwind(AssertUnwindSafe(move || h(f)))
                            .map_err(|_| {
                                warn!(block_id = frame.block_id, "frame handler panicked");
                            })
                            .is_ok()
                    }
                    None => true,
                };

                // Guaranteed tail: runs whether or not the handler faulted,
                // so a bad handler can never wedge the pipeline.
                latest.publish(Arc::clone(&frame));
                meter.record_frame();
                if ok {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                // Lagging subscribers miss frames; they never block here.
                let _ = frame_tx.send(frame);
                gate.release();
            });
        })
    }

    /// Handle to the most recent delivered frame.
    pub fn latest_frame(&self) -> Option<Arc<DecodedFrame>> {
        self.latest.snapshot()
    }

    /// Smoothed delivery rate in frames per second.
    pub fn current_fps(&self) -> f64 {
        self.meter.current_rate()
    }

    /// Counter snapshot including the current rate.
    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot(self.meter.current_rate())
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    /// Subscribe to the decoded-frame broadcast. Each subscriber gets
    /// every frame delivered after it subscribes, subject to channel lag.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DecodedFrame>> {
        self.frame_tx.subscribe()
    }

    /// The backend this session drives.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The capability table validated at the last successful start.
    pub fn features(&self) -> Option<FeatureTable> {
        self.lock_features().clone()
    }
}
