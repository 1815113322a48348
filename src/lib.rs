//! Asynchronous frame-acquisition pipeline for sCMOS scientific cameras.
//!
//! The crate turns raw driver callbacks into decoded frames delivered to
//! user code, without ever blocking the driver thread:
//!
//! ```text
//! driver callback ──► FrameDecoder ──► BackpressureGate ──► worker
//!   (driver thread)    (stride copy,     (single slot,       (user handler,
//!                       bit shift)        drop on busy)       cache, meter)
//! ```
//!
//! - [`components::decoder`] converts the ephemeral [`RawFrameView`] into
//!   an owned, densely packed, bit-normalized [`DecodedFrame`].
//! - [`components::gate`] admits at most one frame in flight; frames that
//!   arrive while the consumer is busy are dropped, never queued.
//! - [`components::session`] runs the user handler on a detached blocking
//!   worker, maintains the [`LatestFrameCache`], the throughput meter and
//!   the drop-accounting counters, and broadcasts delivered frames.
//! - [`components::features`] validates a typed capability table against
//!   the device's feature store at session start.
//! - [`components::mock`] provides a hardware-free backend for tests and
//!   development.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cam_pipeline::{AcquisitionSession, MockCamera, SessionConfig};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let camera = Arc::new(MockCamera::new()?);
//! let session = AcquisitionSession::new(camera, SessionConfig::default());
//! session.on_frame(Arc::new(|frame| {
//!     println!("frame {} ({}x{})", frame.block_id, frame.width, frame.height);
//! }));
//! session.start()?;
//! // ... frames flow ...
//! session.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod components;
pub mod error;

pub use capabilities::FrameProducer;
pub use components::connection::DeviceContext;
pub use components::decoder::{decode, UnknownFormatPolicy};
pub use components::features::{
    FeatureId, FeatureKind, FeatureStore, FeatureTable, FloatRange, IntRange,
};
pub use components::frame::{DecodedFrame, PixelFormat, RawFrameView, ReadoutDepth, SampleDepth};
pub use components::gate::BackpressureGate;
pub use components::latest::LatestFrameCache;
pub use components::mock::MockCamera;
pub use components::session::{
    AcquisitionControl, AcquisitionSession, CameraBackend, FrameHandler, FrameSource,
    RawFrameHandler, SessionConfig,
};
pub use components::stats::{PipelineCounters, PipelineStats, ThroughputMeter};
pub use error::{AcquisitionError, DecodeError, FeatureError};
