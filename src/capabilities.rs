//! Produced capability interface.
//!
//! Downstream orchestration code talks to cameras through this trait
//! rather than the concrete session type, so a hardware-backed session
//! and a mock-backed one are interchangeable behind `dyn FrameProducer`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::components::frame::DecodedFrame;
use crate::components::session::{AcquisitionSession, CameraBackend};
use crate::error::AcquisitionError;

/// Streaming-camera capability.
#[async_trait]
pub trait FrameProducer: Send + Sync {
    /// Begin continuous acquisition.
    async fn start_stream(&self) -> Result<(), AcquisitionError>;

    /// Stop continuous acquisition. Idempotent.
    async fn stop_stream(&self) -> Result<(), AcquisitionError>;

    /// Whether acquisition is currently running.
    fn is_streaming(&self) -> bool;

    /// Frames delivered to user code since the last start.
    fn frame_count(&self) -> u64;

    /// Subscribe to delivered frames. Lagging receivers miss frames.
    fn subscribe_frames(&self) -> broadcast::Receiver<Arc<DecodedFrame>>;
}

#[async_trait]
impl<B: CameraBackend> FrameProducer for AcquisitionSession<B> {
    async fn start_stream(&self) -> Result<(), AcquisitionError> {
        self.start()
    }

    async fn stop_stream(&self) -> Result<(), AcquisitionError> {
        self.stop()
    }

    fn is_streaming(&self) -> bool {
        self.is_capturing()
    }

    fn frame_count(&self) -> u64 {
        self.stats().delivered
    }

    fn subscribe_frames(&self) -> broadcast::Receiver<Arc<DecodedFrame>> {
        self.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::mock::MockCamera;
    use crate::components::session::SessionConfig;

    #[tokio::test(flavor = "multi_thread")]
    async fn session_is_usable_as_dyn_producer() {
        let cam = Arc::new(MockCamera::new().expect("mock"));
        let session: Arc<dyn FrameProducer> =
            Arc::new(AcquisitionSession::new(cam, SessionConfig::default()));

        session.start_stream().await.expect("start");
        assert!(session.is_streaming());
        assert_eq!(session.frame_count(), 0);
        session.stop_stream().await.expect("stop");
        assert!(!session.is_streaming());
    }
}
