//! Mock camera backend.
//!
//! Implements the full backend surface against an in-memory feature map
//! and a caller-driven frame simulator. Used by the integration tests and
//! by downstream code running without hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tracing::debug;

use crate::components::connection::DeviceContext;
use crate::components::features::{FeatureKind, FeatureStore, FloatRange, IntRange};
use crate::components::frame::{PixelFormat, RawFrameView};
use crate::components::session::{AcquisitionControl, FrameSource, RawFrameHandler};
use crate::error::{AcquisitionError, FeatureError};

#[derive(Debug, Clone)]
enum MockFeature {
    Int {
        value: i64,
        min: i64,
        max: i64,
        increment: i64,
    },
    Float {
        value: f64,
        min: f64,
        max: f64,
    },
    Enum {
        value: u64,
    },
    Bool {
        value: bool,
    },
    Str {
        value: String,
    },
}

impl MockFeature {
    fn kind(&self) -> FeatureKind {
        match self {
            MockFeature::Int { .. } => FeatureKind::Int,
            MockFeature::Float { .. } => FeatureKind::Float,
            MockFeature::Enum { .. } => FeatureKind::Enum,
            MockFeature::Bool { .. } => FeatureKind::Bool,
            MockFeature::Str { .. } => FeatureKind::Str,
        }
    }
}

/// In-memory camera: a feature map seeded with the sensor's defaults plus
/// a frame simulator the test drives by hand.
///
/// Frames are produced by [`deliver_gradient`](Self::deliver_gradient)
/// (or [`deliver_frame`](Self::deliver_frame) for custom buffers) on
/// whatever thread the caller runs them from, which stands in for the
/// driver's callback thread.
pub struct MockCamera {
    ctx: DeviceContext,
    features: Mutex<HashMap<&'static str, MockFeature>>,
    handler: Mutex<Option<RawFrameHandler>>,
    grabbing: AtomicBool,
    buffer_count: AtomicU32,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    next_block: AtomicU64,
}

impl MockCamera {
    pub fn new() -> Result<Self> {
        let ctx = DeviceContext::open()?;
        let mut features: HashMap<&'static str, MockFeature> = HashMap::new();
        features.insert(
            "ExposureTime",
            MockFeature::Float {
                value: 10_000.0,
                min: 28.0,
                max: 10_000_000.0,
            },
        );
        features.insert(
            "Gain",
            MockFeature::Int {
                value: 1,
                min: 0,
                max: 100,
                increment: 1,
            },
        );
        features.insert(
            "PixelFormat",
            MockFeature::Enum {
                value: u64::from(PixelFormat::Mono12.code()),
            },
        );
        // Mode 6: 12-bit low noise, the sensor's shipping default.
        features.insert("ReadoutMode", MockFeature::Enum { value: 6 });
        features.insert(
            "Width",
            MockFeature::Int {
                value: 2048,
                min: 64,
                max: 2048,
                increment: 4,
            },
        );
        features.insert(
            "Height",
            MockFeature::Int {
                value: 2048,
                min: 64,
                max: 2048,
                increment: 4,
            },
        );
        features.insert(
            "SensorWidth",
            MockFeature::Int {
                value: 2048,
                min: 2048,
                max: 2048,
                increment: 1,
            },
        );
        features.insert(
            "SensorHeight",
            MockFeature::Int {
                value: 2048,
                min: 2048,
                max: 2048,
                increment: 1,
            },
        );
        features.insert("ReverseX", MockFeature::Bool { value: false });
        features.insert(
            "DeviceUserID",
            MockFeature::Str {
                value: "mock-cam-0".to_string(),
            },
        );

        Ok(Self {
            ctx,
            features: Mutex::new(features),
            handler: Mutex::new(None),
            grabbing: AtomicBool::new(false),
            buffer_count: AtomicU32::new(0),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            next_block: AtomicU64::new(1),
        })
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    fn lock_features(&self) -> MutexGuard<'_, HashMap<&'static str, MockFeature>> {
        match self.features.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_handler(&self) -> MutexGuard<'_, Option<RawFrameHandler>> {
        match self.handler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn feature(
        map: &HashMap<&'static str, MockFeature>,
        name: &str,
    ) -> Result<MockFeature, FeatureError> {
        map.get(name)
            .cloned()
            .ok_or_else(|| FeatureError::NotAvailable(name.to_string()))
    }

    fn wrong_kind(name: &str, expected: FeatureKind, actual: FeatureKind) -> FeatureError {
        FeatureError::WrongKind {
            feature: name.to_string(),
            expected,
            actual,
        }
    }

    /// Make the next `start_grabbing` fail once.
    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Make the next `stop_grabbing` fail once; the engine keeps running.
    pub fn fail_next_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    /// The buffer count last configured by the session.
    pub fn buffer_count(&self) -> u32 {
        self.buffer_count.load(Ordering::SeqCst)
    }

    /// Invoke the attached callback with a caller-built raw frame.
    /// No-op while not grabbing, as a real driver would be.
    pub fn deliver_frame(&self, raw: RawFrameView<'_>) {
        if !self.grabbing.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handler) = self.lock_handler().as_mut() {
            handler(raw);
        }
    }

    /// Deliver one synthetic Mono12 gradient frame with 8 bytes of row
    /// padding, exercising the stride-aware decode path.
    pub fn deliver_gradient(&self, width: u32, height: u32) {
        let block_id = self.next_block.fetch_add(1, Ordering::SeqCst);
        let row_bytes = width as usize * 2;
        let stride = row_bytes + 8;
        let mut data = vec![0u8; stride * height as usize];
        for y in 0..height {
            for x in 0..width {
                let v = ((u64::from(x) + u64::from(y) + block_id) % 4096) as u16;
                let off = y as usize * stride + x as usize * 2;
                data[off..off + 2].copy_from_slice(&v.to_le_bytes());
            }
        }
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        self.deliver_frame(RawFrameView {
            width,
            height,
            stride,
            pixel_format: PixelFormat::Mono12.code(),
            data: &data,
            block_id,
            timestamp_ns,
        });
    }
}

impl FeatureStore for MockCamera {
    fn is_available(&self, name: &str) -> bool {
        self.lock_features().contains_key(name)
    }

    fn kind(&self, name: &str) -> Result<FeatureKind, FeatureError> {
        Self::feature(&self.lock_features(), name).map(|f| f.kind())
    }

    fn get_int(&self, name: &str) -> Result<i64, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Int { value, .. } => Ok(value),
            other => Err(Self::wrong_kind(name, FeatureKind::Int, other.kind())),
        }
    }

    fn set_int(&self, name: &str, new: i64) -> Result<(), FeatureError> {
        let mut map = self.lock_features();
        match map
            .get_mut(name)
            .ok_or_else(|| FeatureError::NotAvailable(name.to_string()))?
        {
            MockFeature::Int {
                value, min, max, ..
            } => {
                if new < *min || new > *max {
                    return Err(FeatureError::OutOfRange {
                        feature: name.to_string(),
                        value: new as f64,
                        min: *min as f64,
                        max: *max as f64,
                    });
                }
                *value = new;
                Ok(())
            }
            other => Err(Self::wrong_kind(name, FeatureKind::Int, other.kind())),
        }
    }

    fn int_range(&self, name: &str) -> Result<IntRange, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Int {
                min,
                max,
                increment,
                ..
            } => Ok(IntRange {
                min,
                max,
                increment,
            }),
            other => Err(Self::wrong_kind(name, FeatureKind::Int, other.kind())),
        }
    }

    fn get_float(&self, name: &str) -> Result<f64, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Float { value, .. } => Ok(value),
            other => Err(Self::wrong_kind(name, FeatureKind::Float, other.kind())),
        }
    }

    fn set_float(&self, name: &str, new: f64) -> Result<(), FeatureError> {
        let mut map = self.lock_features();
        match map
            .get_mut(name)
            .ok_or_else(|| FeatureError::NotAvailable(name.to_string()))?
        {
            MockFeature::Float { value, min, max } => {
                if new < *min || new > *max {
                    return Err(FeatureError::OutOfRange {
                        feature: name.to_string(),
                        value: new,
                        min: *min,
                        max: *max,
                    });
                }
                *value = new;
                Ok(())
            }
            other => Err(Self::wrong_kind(name, FeatureKind::Float, other.kind())),
        }
    }

    fn float_range(&self, name: &str) -> Result<FloatRange, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Float { min, max, .. } => Ok(FloatRange { min, max }),
            other => Err(Self::wrong_kind(name, FeatureKind::Float, other.kind())),
        }
    }

    fn get_enum(&self, name: &str) -> Result<u64, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Enum { value } => Ok(value),
            other => Err(Self::wrong_kind(name, FeatureKind::Enum, other.kind())),
        }
    }

    fn set_enum(&self, name: &str, new: u64) -> Result<(), FeatureError> {
        let mut map = self.lock_features();
        match map
            .get_mut(name)
            .ok_or_else(|| FeatureError::NotAvailable(name.to_string()))?
        {
            MockFeature::Enum { value } => {
                *value = new;
                Ok(())
            }
            other => Err(Self::wrong_kind(name, FeatureKind::Enum, other.kind())),
        }
    }

    fn get_bool(&self, name: &str) -> Result<bool, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Bool { value } => Ok(value),
            other => Err(Self::wrong_kind(name, FeatureKind::Bool, other.kind())),
        }
    }

    fn set_bool(&self, name: &str, new: bool) -> Result<(), FeatureError> {
        let mut map = self.lock_features();
        match map
            .get_mut(name)
            .ok_or_else(|| FeatureError::NotAvailable(name.to_string()))?
        {
            MockFeature::Bool { value } => {
                *value = new;
                Ok(())
            }
            other => Err(Self::wrong_kind(name, FeatureKind::Bool, other.kind())),
        }
    }

    fn get_string(&self, name: &str) -> Result<String, FeatureError> {
        match Self::feature(&self.lock_features(), name)? {
            MockFeature::Str { value } => Ok(value),
            other => Err(Self::wrong_kind(name, FeatureKind::Str, other.kind())),
        }
    }

    fn set_string(&self, name: &str, new: &str) -> Result<(), FeatureError> {
        let mut map = self.lock_features();
        match map
            .get_mut(name)
            .ok_or_else(|| FeatureError::NotAvailable(name.to_string()))?
        {
            MockFeature::Str { value } => {
                *value = new.to_string();
                Ok(())
            }
            other => Err(Self::wrong_kind(name, FeatureKind::Str, other.kind())),
        }
    }

    fn execute_command(&self, name: &str) -> Result<(), FeatureError> {
        // The mock map carries no command features.
        match Self::feature(&self.lock_features(), name) {
            Ok(other) => Err(Self::wrong_kind(name, FeatureKind::Command, other.kind())),
            Err(e) => Err(e),
        }
    }
}

impl AcquisitionControl for MockCamera {
    fn set_buffer_count(&self, count: u32) -> Result<(), AcquisitionError> {
        self.buffer_count.store(count, Ordering::SeqCst);
        Ok(())
    }

    fn start_grabbing(&self) -> Result<(), AcquisitionError> {
        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(AcquisitionError::ControlRejected {
                operation: "start_grabbing",
                reason: "simulated driver fault".to_string(),
            });
        }
        self.grabbing.store(true, Ordering::SeqCst);
        debug!("mock streaming engine started");
        Ok(())
    }

    fn stop_grabbing(&self) -> Result<(), AcquisitionError> {
        if self.fail_stop.swap(false, Ordering::SeqCst) {
            return Err(AcquisitionError::ControlRejected {
                operation: "stop_grabbing",
                reason: "simulated driver fault".to_string(),
            });
        }
        self.grabbing.store(false, Ordering::SeqCst);
        debug!("mock streaming engine stopped");
        Ok(())
    }

    fn is_grabbing(&self) -> bool {
        self.grabbing.load(Ordering::SeqCst)
    }
}

impl FrameSource for MockCamera {
    fn attach(&self, handler: RawFrameHandler) {
        *self.lock_handler() = Some(handler);
    }
}
