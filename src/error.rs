//! Error types for the acquisition pipeline.
//!
//! Three families, matching the three failure domains:
//!
//! - [`DecodeError`] — a single raw frame could not be converted. Per-frame
//!   errors: the frame is counted as dropped and the session keeps running.
//! - [`AcquisitionError`] — a start/stop transition was rejected by the
//!   acquisition control. Surfaced synchronously to the caller; the session
//!   stays in its prior state.
//! - [`FeatureError`] — propagated from the device feature store (not
//!   generated by the pipeline itself, except for capability-table
//!   validation failures).

use thiserror::Error;

use crate::components::features::FeatureKind;

/// Failure to convert one raw driver frame into an owned [`DecodedFrame`].
///
/// [`DecodedFrame`]: crate::components::frame::DecodedFrame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The raw buffer pointer was null or its byte length was zero.
    #[error("empty source buffer")]
    EmptySource,

    /// The frame header declared a zero width or height.
    #[error("zero-sized frame ({width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },

    /// The pixel-format code is not in the lookup table and the decoder is
    /// running with [`UnknownFormatPolicy::Strict`].
    ///
    /// [`UnknownFormatPolicy::Strict`]: crate::components::decoder::UnknownFormatPolicy::Strict
    #[error("unsupported pixel format code {0:#010x}")]
    UnsupportedFormat(u32),

    /// The declared row stride is smaller than one packed row of pixels.
    #[error("row stride {stride} bytes is smaller than packed row of {row_bytes} bytes")]
    StrideTooSmall { stride: usize, row_bytes: usize },

    /// The raw buffer cannot hold `height` rows at the declared stride.
    #[error("source buffer too small: need {needed} bytes, have {actual}")]
    SourceTruncated { needed: usize, actual: usize },
}

/// Failure of an acquisition start/stop transition.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// `start()` was called while the session is already capturing.
    #[error("acquisition already running")]
    AlreadyGrabbing,

    /// The external acquisition control rejected an operation
    /// (invalid state, device busy, timeout inside the driver, ...).
    #[error("acquisition control rejected {operation}: {reason}")]
    ControlRejected {
        operation: &'static str,
        reason: String,
    },

    /// Capability validation or a feature read at session start failed.
    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Failure reported by (or on behalf of) the device feature store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// The device does not expose this feature.
    #[error("feature '{0}' is not available on this device")]
    NotAvailable(String),

    /// The feature exists but has a different kind than the accessor expects.
    #[error("feature '{feature}' has kind {actual}, expected {expected}")]
    WrongKind {
        feature: String,
        expected: FeatureKind,
        actual: FeatureKind,
    },

    /// The feature was not part of the capability table validated at
    /// session start.
    #[error("feature '{0}' was not validated for this session")]
    NotValidated(String),

    /// A write was outside the device-reported range.
    #[error("value {value} out of range [{min}, {max}] for feature '{feature}'")]
    OutOfRange {
        feature: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The underlying driver call failed.
    #[error("feature '{feature}' access failed: {message}")]
    Driver { feature: String, message: String },
}
