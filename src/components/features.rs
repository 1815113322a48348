//! Device features: the generic store interface and the typed capability
//! table the session validates against it.
//!
//! The store speaks in feature names, the way device SDKs do. The rest of
//! the crate never passes raw strings around; it goes through [`FeatureId`]
//! and a [`FeatureTable`] that has checked availability and kind up front,
//! so a typo'd name or a kind mismatch surfaces once at session start
//! instead of mid-acquisition.

use std::collections::HashSet;
use std::fmt;

use crate::error::FeatureError;

/// The value kind a feature carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Int,
    Float,
    Enum,
    Bool,
    Str,
    Command,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeatureKind::Int => "Int",
            FeatureKind::Float => "Float",
            FeatureKind::Enum => "Enum",
            FeatureKind::Bool => "Bool",
            FeatureKind::Str => "Str",
            FeatureKind::Command => "Command",
        };
        f.write_str(s)
    }
}

/// Integer feature constraints as the device reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
    pub increment: i64,
}

/// Float feature constraints as the device reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRange {
    pub min: f64,
    pub max: f64,
}

/// The features this pipeline knows about, each with a fixed device name
/// and expected kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    ExposureTime,
    Gain,
    PixelFormat,
    ReadoutMode,
    Width,
    Height,
    SensorWidth,
    SensorHeight,
    AcquisitionFrameRate,
    TriggerSoftware,
}

impl FeatureId {
    /// The device-side feature name.
    pub fn name(self) -> &'static str {
        match self {
            FeatureId::ExposureTime => "ExposureTime",
            FeatureId::Gain => "Gain",
            FeatureId::PixelFormat => "PixelFormat",
            FeatureId::ReadoutMode => "ReadoutMode",
            FeatureId::Width => "Width",
            FeatureId::Height => "Height",
            FeatureId::SensorWidth => "SensorWidth",
            FeatureId::SensorHeight => "SensorHeight",
            FeatureId::AcquisitionFrameRate => "AcquisitionFrameRate",
            FeatureId::TriggerSoftware => "TriggerSoftware",
        }
    }

    /// The kind the device is expected to report for this feature.
    pub fn kind(self) -> FeatureKind {
        match self {
            FeatureId::ExposureTime | FeatureId::AcquisitionFrameRate => FeatureKind::Float,
            FeatureId::Gain
            | FeatureId::Width
            | FeatureId::Height
            | FeatureId::SensorWidth
            | FeatureId::SensorHeight => FeatureKind::Int,
            FeatureId::PixelFormat | FeatureId::ReadoutMode => FeatureKind::Enum,
            FeatureId::TriggerSoftware => FeatureKind::Command,
        }
    }
}

/// Features the session cannot run without.
pub const SESSION_REQUIRED: &[FeatureId] = &[FeatureId::PixelFormat, FeatureId::ReadoutMode];

/// Name-based access to the device's feature registry.
///
/// Implemented by camera backends. Every accessor reports
/// [`FeatureError`] rather than panicking on unknown names or kind
/// mismatches.
pub trait FeatureStore: Send + Sync {
    fn is_available(&self, name: &str) -> bool;
    fn kind(&self, name: &str) -> Result<FeatureKind, FeatureError>;

    fn get_int(&self, name: &str) -> Result<i64, FeatureError>;
    fn set_int(&self, name: &str, value: i64) -> Result<(), FeatureError>;
    fn int_range(&self, name: &str) -> Result<IntRange, FeatureError>;

    fn get_float(&self, name: &str) -> Result<f64, FeatureError>;
    fn set_float(&self, name: &str, value: f64) -> Result<(), FeatureError>;
    fn float_range(&self, name: &str) -> Result<FloatRange, FeatureError>;

    fn get_enum(&self, name: &str) -> Result<u64, FeatureError>;
    fn set_enum(&self, name: &str, value: u64) -> Result<(), FeatureError>;

    fn get_bool(&self, name: &str) -> Result<bool, FeatureError>;
    fn set_bool(&self, name: &str, value: bool) -> Result<(), FeatureError>;

    fn get_string(&self, name: &str) -> Result<String, FeatureError>;
    fn set_string(&self, name: &str, value: &str) -> Result<(), FeatureError>;

    fn execute_command(&self, name: &str) -> Result<(), FeatureError>;
}

/// A set of features whose availability and kind have been checked against
/// a concrete store.
///
/// Built once by [`validate`](Self::validate) at session start; the typed
/// accessors afterwards refuse features outside the validated set, so a
/// mid-session access can only fail inside the driver, never on a
/// pipeline-side mistake.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    validated: HashSet<FeatureId>,
}

impl FeatureTable {
    /// Check that every listed feature is available and has the expected
    /// kind. Fails on the first mismatch.
    pub fn validate(store: &dyn FeatureStore, ids: &[FeatureId]) -> Result<Self, FeatureError> {
        let mut validated = HashSet::with_capacity(ids.len());
        for &id in ids {
            let name = id.name();
            if !store.is_available(name) {
                return Err(FeatureError::NotAvailable(name.to_string()));
            }
            let actual = store.kind(name)?;
            if actual != id.kind() {
                return Err(FeatureError::WrongKind {
                    feature: name.to_string(),
                    expected: id.kind(),
                    actual,
                });
            }
            validated.insert(id);
        }
        Ok(Self { validated })
    }

    fn check(&self, id: FeatureId, kind: FeatureKind) -> Result<&'static str, FeatureError> {
        if !self.validated.contains(&id) {
            return Err(FeatureError::NotValidated(id.name().to_string()));
        }
        if id.kind() != kind {
            return Err(FeatureError::WrongKind {
                feature: id.name().to_string(),
                expected: kind,
                actual: id.kind(),
            });
        }
        Ok(id.name())
    }

    pub fn get_int(&self, store: &dyn FeatureStore, id: FeatureId) -> Result<i64, FeatureError> {
        store.get_int(self.check(id, FeatureKind::Int)?)
    }

    pub fn set_int(
        &self,
        store: &dyn FeatureStore,
        id: FeatureId,
        value: i64,
    ) -> Result<(), FeatureError> {
        store.set_int(self.check(id, FeatureKind::Int)?, value)
    }

    pub fn get_float(&self, store: &dyn FeatureStore, id: FeatureId) -> Result<f64, FeatureError> {
        store.get_float(self.check(id, FeatureKind::Float)?)
    }

    pub fn set_float(
        &self,
        store: &dyn FeatureStore,
        id: FeatureId,
        value: f64,
    ) -> Result<(), FeatureError> {
        store.set_float(self.check(id, FeatureKind::Float)?, value)
    }

    pub fn get_enum(&self, store: &dyn FeatureStore, id: FeatureId) -> Result<u64, FeatureError> {
        store.get_enum(self.check(id, FeatureKind::Enum)?)
    }

    pub fn set_enum(
        &self,
        store: &dyn FeatureStore,
        id: FeatureId,
        value: u64,
    ) -> Result<(), FeatureError> {
        store.set_enum(self.check(id, FeatureKind::Enum)?, value)
    }

    pub fn execute(&self, store: &dyn FeatureStore, id: FeatureId) -> Result<(), FeatureError> {
        store.execute_command(self.check(id, FeatureKind::Command)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::mock::MockCamera;

    #[test]
    fn validate_accepts_the_mock_feature_set() {
        let cam = MockCamera::new().expect("mock");
        let table = FeatureTable::validate(
            &cam,
            &[
                FeatureId::ExposureTime,
                FeatureId::Gain,
                FeatureId::PixelFormat,
                FeatureId::ReadoutMode,
                FeatureId::Width,
                FeatureId::Height,
            ],
        )
        .expect("validation");

        assert!(table.get_float(&cam, FeatureId::ExposureTime).is_ok());
        assert!(table.get_enum(&cam, FeatureId::ReadoutMode).is_ok());
    }

    #[test]
    fn validate_rejects_missing_feature() {
        let cam = MockCamera::new().expect("mock");
        let err = FeatureTable::validate(&cam, &[FeatureId::TriggerSoftware])
            .expect_err("mock has no software trigger");
        assert!(matches!(err, FeatureError::NotAvailable(name) if name == "TriggerSoftware"));
    }

    #[test]
    fn unvalidated_feature_is_refused() {
        let cam = MockCamera::new().expect("mock");
        let table = FeatureTable::validate(&cam, &[FeatureId::Gain]).expect("validation");
        let err = table
            .get_enum(&cam, FeatureId::ReadoutMode)
            .expect_err("not in table");
        assert!(matches!(err, FeatureError::NotValidated(_)));
    }

    #[test]
    fn kind_mismatch_is_refused() {
        let cam = MockCamera::new().expect("mock");
        let table = FeatureTable::validate(&cam, &[FeatureId::Gain]).expect("validation");
        let err = table
            .get_float(&cam, FeatureId::Gain)
            .expect_err("gain is Int");
        assert!(matches!(err, FeatureError::WrongKind { .. }));
    }

    #[test]
    fn set_respects_device_range() {
        let cam = MockCamera::new().expect("mock");
        let table = FeatureTable::validate(&cam, &[FeatureId::Gain]).expect("validation");
        let range = cam.int_range("Gain").expect("range");
        let err = table
            .set_int(&cam, FeatureId::Gain, range.max + 1)
            .expect_err("out of range");
        assert!(matches!(err, FeatureError::OutOfRange { .. }));
    }
}
