//! Convenience re-exports. `use ecu_common::prelude::*;` pulls in the
//! types most consumers need without listing individual paths.

pub use crate::config::{EcuConfig, LogLevel};
pub use crate::error::CoreError;

pub use crate::ecu::calibration::{CalibrationBlob, ClosedLoopCfg, EoitMapConfig, FuelMaps};
pub use crate::ecu::diagnostics::{ArmOutcome, InjectionDiagnostic, RuntimeState};
pub use crate::ecu::interfaces::{ActuatorHardware, ArmError, CalibrationStore, LambdaProvider, SensorProvider};
pub use crate::ecu::plan::Plan;
pub use crate::ecu::sensors::SensorSnapshot;
pub use crate::ecu::sync::{CamPhase, SyncState};
pub use crate::ecu::tables::{EoiTable, LookupCache, MapTable};
pub use crate::ecu::tooth::ToothEvent;
pub use crate::ecu::trims::FuelTrims;
