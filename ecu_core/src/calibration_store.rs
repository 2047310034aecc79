//! Flat-file calibration persistence (spec §6 "Calibration store").
//!
//! One file per key under a base directory, each holding the
//! version-prefixed, CRC-trailed envelope `CalibrationBlob` already
//! defines. Grounded on the same "one artifact per concern, atomic
//! write via tempfile + rename" shape the teacher uses for its
//! config/state persistence, adapted here to three small calibration
//! keys instead of one big config file.

use std::fs;
use std::path::{Path, PathBuf};

use ecu_common::ecu::calibration::{
    CLOSED_LOOP_CFG_VERSION, CalibrationBlob, ClosedLoopCfg, EOI_CONFIG_VERSION, EOIT_MAP_VERSION, EoiConfig, EoitMapConfig,
    FUEL_MAPS_VERSION, FuelMaps,
};
use ecu_common::ecu::interfaces::CalibrationStore;
use ecu_common::error::CoreError;

const FUEL_MAPS_FILE: &str = "fuel_maps.cal";
const EOI_CONFIG_FILE: &str = "eoi_config.cal";
const EOIT_MAP_FILE: &str = "eoit_map_cfg.cal";
const CLOSED_LOOP_FILE: &str = "closed_loop_cfg.cal";

/// Calibration store backed by flat files on a local filesystem.
pub struct FileCalibrationStore {
    base_dir: PathBuf,
}

impl FileCalibrationStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    /// Write atomically: write to a sibling `.tmp` file, then rename over
    /// the target so a crash mid-write never leaves a torn blob on disk.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes).map_err(|_| CoreError::Fault("calibration write failed"))?;
        fs::rename(&tmp_path, path).map_err(|_| CoreError::Fault("calibration rename failed"))
    }

    fn load_blob(&self, file_name: &str) -> Result<CalibrationBlob, CoreError> {
        let path = self.path_for(file_name);
        let bytes = fs::read(&path).map_err(|_| CoreError::NotReady("calibration file not present"))?;
        CalibrationBlob::from_bytes(&bytes)
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn load_fuel_maps(&self) -> Result<FuelMaps, CoreError> {
        let blob = self.load_blob(FUEL_MAPS_FILE)?;
        FuelMaps::from_payload(blob.version, &blob.payload)
    }

    fn save_fuel_maps(&mut self, maps: &FuelMaps) -> Result<(), CoreError> {
        let blob = CalibrationBlob {
            version: FUEL_MAPS_VERSION,
            payload: maps.to_payload(),
        };
        Self::write_atomic(&self.path_for(FUEL_MAPS_FILE), &blob.to_bytes())
    }

    fn load_eoi_config(&self) -> Result<EoiConfig, CoreError> {
        let blob = self.load_blob(EOI_CONFIG_FILE)?;
        EoiConfig::from_payload(blob.version, &blob.payload)
    }

    fn save_eoi_config(&mut self, cfg: &EoiConfig) -> Result<(), CoreError> {
        let blob = CalibrationBlob {
            version: EOI_CONFIG_VERSION,
            payload: cfg.to_payload(),
        };
        Self::write_atomic(&self.path_for(EOI_CONFIG_FILE), &blob.to_bytes())
    }

    fn load_eoit_map_cfg(&self) -> Result<EoitMapConfig, CoreError> {
        let blob = self.load_blob(EOIT_MAP_FILE)?;
        EoitMapConfig::from_payload(blob.version, &blob.payload)
    }

    fn save_eoit_map_cfg(&mut self, cfg: &EoitMapConfig) -> Result<(), CoreError> {
        let blob = CalibrationBlob {
            version: EOIT_MAP_VERSION,
            payload: cfg.to_payload(),
        };
        Self::write_atomic(&self.path_for(EOIT_MAP_FILE), &blob.to_bytes())
    }

    fn load_closed_loop_cfg(&self) -> Result<ClosedLoopCfg, CoreError> {
        let blob = self.load_blob(CLOSED_LOOP_FILE)?;
        ClosedLoopCfg::from_payload(blob.version, &blob.payload)
    }

    fn save_closed_loop_cfg(&mut self, cfg: &ClosedLoopCfg) -> Result<(), CoreError> {
        let blob = CalibrationBlob {
            version: CLOSED_LOOP_CFG_VERSION,
            payload: cfg.to_payload(),
        };
        Self::write_atomic(&self.path_for(CLOSED_LOOP_FILE), &blob.to_bytes())
    }
}
