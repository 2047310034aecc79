//! Scenario: calibration version mismatch, v1 -> v2 (spec §8 scenario 6).
//!
//! Two independent keys each carry their own v1 -> v2 migration:
//! `eoi_config`'s `{eoi_deg, fallback_deg}` pair becomes
//! `{boundary_deg, normal_deg, fallback_normal_deg}` (spec §6 migration
//! note), and `eoit_map_config`'s cell width changes its *interpretation*
//! (unsigned-only -> two's-complement) without changing its on-disk byte
//! width. Both must still load through the real `FileCalibrationStore`,
//! flagged as migrated, and a blob already written under the current
//! schema must round-trip untouched.

use ecu_common::ecu::calibration::{CalibrationBlob, EoiConfig, EoitMapConfig, EOIT_MAP_VERSION};
use ecu_common::ecu::interfaces::CalibrationStore;
use ecu_common::ecu::tables::EoiTable;

use ecu_core::calibration_store::FileCalibrationStore;

const EOI_CONFIG_FILE: &str = "eoi_config.cal";
const EOIT_MAP_FILE: &str = "eoit_map_cfg.cal";

fn write_eoi_config_v1(dir: &std::path::Path, eoi_deg: f32, fallback_deg: f32) {
    let mut payload = Vec::new();
    payload.extend_from_slice(&eoi_deg.to_le_bytes());
    payload.extend_from_slice(&fallback_deg.to_le_bytes());
    let blob = CalibrationBlob { version: 1, payload };
    std::fs::write(dir.join(EOI_CONFIG_FILE), blob.to_bytes()).unwrap();
}

fn write_eoit_v1(dir: &std::path::Path, table: &EoiTable) {
    let mut payload = Vec::new();
    payload.push(0u8); // v1 carried no enabled flag; default to disabled
    payload.extend_from_slice(&[0u8; 3]);
    for &b in &table.rpm_bins {
        payload.extend_from_slice(&b.to_le_bytes());
    }
    for &b in &table.load_bins {
        payload.extend_from_slice(&b.to_le_bytes());
    }
    for row in &table.cells {
        for &c in row {
            payload.extend_from_slice(&(c as u16).to_le_bytes());
        }
    }
    payload.extend_from_slice(&(table.checksum as u16).to_le_bytes());

    let blob = CalibrationBlob { version: 1, payload };
    std::fs::write(dir.join(EOIT_MAP_FILE), blob.to_bytes()).unwrap();
}

#[test]
fn eoi_config_v1_blob_migrates_and_then_loads_cleanly_after_resave() {
    let dir = tempfile::tempdir().unwrap();
    write_eoi_config_v1(dir.path(), 376.5, 180.0);

    let mut store = FileCalibrationStore::new(dir.path());
    let migrated = store.load_eoi_config().expect("v1 eoi_config must still load");
    assert_eq!(migrated.boundary_deg, 6.5);
    assert_eq!(migrated.normal_deg, 370.0);
    assert_eq!(migrated.fallback_normal_deg, 180.0);

    // Subsequent loads, after the migrated value is saved back, read v2 cleanly.
    store.save_eoi_config(&migrated).unwrap();
    let reloaded = store.load_eoi_config().unwrap();
    assert_eq!(reloaded, migrated);
}

#[test]
fn eoi_config_default_round_trips_with_no_migration_needed() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileCalibrationStore::new(dir.path());
    let cfg = EoiConfig::default();
    store.save_eoi_config(&cfg).unwrap();
    assert_eq!(store.load_eoi_config().unwrap(), cfg);
}

#[test]
fn eoit_map_v1_blob_loads_through_the_file_store_as_migrated() {
    let dir = tempfile::tempdir().unwrap();

    let mut table = EoiTable::default();
    table.cells[1][1] = 250; // a v1 blob can only have stored this as positive
    table.reseal();
    write_eoit_v1(dir.path(), &table);

    let store = FileCalibrationStore::new(dir.path());
    let loaded = store.load_eoit_map_cfg().expect("v1 blob must still load");

    assert!(loaded.migrated_from_v1);
    assert!(!loaded.enabled);
    assert_eq!(loaded.table.cells[1][1], 250);
}

#[test]
fn eoit_map_v2_blob_round_trips_negative_cells_without_migration_flag() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileCalibrationStore::new(dir.path());

    let mut cfg = EoitMapConfig {
        enabled: true,
        ..EoitMapConfig::default()
    };
    cfg.table.cells[2][3] = -400;
    cfg.table.reseal();
    assert_eq!(EOIT_MAP_VERSION, 2, "this test pins the current on-disk EOI-normal schema version");

    store.save_eoit_map_cfg(&cfg).unwrap();
    let loaded = store.load_eoit_map_cfg().unwrap();

    assert!(!loaded.migrated_from_v1);
    assert!(loaded.enabled);
    assert_eq!(loaded.table.cells[2][3], -400);
}
