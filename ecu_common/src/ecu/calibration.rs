//! Calibration blob byte layout (spec §3 "Calibration blob", §6
//! "Calibration store: byte-level blob layout").
//!
//! Every persisted blob is `version: u32 LE | payload | crc32: u32 LE`,
//! where the CRC is CRC-32/ISO-HDLC computed over `version || payload`
//! (spec §6). `CalibrationBlob` implements that envelope once; the
//! concrete payload types (`FuelMaps`, `EoitMapConfig`, `ClosedLoopCfg`)
//! plug into it.
//!
//! Modeled on the version-prefixed, checksum-trailed persistence style of
//! `evo_shared_memory`'s segment headers, adapted from a live mmap
//! segment to an at-rest file blob.

use crc32fast::Hasher;

use crate::consts::MAP_GRID;
use crate::error::CoreError;

use super::tables::{EoiTable, MapTable};

/// Current on-disk schema version for each calibration key.
pub const FUEL_MAPS_VERSION: u32 = 1;
pub const EOI_CONFIG_VERSION: u32 = 2;
pub const EOIT_MAP_VERSION: u32 = 2;
pub const CLOSED_LOOP_CFG_VERSION: u32 = 1;

/// Minimum supported `FuelMaps` version this build can still read.
const FUEL_MAPS_MIN_SUPPORTED_VERSION: u32 = 1;

/// Generic version-prefixed, CRC-trailed blob envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBlob {
    pub version: u32,
    pub payload: Vec<u8>,
}

impl CalibrationBlob {
    /// Serialize to the exact wire layout: `version LE | payload | crc32 LE`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.payload.len() + 4);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.payload);
        let crc = crc32_of(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Parse and checksum-validate a blob read from storage.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < 8 {
            return Err(CoreError::Integrity("calibration blob shorter than envelope"));
        }
        let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        let computed_crc = crc32_of(body);
        if stored_crc != computed_crc {
            return Err(CoreError::Integrity("calibration blob checksum mismatch"));
        }
        let version = u32::from_le_bytes(body[0..4].try_into().unwrap());
        let payload = body[4..].to_vec();
        Ok(Self { version, payload })
    }
}

fn crc32_of(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// End-of-injection scalar calibration (spec §6 `eoi_config` key):
/// the crank-angle `boundary` past which the "normal" EOI target applies,
/// the `normal` EOI target itself, and the EOI target used whenever the
/// decoder is only `CrankLocked` (semi-sequential/wasted-spark, spec
/// §4.7). Distinct from [`EoitMapConfig`], which is the *optional*
/// rpm/load-varying EOI-normal override table — this is the always-on
/// scalar fallback the planner reaches for when that table is disabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EoiConfig {
    pub boundary_deg: f32,
    pub normal_deg: f32,
    pub fallback_normal_deg: f32,
}

impl EoiConfig {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&self.boundary_deg.to_le_bytes());
        out.extend_from_slice(&self.normal_deg.to_le_bytes());
        out.extend_from_slice(&self.fallback_normal_deg.to_le_bytes());
        out
    }

    /// Parse a stored payload, migrating the v1 `{eoi_deg, fallback_deg}`
    /// schema forward (spec §6 migration note) when `version < 2`.
    pub fn from_payload(version: u32, payload: &[u8]) -> Result<Self, CoreError> {
        if version < EOI_CONFIG_VERSION {
            if payload.len() < 8 {
                return Err(CoreError::Integrity("eoi_config v1 payload truncated"));
            }
            let eoi_deg = f32::from_le_bytes(payload[0..4].try_into().unwrap());
            let fallback_deg = f32::from_le_bytes(payload[4..8].try_into().unwrap());
            let boundary_deg = 6.5;
            return Ok(Self {
                boundary_deg,
                normal_deg: eoi_to_normal(boundary_deg, eoi_deg),
                fallback_normal_deg: fallback_deg,
            });
        }

        if payload.len() < 12 {
            return Err(CoreError::Integrity("eoi_config payload truncated"));
        }
        let f = |range: std::ops::Range<usize>| -> f32 { f32::from_le_bytes(payload[range].try_into().unwrap()) };
        Ok(Self {
            boundary_deg: f(0..4),
            normal_deg: f(4..8),
            fallback_normal_deg: f(8..12),
        })
    }
}

impl Default for EoiConfig {
    fn default() -> Self {
        Self {
            boundary_deg: 6.5,
            normal_deg: 370.0,
            fallback_normal_deg: 180.0,
        }
    }
}

/// Converts a v1 absolute EOI angle into the v2 `normal` representation:
/// the offset past `boundary` at which injection closes (DESIGN.md Open
/// Question decision — the source schema carried only the absolute
/// angle, so the migration re-expresses it relative to the boundary
/// reference the v2 schema introduces).
fn eoi_to_normal(boundary_deg: f32, eoi_deg: f32) -> f32 {
    eoi_deg - boundary_deg
}

/// Fuel, ignition and λ-target maps (spec §6 `fuel_maps` key).
#[derive(Debug, Clone, PartialEq)]
pub struct FuelMaps {
    pub ve: MapTable,
    pub ignition_advance: MapTable,
    pub lambda_target: MapTable,
}

impl FuelMaps {
    /// Flat payload: three `MapTable`s back to back, each as
    /// `rpm_bins | load_bins | cells | checksum`, all little-endian.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for table in [&self.ve, &self.ignition_advance, &self.lambda_target] {
            encode_u16_table(table, &mut out);
        }
        out
    }

    pub fn from_payload(version: u32, payload: &[u8]) -> Result<Self, CoreError> {
        if version < FUEL_MAPS_MIN_SUPPORTED_VERSION {
            return Err(CoreError::Integrity("fuel_maps version older than supported"));
        }
        let mut cursor = 0usize;
        let ve = decode_u16_table(payload, &mut cursor)?;
        let ignition_advance = decode_u16_table(payload, &mut cursor)?;
        let lambda_target = decode_u16_table(payload, &mut cursor)?;
        Ok(Self {
            ve,
            ignition_advance,
            lambda_target,
        })
    }
}

impl Default for FuelMaps {
    fn default() -> Self {
        Self {
            ve: MapTable::default(),
            ignition_advance: MapTable::default(),
            lambda_target: MapTable::default(),
        }
    }
}

fn encode_u16_table(table: &MapTable, out: &mut Vec<u8>) {
    for &b in &table.rpm_bins {
        out.extend_from_slice(&b.to_le_bytes());
    }
    for &b in &table.load_bins {
        out.extend_from_slice(&b.to_le_bytes());
    }
    for row in &table.cells {
        for &c in row {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }
    out.extend_from_slice(&table.checksum.to_le_bytes());
}

fn decode_u16_table(payload: &[u8], cursor: &mut usize) -> Result<MapTable, CoreError> {
    let mut rpm_bins = [0u16; MAP_GRID];
    let mut load_bins = [0u16; MAP_GRID];
    let mut cells = [[0u16; MAP_GRID]; MAP_GRID];

    for slot in rpm_bins.iter_mut() {
        *slot = read_u16(payload, cursor)?;
    }
    for slot in load_bins.iter_mut() {
        *slot = read_u16(payload, cursor)?;
    }
    for row in cells.iter_mut() {
        for cell in row.iter_mut() {
            *cell = read_u16(payload, cursor)?;
        }
    }
    let checksum = read_u32(payload, cursor)?;

    let table = MapTable {
        rpm_bins,
        load_bins,
        cells,
        checksum,
    };
    if !table.checksum_valid() {
        return Err(CoreError::Integrity("map table checksum mismatch"));
    }
    Ok(table)
}

fn read_u16(payload: &[u8], cursor: &mut usize) -> Result<u16, CoreError> {
    let end = *cursor + 2;
    let bytes = payload
        .get(*cursor..end)
        .ok_or(CoreError::Integrity("calibration payload truncated"))?;
    *cursor = end;
    Ok(u16::from_le_bytes(bytes.try_into().unwrap()))
}

fn read_u32(payload: &[u8], cursor: &mut usize) -> Result<u32, CoreError> {
    let end = *cursor + 4;
    let bytes = payload
        .get(*cursor..end)
        .ok_or(CoreError::Integrity("calibration payload truncated"))?;
    *cursor = end;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

/// Optional, rpm/load-varying EOI-normal override map (spec §6
/// `eoit_map_config` key: `u8 enabled, u8[3] reserved, 16×16×u16 map, u16
/// checksum`; §9 Open Question). Gated by `enabled` — when `false` the
/// planner falls back to the scalar [`EoiConfig::normal_deg`] instead of
/// consulting this table (spec §4.6 step 4 "one *optional* EOI-normal
/// lookup"). On disk the cells stay `u16` for backward compatibility with
/// the v1 schema; in RAM they are widened to `i16` by bit-reinterpretation
/// so negative EOI-normal offsets are representable (DESIGN.md Open
/// Question decision).
#[derive(Debug, Clone, PartialEq)]
pub struct EoitMapConfig {
    pub enabled: bool,
    pub table: EoiTable,
    /// Whether this config was migrated up from the v1 (unsigned-only) schema.
    pub migrated_from_v1: bool,
}

impl EoitMapConfig {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(u8::from(self.enabled));
        out.extend_from_slice(&[0u8; 3]); // reserved
        for &b in &self.table.rpm_bins {
            out.extend_from_slice(&b.to_le_bytes());
        }
        for &b in &self.table.load_bins {
            out.extend_from_slice(&b.to_le_bytes());
        }
        for row in &self.table.cells {
            for &c in row {
                out.extend_from_slice(&(c as u16).to_le_bytes());
            }
        }
        // Spec pins this field at `u16` width; the in-RAM checksum stays
        // the full commutative `u32` used everywhere else, so only the
        // low 16 bits round-trip to disk (validated the same way below).
        out.extend_from_slice(&(self.table.checksum as u16).to_le_bytes());
        out
    }

    pub fn from_payload(version: u32, payload: &[u8]) -> Result<Self, CoreError> {
        if payload.len() < 4 {
            return Err(CoreError::Integrity("eoit map payload truncated"));
        }
        let enabled = payload[0] != 0;
        let mut cursor = 4usize; // skip enabled + 3 reserved bytes
        let mut rpm_bins = [0u16; MAP_GRID];
        let mut load_bins = [0u16; MAP_GRID];
        let mut cells = [[0i16; MAP_GRID]; MAP_GRID];

        for slot in rpm_bins.iter_mut() {
            *slot = read_u16(payload, &mut cursor)?;
        }
        for slot in load_bins.iter_mut() {
            *slot = read_u16(payload, &mut cursor)?;
        }
        for row in cells.iter_mut() {
            for cell in row.iter_mut() {
                let raw = read_u16(payload, &mut cursor)?;
                // v1 stored these cells as plain unsigned magnitudes with
                // no signed encoding at all; v2 reinterprets the same 16
                // bits as two's complement. A v1 blob therefore loads as
                // if every cell were non-negative.
                *cell = raw as i16;
            }
        }
        let stored_checksum16 = read_u16(payload, &mut cursor)?;

        let mut table = EoiTable {
            rpm_bins,
            load_bins,
            cells,
            checksum: 0,
        };
        let computed = table.compute_checksum();
        if (computed as u16) != stored_checksum16 {
            return Err(CoreError::Integrity("eoit map checksum mismatch"));
        }
        table.checksum = computed;

        Ok(Self {
            enabled,
            table,
            migrated_from_v1: version < EOIT_MAP_VERSION,
        })
    }
}

impl Default for EoitMapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: EoiTable::default(),
            migrated_from_v1: false,
        }
    }
}

/// Closed-loop PI gains and bounds (spec §6 `ignition_trim_cfg` /
/// closed-loop key). Schema-only beyond the gains this crate's
/// closed-loop controller actually consumes: a reserved `knock_retard`
/// field is accepted on read and round-tripped on write, but no
/// subsystem acts on it (knock-retard persistence stays unimplemented,
/// DESIGN.md Open Question decision).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedLoopCfg {
    pub kp: f32,
    pub ki: f32,
    pub integral_min: f32,
    pub integral_max: f32,
    /// Reserved for a future knock-retard table; round-tripped, unused.
    pub knock_retard_reserved: f32,
}

impl ClosedLoopCfg {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.extend_from_slice(&self.kp.to_le_bytes());
        out.extend_from_slice(&self.ki.to_le_bytes());
        out.extend_from_slice(&self.integral_min.to_le_bytes());
        out.extend_from_slice(&self.integral_max.to_le_bytes());
        out.extend_from_slice(&self.knock_retard_reserved.to_le_bytes());
        out
    }

    pub fn from_payload(_version: u32, payload: &[u8]) -> Result<Self, CoreError> {
        if payload.len() < 20 {
            return Err(CoreError::Integrity("closed_loop_cfg payload truncated"));
        }
        let f = |range: std::ops::Range<usize>| -> f32 {
            f32::from_le_bytes(payload[range].try_into().unwrap())
        };
        Ok(Self {
            kp: f(0..4),
            ki: f(4..8),
            integral_min: f(8..12),
            integral_max: f(12..16),
            knock_retard_reserved: f(16..20),
        })
    }
}

impl Default for ClosedLoopCfg {
    fn default() -> Self {
        Self {
            kp: 0.05,
            ki: 0.01,
            integral_min: -0.25,
            integral_max: 0.25,
            knock_retard_reserved: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips_through_bytes() {
        let blob = CalibrationBlob {
            version: 3,
            payload: vec![1, 2, 3, 4, 5],
        };
        let bytes = blob.to_bytes();
        let back = CalibrationBlob::from_bytes(&bytes).expect("valid blob");
        assert_eq!(back, blob);
    }

    #[test]
    fn blob_rejects_corrupted_checksum() {
        let blob = CalibrationBlob {
            version: 1,
            payload: vec![9, 9, 9],
        };
        let mut bytes = blob.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(CalibrationBlob::from_bytes(&bytes).is_err());
    }

    #[test]
    fn blob_rejects_short_buffer() {
        assert!(CalibrationBlob::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn fuel_maps_round_trip() {
        let maps = FuelMaps::default();
        let payload = maps.to_payload();
        let back = FuelMaps::from_payload(FUEL_MAPS_VERSION, &payload).expect("valid payload");
        assert_eq!(back, maps);
    }

    #[test]
    fn fuel_maps_payload_tamper_detected() {
        let maps = FuelMaps::default();
        let mut payload = maps.to_payload();
        payload[0] ^= 0xFF;
        assert!(FuelMaps::from_payload(FUEL_MAPS_VERSION, &payload).is_err());
    }

    #[test]
    fn eoit_map_v1_loads_as_nonnegative() {
        let mut cfg = EoitMapConfig::default();
        cfg.table.cells[0][0] = 500;
        cfg.table.reseal();
        let payload = cfg.to_payload();
        let back = EoitMapConfig::from_payload(1, &payload).expect("valid payload");
        assert!(back.migrated_from_v1);
        assert_eq!(back.table.cells[0][0], 500);
    }

    #[test]
    fn eoit_map_v2_preserves_negative_cells() {
        let mut cfg = EoitMapConfig::default();
        cfg.table.cells[2][2] = -300;
        cfg.table.reseal();
        let payload = cfg.to_payload();
        let back = EoitMapConfig::from_payload(EOIT_MAP_VERSION, &payload).expect("valid payload");
        assert!(!back.migrated_from_v1);
        assert_eq!(back.table.cells[2][2], -300);
    }

    #[test]
    fn eoi_config_v1_migrates_eoi_deg_into_boundary_relative_normal() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&376.5f32.to_le_bytes()); // v1 eoi_deg
        payload.extend_from_slice(&180.0f32.to_le_bytes()); // v1 fallback_deg
        let migrated = EoiConfig::from_payload(1, &payload).expect("v1 payload parses");
        assert_eq!(migrated.boundary_deg, 6.5);
        assert_eq!(migrated.normal_deg, 370.0);
        assert_eq!(migrated.fallback_normal_deg, 180.0);
    }

    #[test]
    fn eoi_config_v2_round_trips_directly() {
        let cfg = EoiConfig {
            boundary_deg: 6.5,
            normal_deg: 370.0,
            fallback_normal_deg: 180.0,
        };
        let payload = cfg.to_payload();
        let back = EoiConfig::from_payload(EOI_CONFIG_VERSION, &payload).expect("v2 payload parses");
        assert_eq!(back, cfg);
    }

    #[test]
    fn closed_loop_cfg_round_trip_keeps_reserved_field() {
        let cfg = ClosedLoopCfg {
            knock_retard_reserved: 4.5,
            ..ClosedLoopCfg::default()
        };
        let payload = cfg.to_payload();
        let back = ClosedLoopCfg::from_payload(CLOSED_LOOP_CFG_VERSION, &payload).expect("valid payload");
        assert_eq!(back, cfg);
    }
}
