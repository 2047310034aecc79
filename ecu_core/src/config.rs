//! Configuration loading (spec §6 "Configuration knobs").
//!
//! Thin file-loading wrapper around [`ecu_common::config::EcuConfig`],
//! in the same "read text, parse, validate, wrap errors" shape as
//! `evo_control_unit::config::load_control_unit_config`, reduced to a
//! single TOML file since the core has no axis/I/O config bundle to
//! assemble alongside it.

use std::fmt;
use std::fs;
use std::path::Path;

use ecu_common::config::EcuConfig;

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse/validation error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate [`EcuConfig`] from a TOML file at `path`.
pub fn load_config(path: &Path) -> Result<EcuConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    EcuConfig::from_toml(&text).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_defaults_from_empty_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "").unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.rpm_min, EcuConfig::default().rpm_min);
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = load_config(Path::new("/nonexistent/ecu.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn invalid_toml_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpm_min = \"not a number\"").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
