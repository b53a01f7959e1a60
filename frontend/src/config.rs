//! Front-end configuration file.
//!
//! Read from `<config_dir>/omniframe/config.toml` unless a path is given on
//! the command line. A missing default file means defaults; a missing
//! explicit file is an error.

use std::path::{Path, PathBuf};

use log::debug;
use omniframe_core::session::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Machine used when the command line does not name one.
    pub machine: String,
    /// Default log filter; `RUST_LOG` and `--log-level` take precedence.
    pub log_level: String,
    pub session: SessionConfig,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            machine: "generic6502".to_string(),
            log_level: "info".to_string(),
            session: SessionConfig::default(),
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("omniframe").join("config.toml"))
}

pub fn load(explicit: Option<&Path>) -> Result<FrontendConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok(FrontendConfig::default()),
        },
    };
    debug!("reading config from {}", path.display());
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: FrontendConfig = toml::from_str("").unwrap();
        assert_eq!(config, FrontendConfig::default());
        assert_eq!(config.session.history.stride, 10);
    }

    #[test]
    fn nested_session_settings() {
        let config: FrontendConfig = toml::from_str(
            r#"
            log_level = "debug"

            [session]
            emulator_args = ["frequency_mhz=1.79"]

            [session.history]
            stride = 5
            max_snapshots = 100
            truncate_on_restore = true
            "#,
        )
        .unwrap();
        assert_eq!(config.machine, "generic6502");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.session.emulator_args, vec!["frequency_mhz=1.79"]);
        assert_eq!(config.session.history.stride, 5);
        assert_eq!(config.session.history.max_snapshots, Some(100));
        assert!(config.session.history.truncate_on_restore);
    }

    #[test]
    fn explicit_path_is_read() {
        let path = std::env::temp_dir().join("omniframe_config_test.toml");
        std::fs::write(&path, "machine = \"other\"\n").unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.machine, "other");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_explicit_path_is_error() {
        let path = std::env::temp_dir().join("omniframe_config_missing.toml");
        assert!(matches!(load(Some(&path)), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let path = std::env::temp_dir().join("omniframe_config_bad.toml");
        std::fs::write(&path, "machine = [").unwrap();
        assert!(matches!(load(Some(&path)), Err(ConfigError::Parse { .. })));
        std::fs::remove_file(&path).unwrap();
    }
}
