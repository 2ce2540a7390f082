//! Server configuration.
//!
//! JSON at `$ROBOFILE_CONFIG`, or `~/.config/robofile/config.json`
//! (`%APPDATA%\robofile\config.json` on Windows). A missing file means
//! defaults; a malformed one is logged and replaced by defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use robofile_file_service::Timeouts;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "ROBOFILE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Root of the local map folders.
    pub maps_dir: PathBuf,
    /// Where multipart uploads are spooled.
    pub scratch_dir: PathBuf,
    pub max_upload_bytes: u64,
    /// Port used when a robot URL has none.
    pub default_robot_port: u16,
    pub api_prefix: String,
    pub health_timeout_secs: u64,
    pub control_timeout_secs: u64,
    pub transfer_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            maps_dir: PathBuf::from("./maps"),
            scratch_dir: PathBuf::from("./temp"),
            max_upload_bytes: robofile_multipart::SPOOL_LIMIT_BYTES,
            default_robot_port: robofile_file_service::DEFAULT_PORT,
            api_prefix: robofile_file_service::API_PREFIX.into(),
            health_timeout_secs: robofile_file_service::HEALTH_TIMEOUT.as_secs(),
            control_timeout_secs: robofile_file_service::CONTROL_TIMEOUT.as_secs(),
            transfer_timeout_secs: robofile_file_service::TRANSFER_TIMEOUT.as_secs(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<ServerConfig>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "configuration loaded");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse server config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    /// Robot client timeouts. Zero values fall back to one second.
    pub fn timeouts(&self) -> Timeouts {
        let secs = |s: u64| Duration::from_secs(s.max(1));
        Timeouts {
            health: secs(self.health_timeout_secs),
            control: secs(self.control_timeout_secs),
            transfer: secs(self.transfer_timeout_secs),
        }
    }
}

fn config_file_path() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(config_base_dir()?.join("robofile").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .map_err(|_| anyhow::anyhow!("APPDATA environment variable not set"))?;
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        Ok(PathBuf::from(home).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.maps_dir, PathBuf::from("./maps"));
        assert_eq!(config.max_upload_bytes, 512 * 1024 * 1024);
        assert_eq!(config.default_robot_port, 8080);
        assert_eq!(config.api_prefix, "/api/files");
        assert_eq!(config.timeouts(), Timeouts::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"listenAddr":"127.0.0.1:4000","mapsDir":"/srv/maps"}"#).unwrap();

        let config = ServerConfig::load_from(&path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:4000");
        assert_eq!(config.maps_dir, PathBuf::from("/srv/maps"));
        assert_eq!(config.scratch_dir, PathBuf::from("./temp"));
        assert_eq!(config.transfer_timeout_secs, 600);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(ServerConfig::load_from(&path).unwrap(), ServerConfig::default());
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn zero_timeouts_are_clamped() {
        let config = ServerConfig {
            health_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.timeouts().health, Duration::from_secs(1));
    }
}
