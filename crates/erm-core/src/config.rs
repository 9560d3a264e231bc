use crate::error::{ErmError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub analytics: AnalyticsConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/erm-insights/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| ErmError::Config(e.to_string()))?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Reject values the analytics engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.analytics.session_gap_minutes == 0 {
            return Err(ErmError::Config(
                "analytics.session_gap_minutes must be at least 1".into(),
            ));
        }
        if self.analytics.snapshot_retention_days == 0 {
            return Err(ErmError::Config(
                "analytics.snapshot_retention_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("erm-insights")
            .join("config.toml")
    }

    /// Data directory for the key-value store.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("erm-insights")
    }

    /// Resolved store directory: the configured one, or `data_dir()/store`.
    pub fn store_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("store"))
    }
}

/// Key names and location of the key-value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per key.
    pub data_dir: Option<PathBuf>,
    /// Append-only activity log.
    pub activity_key: String,
    /// Date-keyed snapshot history.
    pub snapshot_key: String,
    pub workspaces_key: String,
    pub users_key: String,
    pub risks_key: String,
    pub controls_key: String,
    pub reports_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None, // resolved at runtime to data_dir/store
            activity_key: "erm_activity_log".into(),
            snapshot_key: "erm_platform_snapshots".into(),
            workspaces_key: "erm_workspaces".into(),
            users_key: "erm_users".into(),
            risks_key: "erm_risks".into(),
            controls_key: "erm_controls".into(),
            reports_key: "erm_reports".into(),
        }
    }
}

/// Tuning for session inference, retention, and query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Inactivity gap (minutes) that closes a session.
    pub session_gap_minutes: u32,
    /// Maximum number of daily snapshots kept.
    pub snapshot_retention_days: usize,
    /// How many of the latest sessions are returned for display.
    pub recent_sessions_limit: usize,
    /// Period token used when none is given.
    pub default_period: String,
    /// Timeline granularity used when none is given.
    pub default_granularity: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            session_gap_minutes: 30,
            snapshot_retention_days: 90,
            recent_sessions_limit: 20,
            default_period: "week".into(),
            default_granularity: "day".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("erm_activity_log"));
        assert!(toml_str.contains("session_gap_minutes = 30"));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[analytics]\nrecent_sessions_limit = 5\n").unwrap();
        assert_eq!(parsed.analytics.recent_sessions_limit, 5);
        assert_eq!(parsed.analytics.session_gap_minutes, 30);
        assert_eq!(parsed.storage.snapshot_key, "erm_platform_snapshots");
    }

    #[test]
    fn test_load_from_rejects_zero_gap() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[analytics]\nsession_gap_minutes = 0\n").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ErmError::Config(_)));
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[analytics\n").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ErmError::Toml(_)));
    }

    #[test]
    fn test_store_dir_prefers_configured_path() {
        let mut config = AppConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/tmp/erm"));
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/erm"));
    }
}
