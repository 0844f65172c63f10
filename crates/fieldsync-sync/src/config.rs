//! # FieldSync Configuration
//!
//! Configuration management for the sync queue, autosave and location.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FIELDSYNC_API_URL=https://api.example.com                          │
//! │     FIELDSYNC_DEVICE_ID=abc-123                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fieldsync/fieldsync.toml (Linux)                         │
//! │     ~/Library/Application Support/com.fieldsync.agent/ (macOS)         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     3 attempts, 30s autosave, auto-generated device_id                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Inspector tablet 4"
//!
//! [sync]
//! api_base_url = "https://api.example.com"
//! upload_url = "https://uploads.example.com/media"
//! max_attempts = 3
//!
//! [autosave]
//! enabled = true
//! interval_secs = 30
//!
//! [location]
//! foreground_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use fieldsync_core::DEFAULT_MAX_ATTEMPTS;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    #[serde(default = "generate_device_id")]
    pub id: String,

    /// Human-readable device name.
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn generate_device_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_device_name() -> String {
    "Field Device".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: generate_device_id(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Delivery behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the inspection API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Blob upload endpoint. `None` leaves the uploader unconfigured and
    /// new media is queued instead of uploaded inline.
    #[serde(default)]
    pub upload_url: Option<String>,

    /// Delivery attempts per item before it is tombstoned.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Permanently failed items retained for reporting.
    #[serde(default = "default_tombstone_limit")]
    pub tombstone_limit: usize,

    /// Interval between connectivity probes (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:3000/api".to_string()
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_tombstone_limit() -> usize {
    50
}
fn default_probe_interval() -> u64 {
    15
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            api_base_url: default_api_base_url(),
            upload_url: None,
            max_attempts: default_max_attempts(),
            tombstone_limit: default_tombstone_limit(),
            probe_interval_secs: default_probe_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Autosave Settings
// =============================================================================

/// Draft autosave timing.
///
/// ## Debounce Tiers
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  quick  (500ms)  toggles, pins, steps, tags                            │
/// │  normal (1000ms) address changes, media edits                          │
/// │  text   (1500ms) notes, typed character by character                   │
/// │                                                                         │
/// │  Each new mutation replaces the pending debounce, so a burst of edits  │
/// │  ends in a single write. The periodic save runs regardless.            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Period of the unconditional save (seconds).
    #[serde(default = "default_autosave_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_quick_debounce")]
    pub quick_debounce_ms: u64,

    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,

    #[serde(default = "default_text_debounce")]
    pub text_debounce_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_autosave_interval() -> u64 {
    30
}
fn default_quick_debounce() -> u64 {
    500
}
fn default_debounce() -> u64 {
    1000
}
fn default_text_debounce() -> u64 {
    1500
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        AutosaveSettings {
            enabled: true,
            interval_secs: default_autosave_interval(),
            quick_debounce_ms: default_quick_debounce(),
            debounce_ms: default_debounce(),
            text_debounce_ms: default_text_debounce(),
        }
    }
}

impl AutosaveSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// =============================================================================
// Location Settings
// =============================================================================

/// Coordinate acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSettings {
    /// Bounded wait while the app is in the foreground (seconds).
    #[serde(default = "default_foreground_timeout")]
    pub foreground_timeout_secs: u64,

    /// Bounded wait while backgrounded (seconds).
    #[serde(default = "default_background_timeout")]
    pub background_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub high_accuracy: bool,
}

fn default_foreground_timeout() -> u64 {
    10
}
fn default_background_timeout() -> u64 {
    15
}

impl Default for LocationSettings {
    fn default() -> Self {
        LocationSettings {
            foreground_timeout_secs: default_foreground_timeout(),
            background_timeout_secs: default_background_timeout(),
            high_accuracy: true,
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Local store location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete FieldSync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldSyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub autosave: AutosaveSettings,

    #[serde(default)]
    pub location: LocationSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl FieldSyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (fieldsync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        validate_http_url("api_base_url", &self.sync.api_base_url)?;
        if let Some(ref upload) = self.sync.upload_url {
            validate_http_url("upload_url", upload)?;
        }

        if self.sync.max_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "max_attempts must be greater than 0".into(),
            ));
        }

        if self.autosave.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "autosave interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("FIELDSYNC_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = var("FIELDSYNC_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = var("FIELDSYNC_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.sync.api_base_url = url;
        }

        if let Some(url) = var("FIELDSYNC_UPLOAD_URL") {
            self.sync.upload_url = if url.is_empty() { None } else { Some(url) };
        }

        if let Some(attempts) = var("FIELDSYNC_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.sync.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring non-numeric FIELDSYNC_MAX_ATTEMPTS"),
            }
        }

        if let Some(flag) = var("FIELDSYNC_AUTOSAVE") {
            match flag.to_lowercase().as_str() {
                "on" | "true" | "1" => self.autosave.enabled = true,
                "off" | "false" | "0" => self.autosave.enabled = false,
                _ => warn!(value = %flag, "Unknown autosave flag in environment"),
            }
        }

        if let Some(path) = var("FIELDSYNC_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fieldsync", "agent")
            .map(|dirs| dirs.config_dir().join("fieldsync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the device ID.
    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    /// Returns the SQLite path, falling back to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.storage.database_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "fieldsync", "agent")
                .map(|dirs| dirs.data_dir().join("fieldsync.db"))
                .unwrap_or_else(|| PathBuf::from("fieldsync.db"))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.sync.probe_interval_secs)
    }
}

fn validate_http_url(field: &str, raw: &str) -> SyncResult<()> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SyncError::InvalidUrl(format!(
            "{} must use http or https, got: {}",
            field, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = FieldSyncConfig::default();
        assert!(!config.device.id.is_empty());
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.tombstone_limit, 50);
        assert_eq!(config.autosave.interval_secs, 30);
        assert_eq!(config.autosave.quick_debounce_ms, 500);
        assert_eq!(config.location.foreground_timeout_secs, 10);
        assert!(config.sync.upload_url.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = FieldSyncConfig::default();
        assert!(config.validate().is_ok());

        config.device.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingDeviceId)));

        config.device.id = "test".to_string();
        config.sync.api_base_url = "ws://invalid".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.sync.api_base_url = "https://api.example.com".to_string();
        config.sync.upload_url = Some("not a url".to_string());
        assert!(config.validate().unwrap_err().is_config_error());

        config.sync.upload_url = Some("https://uploads.example.com".to_string());
        config.sync.max_attempts = 0;
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FIELDSYNC_API_URL", "https://api.example.com"),
            ("FIELDSYNC_MAX_ATTEMPTS", "5"),
            ("FIELDSYNC_AUTOSAVE", "off"),
            ("FIELDSYNC_DB_PATH", "/data/fs.db"),
        ]
        .into_iter()
        .collect();

        let mut config = FieldSyncConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.sync.api_base_url, "https://api.example.com");
        assert_eq!(config.sync.max_attempts, 5);
        assert!(!config.autosave.enabled);
        assert_eq!(config.database_path(), PathBuf::from("/data/fs.db"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: FieldSyncConfig = toml::from_str(
            r#"
            [sync]
            api_base_url = "https://api.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.max_attempts, 3);
        assert!(!config.device.id.is_empty());
        assert!(config.autosave.enabled);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fieldsync.toml");

        let mut config = FieldSyncConfig::default();
        config.device.name = "Tablet 7".to_string();
        config.save(Some(path.clone())).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[device]"));
        assert!(text.contains("[autosave]"));

        let loaded: FieldSyncConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.device.name, "Tablet 7");
        assert_eq!(loaded.device.id, config.device.id);
    }
}
