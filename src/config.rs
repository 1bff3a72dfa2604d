use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub updates: UpdatesConfig,
}

/// When the update notification surface should become visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowNotificationOn {
    /// As soon as a check starts
    Checking,
    /// Only once an update is known to be available
    #[default]
    Available,
    /// Keep the surface visible from startup
    Always,
}

/// Update behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesConfig {
    /// URL of the JSON release manifest
    #[serde(default)]
    pub feed_url: String,
    /// Check for updates shortly after startup
    #[serde(default = "default_true")]
    pub check_on_startup: bool,
    /// Delay before the startup check, so the UI is fully up first
    #[serde(default = "default_startup_check_delay")]
    pub startup_check_delay_secs: u64,
    /// How long up-to-date and error notifications stay on screen
    #[serde(default = "default_dismiss_delay")]
    pub dismiss_delay_secs: u64,
    /// Start downloading as soon as an update is found
    #[serde(default = "default_true")]
    pub auto_download: bool,
    /// Apply a staged update silently when the app quits
    #[serde(default)]
    pub auto_install_on_quit: bool,
    /// When to reveal the notification surface
    #[serde(default)]
    pub show_notification_on: ShowNotificationOn,
    /// Allow update checks in debug builds (normally suppressed)
    #[serde(default)]
    pub allow_dev_checks: bool,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            check_on_startup: true,
            startup_check_delay_secs: default_startup_check_delay(),
            dismiss_delay_secs: default_dismiss_delay(),
            auto_download: true,
            auto_install_on_quit: false,
            show_notification_on: ShowNotificationOn::default(),
            allow_dev_checks: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_startup_check_delay() -> u64 {
    3
}

fn default_dismiss_delay() -> u64 {
    3
}

impl UpdatesConfig {
    pub fn startup_check_delay(&self) -> Duration {
        Duration::from_secs(self.startup_check_delay_secs)
    }

    pub fn dismiss_delay(&self) -> Duration {
        Duration::from_secs(self.dismiss_delay_secs)
    }

    /// Whether update checks are suppressed in this build.
    ///
    /// Debug builds never talk to the release feed unless explicitly
    /// allowed, so development runs don't self-update.
    pub fn dev_mode(&self) -> bool {
        cfg!(debug_assertions) && !self.allow_dev_checks
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "lumen", "Lumen")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let config = Self::load_from(&path)?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, writing defaults");
            let config = Self::default();
            if let Err(e) = config.save() {
                tracing::warn!("Could not write default configuration: {}", e);
            }
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.updates.check_on_startup);
        assert!(config.updates.auto_download);
        assert!(!config.updates.auto_install_on_quit);
        assert_eq!(
            config.updates.show_notification_on,
            ShowNotificationOn::Available
        );
        assert_eq!(config.updates.startup_check_delay(), Duration::from_secs(3));
        assert_eq!(config.updates.dismiss_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [updates]
            feed_url = "https://releases.example.com/lumen/latest.json"
            auto_download = false
            show_notification_on = "always"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.updates.feed_url,
            "https://releases.example.com/lumen/latest.json"
        );
        assert!(!config.updates.auto_download);
        assert_eq!(
            config.updates.show_notification_on,
            ShowNotificationOn::Always
        );
        // Unspecified fields fall back to defaults
        assert!(config.updates.check_on_startup);
        assert_eq!(config.updates.dismiss_delay_secs, 3);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let path = std::env::temp_dir().join("lumen-config-test-corrupt.toml");
        std::fs::write(&path, "[updates\nfeed_url = ").unwrap();
        assert!(Config::load_from(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir().join("lumen-config-test-save.toml");
        let mut config = Config::default();
        config.updates.feed_url = "https://example.com/feed.json".to_string();

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.updates.feed_url, config.updates.feed_url);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.updates.feed_url = "https://example.com/feed.json".to_string();
        config.updates.auto_install_on_quit = true;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.updates.feed_url, config.updates.feed_url);
        assert!(parsed.updates.auto_install_on_quit);
    }
}
