// ABOUTME: Configuration loading and management for hatch
// ABOUTME: TOML config file with environment overrides and sensible defaults

use crate::error::Error;
use crate::locale::Locale;
use crate::source::CliConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where agent turns come from
    pub agent: AgentConfig,
    /// Display settings
    pub ui: UiConfig,
    /// Message log persistence
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// HTTP endpoint that streams `data:` framed agent events
    pub endpoint: Option<String>,
    /// Path to the agent CLI binary (defaults to "claude")
    pub binary: String,
    /// Wall-clock cap for one CLI turn in seconds
    pub timeout_secs: u64,
    /// Working directory for the CLI, defaults to the current directory
    pub working_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            binary: "claude".to_string(),
            timeout_secs: 300,
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub locale: Locale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for per-project message logs
    pub dir: Option<PathBuf>,
    /// Quiet period before a burst of changes is flushed
    pub debounce_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            debounce_ms: 500,
        }
    }
}

impl Config {
    /// Get the XDG config directory for hatch (~/.config/hatch)
    pub fn config_dir() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("hatch")
    }

    /// Get the XDG data directory for hatch (~/.local/share/hatch)
    pub fn data_dir() -> PathBuf {
        std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".local").join("share"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("hatch")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from the XDG config directory, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Ok(config)
    }

    /// Apply `HATCH_LOCALE` and `HATCH_ENDPOINT` from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(locale) = lookup("HATCH_LOCALE") {
            self.ui.locale = locale
                .parse::<Locale>()
                .map_err(Error::Config)
                .context("Invalid HATCH_LOCALE")?;
        }
        if let Some(endpoint) = lookup("HATCH_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            self.agent.endpoint = Some(endpoint);
        }
        Ok(())
    }

    /// Directory holding message logs, using the data dir if not configured
    pub fn messages_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("messages"))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.storage.debounce_ms)
    }

    /// Settings for spawning the agent CLI
    pub fn cli(&self) -> CliConfig {
        let defaults = CliConfig::default();
        CliConfig {
            binary: self.agent.binary.clone(),
            working_dir: self.agent.working_dir.clone().unwrap_or(defaults.working_dir),
            timeout_secs: self.agent.timeout_secs,
        }
    }

    /// Generate a default config file content
    pub fn default_toml() -> String {
        r#"# hatch configuration
# Location: ~/.config/hatch/config.toml

[agent]
# endpoint = "http://localhost:3000/api/chat"  # Streams data: framed events
binary = "claude"
timeout_secs = 300
# working_dir = "~/projects/my-site"

[ui]
# "en" or "he"
locale = "en"

[storage]
# dir = "~/.local/share/hatch/messages"  # Default location
debounce_ms = 500
"#
        .to_string()
    }

    /// Initialize config directory and create default config if needed
    pub fn init() -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_path();
        let data_dir = Self::data_dir();

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;

        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_toml())
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_toml_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::default_toml()).unwrap();
        assert_eq!(config.ui.locale, Locale::En);
        assert_eq!(config.agent.binary, "claude");
        assert_eq!(config.agent.timeout_secs, 300);
        assert_eq!(config.storage.debounce_ms, 500);
        assert!(config.agent.endpoint.is_none());
    }

    #[test]
    fn test_load_from_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ui]\nlocale = \"he\"\n[storage]\ndir = \"/tmp/hatch-msgs\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.ui.locale, Locale::He);
        assert_eq!(config.messages_dir(), PathBuf::from("/tmp/hatch-msgs"));
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_from_rejects_bad_locale() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[ui]\nlocale = \"fr\"").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("HATCH_LOCALE", "he"),
            ("HATCH_ENDPOINT", "http://localhost:3000/api/chat"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.ui.locale, Locale::He);
        assert_eq!(
            config.agent.endpoint.as_deref(),
            Some("http://localhost:3000/api/chat")
        );
    }

    #[test]
    fn test_invalid_env_locale_is_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|k| (k == "HATCH_LOCALE").then(|| "xx".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_config_from_agent_section() {
        let mut config = Config::default();
        config.agent.binary = "/opt/bin/claude".to_string();
        config.agent.working_dir = Some(PathBuf::from("/work"));
        config.agent.timeout_secs = 60;

        let cli = config.cli();
        assert_eq!(cli.binary, "/opt/bin/claude");
        assert_eq!(cli.working_dir, PathBuf::from("/work"));
        assert_eq!(cli.timeout_secs, 60);
    }
}
