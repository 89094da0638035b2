use crate::engine::RoleContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "service-desk.toml";
const DEFAULT_BASE_URL: &str = "http://localhost:8001";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Backend base address, e.g. `http://localhost:8001`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default)]
    pub role: RoleContext,
    /// Longest wait for the next chunk of a streaming answer before the
    /// turn is failed.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            role: RoleContext::default(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
        }
    }
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}

impl ChatConfig {
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub directory: Option<String>,
    pub retention_days: Option<u64>,
}

impl Config {
    /// Load the first config file found, then apply environment overrides.
    pub fn load_with_path() -> Result<(Self, Option<PathBuf>)> {
        let (mut config, path) = Self::load_file(Self::candidates())?;
        config.apply_env(std::env::var("DESK_API_URL").ok());
        Ok((config, path))
    }

    fn candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(explicit) = std::env::var("DESK_CONFIG") {
            candidates.push(PathBuf::from(explicit));
        }
        candidates.push(PathBuf::from(CONFIG_FILE));
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("service-desk").join(CONFIG_FILE));
        }
        candidates
    }

    fn load_file(candidates: Vec<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        for path in candidates {
            if path.exists() {
                let config = Self::from_path(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Config::default(), None))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Config at {} is invalid: {}", path.display(), e))
    }

    fn apply_env(&mut self, api_url: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.server.base_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.server.base_url.trim().to_lowercase();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!(
                "server.base_url must start with http:// or https://, got: {}",
                self.server.base_url
            );
        }
        if self.chat.stream_idle_timeout_secs == 0 {
            anyhow::bail!("chat.stream_idle_timeout_secs must be greater than 0");
        }
        if self.chat.stream_idle_timeout_secs > 3600 {
            anyhow::bail!("chat.stream_idle_timeout_secs must not exceed 3600");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:8001");
        assert_eq!(config.chat.role, RoleContext::User);
        assert_eq!(config.chat.stream_idle_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[chat]\nrole = \"admin\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let (config, found) = Config::load_file(vec![dir.path().join("missing.toml"), path.clone()])
            .unwrap();
        assert_eq!(found, Some(path));
        assert_eq!(config.chat.role, RoleContext::Admin);
        assert_eq!(config.chat.stream_idle_timeout_secs, 60);
        assert_eq!(config.server.base_url, "http://localhost:8001");
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, found) = Config::load_file(vec![dir.path().join("nope.toml")]).unwrap();
        assert!(found.is_none());
        assert_eq!(config.server.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[chat]\nrole = \"superuser\"\n").unwrap();
        let err = Config::from_path(&path).unwrap_err().to_string();
        assert!(err.contains(CONFIG_FILE));
    }

    #[test]
    fn env_override_wins_over_file() {
        let mut config = Config::default();
        config.apply_env(Some(" https://desk.example.com ".into()));
        assert_eq!(config.server.base_url, "https://desk.example.com");
        config.apply_env(Some("  ".into()));
        assert_eq!(config.server.base_url, "https://desk.example.com");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.base_url = "ftp://desk".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chat.stream_idle_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
