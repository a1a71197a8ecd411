//! Application configuration management.
//!
//! Configuration is stored at `~/.config/schoolcache/config.json`. The API
//! base URL can be overridden with `SCHOOLCACHE_API_URL`, or with the
//! website's own `VITE_API_URL` so both front ends point at the same backend.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "schoolcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when neither the config file nor the environment name one.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const API_URL_ENV: &str = "SCHOOLCACHE_API_URL";
const LEGACY_API_URL_ENV: &str = "VITE_API_URL";

/// Theme palette poll interval.
const DEFAULT_THEME_POLL_SECS: u64 = 5;

/// Gallery and carousel auto-refresh interval.
const DEFAULT_GALLERY_POLL_SECS: u64 = 60;

/// Abort logo downloads that take longer than this.
const DEFAULT_LOGO_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub theme_poll_secs: u64,
    pub gallery_poll_secs: u64,
    pub logo_timeout_secs: u64,
    pub admin_user: Option<String>,
    /// `--api-url` from the command line; never written back to disk.
    #[serde(skip)]
    pub api_url_override: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            cache_dir: None,
            theme_poll_secs: DEFAULT_THEME_POLL_SECS,
            gallery_poll_secs: DEFAULT_GALLERY_POLL_SECS,
            logo_timeout_secs: DEFAULT_LOGO_TIMEOUT_SECS,
            admin_user: None,
            api_url_override: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Resolve the API base URL: command line, environment, config file,
    /// then the default.
    pub fn api_url(&self) -> String {
        let overridden = self
            .api_url_override
            .clone()
            .or_else(|| std::env::var(API_URL_ENV).ok())
            .or_else(|| std::env::var(LEGACY_API_URL_ENV).ok())
            .filter(|v| !v.trim().is_empty());
        Self::resolve_api_url(overridden, self.api_url.clone())
    }

    fn resolve_api_url(from_env: Option<String>, from_file: Option<String>) -> String {
        from_env
            .or(from_file)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Origin serving uploaded media: the API URL without its `/api` suffix.
    pub fn backend_origin(&self) -> String {
        origin_from_api_url(&self.api_url())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn theme_poll_interval(&self) -> Duration {
        Duration::from_secs(self.theme_poll_secs.max(1))
    }

    pub fn gallery_poll_interval(&self) -> Duration {
        Duration::from_secs(self.gallery_poll_secs.max(1))
    }

    pub fn logo_timeout(&self) -> Duration {
        Duration::from_secs(self.logo_timeout_secs.max(1))
    }
}

pub fn origin_from_api_url(api_url: &str) -> String {
    let trimmed = api_url.trim_end_matches('/');
    trimmed
        .strip_suffix("/api")
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = Config::default();
        assert_eq!(config.theme_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.gallery_poll_interval(), Duration::from_secs(60));
        assert_eq!(config.logo_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_resolve_api_url_precedence() {
        assert_eq!(Config::resolve_api_url(None, None), DEFAULT_API_URL);
        assert_eq!(
            Config::resolve_api_url(None, Some("https://school.example/api/".into())),
            "https://school.example/api"
        );
        assert_eq!(
            Config::resolve_api_url(
                Some("http://10.0.0.2:8000/api".into()),
                Some("https://school.example/api".into())
            ),
            "http://10.0.0.2:8000/api"
        );
    }

    #[test]
    fn test_command_line_url_wins_and_is_not_saved() {
        let config = Config {
            api_url: Some("https://school.example/api".into()),
            api_url_override: Some("http://127.0.0.1:8000/api/".into()),
            ..Default::default()
        };
        assert_eq!(config.api_url(), "http://127.0.0.1:8000/api");
        assert!(!serde_json::to_string(&config).unwrap().contains("127.0.0.1"));
    }

    #[test]
    fn test_origin_from_api_url() {
        assert_eq!(origin_from_api_url("http://localhost:8000/api"), "http://localhost:8000");
        assert_eq!(origin_from_api_url("http://localhost:8000/api/"), "http://localhost:8000");
        assert_eq!(origin_from_api_url("https://cdn.example"), "https://cdn.example");
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"api_url": "https://x/api"}"#).unwrap();
        assert_eq!(config.api_url.as_deref(), Some("https://x/api"));
        assert_eq!(config.gallery_poll_secs, 60);
    }
}
