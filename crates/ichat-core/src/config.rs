//! Configuration management for IntelliChat.
//!
//! Loads configuration from ${ICHAT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::client::ClientConfig;

/// Environment variable overriding the backend root.
pub const BASE_URL_ENV: &str = "ICHAT_BASE_URL";

/// How chat responses are delivered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// SSE stream of incremental updates
    #[default]
    Stream,
    /// One JSON `{answer, sources}` document
    Direct,
}

/// Body encoding for the login call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoginFormat {
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` OAuth2 password form
    Form,
}

pub mod paths {
    //! Path resolution for IntelliChat configuration and data.
    //!
    //! ICHAT_HOME resolution order:
    //! 1. ICHAT_HOME environment variable (if set)
    //! 2. ~/.config/ichat (default)

    use std::path::PathBuf;

    /// Returns the IntelliChat home directory.
    pub fn ichat_home() -> PathBuf {
        if let Ok(home) = std::env::var("ICHAT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("ichat"))
            .unwrap_or_else(|| PathBuf::from(".ichat"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        ichat_home().join("config.toml")
    }

    /// Returns the path to the stored login token.
    pub fn token_path() -> PathBuf {
        ichat_home().join("token.json")
    }

    /// Returns the directory for log files.
    pub fn logs_dir() -> PathBuf {
        ichat_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend root URL
    pub base_url: String,
    /// Chat endpoint path
    pub chat_path: String,
    /// Login endpoint path
    pub login_path: String,
    pub response_mode: ResponseMode,
    pub login_format: LoginFormat,
    /// Documents to retrieve per question (backend default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    pub connect_timeout_secs: u64,
    /// Maximum silence between reads of a response body
    pub read_timeout_secs: u64,
}

impl Config {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    pub const DEFAULT_CHAT_PATH: &str = "/api/chat";
    pub const DEFAULT_LOGIN_PATH: &str = "/login";
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default config to `path`.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })
    }

    /// Resolves the backend root with precedence: override > env > config.
    ///
    /// # Errors
    /// Returns an error if the winning value is not a valid URL.
    pub fn resolve_base_url(&self, override_url: Option<&str>) -> Result<String> {
        let env_url = std::env::var(BASE_URL_ENV).ok();
        let candidates = [override_url, env_url.as_deref(), Some(self.base_url.as_str())];

        let chosen = candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_BASE_URL);

        url::Url::parse(chosen).with_context(|| format!("Invalid base URL: {chosen}"))?;
        Ok(chosen.trim_end_matches('/').to_string())
    }

    /// Builds the transport configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn client_config(&self, override_url: Option<&str>) -> Result<ClientConfig> {
        Ok(ClientConfig {
            base_url: self.resolve_base_url(override_url)?,
            chat_path: normalize_path(&self.chat_path),
            login_path: normalize_path(&self.login_path),
            login_format: self.login_format,
            top_k: self.top_k,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            chat_path: Self::DEFAULT_CHAT_PATH.to_string(),
            login_path: Self::DEFAULT_LOGIN_PATH.to_string(),
            response_mode: ResponseMode::default(),
            login_format: LoginFormat::default(),
            top_k: None,
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: Self::DEFAULT_READ_TIMEOUT_SECS,
        }
    }
}

fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "base_url = \"https://chat.example.org\"\nresponse_mode = \"direct\"\nlogin_format = \"form\"\ntop_k = 5\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://chat.example.org");
        assert_eq!(config.response_mode, ResponseMode::Direct);
        assert_eq!(config.login_format, LoginFormat::Form);
        assert_eq!(config.top_k, Some(5));
        assert_eq!(config.chat_path, Config::DEFAULT_CHAT_PATH);
        assert_eq!(config.read_timeout_secs, Config::DEFAULT_READ_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "response_mode = \"carrier-pigeon\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(default_config_template()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::init(&path).unwrap();
        assert!(path.exists());
        let err = Config::init(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_override_base_url_wins_and_is_validated() {
        let config = Config::default();
        assert_eq!(
            config
                .resolve_base_url(Some("https://override.example/"))
                .unwrap(),
            "https://override.example"
        );
        assert!(config.resolve_base_url(Some("not a url")).is_err());
    }

    #[test]
    fn test_client_config_normalizes_paths() {
        let config = Config {
            chat_path: "api/chat/stream".to_string(),
            ..Config::default()
        };
        let client = config
            .client_config(Some("http://localhost:9000"))
            .unwrap();
        assert_eq!(client.chat_path, "/api/chat/stream");
        assert_eq!(client.login_path, "/login");
        assert_eq!(client.read_timeout, Duration::from_secs(120));
    }
}
