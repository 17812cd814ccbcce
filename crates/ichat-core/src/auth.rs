//! Login and bearer-token storage.
//!
//! Tokens live in `<ICHAT_HOME>/token.json` with restricted permissions (0600)
//! and are never logged or displayed in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{self, ClientConfig};
use crate::config::{LoginFormat, paths};
use crate::error::{ChatError, ChatErrorKind, ChatResult};

fn now_millis_u64() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or(u64::MAX)
}

/// Stored login result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expiry timestamp in milliseconds since epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    /// Account the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Credentials {
    /// Returns true if the token has a known expiry that has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at_ms
            .is_some_and(|expires| now_millis_u64() >= expires)
    }

    /// Time left before expiry, zero once expired. `None` if no expiry is known.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at_ms
            .map(|expires| Duration::from_millis(expires.saturating_sub(now_millis_u64())))
    }

    /// Masked token for display.
    pub fn mask_token(&self) -> String {
        mask_token(&self.access_token)
    }
}

/// Shows only a prefix of a token.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        "***".to_string()
    } else {
        let prefix: String = token.chars().take(12).collect();
        format!("{prefix}...")
    }
}

/// Supplies the bearer token attached to chat requests.
pub trait TokenSource: Send + Sync {
    /// Returns the current token, or `None` to send the request unauthenticated.
    fn token(&self) -> Option<String>;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// File-backed credential store.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(paths::token_path())
    }
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads stored credentials.
    /// Returns `None` if nothing is stored.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token from {}", self.path.display()))?;
        let creds = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse token from {}", self.path.display()))?;
        Ok(Some(creds))
    }

    /// Saves credentials with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, creds: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(creds).context("Failed to serialize credentials")?;
        let tmp_path = self.path.with_extension("json.tmp");

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        #[cfg(not(unix))]
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move token into {}", self.path.display()))
    }

    /// Removes stored credentials.
    /// Returns whether anything was removed.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}

impl TokenSource for TokenStore {
    fn token(&self) -> Option<String> {
        match self.load() {
            Ok(Some(creds)) => {
                if creds.is_expired() {
                    warn!("stored token has expired; sending it anyway");
                }
                Some(creds.access_token)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "ignoring unreadable token file");
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonLogin<'a> {
    user_id: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct FormLogin<'a> {
    username: &'a str,
    user_id: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    /// Minutes until expiry
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchanges a user id and password for credentials.
///
/// # Errors
/// Returns an `Auth` error on a non-2xx response, or a transport error.
pub async fn login(config: &ClientConfig, user_id: &str, password: &str) -> ChatResult<Credentials> {
    let http = client::build_http_client(config)?;
    let url = config.login_url();
    info!(%url, format = ?config.login_format, "logging in");

    let request = http.post(&url);
    let request = match config.login_format {
        LoginFormat::Json => request.json(&JsonLogin { user_id, password }),
        LoginFormat::Form => request.form(&FormLogin {
            username: user_id,
            user_id,
            password,
        }),
    };

    let response = request.send().await.map_err(|e| ChatError::transport(&e))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "login rejected");
        return Err(ChatError::http_status(
            ChatErrorKind::Auth,
            status.as_u16(),
            &body,
        ));
    }

    let body = response.text().await.map_err(|e| ChatError::transport(&e))?;
    let parsed: LoginResponse = serde_json::from_str(&body).map_err(|e| ChatError {
        kind: ChatErrorKind::Auth,
        message: format!("Unexpected login response: {e}"),
        details: Some(body.clone()),
    })?;
    debug!(expires_in = ?parsed.expires_in, "login succeeded");

    let expires_at_ms = parsed
        .expires_in
        .map(|minutes| now_millis_u64().saturating_add(minutes.saturating_mul(60_000)));

    Ok(Credentials {
        access_token: parsed.access_token,
        token_type: parsed.token_type,
        expires_at_ms,
        user_id: Some(user_id.to_string()),
    })
}
