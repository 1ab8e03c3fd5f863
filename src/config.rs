//! Configuration management for tunelog.
//!
//! This module handles loading and accessing configuration values from environment
//! variables and `.env` files. It provides a centralized way to manage the OAuth
//! client registration, API endpoints, the loopback callback server and the
//! album art cache limits.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)
//!
//! Missing or malformed values surface as a [`ConfigError`] exactly once, at
//! startup. Nothing in here panics.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SCOPE: &str =
    "user-read-currently-playing user-read-recently-played user-read-playback-state";
pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
pub const DEFAULT_KEYRING_SERVICE: &str = "tunelog.spotify";

const DEFAULT_CACHE_MAX_ITEMS: usize = 100;
const DEFAULT_CACHE_MAX_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_IMAGE_MAX_DIMENSION: u32 = 640;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REFRESH_WAIT_SECS: u64 = 30;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the necessary directory structure if it doesn't exist and loads
/// environment variables from a `.env` file located in the platform-specific
/// local data directory under `tunelog/.env`. A missing file is not an error;
/// the process environment alone may carry the configuration.
///
/// # Directory Structure
///
/// The function looks for the `.env` file in:
/// - Linux: `~/.local/share/tunelog/.env`
/// - macOS: `~/Library/Application Support/tunelog/.env`
/// - Windows: `%LOCALAPPDATA%/tunelog/.env`
///
/// # Errors
///
/// Returns an error string if the directory cannot be created or the file
/// exists but cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Platform-specific directory holding the `.env` file.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tunelog");
    path
}

fn default_cache_dir() -> PathBuf {
    let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("tunelog/images");
    path
}

/// OAuth client registration and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

/// Limits for the album art cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub max_items: usize,
    pub max_bytes: usize,
    pub max_dimension: u32,
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_items: DEFAULT_CACHE_MAX_ITEMS,
            max_bytes: DEFAULT_CACHE_MAX_BYTES,
            max_dimension: DEFAULT_IMAGE_MAX_DIMENSION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub oauth: OAuthConfig,
    pub cache: CacheConfig,
    pub server_address: String,
    pub keyring_service: String,
    pub request_timeout: Duration,
    /// Upper bound a caller waits on somebody else's token refresh.
    pub refresh_wait: Duration,
}

impl Config {
    /// Reads the full configuration from the process environment.
    ///
    /// Call [`load_env`] first so values from the `.env` file are visible.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Missing`] when `SPOTIFY_API_AUTH_CLIENT_ID` or
    ///   `SPOTIFY_API_REDIRECT_URI` is unset or blank
    /// - [`ConfigError::Invalid`] when a numeric limit does not parse or the
    ///   redirect URI is not an absolute URL
    pub fn from_env() -> Result<Self, ConfigError> {
        let redirect_uri = required("SPOTIFY_API_REDIRECT_URI")?;
        Url::parse(&redirect_uri).map_err(|e| ConfigError::Invalid {
            key: "SPOTIFY_API_REDIRECT_URI",
            reason: e.to_string(),
        })?;

        let oauth = OAuthConfig {
            client_id: required("SPOTIFY_API_AUTH_CLIENT_ID")?,
            redirect_uri,
            scope: optional("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            auth_url: optional("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: optional("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_url: optional("SPOTIFY_API_URL", DEFAULT_API_URL),
        };

        let cache = CacheConfig {
            dir: env::var("TUNELOG_CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_cache_dir),
            max_items: parsed("TUNELOG_CACHE_MAX_ITEMS", DEFAULT_CACHE_MAX_ITEMS)?,
            max_bytes: parsed("TUNELOG_CACHE_MAX_BYTES", DEFAULT_CACHE_MAX_BYTES)?,
            max_dimension: parsed("TUNELOG_IMAGE_MAX_DIMENSION", DEFAULT_IMAGE_MAX_DIMENSION)?,
        };

        Ok(Self {
            oauth,
            cache,
            server_address: optional("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS),
            keyring_service: optional("TUNELOG_KEYRING_SERVICE", DEFAULT_KEYRING_SERVICE),
            request_timeout: Duration::from_secs(parsed(
                "TUNELOG_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            refresh_wait: Duration::from_secs(parsed(
                "TUNELOG_REFRESH_WAIT_SECS",
                DEFAULT_REFRESH_WAIT_SECS,
            )?),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(key: &'static str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
