//! Configuration for apistore clients.
//!
//! TOML profiles merged with `APISTORE_` environment variables, bearer token
//! resolution (env var or plaintext), and translation into the
//! `StoreConfig` / `TransportConfig` / origin triple a `Store` is built from.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use apistore_api::{TlsMode, TransportConfig};
use apistore_core::{DEFAULT_PAGE_SIZE, StoreConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found (available: {available})")]
    UnknownProfile { name: String, available: String },

    #[error("no token available for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named API endpoints.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Resolve the requested (or default) profile by name.
    pub fn profile<'a>(
        &'a self,
        requested: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(name, profile)| (name.as_str(), profile))
            .ok_or_else(|| {
                let mut available: Vec<_> = self.profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                ConfigError::UnknownProfile {
                    name: name.to_owned(),
                    available: if available.is_empty() {
                        "(none)".into()
                    } else {
                        available.join(", ")
                    },
                }
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds; 0 disables it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: false,
            page_size: default_page_size(),
            base_path: default_base_path(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_base_path() -> String {
    "/v1".into()
}

/// A named API endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API origin (e.g., "https://api.example.com").
    pub endpoint: String,

    /// Prefix for relative resource URLs; overrides `defaults.base_path`.
    pub base_path: Option<String>,

    /// Bearer token (plaintext; prefer `token_env`).
    pub token: Option<String>,

    /// Environment variable holding the bearer token.
    pub token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    pub insecure: Option<bool>,

    pub timeout: Option<u64>,

    pub page_size: Option<usize>,

    /// Evict records after every successful delete.
    #[serde(default)]
    pub remove_after_delete: bool,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "apistore", "apistore").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("apistore");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (default: [`config_path`]) merged with
/// `APISTORE_`-prefixed environment variables. A missing file yields the
/// defaults.
///
/// Nested keys use a double underscore: `APISTORE_DEFAULTS__TIMEOUT=5`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("APISTORE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the bearer token: `token_env` first, then plaintext `token`.
///
/// A profile with neither configured is anonymous (`Ok(None)`); naming an
/// unset variable with no plaintext fallback is an error.
pub fn resolve_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some(SecretString::from(val)));
        }
    }

    if let Some(ref token) = profile.token {
        return Ok(Some(SecretString::from(token.clone())));
    }

    if profile.token_env.is_some() {
        return Err(ConfigError::NoCredentials {
            profile: profile_name.into(),
        });
    }
    Ok(None)
}

// ── Translation ─────────────────────────────────────────────────────

impl Profile {
    /// Build the store and transport settings for this profile, plus the
    /// origin the transport resolves relative URLs against.
    pub fn to_store_parts(
        &self,
        profile_name: &str,
        defaults: &Defaults,
    ) -> Result<(StoreConfig, TransportConfig, Url), ConfigError> {
        let origin: Url = self.endpoint.parse().map_err(|_| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("invalid URL: {}", self.endpoint),
        })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "endpoint".into(),
                reason: format!("expected an http(s) URL, got '{}'", self.endpoint),
            });
        }

        let timeout = match self.timeout.unwrap_or(defaults.timeout) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let mut store = StoreConfig::default()
            .with_base_url(
                self.base_path
                    .clone()
                    .unwrap_or_else(|| defaults.base_path.clone()),
            )
            .with_timeout(timeout)
            .with_remove_after_delete(self.remove_after_delete);
        store.default_page_size = self.page_size.unwrap_or(defaults.page_size);
        for (name, value) in &self.headers {
            store = store.with_header(name.as_str(), value.as_str());
        }
        if let Some(token) = resolve_token(self, profile_name)? {
            store = store.with_header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            );
        }

        let tls = if self.insecure.unwrap_or(defaults.insecure) {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        let transport = TransportConfig {
            tls,
            ..TransportConfig::default()
        };

        Ok((store, transport, origin))
    }
}
