//! Shared configuration for the rivalwatch CLI.
//!
//! TOML profiles, token resolution (env + plaintext), and translation
//! to `rivalwatch_core::RealtimeConfig` plus the connection settings
//! the stream provider needs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rivalwatch_core::{BackoffPolicy, RealtimeConfig, ScopeId};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{name}' in config")]
    UnknownProfile { name: String },

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
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named stream profiles.
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

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_color")]
    pub color: String,

    /// How long `connect` waits for the first attempt to settle, in
    /// seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Events retained in the client history.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            color: default_color(),
            connect_timeout: default_connect_timeout(),
            history_cap: default_history_cap(),
        }
    }
}

fn default_color() -> String {
    "auto".into()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_history_cap() -> usize {
    50
}

/// A named stream profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Stream endpoint base URL (e.g., "wss://push.example.com").
    pub endpoint: String,

    /// Project identifier the stream is scoped to.
    pub project: String,

    /// Optional user segment for per-user channels.
    pub user: Option<String>,

    /// Bearer token (plaintext — prefer an env var).
    pub auth_token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub auth_token_env: Option<String>,

    /// Override the events retained in history.
    pub history_cap: Option<usize>,

    /// Override the connect timeout, in seconds.
    pub connect_timeout: Option<u64>,

    /// Initial reconnect backoff delay, in milliseconds.
    pub backoff_initial_ms: Option<u64>,

    /// Upper bound on reconnect backoff delay, in milliseconds.
    pub backoff_max_ms: Option<u64>,

    /// Reconnect attempts before the client gives up entirely.
    pub max_reconnect_attempts: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "rivalwatch", "rivalwatch").map_or_else(
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
    p.push("rivalwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("RIVALWATCH_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Look up a profile by name, or the default profile when `name` is
/// `None`.
pub fn select_profile<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = name
        .or(config.default_profile.as_deref())
        .unwrap_or("default");

    config
        .profiles
        .get_key_value(name)
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve the bearer token from the credential chain. Streams may be
/// unauthenticated, so an empty chain yields `None` rather than an
/// error.
pub fn resolve_token(profile: &Profile) -> Option<SecretString> {
    // 1. Profile's auth_token_env → env var lookup
    if let Some(ref env_name) = profile.auth_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var("RIVALWATCH_TOKEN") {
        return Some(SecretString::from(val));
    }

    // 3. Plaintext in config
    profile
        .auth_token
        .as_ref()
        .map(|t| SecretString::from(t.clone()))
}

// ── Profile → client settings ───────────────────────────────────────

/// Everything needed to build a provider and a client for one profile.
#[derive(Debug)]
pub struct StreamSettings {
    pub endpoint: url::Url,
    pub token: Option<SecretString>,
    pub scope: ScopeId,
    pub realtime: RealtimeConfig,
}

/// Build [`StreamSettings`] from a profile — no CLI flag overrides.
pub fn profile_to_stream_settings(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<StreamSettings, ConfigError> {
    let endpoint: url::Url = profile
        .endpoint
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("invalid URL: {}", profile.endpoint),
        })?;

    let scope = match profile.user.as_deref() {
        Some(user) => ScopeId::for_user(&profile.project, user),
        None => ScopeId::new(&profile.project),
    }
    .ok_or_else(|| ConfigError::Validation {
        field: "project".into(),
        reason: "project identifier must not be empty".into(),
    })?;

    let mut backoff = BackoffPolicy::default();
    if let Some(ms) = profile.backoff_initial_ms {
        backoff.initial_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = profile.backoff_max_ms {
        backoff.max_delay = Duration::from_millis(ms);
    }
    if let Some(max) = profile.max_reconnect_attempts {
        backoff.max_attempts = Some(max);
    }

    let realtime = RealtimeConfig {
        history_cap: profile.history_cap.unwrap_or(defaults.history_cap),
        connect_timeout: Some(Duration::from_secs(
            profile.connect_timeout.unwrap_or(defaults.connect_timeout),
        )),
        backoff,
        ..RealtimeConfig::default()
    };

    Ok(StreamSettings {
        endpoint,
        token: resolve_token(profile),
        scope,
        realtime,
    })
}

// ── Tests ────────────────────────────────────────────────────────────
