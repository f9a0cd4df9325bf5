//! Configuration for the ledwatch console.
//!
//! TOML profiles layered with `LEDWATCH_` environment overrides, translation
//! to `ledwatch_core::ConsoleConfig`, and a file-backed preference store for
//! settings the console changes at runtime.

mod preferences;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use ledwatch_core::{ConsoleConfig, DEFAULT_SOUND, ReconnectConfig};

pub use preferences::FilePreferences;

const DEFAULT_PROFILE: &str = "default";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{name}'")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

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
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named relay/registry profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some(DEFAULT_PROFILE.into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Registry request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Upper bound on the relay reconnect delay, in seconds.
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_secs: u64,

    #[serde(default)]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            reconnect_max_secs: default_reconnect_max(),
            insecure: false,
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_reconnect_max() -> u64 {
    30
}

/// A named relay/registry pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Relay event channel URL (e.g., "ws://localhost:5000/ws").
    #[serde(default = "default_relay")]
    pub relay: String,

    /// Registry base URL (e.g., "http://localhost:5000").
    #[serde(default = "default_registry")]
    pub registry: String,

    /// Directory scanned for alarm sounds. Falls back to `sounds/` under the
    /// data directory when that exists.
    pub sounds_dir: Option<PathBuf>,

    /// Sound used for unknown identifiers.
    pub default_sound: Option<String>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            relay: default_relay(),
            registry: default_registry(),
            sounds_dir: None,
            default_sound: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_relay() -> String {
    "ws://localhost:5000/ws".into()
}
fn default_registry() -> String {
    "http://localhost:5000".into()
}

impl Config {
    /// Resolve a profile by name, falling back to `default_profile`.
    ///
    /// The default profile need not be written down: when it is absent
    /// from the file, the built-in localhost profile stands in.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE);

        match self.profiles.get(name) {
            Some(profile) => Ok((name.to_owned(), profile.clone())),
            None if name == DEFAULT_PROFILE => Ok((name.to_owned(), Profile::default())),
            None => Err(ConfigError::UnknownProfile { name: name.into() }),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "ledwatch")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ledwatch");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory for state the console writes itself (preferences, logs).
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

/// Where sound files are picked up when no profile names a directory.
pub fn default_sounds_dir() -> PathBuf {
    data_dir().join("sounds")
}

/// The profile's sounds directory, else `fallback` if it is a directory.
fn resolve_sounds_dir(configured: Option<&Path>, fallback: PathBuf) -> Option<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .or_else(|| fallback.is_dir().then_some(fallback))
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, then layer `LEDWATCH_*` variables on top.
///
/// Nested keys use `__`: `LEDWATCH_PROFILES__LAB__RELAY`. A missing file is
/// not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LEDWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config unreadable, using defaults");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ConsoleConfig` from a profile and the global defaults.
pub fn profile_to_console_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ConsoleConfig, ConfigError> {
    let relay_url = parse_url("relay", &profile.relay, &["ws", "wss"])?;
    let registry_url = parse_url("registry", &profile.registry, &["http", "https"])?;

    let default_sound = profile
        .default_sound
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SOUND.into());

    Ok(ConsoleConfig {
        relay_url,
        registry_url,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        insecure: profile.insecure.unwrap_or(defaults.insecure),
        sounds_dir: resolve_sounds_dir(profile.sounds_dir.as_deref(), default_sounds_dir()),
        default_sound,
        reconnect: ReconnectConfig {
            max_delay: Duration::from_secs(defaults.reconnect_max_secs.max(1)),
            ..ReconnectConfig::default()
        },
    })
}

fn parse_url(field: &str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("expected {} URL, got {raw}", schemes.join(" or ")),
        });
    }
    Ok(url)
}
