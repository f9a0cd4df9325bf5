// ── Runtime console configuration ──
//
// Describes *where* the relay and registry live and how to reach them.
// Never touches disk: the TUI (via ledwatch-config) builds a
// `ConsoleConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use ledwatch_api::ReconnectConfig;
use url::Url;

/// Sound used when nothing else is configured or a name is unknown.
pub const DEFAULT_SOUND: &str = "beep.mp3";

/// Configuration for one console session.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Relay event channel (e.g. `ws://localhost:5000/ws`).
    pub relay_url: Url,
    /// Device registry root (e.g. `http://localhost:5000`).
    pub registry_url: Url,
    /// Registry request timeout.
    pub timeout: Duration,
    /// Accept self-signed registry certificates.
    pub insecure: bool,
    /// Directory scanned for alarm sounds. `None` uses the built-in list.
    pub sounds_dir: Option<PathBuf>,
    /// Fallback for unknown sound identifiers.
    pub default_sound: String,
    pub reconnect: ReconnectConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            relay_url: Url::parse("ws://localhost:5000/ws").expect("static relay URL"),
            registry_url: Url::parse("http://localhost:5000").expect("static registry URL"),
            timeout: Duration::from_secs(10),
            insecure: false,
            sounds_dir: None,
            default_sound: DEFAULT_SOUND.into(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ConsoleConfig {
    pub(crate) fn transport(&self) -> ledwatch_api::TransportConfig {
        ledwatch_api::TransportConfig {
            timeout: self.timeout,
            accept_invalid_certs: self.insecure,
        }
    }
}
