// ── Core error types ──
//
// User-facing errors from ledwatch-core. Consumers never see HTTP bodies
// or JSON parse failures directly; the `From<ledwatch_api::Error>` impl
// translates transport-layer errors into console-level variants.

use thiserror::Error;

use crate::alarm::AudioError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    /// Rejected locally before any request was issued.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("Registry rejected the request (HTTP {status}): {message}")]
    Registry { status: u16, message: String },

    #[error("Cannot reach {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Relay channel closed")]
    RelayClosed,

    // ── Local resources ──────────────────────────────────────────────
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Preference storage failed: {message}")]
    Preferences { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ledwatch_api::Error> for CoreError {
    fn from(err: ledwatch_api::Error) -> Self {
        match err {
            ledwatch_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            ledwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ledwatch_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ledwatch_api::Error::Registry { status, message } => {
                CoreError::Registry { status, message }
            }
            ledwatch_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            ledwatch_api::Error::ChannelClosed => CoreError::RelayClosed,
            ledwatch_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
