use thiserror::Error;

/// Top-level error type for the `ledwatch-api` crate.
///
/// Covers both surfaces the console talks to: the relay's WebSocket event
/// channel and the registry's HTTP endpoints. `ledwatch-core` maps these
/// into user-facing notifications.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Registry ────────────────────────────────────────────────────
    /// Non-success response from the device registry.
    ///
    /// `message` is taken from the `{"error": "..."}` body when present.
    #[error("Registry error (HTTP {status}): {message}")]
    Registry { status: u16, message: String },

    // ── Event channel ───────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The relay loop has shut down and can no longer accept commands.
    #[error("Relay channel closed")]
    ChannelClosed,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}
