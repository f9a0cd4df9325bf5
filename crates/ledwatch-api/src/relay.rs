//! Relay event channel with auto-reconnect.
//!
//! Holds one logical WebSocket connection to the relay. Inbound frames are
//! decoded into [`RelayEvent`]s and delivered, in arrival order, through an
//! unbounded channel together with connection lifecycle markers. Outbound
//! [`RelayCommand`]s are queued through a cloneable [`RelayPublisher`] and
//! written by the same task that owns the socket.
//!
//! # Example
//!
//! ```rust,ignore
//! use ledwatch_api::relay::{ChannelEvent, ReconnectConfig, RelayHandle};
//! use ledwatch_api::RelayCommand;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("ws://localhost:5000/ws")?;
//! let mut handle = RelayHandle::connect(url, ReconnectConfig::default(), CancellationToken::new())?;
//! handle.publisher().publish(RelayCommand::RequestFleetSnapshot)?;
//!
//! while let Some(event) = handle.recv().await {
//!     if let ChannelEvent::Message(msg) = event {
//!         println!("{:?}", msg.kind());
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::protocol::{RelayCommand, RelayEvent};

// ── ChannelEvent ─────────────────────────────────────────────────────

/// What the relay loop reports to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A session was established.
    Connected,
    /// One decoded push event.
    Message(RelayEvent),
    /// An established session ended. Emitted once per session.
    Disconnected { reason: String },
    /// Waiting before the next connection attempt.
    Reconnecting { attempt: u32, delay: Duration },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for relay reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── RelayPublisher ───────────────────────────────────────────────────

/// Fire-and-forget command sender.
///
/// Commands published while no session is live are discarded when the next
/// session starts; the relay has no delivery guarantee across reconnects.
#[derive(Debug, Clone)]
pub struct RelayPublisher {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayPublisher {
    /// Queue a command for the live session.
    ///
    /// Only fails once the relay loop has shut down.
    pub fn publish(&self, command: RelayCommand) -> Result<(), Error> {
        tracing::debug!(?command, "publish");
        self.tx.send(command).map_err(|_| Error::ChannelClosed)
    }

    /// A detached publisher and the receiving end of its queue.
    ///
    /// Lets consumers be exercised without a socket.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RelayCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

// ── RelayHandle ──────────────────────────────────────────────────────

/// Handle to a running relay connection loop.
pub struct RelayHandle {
    event_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    publisher: RelayPublisher,
    cancel: CancellationToken,
}

impl RelayHandle {
    /// Spawn the connection loop for `url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background and is reported as [`ChannelEvent::Connected`].
    pub fn connect(
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme '{}' (expected ws or wss)",
                url.scheme()
            )));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (publisher, command_rx) = RelayPublisher::channel();
        let cancel = cancel.child_token();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            relay_loop(url, event_tx, command_rx, reconnect, task_cancel).await;
        });

        Ok(Self {
            event_rx,
            publisher,
            cancel,
        })
    }

    /// Next lifecycle marker or push event. `None` once the loop has exited.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.event_rx.recv().await
    }

    pub fn publisher(&self) -> RelayPublisher {
        self.publisher.clone()
    }

    /// Split into the event receiver, a publisher, and the loop's token.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<ChannelEvent>,
        RelayPublisher,
        CancellationToken,
    ) {
        (self.event_rx, self.publisher, self.cancel)
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → run session → backoff → reconnect.
async fn relay_loop(
    url: Url,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    mut command_rx: mpsc::UnboundedReceiver<RelayCommand>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = connect_and_run(&url, &event_tx, &mut command_rx, &cancel).await;
        if cancel.is_cancelled() || event_tx.is_closed() {
            break;
        }

        match result {
            Ok(()) => {
                tracing::info!("relay session ended, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "relay connection error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "relay reconnection limit reached, giving up"
                        );
                        break;
                    }
                }
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        let _ = event_tx.send(ChannelEvent::Reconnecting { attempt, delay });

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!("relay loop exiting");
}

// ── Single session lifecycle ─────────────────────────────────────────

/// Connect once and run the session until it drops.
///
/// [`ChannelEvent::Disconnected`] is only emitted for sessions that were
/// actually established.
async fn connect_and_run(
    url: &Url,
    event_tx: &mpsc::UnboundedSender<ChannelEvent>,
    command_rx: &mut mpsc::UnboundedReceiver<RelayCommand>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to relay");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let connect = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri));
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = connect => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };

    tracing::info!("relay connected");

    let stale = drain_stale(command_rx);
    if stale > 0 {
        tracing::debug!(count = stale, "discarded commands queued while offline");
    }
    let _ = event_tx.send(ChannelEvent::Connected);

    let outcome = run_session(ws_stream, event_tx, command_rx, cancel).await;

    let reason = match &outcome {
        Ok(reason) => reason.clone(),
        Err(e) => e.to_string(),
    };
    let _ = event_tx.send(ChannelEvent::Disconnected { reason });

    outcome.map(|_| ())
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Pump frames both ways. Returns the reason a clean end happened.
async fn run_session(
    ws_stream: WsStream,
    event_tx: &mpsc::UnboundedSender<ChannelEvent>,
    command_rx: &mut mpsc::UnboundedReceiver<RelayCommand>,
    cancel: &CancellationToken,
) -> Result<String, Error> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok("shutdown".into());
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(event) = parse_event(&text) {
                            if event_tx.send(ChannelEvent::Message(event)).is_err() {
                                return Ok("consumer dropped".into());
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong; it is flushed on the next write
                        tracing::trace!("relay ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let reason = frame.as_ref().map_or_else(
                            || "closed by relay".to_owned(),
                            |cf| format!("closed by relay ({}): {}", cf.code, cf.reason),
                        );
                        tracing::info!(%reason, "relay close frame received");
                        return Ok(reason);
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("relay stream ended");
                        return Ok("stream ended".into());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            command = command_rx.recv() => {
                let Some(command) = command else {
                    // Every publisher is gone; nothing can drive this session anymore.
                    cancel.cancel();
                    continue;
                };
                let text = serde_json::to_string(&command).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: format!("{command:?}"),
                })?;
                write
                    .send(tungstenite::Message::Text(text.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
        }
    }
}

fn drain_stale(command_rx: &mut mpsc::UnboundedReceiver<RelayCommand>) -> usize {
    let mut count = 0;
    while command_rx.try_recv().is_ok() {
        count += 1;
    }
    count
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Decode one text frame. Undecodable frames are logged and skipped.
fn parse_event(text: &str) -> Option<RelayEvent> {
    match serde_json::from_str::<RelayEvent>(text) {
        Ok(event) => {
            tracing::trace!(kind = ?event.kind(), "relay event");
            Some(event)
        }
        Err(e) => {
            tracing::debug!(error = %e, body = text, "skipping undecodable relay frame");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::{DeviceId, EventKind};

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        assert!(
            d10 <= Duration::from_millis(12_500),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );

        // Large attempt counts must not overflow the exponent.
        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_millis(12_500));
    }

    #[test]
    fn parse_event_decodes_alarm() {
        let event = parse_event(
            r#"{"event":"play_sound_on_frontend","data":{"client_id":1,"sound":"siren.mp3"}}"#,
        )
        .unwrap();
        assert_eq!(event.kind(), EventKind::AlarmPlay);
        let RelayEvent::AlarmPlay(play) = event else {
            panic!("expected alarm play");
        };
        assert_eq!(play.client_id, DeviceId(1));
        assert_eq!(play.sound, "siren.mp3");
    }

    #[test]
    fn parse_event_skips_malformed() {
        assert!(parse_event("not json at all").is_none());
        assert!(parse_event(r#"{"event":"unknown_thing","data":{}}"#).is_none());
    }

    #[test]
    fn publisher_errors_after_receiver_dropped() {
        let (publisher, rx) = RelayPublisher::channel();
        publisher.publish(RelayCommand::ClearLogs).unwrap();
        drop(rx);
        assert!(matches!(
            publisher.publish(RelayCommand::ClearLogs),
            Err(Error::ChannelClosed)
        ));
    }

    #[test]
    fn drain_stale_discards_queued_commands() {
        let (publisher, mut rx) = RelayPublisher::channel();
        publisher.publish(RelayCommand::ResetAllLeds).unwrap();
        publisher.publish(RelayCommand::RequestFleetSnapshot).unwrap();

        assert_eq!(drain_stale(&mut rx), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_rejects_http_scheme() {
        let url = Url::parse("http://localhost:5000/ws").unwrap();
        let result = RelayHandle::connect(url, ReconnectConfig::default(), CancellationToken::new());
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }
}
