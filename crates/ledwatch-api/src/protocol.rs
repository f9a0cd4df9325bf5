//! Wire types shared by the relay event channel and the device registry.
//!
//! Every relay frame is a JSON envelope of the shape
//! `{"event": "<name>", "data": <payload>}`. Inbound frames decode into
//! [`RelayEvent`], outbound frames are encoded from [`RelayCommand`]. The
//! set of event kinds is closed: [`EventKind`] is derived from the
//! `RelayEvent` variants, so adding a kind is a compile-checked change.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{EnumDiscriminants, EnumIter};

// ── Identifiers ──────────────────────────────────────────────────────

/// Registry-assigned device identifier. Unique and stable.
///
/// Serialized as an integer. Deserialization also accepts the decimal
/// string form, since JSON object keys (the indicator map) are strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = DeviceId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer device id")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<DeviceId, E> {
                Ok(DeviceId(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<DeviceId, E> {
                i64::try_from(v)
                    .map(DeviceId)
                    .map_err(|_| E::custom(format!("device id {v} out of range")))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<DeviceId, E> {
                v.trim()
                    .parse()
                    .map(DeviceId)
                    .map_err(|_| E::custom(format!("invalid device id {v:?}")))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DeviceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ── LedState ─────────────────────────────────────────────────────────

/// Indicator state reported for a device.
///
/// The relay may introduce values the console does not know about; those
/// are kept verbatim in [`LedState::Other`] rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LedState {
    #[default]
    Off,
    On,
    Blink,
    Alarm,
    /// Device holds a live connection to the relay but shows no indication.
    Connected,
    Other(String),
}

impl LedState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Blink => "blink",
            Self::Alarm => "alarm",
            Self::Connected => "connected",
            Self::Other(s) => s,
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::Alarm)
    }
}

impl From<String> for LedState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "off" => Self::Off,
            "on" => Self::On,
            "blink" => Self::Blink,
            "alarm" => Self::Alarm,
            "connected" => Self::Connected,
            _ => Self::Other(s),
        }
    }
}

impl From<LedState> for String {
    fn from(state: LedState) -> Self {
        match state {
            LedState::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for LedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DeviceRecord ─────────────────────────────────────────────────────

/// One registered device as carried by a fleet snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub led_state: LedState,
}

impl DeviceRecord {
    pub fn is_alarming(&self) -> bool {
        self.led_state.is_alarm()
    }
}

// ── DashboardStatus ──────────────────────────────────────────────────

/// Relay-reported summary counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardStatus {
    pub server_running: bool,
    pub client_count: u64,
    pub message_count: u64,
    pub last_activity: String,
}

impl Default for DashboardStatus {
    fn default() -> Self {
        Self {
            server_running: false,
            client_count: 0,
            message_count: 0,
            last_activity: "N/A".into(),
        }
    }
}

// ── Log entries ──────────────────────────────────────────────────────

/// Origin tag of a relay log line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogKind {
    Server,
    Client,
    Recv,
    Warning,
    Error,
    Other(String),
}

/// Coarse classification used for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Info,
    Event,
    Error,
}

impl LogKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server => "SERVER",
            Self::Client => "CLIENT",
            Self::Recv => "RECV",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Other(s) => s,
        }
    }

    pub fn severity(&self) -> LogSeverity {
        match self {
            Self::Client | Self::Recv => LogSeverity::Event,
            Self::Warning | Self::Error => LogSeverity::Error,
            Self::Server | Self::Other(_) => LogSeverity::Info,
        }
    }
}

impl From<String> for LogKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SERVER" => Self::Server,
            "CLIENT" => Self::Client,
            "RECV" => Self::Recv,
            "WARNING" => Self::Warning,
            "ERROR" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<LogKind> for String {
    fn from(kind: LogKind) -> Self {
        match kind {
            LogKind::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

/// A single relay log line. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
}

// ── Alarm payloads ───────────────────────────────────────────────────

/// Payload of a play-alarm push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPlay {
    pub client_id: DeviceId,
    pub sound: String,
}

// ── Relay → console ──────────────────────────────────────────────────

/// Inbound push event from the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[serde(tag = "event", content = "data")]
#[strum_discriminants(name(EventKind), derive(Hash, EnumIter))]
pub enum RelayEvent {
    /// Complete replacement list of all known devices.
    #[serde(rename = "update_clients")]
    FleetSnapshot(Vec<DeviceRecord>),

    /// Complete replacement map of device id to indicator state.
    #[serde(rename = "update_leds")]
    IndicatorMap(BTreeMap<DeviceId, LedState>),

    #[serde(rename = "update_dashboard")]
    StatusUpdate(DashboardStatus),

    /// Full log history, sent once per connection.
    #[serde(rename = "all_logs")]
    LogSnapshot(Vec<LogEntry>),

    #[serde(rename = "new_log")]
    LogAppend(LogEntry),

    #[serde(rename = "play_sound_on_frontend")]
    AlarmPlay(AlarmPlay),

    #[serde(rename = "stop_all_sounds_on_frontend")]
    AlarmStopAll,
}

impl RelayEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}

// ── Console → relay ──────────────────────────────────────────────────

/// Target of a test broadcast: one device, or every connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestTarget {
    Device(DeviceId),
    All,
}

const ALL_SENTINEL: &str = "all";

impl Serialize for TestTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Device(id) => id.serialize(serializer),
            Self::All => serializer.serialize_str(ALL_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for TestTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(Self::Device(DeviceId(id))),
            Raw::Text(s) if s == ALL_SENTINEL => Ok(Self::All),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "expected device id or \"{ALL_SENTINEL}\", got {s:?}"
            ))),
        }
    }
}

/// Outbound command to the relay. Fire-and-forget: the relay sends no
/// acknowledgement, effects are observed through later push events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RelayCommand {
    ResetAllLeds,
    ClearLogs,
    ResetAlarm {
        client_id: DeviceId,
    },
    SendTestMessage {
        client_id: TestTarget,
    },
    DisconnectClient {
        client_id: DeviceId,
    },
    #[serde(rename = "get_clients")]
    RequestFleetSnapshot,
    SetDefaultSound {
        client_id: DeviceId,
        sound: String,
    },
    SetGlobalSound {
        sound: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn decode_fleet_snapshot() {
        let raw = json!({
            "event": "update_clients",
            "data": [
                {"id": 1, "name": "Lobby", "ip": "10.0.0.5", "mac": null, "led_state": "alarm"},
                {"id": 2, "name": "Dock", "ip": "10.0.0.6", "mac": "aa:bb", "led_state": "strobe"}
            ]
        });

        let event: RelayEvent = serde_json::from_value(raw).unwrap();
        let RelayEvent::FleetSnapshot(devices) = event else {
            panic!("expected fleet snapshot");
        };
        assert_eq!(devices.len(), 2);
        assert!(devices[0].is_alarming());
        assert_eq!(devices[0].mac, None);
        assert_eq!(devices[1].led_state, LedState::Other("strobe".into()));
        assert_eq!(devices[1].mac.as_deref(), Some("aa:bb"));
    }

    #[test]
    fn decode_indicator_map_with_string_keys() {
        let raw = json!({"event": "update_leds", "data": {"1": "connected", "7": "off"}});

        let event: RelayEvent = serde_json::from_value(raw).unwrap();
        let RelayEvent::IndicatorMap(map) = event else {
            panic!("expected indicator map");
        };
        assert_eq!(map.get(&DeviceId(1)), Some(&LedState::Connected));
        assert_eq!(map.get(&DeviceId(7)), Some(&LedState::Off));
    }

    #[test]
    fn decode_stop_all_without_payload() {
        let event: RelayEvent =
            serde_json::from_str(r#"{"event": "stop_all_sounds_on_frontend"}"#).unwrap();
        assert_eq!(event, RelayEvent::AlarmStopAll);
        assert_eq!(event.kind(), EventKind::AlarmStopAll);
    }

    #[test]
    fn decode_dashboard_defaults_last_activity() {
        let raw = json!({
            "event": "update_dashboard",
            "data": {"server_running": true, "client_count": 2, "message_count": 10}
        });

        let event: RelayEvent = serde_json::from_value(raw).unwrap();
        let RelayEvent::StatusUpdate(status) = event else {
            panic!("expected status update");
        };
        assert!(status.server_running);
        assert_eq!(status.client_count, 2);
        assert_eq!(status.last_activity, "N/A");
    }

    #[test]
    fn decode_log_append() {
        let raw = json!({
            "event": "new_log",
            "data": {"timestamp": "12:00:01", "type": "RECV", "message": "button 1"}
        });

        let event: RelayEvent = serde_json::from_value(raw).unwrap();
        let RelayEvent::LogAppend(entry) = event else {
            panic!("expected log append");
        };
        assert_eq!(entry.kind, LogKind::Recv);
        assert_eq!(entry.kind.severity(), LogSeverity::Event);
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result = serde_json::from_str::<RelayEvent>(r#"{"event": "bogus", "data": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn every_event_kind_is_distinct() {
        let kinds: std::collections::HashSet<_> = EventKind::iter().collect();
        assert_eq!(kinds.len(), 7);
    }

    #[test]
    fn encode_unit_command() {
        let value = serde_json::to_value(RelayCommand::ResetAllLeds).unwrap();
        assert_eq!(value, json!({"event": "reset_all_leds"}));

        let value = serde_json::to_value(RelayCommand::RequestFleetSnapshot).unwrap();
        assert_eq!(value, json!({"event": "get_clients"}));
    }

    #[test]
    fn encode_test_message_targets() {
        let all = RelayCommand::SendTestMessage {
            client_id: TestTarget::All,
        };
        assert_eq!(
            serde_json::to_value(all).unwrap(),
            json!({"event": "send_test_message", "data": {"client_id": "all"}})
        );

        let one = RelayCommand::SendTestMessage {
            client_id: TestTarget::Device(DeviceId(4)),
        };
        assert_eq!(
            serde_json::to_value(one).unwrap(),
            json!({"event": "send_test_message", "data": {"client_id": 4}})
        );
    }

    #[test]
    fn test_target_rejects_other_strings() {
        assert!(serde_json::from_value::<TestTarget>(json!("some")).is_err());
        assert_eq!(
            serde_json::from_value::<TestTarget>(json!("all")).unwrap(),
            TestTarget::All
        );
    }

    #[test]
    fn encode_sound_commands() {
        let cmd = RelayCommand::SetDefaultSound {
            client_id: DeviceId(3),
            sound: "horn.mp3".into(),
        };
        assert_eq!(
            serde_json::to_value(cmd).unwrap(),
            json!({"event": "set_default_sound", "data": {"client_id": 3, "sound": "horn.mp3"}})
        );
    }
}
