//! Console state layer between `ledwatch-api` and UI consumers.
//!
//! - **[`Console`]**: central facade. [`connect()`](Console::connect) spawns
//!   the relay loop and a single dispatch task that applies every push event
//!   in arrival order. User actions (relay commands, registry CRUD, sound
//!   selection) are plain methods on the same handle.
//!
//! - **Stores** ([`store`]): fleet snapshot, indicator map, dashboard status
//!   and activity log, each an `Arc` snapshot in a `tokio::sync::watch`
//!   channel, replaced wholesale. Consumers subscribe through
//!   [`SnapshotStream<T>`].
//!
//! - **[`AlarmOrchestrator`]**: Idle / Alarming / TestPlaying state machine
//!   owning the single [`AudioChannel`]. New playback preempts old.
//!
//! - **[`RegistryBridge`]**: registry CRUD that reconciles by asking the
//!   relay for a fresh fleet snapshot instead of merging responses.
//!
//! - **[`EventRouter`]**: dispatch table keyed by the closed
//!   [`EventKind`](ledwatch_api::EventKind) enum, built once per console.

pub mod alarm;
pub mod config;
pub mod console;
pub mod error;
pub mod notification;
pub mod preferences;
pub mod registry_bridge;
pub mod router;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alarm::{
    AlarmOrchestrator, AlarmSession, AlarmState, AudioChannel, AudioError, Playback, SilentAudio,
    Sound, SoundLibrary,
};
pub use config::{ConsoleConfig, DEFAULT_SOUND};
pub use console::{BUILTIN_SOUNDS, ConnectionState, Console, ResetScope};
pub use error::CoreError;
pub use notification::{Notification, NotificationLevel, Notifier};
pub use preferences::{GLOBAL_SOUND_KEY, MemoryPreferences, PreferenceStore, Preferences};
pub use registry_bridge::RegistryBridge;
pub use router::EventRouter;
pub use store::{DeviceList, FleetStore, LedMap, LogHistory, LogStore, StatusStore};
pub use stream::{SnapshotStream, SnapshotWatchStream};

// Wire types consumers need alongside the console.
pub use ledwatch_api::{
    DashboardStatus, DeviceDraft, DeviceId, DevicePatch, DeviceRecord, LedState, LogEntry,
    LogKind, LogSeverity, ReconnectConfig, TestTarget,
};
