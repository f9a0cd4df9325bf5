// ledwatch-api: Async Rust client for the relay event channel and device registry

pub mod error;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod transport;

pub use error::Error;
pub use protocol::{
    AlarmPlay, DashboardStatus, DeviceId, DeviceRecord, EventKind, LedState, LogEntry, LogKind,
    LogSeverity, RelayCommand, RelayEvent, TestTarget,
};
pub use registry::{DeleteAck, DeviceDraft, DevicePatch, RegistryClient};
pub use relay::{ChannelEvent, ReconnectConfig, RelayHandle, RelayPublisher};
pub use transport::TransportConfig;
