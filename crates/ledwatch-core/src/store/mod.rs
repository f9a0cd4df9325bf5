// ── Push-fed state stores ──
//
// Each store holds one `Arc` snapshot in a `watch` channel. Writers swap
// the whole snapshot; readers get cheap clones and change notification.

mod fleet;
mod logs;
mod status;

pub use fleet::{DeviceList, FleetStore, LedMap};
pub use logs::{LogHistory, LogStore};
pub use status::StatusStore;
