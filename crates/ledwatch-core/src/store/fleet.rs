use std::collections::BTreeMap;
use std::sync::Arc;

use ledwatch_api::{DeviceId, DeviceRecord, LedState};
use tokio::sync::watch;

use crate::stream::SnapshotStream;

pub type DeviceList = Vec<DeviceRecord>;
pub type LedMap = BTreeMap<DeviceId, LedState>;

/// Current fleet snapshot and indicator-state map.
///
/// Both are replaced wholesale from push events; nothing here merges.
/// The only partial mutation is [`remove_device`](Self::remove_device),
/// reserved for a registry delete that has already been confirmed.
pub struct FleetStore {
    devices: watch::Sender<Arc<DeviceList>>,
    led_states: watch::Sender<Arc<LedMap>>,
}

impl FleetStore {
    pub fn new() -> Self {
        let (devices, _) = watch::channel(Arc::new(Vec::new()));
        let (led_states, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            devices,
            led_states,
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────

    pub fn replace_devices(&self, devices: DeviceList) {
        tracing::debug!(count = devices.len(), "fleet snapshot replaced");
        self.devices.send_replace(Arc::new(devices));
    }

    pub fn replace_led_states(&self, led_states: LedMap) {
        self.led_states.send_replace(Arc::new(led_states));
    }

    /// Drop every device. Used when the relay becomes unreachable.
    pub fn clear_devices(&self) {
        self.devices.send_replace(Arc::new(Vec::new()));
    }

    /// Remove one device after the registry confirmed its deletion.
    /// Returns `true` if the device was listed.
    pub(crate) fn remove_device(&self, id: DeviceId) -> bool {
        self.devices.send_if_modified(|snap| {
            if !snap.iter().any(|d| d.id == id) {
                return false;
            }
            let kept: DeviceList = snap.iter().filter(|d| d.id != id).cloned().collect();
            *snap = Arc::new(kept);
            true
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn devices(&self) -> Arc<DeviceList> {
        self.devices.borrow().clone()
    }

    pub fn led_states(&self) -> Arc<LedMap> {
        self.led_states.borrow().clone()
    }

    pub fn device(&self, id: DeviceId) -> Option<DeviceRecord> {
        self.devices.borrow().iter().find(|d| d.id == id).cloned()
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.borrow().iter().any(|d| d.id == id)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> SnapshotStream<DeviceList> {
        SnapshotStream::new(self.devices.subscribe())
    }

    pub fn subscribe_led_states(&self) -> SnapshotStream<LedMap> {
        SnapshotStream::new(self.led_states.subscribe())
    }
}

impl Default for FleetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(id: i64, led_state: LedState) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId(id),
            name: format!("dev-{id}"),
            ip: format!("10.0.0.{id}"),
            mac: None,
            led_state,
        }
    }

    #[test]
    fn replace_is_not_merge() {
        let store = FleetStore::new();
        store.replace_devices(vec![device(1, LedState::On), device(2, LedState::Off)]);
        store.replace_devices(vec![device(3, LedState::Alarm)]);

        let devices = store.devices();
        assert_eq!(*devices, vec![device(3, LedState::Alarm)]);
        assert!(!store.contains(DeviceId(1)));
    }

    #[test]
    fn remove_device_only_touches_listed_ids() {
        let store = FleetStore::new();
        store.replace_devices(vec![device(1, LedState::On), device(2, LedState::Off)]);

        assert!(store.remove_device(DeviceId(1)));
        assert!(!store.remove_device(DeviceId(9)));
        assert_eq!(*store.devices(), vec![device(2, LedState::Off)]);
    }

    #[test]
    fn led_map_is_independent_of_devices() {
        let store = FleetStore::new();
        store.replace_led_states(BTreeMap::from([(DeviceId(1), LedState::Blink)]));
        store.clear_devices();

        assert_eq!(store.led_states().get(&DeviceId(1)), Some(&LedState::Blink));
        assert!(store.devices().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_replacements() {
        let store = FleetStore::new();
        let mut stream = store.subscribe_devices();
        assert!(stream.current().is_empty());

        store.replace_devices(vec![device(1, LedState::On)]);
        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
    }
}
