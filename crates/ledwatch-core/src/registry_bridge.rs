// ── Device registry bridge ──
//
// CRUD against the registry, reconciled through the push channel. A
// successful write never touches the fleet store directly: it asks the
// relay for a fresh snapshot and lets `update_clients` carry the result.
// The one exception is delete, which drops the id locally once the
// registry has confirmed it.

use std::sync::Arc;

use ledwatch_api::{DeviceDraft, DeviceId, DevicePatch, RegistryClient, RelayCommand, RelayPublisher};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::notification::{Notification, Notifier};
use crate::store::FleetStore;

const MISSING_FIELDS: &str = "Device name and IP address are required";

/// Registry CRUD with refresh-based reconciliation.
pub struct RegistryBridge {
    client: RegistryClient,
    publisher: RelayPublisher,
    fleet: Arc<FleetStore>,
    notifier: Notifier,
}

impl RegistryBridge {
    pub fn new(
        client: RegistryClient,
        publisher: RelayPublisher,
        fleet: Arc<FleetStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            client,
            publisher,
            fleet,
            notifier,
        }
    }

    /// Register a new device. Returns the id the registry assigned.
    ///
    /// Blank name or ip fails locally without a request.
    pub async fn add_device(&self, draft: DeviceDraft) -> Result<DeviceId, CoreError> {
        let draft = self.checked(draft)?;

        match self.client.create_device(&draft).await {
            Ok(record) => {
                info!(id = %record.id, name = %record.name, "device added");
                self.notifier
                    .notify(Notification::success("Device added successfully"));
                self.request_refresh();
                Ok(record.id)
            }
            Err(e) => Err(self.failed("add", e.into())),
        }
    }

    /// Apply `patch` to device `id`.
    ///
    /// The registry replaces whole rows, so fields the patch leaves out are
    /// taken from the current fleet snapshot. A `mac` of `""` clears it.
    pub async fn update_device(&self, id: DeviceId, patch: DevicePatch) -> Result<DeviceId, CoreError> {
        let current = self.fleet.device(id);
        let draft = DeviceDraft {
            name: patch
                .name
                .or_else(|| current.as_ref().map(|d| d.name.clone()))
                .unwrap_or_default(),
            ip: patch
                .ip
                .or_else(|| current.as_ref().map(|d| d.ip.clone()))
                .unwrap_or_default(),
            mac: patch.mac.or_else(|| current.and_then(|d| d.mac)),
        };
        let draft = self.checked(draft)?;

        match self.client.update_device(id, &draft).await {
            Ok(record) => {
                info!(%id, name = %record.name, "device updated");
                self.notifier
                    .notify(Notification::success("Device updated successfully"));
                self.request_refresh();
                Ok(id)
            }
            Err(e) => Err(self.failed("update", e.into())),
        }
    }

    /// Rename a listed device, keeping its ip and mac.
    pub async fn rename_device(&self, id: DeviceId, name: &str) -> Result<DeviceId, CoreError> {
        if !self.fleet.contains(id) {
            let err = CoreError::DeviceNotFound {
                identifier: id.to_string(),
            };
            self.notifier.notify(Notification::error(err.to_string()));
            return Err(err);
        }
        self.update_device(
            id,
            DevicePatch {
                name: Some(name.to_owned()),
                ..DevicePatch::default()
            },
        )
        .await
    }

    /// Delete device `id`.
    ///
    /// The id leaves the local fleet only after the registry confirms; a
    /// failure leaves the fleet untouched.
    pub async fn delete_device(&self, id: DeviceId) -> Result<(), CoreError> {
        match self.client.delete_device(id).await {
            Ok(ack) => {
                let removed = self.fleet.remove_device(id);
                info!(%id, removed, message = %ack.message, "device deleted");
                self.notifier
                    .notify(Notification::success("Device deleted successfully"));
                self.request_refresh();
                Ok(())
            }
            Err(e) => Err(self.failed("delete", e.into())),
        }
    }

    /// Ask the relay for a fresh fleet snapshot.
    pub fn request_refresh(&self) {
        if let Err(e) = self.publisher.publish(RelayCommand::RequestFleetSnapshot) {
            warn!(error = %e, "cannot request fleet snapshot");
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn checked(&self, draft: DeviceDraft) -> Result<DeviceDraft, CoreError> {
        let name = draft.name.trim();
        let ip = draft.ip.trim();
        if name.is_empty() || ip.is_empty() {
            self.notifier.notify(Notification::error(MISSING_FIELDS));
            return Err(CoreError::validation(MISSING_FIELDS));
        }
        let mac = draft
            .mac
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty());
        Ok(DeviceDraft {
            name: name.to_owned(),
            ip: ip.to_owned(),
            mac,
        })
    }

    fn failed(&self, op: &str, err: CoreError) -> CoreError {
        warn!(error = %err, op, "registry request failed");
        let message = match &err {
            CoreError::Registry { message, .. } => format!("Failed to {op} device: {message}"),
            other => format!("Failed to {op} device: {other}"),
        };
        self.notifier.notify(Notification::error(message));
        err
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ledwatch_api::{DeviceRecord, LedState};
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notification::NotificationLevel;

    struct Harness {
        server: MockServer,
        bridge: RegistryBridge,
        commands: UnboundedReceiver<RelayCommand>,
        fleet: Arc<FleetStore>,
        notifier: Notifier,
    }

    async fn setup() -> Harness {
        let server = MockServer::start().await;
        let url = Url::parse(&server.uri()).unwrap();
        let client = RegistryClient::with_client(reqwest::Client::new(), url);
        let (publisher, commands) = RelayPublisher::channel();
        let fleet = Arc::new(FleetStore::new());
        let notifier = Notifier::new();
        let bridge = RegistryBridge::new(client, publisher, Arc::clone(&fleet), notifier.clone());
        Harness {
            server,
            bridge,
            commands,
            fleet,
            notifier,
        }
    }

    fn device(id: i64, name: &str) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId(id),
            name: name.into(),
            ip: format!("10.0.0.{id}"),
            mac: Some("aa:bb".into()),
            led_state: LedState::Off,
        }
    }

    #[tokio::test]
    async fn blank_fields_fail_without_request() {
        let mut h = setup().await;
        let mut notes = h.notifier.subscribe();

        let err = h
            .bridge
            .add_device(DeviceDraft {
                name: "  ".into(),
                ip: "10.0.0.5".into(),
                mac: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(notes.try_recv().unwrap().level, NotificationLevel::Error);
        assert!(h.commands.try_recv().is_err());
        assert!(h.server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_mac_is_sent_as_null() {
        let mut h = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/devices"))
            .and(body_json(json!({"name": "Lobby", "ip": "10.0.0.5", "mac": null})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 7, "name": "Lobby", "ip": "10.0.0.5", "mac": null
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let id = h
            .bridge
            .add_device(DeviceDraft {
                name: " Lobby ".into(),
                ip: "10.0.0.5".into(),
                mac: Some(String::new()),
            })
            .await
            .unwrap();

        assert_eq!(id, DeviceId(7));
        assert_eq!(h.commands.try_recv().unwrap(), RelayCommand::RequestFleetSnapshot);
        assert!(h.fleet.devices().is_empty());
    }

    #[tokio::test]
    async fn rename_keeps_ip_and_mac() {
        let mut h = setup().await;
        h.fleet.replace_devices(vec![device(3, "Old")]);
        Mock::given(method("PUT"))
            .and(path("/api/devices/3"))
            .and(body_json(json!({"name": "New", "ip": "10.0.0.3", "mac": "aa:bb"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3, "name": "New", "ip": "10.0.0.3", "mac": "aa:bb"
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        h.bridge.rename_device(DeviceId(3), "New").await.unwrap();

        assert_eq!(h.commands.try_recv().unwrap(), RelayCommand::RequestFleetSnapshot);
        // Still the old name until the relay pushes a snapshot.
        assert_eq!(h.fleet.device(DeviceId(3)).unwrap().name, "Old");
    }

    #[tokio::test]
    async fn rename_unknown_device_is_not_found() {
        let h = setup().await;
        let err = h.bridge.rename_device(DeviceId(9), "x").await.unwrap_err();
        assert!(matches!(err, CoreError::DeviceNotFound { .. }));
    }

    #[tokio::test]
    async fn conflict_is_surfaced_with_registry_message() {
        let mut h = setup().await;
        let mut notes = h.notifier.subscribe();
        Mock::given(method("POST"))
            .and(path("/api/devices"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"error": "IP address already exists"})),
            )
            .mount(&h.server)
            .await;

        let err = h
            .bridge
            .add_device(DeviceDraft {
                name: "Lobby".into(),
                ip: "10.0.0.5".into(),
                mac: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Registry { status: 409, .. }));
        let note = notes.try_recv().unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert!(note.message.contains("IP address already exists"));
        assert!(h.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn delete_removes_only_after_success() {
        let mut h = setup().await;
        h.fleet.replace_devices(vec![device(1, "A"), device(2, "B")]);
        Mock::given(method("DELETE"))
            .and(path("/api/devices/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Device deleted"})))
            .mount(&h.server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/devices/2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&h.server)
            .await;

        assert!(h.bridge.delete_device(DeviceId(2)).await.is_err());
        assert_eq!(h.fleet.devices().len(), 2);
        assert!(h.commands.try_recv().is_err());

        h.bridge.delete_device(DeviceId(1)).await.unwrap();
        assert_eq!(*h.fleet.devices(), vec![device(2, "B")]);
        assert_eq!(h.commands.try_recv().unwrap(), RelayCommand::RequestFleetSnapshot);
    }

    #[tokio::test]
    async fn delete_without_body_still_removes() {
        let mut h = setup().await;
        h.fleet.replace_devices(vec![device(1, "A"), device(2, "B")]);
        let mut notes = h.notifier.subscribe();
        Mock::given(method("DELETE"))
            .and(path("/api/devices/1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&h.server)
            .await;

        h.bridge.delete_device(DeviceId(1)).await.unwrap();

        assert_eq!(*h.fleet.devices(), vec![device(2, "B")]);
        assert_eq!(notes.try_recv().unwrap().level, NotificationLevel::Success);
        assert_eq!(h.commands.try_recv().unwrap(), RelayCommand::RequestFleetSnapshot);
    }

    #[tokio::test]
    async fn update_with_blank_fields_fails_without_request() {
        let mut h = setup().await;
        h.fleet.replace_devices(vec![device(3, "Dock")]);
        let mut notes = h.notifier.subscribe();
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = h
            .bridge
            .update_device(
                DeviceId(3),
                DevicePatch {
                    name: Some("Dock".into()),
                    ip: Some("   ".into()),
                    mac: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        // Unknown device with no name supplied has nothing to fill from.
        let err = h
            .bridge
            .update_device(
                DeviceId(9),
                DevicePatch {
                    ip: Some("10.0.0.9".into()),
                    ..DevicePatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        assert_eq!(notes.try_recv().unwrap().message, MISSING_FIELDS);
        assert!(h.commands.try_recv().is_err());
        assert_eq!(*h.fleet.devices(), vec![device(3, "Dock")]);
    }

    #[tokio::test]
    async fn update_with_empty_mac_clears_it() {
        let mut h = setup().await;
        h.fleet.replace_devices(vec![device(3, "Dock")]);
        Mock::given(method("PUT"))
            .and(path("/api/devices/3"))
            .and(body_json(json!({"name": "Dock", "ip": "10.0.0.3", "mac": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 3, "name": "Dock", "ip": "10.0.0.3", "mac": null
            })))
            .expect(1)
            .mount(&h.server)
            .await;

        let id = h
            .bridge
            .update_device(
                DeviceId(3),
                DevicePatch {
                    mac: Some(String::new()),
                    ..DevicePatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(id, DeviceId(3));
        assert_eq!(h.commands.try_recv().unwrap(), RelayCommand::RequestFleetSnapshot);
    }

    #[tokio::test]
    async fn update_conflict_leaves_fleet_unchanged() {
        let mut h = setup().await;
        h.fleet.replace_devices(vec![device(3, "Dock")]);
        let mut notes = h.notifier.subscribe();
        Mock::given(method("PUT"))
            .and(path("/api/devices/3"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"error": "IP address already exists"})),
            )
            .expect(1)
            .mount(&h.server)
            .await;

        let err = h
            .bridge
            .update_device(
                DeviceId(3),
                DevicePatch {
                    ip: Some("10.0.0.4".into()),
                    ..DevicePatch::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Registry { status: 409, .. }));
        let note = notes.try_recv().unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert_eq!(note.message, "Failed to update device: IP address already exists");
        assert!(h.commands.try_recv().is_err());
        assert_eq!(*h.fleet.devices(), vec![device(3, "Dock")]);
    }
}
