#![allow(clippy::unwrap_used)]
// Integration tests for `RegistryClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledwatch_api::{DeviceDraft, DeviceId, Error, LedState, RegistryClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RegistryClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RegistryClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn lobby() -> DeviceDraft {
    DeviceDraft {
        name: "Lobby".into(),
        ip: "10.0.0.5".into(),
        mac: None,
    }
}

// ── Create tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_device() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .and(body_json(json!({"name": "Lobby", "ip": "10.0.0.5", "mac": null})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9, "name": "Lobby", "ip": "10.0.0.5", "mac": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = client.create_device(&lobby()).await.unwrap();
    assert_eq!(record.id, DeviceId(9));
    assert_eq!(record.name, "Lobby");
    // The registry knows nothing about live state.
    assert_eq!(record.led_state, LedState::Off);
}

#[tokio::test]
async fn test_create_device_conflict() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "IP address already exists"})),
        )
        .mount(&server)
        .await;

    let err = client.create_device(&lobby()).await.unwrap_err();
    match err {
        Error::Registry { status, message } => {
            assert_eq!(status, 409);
            assert_eq!(message, "IP address already exists");
        }
        other => panic!("expected Registry error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_device_plain_text_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = client.create_device(&lobby()).await.unwrap_err();
    assert!(matches!(err, Error::Registry { status: 500, .. }));
    assert!(err.to_string().contains("Internal Server Error"));
}

// ── Update tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_device() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/devices/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "name": "Lobby", "ip": "10.0.0.5", "mac": "aa:bb:cc:dd:ee:ff"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let draft = DeviceDraft {
        mac: Some("aa:bb:cc:dd:ee:ff".into()),
        ..lobby()
    };
    let record = client.update_device(DeviceId(3), &draft).await.unwrap();
    assert_eq!(record.id, DeviceId(3));
    assert_eq!(record.mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
}

#[tokio::test]
async fn test_update_device_missing_fields() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/devices/3"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "Name and IP are required"})),
        )
        .mount(&server)
        .await;

    let result = client.update_device(DeviceId(3), &DeviceDraft::default()).await;
    assert!(
        matches!(result, Err(Error::Registry { status: 400, .. })),
        "expected 400 Registry error, got: {result:?}"
    );
}

// ── Delete tests ─────────────────────────────────────────────

#[tokio::test]
async fn test_delete_device() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/devices/4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Device deleted successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = client.delete_device(DeviceId(4)).await.unwrap();
    assert_eq!(ack.message, "Device deleted successfully");
}

#[tokio::test]
async fn test_delete_device_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/devices/4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.delete_device(DeviceId(4)).await.unwrap_err();
    assert!(
        matches!(err, Error::Registry { status: 404, .. }),
        "expected not found, got: {err:?}"
    );
}

#[tokio::test]
async fn test_delete_device_without_body() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/devices/4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/devices/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
        .expect(1)
        .mount(&server)
        .await;

    let ack = client.delete_device(DeviceId(4)).await.unwrap();
    assert!(ack.message.is_empty());
    let ack = client.delete_device(DeviceId(5)).await.unwrap();
    assert!(ack.message.is_empty());
}

#[tokio::test]
async fn test_malformed_success_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(201).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.create_device(&lobby()).await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}
