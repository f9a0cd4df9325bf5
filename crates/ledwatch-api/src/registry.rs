// Device registry HTTP client
//
// Thin wrapper over `reqwest::Client` for the registry's `/api/devices`
// endpoints. Responses are returned as-is; deciding what to do with them
// (and what not to trust) is the caller's business.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::protocol::{DeviceId, DeviceRecord};
use crate::transport::TransportConfig;

/// Fields sent when creating or replacing a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDraft {
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub mac: Option<String>,
}

/// Partial edit of a device, as entered by the user.
///
/// The registry replaces whole rows, so `name` and `ip` must be present by
/// the time the patch is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub ip: Option<String>,
    pub mac: Option<String>,
}

/// Error body the registry sends on non-success responses.
#[derive(Deserialize)]
struct RegistryErrorBody {
    error: String,
}

/// Body of a successful delete. The registry may send none at all.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteAck {
    #[serde(default)]
    pub message: String,
}

/// Raw HTTP client for the device registry.
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RegistryClient {
    /// Create a registry client from a `TransportConfig`.
    ///
    /// `base_url` is the registry root, e.g. `http://localhost:5000`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a registry client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `POST /api/devices`
    pub async fn create_device(&self, draft: &DeviceDraft) -> Result<DeviceRecord, Error> {
        let url = self.devices_url(None)?;
        debug!("POST {}", url);

        let resp = self.http.post(url).json(draft).send().await?;
        Self::parse_json(resp).await
    }

    /// `PUT /api/devices/{id}`
    pub async fn update_device(
        &self,
        id: DeviceId,
        draft: &DeviceDraft,
    ) -> Result<DeviceRecord, Error> {
        let url = self.devices_url(Some(id))?;
        debug!("PUT {}", url);

        let resp = self.http.put(url).json(draft).send().await?;
        Self::parse_json(resp).await
    }

    /// `DELETE /api/devices/{id}`
    ///
    /// Any 2xx is a successful delete; the ack body is optional.
    pub async fn delete_device(&self, id: DeviceId) -> Result<DeleteAck, Error> {
        let url = self.devices_url(Some(id))?;
        debug!("DELETE {}", url);

        let resp = self.http.delete(url).send().await?;
        let body = Self::success_body(resp).await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn devices_url(&self, id: Option<DeviceId>) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = match id {
            Some(id) => format!("{base}/api/devices/{id}"),
            None => format!("{base}/api/devices"),
        };
        Ok(Url::parse(&full)?)
    }

    /// Map non-success statuses to [`Error::Registry`], otherwise decode.
    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let body = Self::success_body(resp).await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }

    /// Read the body of a 2xx response, or turn anything else into
    /// [`Error::Registry`] with the registry's `error` text when present.
    async fn success_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<RegistryErrorBody>(&body).map_or_else(
                |_| {
                    if body.trim().is_empty() {
                        status.canonical_reason().unwrap_or("request failed").to_owned()
                    } else {
                        preview(&body)
                    }
                },
                |b| b.error,
            );
            return Err(Error::Registry {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
