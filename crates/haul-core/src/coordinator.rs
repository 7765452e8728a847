//! HTTP client for the coordinator service.
//!
//! The coordinator registers sessions and enumerates relays. It is purely
//! advisory: callers log failures and continue, and its absence never blocks
//! a local transfer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::COORDINATOR_TIMEOUT;
use crate::error::{Error, Result};
use crate::model::{FileMetadata, TransferSession};

/// A relay registered with the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayInfo {
    pub id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    file: &'a FileMetadata,
}

#[derive(Serialize)]
struct RegisterRelayRequest<'a> {
    id: &'a str,
    address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    region: Option<&'a str>,
}

/// Small HTTP client for the coordinator API.
pub struct CoordinatorClient {
    base_url: String,
    http: reqwest::Client,
}

impl CoordinatorClient {
    /// Create a client for `base_url` (no trailing slash) with a 10 s
    /// request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(COORDINATOR_TIMEOUT)
            .build()
            .map_err(|e| Error::Coordinator {
                message: format!("build http client: {}", e),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Register a new transfer session; returns the coordinator's copy.
    pub async fn create_session(&self, file: &FileMetadata) -> Result<TransferSession> {
        let response = self
            .http
            .post(format!("{}/api/v1/session", self.base_url))
            .json(&CreateSessionRequest { file })
            .send()
            .await
            .map_err(coordinator_err)?;

        if response.status() != reqwest::StatusCode::CREATED {
            return Err(Error::Coordinator {
                message: format!("unexpected status: {}", response.status()),
            });
        }
        response.json().await.map_err(coordinator_err)
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, id: &str) -> Result<TransferSession> {
        let response = self
            .http
            .get(format!("{}/api/v1/session/{}", self.base_url, id))
            .send()
            .await
            .map_err(coordinator_err)?
            .error_for_status()
            .map_err(coordinator_err)?;
        response.json().await.map_err(coordinator_err)
    }

    /// Register a relay endpoint.
    pub async fn register_relay(
        &self,
        id: &str,
        address: &str,
        region: Option<&str>,
    ) -> Result<RelayInfo> {
        let response = self
            .http
            .post(format!("{}/api/v1/relays/register", self.base_url))
            .json(&RegisterRelayRequest { id, address, region })
            .send()
            .await
            .map_err(coordinator_err)?
            .error_for_status()
            .map_err(coordinator_err)?;
        response.json().await.map_err(coordinator_err)
    }

    /// List the registered relays.
    pub async fn list_relays(&self) -> Result<Vec<RelayInfo>> {
        let response = self
            .http
            .get(format!("{}/api/v1/relays", self.base_url))
            .send()
            .await
            .map_err(coordinator_err)?
            .error_for_status()
            .map_err(coordinator_err)?;
        response.json().await.map_err(coordinator_err)
    }
}

fn coordinator_err(e: reqwest::Error) -> Error {
    Error::Coordinator {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = CoordinatorClient::new("http://localhost:9000/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    #[test]
    fn relay_info_roundtrip() {
        let relay = RelayInfo {
            id: "relay-eu-1".into(),
            address: "203.0.113.9:7000".into(),
            region: Some("eu-west".into()),
            last_seen: Utc::now(),
        };
        let json = serde_json::to_string(&relay).unwrap();
        let back: RelayInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(relay, back);
    }

    #[test]
    fn relay_info_region_is_optional() {
        let json = r#"{"id":"r1","address":"10.0.0.1:7000","last_seen":"2025-01-01T00:00:00Z"}"#;
        let relay: RelayInfo = serde_json::from_str(json).unwrap();
        assert!(relay.region.is_none());

        let out = serde_json::to_string(&relay).unwrap();
        assert!(!out.contains("region"));
    }

    #[tokio::test]
    async fn unreachable_coordinator_is_an_error() {
        let client = CoordinatorClient::new("http://127.0.0.1:1").unwrap();
        let err = client.list_relays().await.unwrap_err();
        assert!(err.is_transient());
    }
}
