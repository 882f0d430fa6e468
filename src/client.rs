use anyhow::{Context, Result};
use log::warn;
use reqwest::StatusCode;

use crate::models::{ChildId, ChildSettings, ScreenTimeStatus, SessionRequest};

/// Backend origin used when `MERELAX_API_ENDPOINT` is not set.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
pub const ENDPOINT_ENV_VAR: &str = "MERELAX_API_ENDPOINT";
const API_ROOT: &str = "/api/v1";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: String,
}

impl ApiConfig {
    /// Build a config for an explicit backend origin (scheme + host + port).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self {
            base_url: format!("{endpoint}{API_ROOT}"),
        }
    }

    /// Read the backend origin from the environment.
    pub fn from_env() -> Self {
        let endpoint =
            std::env::var(ENDPOINT_ENV_VAR).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Self::new(endpoint)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Thin RPC boundary to the server-side session record. Carries no local
/// state beyond the connection pool; all error recovery happens in the
/// controller, which logs failures and keeps the last-known local state.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
}

impl SessionClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url,
        }
    }

    /// Read the canonical session state. Side-effect free on the server.
    pub async fn fetch_status(&self, child_id: ChildId) -> Result<ScreenTimeStatus> {
        let url = format!("{}/screentime/status", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("child_id", child_id)])
            .send()
            .await
            .context("screentime status request failed")?
            .error_for_status()
            .context("screentime status returned an error")?;

        response
            .json::<ScreenTimeStatus>()
            .await
            .context("screentime status body did not parse")
    }

    /// Create a new active session for the child, starting at zero seconds.
    pub async fn start_session(&self, child_id: ChildId) -> Result<ScreenTimeStatus> {
        let url = format!("{}/screentime/start", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&SessionRequest { child_id })
            .send()
            .await
            .context("screentime start request failed")?
            .error_for_status()
            .context("screentime start returned an error")?;

        response
            .json::<ScreenTimeStatus>()
            .await
            .context("screentime start body did not parse")
    }

    /// Terminate whatever active session exists for the child. Idempotent:
    /// the backend answering 404 (nothing to end) is treated as success.
    pub async fn end_session(&self, child_id: ChildId) -> Result<()> {
        let url = format!("{}/screentime/end", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&SessionRequest { child_id })
            .send()
            .await
            .context("screentime end request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("end_session: no active session for child {child_id}");
            return Ok(());
        }

        response
            .error_for_status()
            .context("screentime end returned an error")?;
        Ok(())
    }

    /// Resolve the default child id from the settings service. A settings
    /// record without a child, or an error status, yields `None`.
    pub async fn default_child(&self, settings_key: &str) -> Result<Option<ChildId>> {
        let url = format!("{}/settings/{settings_key}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("settings request failed")?;

        if !response.status().is_success() {
            warn!("settings lookup for {settings_key} answered {}", response.status());
            return Ok(None);
        }

        let settings = response
            .json::<ChildSettings>()
            .await
            .context("settings body did not parse")?;
        Ok(settings.child_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SessionClient {
        SessionClient::new(ApiConfig::new(server.uri()))
    }

    fn status_body(id: u64, active: bool, elapsed: u64, level: u8) -> serde_json::Value {
        serde_json::json!({
            "screentime_id": id,
            "is_active": active,
            "elapsed_seconds": elapsed,
            "message": "",
            "alert_level": level,
        })
    }

    #[tokio::test]
    async fn fetch_status_hits_versioned_path_with_child_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/screentime/status"))
            .and(query_param("child_id", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status_body(3, true, 120, 0)))
            .expect(1)
            .mount(&server)
            .await;

        let status = client_for(&server).fetch_status(7).await.unwrap();
        assert_eq!(status.screentime_id, 3);
        assert_eq!(status.elapsed_seconds, 120);
    }

    #[tokio::test]
    async fn start_session_posts_child_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/screentime/start"))
            .and(body_json(serde_json::json!({ "child_id": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(status_body(9, true, 0, 0)))
            .expect(1)
            .mount(&server)
            .await;

        let status = client_for(&server).start_session(7).await.unwrap();
        assert_eq!(status.screentime_id, 9);
        assert_eq!(status.elapsed_seconds, 0);
        assert!(status.is_active);
    }

    #[tokio::test]
    async fn end_session_treats_missing_session_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/screentime/end"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client_for(&server).end_session(7).await.is_ok());
    }

    #[tokio::test]
    async fn end_session_propagates_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/screentime/end"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(client_for(&server).end_session(7).await.is_err());
    }

    #[tokio::test]
    async fn default_child_reads_settings_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/settings/1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "child_id": 12 })),
            )
            .mount(&server)
            .await;

        let resolved = client_for(&server).default_child("1").await.unwrap();
        assert_eq!(resolved, Some(12));
    }

    #[tokio::test]
    async fn default_child_is_none_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/settings/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolved = client_for(&server).default_child("1").await.unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn config_normalizes_trailing_slash() {
        let config = ApiConfig::new("http://localhost:8000/");
        assert_eq!(config.base_url(), "http://localhost:8000/api/v1");
    }
}
