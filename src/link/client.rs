use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use hasslink_api::link::LinkConfig;
use hasslink_api::state::{STATE_OFF, STATE_ON, ServiceCall};

use crate::error::ApiResult;

/// Result of a single remote request.
///
/// Remote failures never propagate as errors. They are reported here, so
/// callers can tell "no update" apart from a confirmed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteOutcome<T> {
    Confirmed(T),
    /// Connection failure or timeout
    Unreachable(String),
    /// Unexpected status code or response body
    ProtocolError(String),
}

enum RemoteFailure {
    Unreachable(String),
    Protocol(String),
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<url::ParseError> for RemoteFailure {
    fn from(err: url::ParseError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl<T> From<Result<T, RemoteFailure>> for RemoteOutcome<T> {
    fn from(res: Result<T, RemoteFailure>) -> Self {
        match res {
            Ok(value) => Self::Confirmed(value),
            Err(RemoteFailure::Unreachable(msg)) => Self::Unreachable(msg),
            Err(RemoteFailure::Protocol(msg)) => Self::ProtocolError(msg),
        }
    }
}

/// The remote half of a link: one on/off switch on another instance.
#[async_trait]
pub trait RemoteSwitch: Send + Sync {
    /// Read the current remote state (`true` = on)
    async fn fetch_state(&self) -> RemoteOutcome<bool>;

    /// Ask the remote to switch on or off
    async fn set_state(&self, on: bool) -> RemoteOutcome<()>;
}

#[derive(Debug, Deserialize)]
struct RemoteState {
    state: String,
}

pub struct RemoteSwitchClient {
    link_name: String,
    base_url: Url,
    token: String,
    entity_id: String,
    http: reqwest::Client,
}

impl RemoteSwitchClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Build the connection pool shared by every link.
    pub fn http_client() -> ApiResult<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()?)
    }

    #[must_use]
    pub fn new(http: reqwest::Client, config: &LinkConfig) -> Self {
        Self {
            link_name: config.name.clone(),
            base_url: config.remote_url.clone(),
            token: config.remote_token.clone(),
            entity_id: config.remote_entity_id.clone(),
            http,
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, url::ParseError> {
        // keep any path prefix of the base url
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(endpoint.trim_start_matches('/'))
    }

    async fn try_fetch_state(&self) -> Result<bool, RemoteFailure> {
        let url = self.endpoint_url(&format!("/api/states/{}", self.entity_id))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .timeout(Self::DEFAULT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RemoteFailure::Protocol(format!(
                "GET /api/states/{}: {status}",
                self.entity_id
            )));
        }

        let body = response.text().await?;
        let remote: RemoteState = serde_json::from_str(&body)?;
        match remote.state.as_str() {
            STATE_ON => Ok(true),
            STATE_OFF => Ok(false),
            other => Err(RemoteFailure::Protocol(format!(
                "Remote entity {} reports unexpected state {other:?}",
                self.entity_id
            ))),
        }
    }

    async fn try_set_state(&self, on: bool) -> Result<(), RemoteFailure> {
        let service = if on { "turn_on" } else { "turn_off" };
        let url = self.endpoint_url(&format!("/api/services/switch/{service}"))?;
        let payload = ServiceCall {
            entity_id: self.entity_id.clone(),
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&payload)
            .timeout(Self::DEFAULT_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        // drain the body, the content is not used
        let _ = response.text().await?;

        if !status.is_success() {
            return Err(RemoteFailure::Protocol(format!(
                "POST /api/services/switch/{service}: {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSwitch for RemoteSwitchClient {
    async fn fetch_state(&self) -> RemoteOutcome<bool> {
        let res = self.try_fetch_state().await;
        if let Err(RemoteFailure::Unreachable(msg)) = &res {
            log::trace!("[{}] Remote read failed: {msg}", self.link_name);
        }
        res.into()
    }

    async fn set_state(&self, on: bool) -> RemoteOutcome<()> {
        self.try_set_state(on).await.into()
    }
}
