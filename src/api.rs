// file: src/api.rs
// description: thin REST client for event history, unread count and mark-read

use crate::{error::MonitorError, types::MonitoringEvent};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct EventPage {
    #[serde(default)]
    events: Vec<MonitoringEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnreadResponse {
    unread_count: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the monitoring REST endpoints, rooted at `base_url`
/// (e.g. `https://dash.example.com/api/v1/monitoring/`).
#[derive(Debug, Clone)]
pub struct HttpEventsApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpEventsApi {
    pub fn new(
        base_url: Url,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, MonitorError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| MonitorError::InvalidMessage(format!("invalid token header: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self::from_reqwest(base_url, http))
    }

    /// Wrap an existing client (caller manages auth headers).
    pub fn from_reqwest(mut base_url: Url, http: reqwest::Client) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    /// `GET events?page_size=N`
    pub async fn fetch_page(&self, page_size: u32) -> Result<Vec<MonitoringEvent>, MonitorError> {
        let url = self.url("events")?;
        debug!("GET {url} page_size={page_size}");

        let resp = self
            .http
            .get(url)
            .query(&[("page_size", page_size)])
            .send()
            .await?;
        let page: EventPage = Self::handle_response(resp).await?;
        Ok(page.events)
    }

    /// `GET events/unread`
    pub async fn fetch_unread_count(&self) -> Result<u64, MonitorError> {
        let url = self.url("events/unread")?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        let body: UnreadResponse = Self::handle_response(resp).await?;
        Ok(body.unread_count)
    }

    /// `PATCH events/{id}/read`. Any 2xx is success; the body is ignored.
    pub async fn mark_read(&self, id: &str) -> Result<(), MonitorError> {
        let mut url = self.url("events")?;
        url.path_segments_mut()
            .map_err(|_| MonitorError::InvalidMessage("base URL cannot hold a path".into()))?
            .push(id)
            .push("read");
        debug!("PATCH {url}");

        let resp = self.http.patch(url).send().await?;
        Self::check_status(resp).await.map(|_| ())
    }

    fn url(&self, path: &str) -> Result<Url, MonitorError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, MonitorError> {
        let resp = Self::check_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, MonitorError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail.or(b.message))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(MonitorError::ApiStatus {
            status: status.as_u16(),
            message,
        })
    }
}
