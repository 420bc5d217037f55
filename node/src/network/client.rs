// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use trunk_kernel::EventRow;

use super::{ndjson_rows, InsertStatus, RemoteError, RemoteEventStore, RowStream};
use crate::config::NodeConfig;

/// Remote event table over HTTP.
///
/// Inserts and selects carry a per-request timeout. The realtime request
/// does not, since its body is a long-lived stream; callers bound the
/// handshake instead.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client,
        })
    }

    /// `None` when no remote is configured.
    pub fn from_config(cfg: &NodeConfig) -> Option<Result<Self, RemoteError>> {
        cfg.remote_url
            .as_ref()
            .map(|url| Self::new(url.clone(), cfg.api_key.clone(), cfg.network_timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key).bearer_auth(key);
        }
        req
    }

    fn map_err(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }

    async fn rejected(resp: reqwest::Response) -> RemoteError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        RemoteError::Rejected { status, body }
    }
}

#[async_trait]
impl RemoteEventStore for HttpRemote {
    async fn insert(&self, row: &EventRow) -> Result<InsertStatus, RemoteError> {
        let resp = self
            .request(Method::POST, "/rest/v1/events")
            .header("Prefer", "resolution=ignore-duplicates")
            .timeout(self.timeout)
            .json(row)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        match resp.status() {
            StatusCode::CREATED => Ok(InsertStatus::Inserted),
            StatusCode::OK | StatusCode::CONFLICT => Ok(InsertStatus::AlreadyPresent),
            _ => Err(Self::rejected(resp).await),
        }
    }

    async fn select_after(&self, user_id: &str, after_id: Option<i64>) -> Result<Vec<EventRow>, RemoteError> {
        let mut query = vec![("user_id", user_id.to_string())];
        if let Some(after) = after_id {
            query.push(("after_id", after.to_string()));
        }
        let resp = self
            .request(Method::GET, "/rest/v1/events")
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }
        resp.json::<Vec<EventRow>>().await.map_err(|e| self.map_err(e))
    }

    async fn subscribe(&self, user_id: &str) -> Result<RowStream, RemoteError> {
        let resp = self
            .request(Method::GET, "/realtime/v1/events")
            .query(&[("user_id", user_id)])
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        if !resp.status().is_success() {
            return Err(Self::rejected(resp).await);
        }
        tracing::debug!("Realtime stream open at {}", self.base_url);
        Ok(ndjson_rows(resp.bytes_stream()))
    }
}
