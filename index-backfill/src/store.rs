#![doc = "Algolia-backed implementation of the core `RemoteStore` contract."]
//
//! # Remote store client (CLI <-> Core)
//!
//! This module wires the [`RemoteStore`] trait from `index-backfill-core` to the
//! Algolia REST API over `reqwest`:
//!
//! - `get_by_ids` → `POST /1/indexes/*/objects`
//! - `save_batch` → `POST /1/indexes/{index}/batch` with `updateObject` actions
//! - `save_one`   → `PUT /1/indexes/{index}/{objectID}`
//!
//! ## Hosts
//!
//! Reads go to `{app}-dsn.algolia.net`, writes to `{app}.algolia.net`, and both
//! fall back to `{app}-1..3.algolianet.com`. A host is skipped on connection
//! errors, timeouts and 5xx responses. When every host fails that way the call
//! returns [`StoreError::Unreachable`]; any other non-2xx response is classified
//! with [`StoreError::from_response`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use index_backfill_core::contract::{GetObjectsResponse, Record, RemoteStore, StoreError};
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};

/// Connection settings for the remote index. Secrets are injected from the environment.
#[derive(Clone)]
pub struct StoreSettings {
    pub app_id: String,
    pub api_key: String,
    pub index_name: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Replaces the default host list, e.g. `["http://localhost:8080"]`.
    pub hosts: Option<Vec<String>>,
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("app_id", &self.app_id)
            .field("api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .field("hosts", &self.hosts)
            .finish()
    }
}

/// Default read hosts for an application id, in the order they are tried.
pub fn read_hosts(app_id: &str) -> Vec<String> {
    let mut hosts = vec![format!("https://{app_id}-dsn.algolia.net")];
    hosts.extend(fallback_hosts(app_id));
    hosts
}

/// Default write hosts for an application id, in the order they are tried.
pub fn write_hosts(app_id: &str) -> Vec<String> {
    let mut hosts = vec![format!("https://{app_id}.algolia.net")];
    hosts.extend(fallback_hosts(app_id));
    hosts
}

fn fallback_hosts(app_id: &str) -> impl Iterator<Item = String> + '_ {
    (1..=3).map(move |n| format!("https://{app_id}-{n}.algolianet.com"))
}

pub struct AlgoliaClient {
    http: reqwest::Client,
    settings: StoreSettings,
    read_hosts: Vec<String>,
    write_hosts: Vec<String>,
}

impl AlgoliaClient {
    pub fn new(settings: StoreSettings) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                StoreError::other(format!("failed to build HTTP client: {e}"))
            })?;
        let (read_hosts, write_hosts) = match &settings.hosts {
            Some(hosts) => (hosts.clone(), hosts.clone()),
            None => (read_hosts(&settings.app_id), write_hosts(&settings.app_id)),
        };
        tracing::info!(
            app_id = %settings.app_id,
            index = %settings.index_name,
            api_key_set = !settings.api_key.is_empty(),
            "Initialized AlgoliaClient"
        );
        Ok(Self {
            http,
            settings,
            read_hosts,
            write_hosts,
        })
    }

    /// Sends one request, moving on to the next host on retryable failures.
    async fn request(
        &self,
        hosts: &[String],
        method: Method,
        segments: &[&str],
        body: &Value,
    ) -> Result<(StatusCode, Value), StoreError> {
        let mut failures = Vec::new();
        for host in hosts {
            let url = build_url(host, segments)?;
            let sent = self
                .http
                .request(method.clone(), url)
                .header("X-Algolia-Application-Id", &self.settings.app_id)
                .header("X-Algolia-API-Key", &self.settings.api_key)
                .json(body)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    tracing::warn!(host = %host, error = %e, "Host unreachable, trying next host");
                    failures.push(format!("{host}: {e}"));
                    continue;
                }
                Err(e) => {
                    tracing::error!(host = %host, error = ?e, "Request failed");
                    return Err(StoreError::other(e.to_string()));
                }
            };

            let status = response.status();
            let text = response.text().await.map_err(|e| {
                tracing::error!(host = %host, error = ?e, "Failed to read response body");
                StoreError::other(format!("failed to read response body: {e}"))
            })?;
            if status.is_server_error() {
                tracing::warn!(host = %host, status = status.as_u16(), "Server error, trying next host");
                failures.push(format!("{host}: HTTP {status}"));
                continue;
            }
            let value = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or_else(|_| json!({ "message": &text }))
            };
            return Ok((status, value));
        }
        Err(StoreError::Unreachable(format!(
            "all hosts failed: {}",
            failures.join("; ")
        )))
    }
}

fn build_url(host: &str, segments: &[&str]) -> Result<Url, StoreError> {
    let mut url = Url::parse(host)
        .map_err(|e| StoreError::other(format!("invalid host {host}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| StoreError::other(format!("host {host} cannot carry a path")))?
        .clear()
        .extend(segments);
    Ok(url)
}

fn error_message(body: &Value) -> String {
    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn expect_success(status: StatusCode, body: &Value) -> Result<(), StoreError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(StoreError::from_response(status.as_u16(), error_message(body)))
    }
}

#[async_trait]
impl RemoteStore for AlgoliaClient {
    async fn get_by_ids(
        &self,
        ids: &[String],
        attributes_to_retrieve: &[String],
    ) -> Result<GetObjectsResponse, StoreError> {
        tracing::debug!(ids = ids.len(), index = %self.settings.index_name, "Fetching objects");
        let requests: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "indexName": self.settings.index_name,
                    "objectID": id,
                    "attributesToRetrieve": attributes_to_retrieve,
                })
            })
            .collect();
        let body = json!({ "requests": requests });

        let (status, value) = self
            .request(&self.read_hosts, Method::POST, &["1", "indexes", "*", "objects"], &body)
            .await?;
        // A fetch where nothing matches may come back as 404 with the usual body.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(GetObjectsResponse::from_raw(value))
        } else {
            Err(StoreError::from_response(status.as_u16(), error_message(&value)))
        }
    }

    async fn save_batch(&self, records: &[Record]) -> Result<(), StoreError> {
        tracing::info!(records = records.len(), index = %self.settings.index_name, "Saving batch");
        let requests: Vec<Value> = records
            .iter()
            .map(|record| json!({ "action": "updateObject", "body": record }))
            .collect();
        let body = json!({ "requests": requests });
        let index = self.settings.index_name.as_str();

        let (status, value) = self
            .request(&self.write_hosts, Method::POST, &["1", "indexes", index, "batch"], &body)
            .await?;
        expect_success(status, &value)
    }

    async fn save_one(&self, record: &Record) -> Result<(), StoreError> {
        tracing::debug!(object_id = %record.object_id, "Saving single record");
        let body = serde_json::to_value(record)
            .map_err(|e| StoreError::other(format!("failed to serialise record: {e}")))?;
        let index = self.settings.index_name.as_str();

        let (status, value) = self
            .request(
                &self.write_hosts,
                Method::PUT,
                &["1", "indexes", index, record.object_id.as_str()],
                &body,
            )
            .await?;
        expect_success(status, &value)
    }
}
