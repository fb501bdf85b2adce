//! HTTP adapters for the remote and media stores.
//!
//! Documents: `POST {base}/{collection}/{id}` with the JSON body, 2xx = ok;
//! `GET {base}/{collection}?field=value` returning a JSON array.
//! Media: `PUT {media_base}/{path}` with the raw bytes.

use super::remote::{MediaStore, QueryFilter, RemoteError, RemoteStore};
use serde_json::Value;
use std::time::Duration;

fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RemoteError::Network(e.to_string()))
}

fn network_error(e: reqwest::Error) -> RemoteError {
    RemoteError::Network(e.to_string())
}

/// Map a non-2xx response to `Rejected`.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Remote store reached over HTTP.
#[derive(Clone)]
pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn create(&self, collection: &str, id: &str, document: Value) -> Result<(), RemoteError> {
        let url = format!("{}/{}/{}", self.base_url, collection, id);
        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(&document)
            .send()
            .await
            .map_err(network_error)?;

        check_status(response).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[QueryFilter],
    ) -> Result<Vec<Value>, RemoteError> {
        let url = format!("{}/{}", self.base_url, collection);
        let pairs: Vec<(&str, &str)> = filters
            .iter()
            .map(|f| (f.field.as_str(), f.value.as_str()))
            .collect();

        let response = self
            .http
            .get(&url)
            .query(&pairs)
            .send()
            .await
            .map_err(network_error)?;

        let response = check_status(response).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Serialization(e.to_string()))
    }
}

/// Media store reached over HTTP.
#[derive(Clone)]
pub struct HttpMediaStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMediaStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl MediaStore for HttpMediaStore {
    async fn upload(&self, blob: &[u8], path: &str) -> Result<String, RemoteError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!("PUT {} ({} bytes)", url, blob.len());

        let response = self
            .http
            .put(&url)
            .header("Content-Type", "application/octet-stream")
            .body(blob.to_vec())
            .send()
            .await
            .map_err(network_error)?;

        check_status(response).await?;
        Ok(url)
    }
}
