//! HTTP plumbing shared by every prover adapter.
//!
//! Nothing fetched here is trusted. Responses are decoded and then handed to
//! lantern-core for verification; this layer only moves bytes.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Errors from network operations.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request could not be sent or the connection dropped.
    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP request returned a non-success status.
    #[error("HTTP error {status} from {url}")]
    HttpError { status: u16, url: String },
    /// Failed to read or decode the response body.
    #[error("Body read failed for {url}: {reason}")]
    BodyReadFailed { url: String, reason: String },
}

/// A thin wrapper around a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { inner }
    }

    /// Talks straight to loopback servers, ignoring proxy settings.
    #[cfg(test)]
    pub(crate) fn loopback() -> Self {
        let inner = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("loopback client");
        Self { inner }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, NetworkError> {
        trace!(url, "GET");
        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|source| NetworkError::RequestFailed {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(NetworkError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }

    /// Fetch a URL and return the raw body (SSZ endpoints).
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let resp = self.get(url).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| NetworkError::BodyReadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }

    /// Fetch a URL and decode its JSON body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, NetworkError> {
        let resp = self.get(url).await?;
        resp.json::<T>()
            .await
            .map_err(|e| NetworkError::BodyReadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
