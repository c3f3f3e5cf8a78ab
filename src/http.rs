//! Plain HTTP calls against the service REST API.

use crate::error::{Error, Result};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use log::trace;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Small HTTP client for service lookups and application management
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpConnector, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a new client
    pub fn new() -> Self {
        Self {
            inner: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// GET a JSON document; anything but 200 is an error
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url, timeout: Duration) -> Result<T> {
        let body = self.request(Method::GET, url, timeout).await?;
        serde_json::from_slice(&body).map_err(Error::from)
    }

    /// PUT with an empty body; anything but 200 is an error
    pub async fn put(&self, url: &Url, timeout: Duration) -> Result<()> {
        self.request(Method::PUT, url, timeout).await.map(|_| ())
    }

    async fn request(&self, method: Method, url: &Url, timeout: Duration) -> Result<Bytes> {
        let request = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header("Content-Type", "application/json;charset=UTF-8")
            .body(Full::new(Bytes::new()))
            .map_err(|e| Error::Other(format!("Failed to build request: {}", e)))?;

        trace!("{} {}", method, url);
        let response = tokio::time::timeout(timeout, self.inner.request(request))
            .await
            .map_err(|_| Error::Timeout(format!("Request Timeout: {} {}", method, url)))?
            .map_err(|e| Error::Connection(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = tokio::time::timeout(timeout, response.into_body().collect())
            .await
            .map_err(|_| Error::Timeout(format!("Request Timeout: {} {}", method, url)))?
            .map_err(|e| Error::Connection(format!("Failed to read response: {}", e)))?
            .to_bytes();

        if status != StatusCode::OK {
            return Err(Error::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        Ok(body)
    }
}
