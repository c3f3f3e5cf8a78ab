use crate::application::Application;
use crate::channel::{Channel, ChannelBuilder};
use crate::endpoint::ServiceEndpoint;
use crate::error::Result;
use crate::http::HttpClient;
use crate::SERVICE_TIMEOUT_SECS;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// A screen service running on a remote device, such as a TV
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Service {
    /// Service id
    pub id: String,

    /// Friendly name (e.g. "Living Room TV")
    #[serde(default)]
    pub name: String,

    /// Service version (x.y.z)
    #[serde(default)]
    pub version: String,

    /// Device type
    #[serde(rename = "type", default)]
    pub service_type: String,

    /// Base URI (`http://<ip>:<port>/api/v2/`)
    pub uri: String,

    /// Additional device information
    #[serde(default)]
    pub device: Value,
}

impl Service {
    /// Fetch the description of the service at `uri`
    pub async fn fetch(uri: &str) -> Result<Self> {
        Self::fetch_with(&HttpClient::new(), uri, Duration::from_secs(SERVICE_TIMEOUT_SECS)).await
    }

    /// The service running on this device
    pub async fn local() -> Result<Self> {
        Self::fetch(ServiceEndpoint::local().url().as_str()).await
    }

    pub(crate) async fn fetch_with(
        http: &HttpClient,
        uri: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = ServiceEndpoint::parse(uri)?;
        debug!("Fetching service description from {}", endpoint);
        http.get_json(endpoint.url(), timeout).await
    }

    /// Normalised endpoint of the service
    pub fn endpoint(&self) -> Result<ServiceEndpoint> {
        ServiceEndpoint::parse(&self.uri)
    }

    /// Builder for a channel on this service
    pub fn channel_builder(&self, uri: &str) -> Result<ChannelBuilder> {
        Ok(Channel::builder(self.endpoint()?, uri))
    }

    /// Create a channel on this service with default settings
    pub fn channel(&self, uri: &str) -> Result<Channel> {
        self.channel_builder(uri)?.build()
    }

    /// Create an application handle; `id` is an installed id or a web URL
    pub fn application(&self, id: &str, channel_uri: &str) -> Result<Application> {
        Application::from_builder(id, self.channel_builder(channel_uri)?)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.name, self.service_type, self.uri)
    }
}
