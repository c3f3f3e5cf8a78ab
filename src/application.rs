use crate::{
    channel::{Channel, ChannelBuilder, ChannelEvent},
    client::Client,
    endpoint::ServiceEndpoint,
    error::{Error, Result},
    http::HttpClient,
    protocol::{
        Attributes, Call, METHOD_APPLICATION_START, METHOD_APPLICATION_STOP,
        METHOD_WEBAPPLICATION_START, METHOD_WEBAPPLICATION_STOP,
    },
    INSTALL_TIMEOUT_SECS, STOP_TIMEOUT_SECS,
};
use log::{debug, warn};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::{sync::broadcast, time};

/// What an application id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationKind {
    /// An application installed on the device, addressed by id
    Installed,

    /// A web application, addressed by URL
    Web,
}

impl ApplicationKind {
    /// Ids containing a `file://`, `http://` or `https://` URL are web applications
    pub fn from_id(id: &str) -> Self {
        let id = id.to_ascii_lowercase();
        if ["file://", "http://", "https://"]
            .iter()
            .any(|scheme| id.contains(scheme))
        {
            Self::Web
        } else {
            Self::Installed
        }
    }

    /// Get the string representation of an application kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "applications",
            Self::Web => "webapplication",
        }
    }

    fn params(&self, id: &str) -> Value {
        match self {
            Self::Installed => json!({ "id": id }),
            Self::Web => json!({ "url": id }),
        }
    }

    /// Call that launches the application
    pub fn start_call(&self, id: &str) -> Call {
        let method = match self {
            Self::Installed => METHOD_APPLICATION_START,
            Self::Web => METHOD_WEBAPPLICATION_START,
        };
        Call::notification(method, self.params(id))
    }

    /// Method and params that stop the application
    pub fn stop_call(&self, id: &str) -> (&'static str, Value) {
        let method = match self {
            Self::Installed => METHOD_APPLICATION_STOP,
            Self::Web => METHOD_WEBAPPLICATION_STOP,
        };
        (method, self.params(id))
    }
}

/// An application on the remote device, reached through a channel.
///
/// Opening the channel launches the application. `connect` resolves, and
/// subscribers see [`ChannelEvent::Connect`], only once the remote reports
/// that the application is ready.
#[derive(Debug, Clone)]
pub struct Application {
    id: String,
    kind: ApplicationKind,
    endpoint: ServiceEndpoint,
    channel: Channel,
    http: HttpClient,
}

impl Application {
    /// Create an application on top of a configured channel builder
    pub fn from_builder(id: &str, builder: ChannelBuilder) -> Result<Self> {
        if id.is_empty() {
            return Err(Error::InvalidArgument(
                "id must be a valid string".to_string(),
            ));
        }
        if builder.uri().is_empty() {
            return Err(Error::InvalidArgument(
                "channel uri must be a valid string".to_string(),
            ));
        }

        let kind = ApplicationKind::from_id(id);
        let endpoint = builder.endpoint().clone();
        let channel = builder
            .start_call(kind.start_call(id))
            .connect_on_ready(true)
            .build()?;

        Ok(Self {
            id: id.to_string(),
            kind,
            endpoint,
            channel,
            http: HttpClient::new(),
        })
    }

    /// Installed application id or web application URL
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this is a web or installed application
    pub fn kind(&self) -> ApplicationKind {
        self.kind
    }

    /// The underlying channel
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Subscribe to channel events
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.channel.subscribe()
    }

    /// Launch the application and connect once it is ready
    pub async fn connect(&self, attributes: Attributes) -> Result<Client> {
        debug!("Launching {} {}", self.kind.as_str(), self.id);
        self.channel.connect(attributes).await
    }

    /// Disconnect, optionally stopping the remote application first.
    ///
    /// The channel disconnects whether or not the stop call succeeds.
    pub async fn disconnect(&self, exit_on_remote: bool) -> Result<Option<Client>> {
        if exit_on_remote {
            let (method, params) = self.kind.stop_call(&self.id);
            let stop = self.channel.invoke(method, params, None);
            match time::timeout(Duration::from_secs(STOP_TIMEOUT_SECS), stop).await {
                Ok(Ok(_)) => debug!("Stopped {}", self.id),
                Ok(Err(e)) => debug!("Stopping {} failed: {}", self.id, e),
                Err(_) => warn!("No answer to {} for {}", method, self.id),
            }
        }

        self.channel.disconnect().await
    }

    /// Install the application on the device.
    ///
    /// Web applications cannot be installed; that fails without any
    /// network call.
    pub async fn install(&self) -> Result<()> {
        if self.kind == ApplicationKind::Web {
            return Err(Error::NotSupported(
                "web application cannot be installed".to_string(),
            ));
        }

        let url = self.endpoint.application_url(&self.id)?;
        debug!("Installing {} via {}", self.id, url);
        self.http
            .put(&url, Duration::from_secs(INSTALL_TIMEOUT_SECS))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_id() {
        assert_eq!(ApplicationKind::from_id("111299001912"), ApplicationKind::Installed);
        assert_eq!(
            ApplicationKind::from_id("http://example.com/app/"),
            ApplicationKind::Web
        );
        assert_eq!(
            ApplicationKind::from_id("HTTPS://example.com/app/"),
            ApplicationKind::Web
        );
        assert_eq!(ApplicationKind::from_id("file:///tmp/app"), ApplicationKind::Web);
    }

    #[test]
    fn test_start_and_stop_calls() {
        let start = ApplicationKind::Web.start_call("http://example.com/");
        assert_eq!(start.method, "ms.webapplication.start");
        assert_eq!(start.params, json!({ "url": "http://example.com/" }));
        assert_eq!(start.id, None);

        let (method, params) = ApplicationKind::Installed.stop_call("abc");
        assert_eq!(method, "ms.application.stop");
        assert_eq!(params, json!({ "id": "abc" }));
    }
}
