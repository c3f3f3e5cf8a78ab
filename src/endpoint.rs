use crate::error::{Error, Result};
use crate::protocol::Attributes;
use crate::{API_PATH, DEFAULT_PORT, DEFAULT_SECURE_PORT};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Base URI of a screen service, e.g. `http://192.168.1.20:8001/api/v2/`.
///
/// Parsing accepts any of:
/// - a full URI: `http://host:port/api/v2/`
/// - a host with port: `host:port`
/// - a bare host or IP address: `host`
///
/// Missing pieces fall back to port 8001 and the `/api/v2/` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    url: Url,
}

impl ServiceEndpoint {
    /// Parse and normalise a service URI
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidArgument(
                "service uri must not be empty".to_string(),
            ));
        }

        let mut url = if input.contains("://") {
            Url::parse(input)?
        } else {
            Url::parse(&format!("http://{}", input))?
        };

        if url.host_str().is_none() {
            return Err(Error::InvalidArgument(format!(
                "service uri {} has no host",
                input
            )));
        }

        if url.port().is_none() && url.scheme() == "http" {
            url.set_port(Some(DEFAULT_PORT))
                .map_err(|_| Error::InvalidArgument(format!("cannot set port on {}", input)))?;
        }

        if url.path() == "/" || url.path().is_empty() {
            url.set_path(API_PATH);
        } else if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url })
    }

    /// The service running on this device
    pub fn local() -> Self {
        Self::parse("127.0.0.1").unwrap_or_else(|_| unreachable!("loopback endpoint is valid"))
    }

    /// The normalised base URI
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host name or address of the service
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Derive the websocket URL of a channel.
    ///
    /// Secure mode switches the scheme to `wss` and the default port to
    /// the secure one. Attributes become the query string.
    pub fn channel_url(
        &self,
        channel_uri: &str,
        secure: bool,
        attributes: &Attributes,
    ) -> Result<Url> {
        if channel_uri.is_empty() {
            return Err(Error::InvalidArgument(
                "channel uri must not be empty".to_string(),
            ));
        }

        let host = self
            .url
            .host()
            .ok_or_else(|| Error::InvalidArgument("service uri has no host".to_string()))?;
        let port = self.url.port().unwrap_or(DEFAULT_PORT);
        let (scheme, port) = if secure {
            let port = if port == DEFAULT_PORT {
                DEFAULT_SECURE_PORT
            } else {
                port
            };
            ("wss", port)
        } else {
            ("ws", port)
        };

        let mut url = Url::parse(&format!(
            "{}://{}:{}{}channels/{}",
            scheme,
            host,
            port,
            self.url.path(),
            channel_uri
        ))?;

        if !attributes.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in attributes {
                match value {
                    Value::String(text) => query.append_pair(key, text),
                    other => query.append_pair(key, &other.to_string()),
                };
            }
        }

        Ok(url)
    }

    /// URL of an installed application resource
    pub fn application_url(&self, app_id: &str) -> Result<Url> {
        Ok(self.url.join(&format!("applications/{}", app_id))?)
    }
}

impl FromStr for ServiceEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServiceEndpoint::parse(s)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
