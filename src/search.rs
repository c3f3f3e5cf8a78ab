//! Probing the local network for screen services.
//!
//! A [`Search`] is an ordinary owned value: create one, subscribe to its
//! events if needed, and run probes. Only one probe runs at a time per
//! search.

use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::service::Service;
use crate::{API_PATH, DEFAULT_PORT, SERVICE_TIMEOUT_SECS};
use futures_util::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Service port to probe
    pub port: u16,

    /// Per-probe timeout
    pub probe_timeout: Duration,

    /// Probes in flight at once
    pub concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            probe_timeout: Duration::from_secs(SERVICE_TIMEOUT_SECS),
            concurrency: 64,
        }
    }
}

/// Search progress notification
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// A probe run began
    Started,

    /// A service answered
    Found(Service),

    /// The probe run finished with this many services
    Stopped(usize),
}

/// Discovery session
#[derive(Debug, Clone)]
pub struct Search {
    config: SearchConfig,
    http: HttpClient,
    running: Arc<AtomicBool>,
    events: broadcast::Sender<SearchEvent>,
}

impl Default for Search {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl Search {
    /// Create a search session
    pub fn new(config: SearchConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            http: HttpClient::new(),
            running: Arc::new(AtomicBool::new(false)),
            events,
        }
    }

    /// Subscribe to search events
    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    /// Whether a probe run is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Probe every address of the /24 network `local` belongs to
    pub async fn scan_subnet(&self, local: Ipv4Addr) -> Result<Vec<Service>> {
        self.probe(subnet_candidates(local, self.config.port)).await
    }

    /// Probe the given service URIs and return the services that answered
    pub async fn probe<I>(&self, uris: I) -> Result<Vec<Service>>
    where
        I: IntoIterator<Item = String>,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("a previous search is already in progress");
            return Err(Error::Other(
                "a previous search is already in progress".to_string(),
            ));
        }

        let _running = RunningGuard(&self.running);
        let _ = self.events.send(SearchEvent::Started);

        let http = &self.http;
        let timeout = self.config.probe_timeout;
        let mut responses = stream::iter(uris)
            .map(|uri| async move {
                let result = Service::fetch_with(http, &uri, timeout).await;
                (uri, result)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        while let Some((uri, result)) = responses.next().await {
            match result {
                Ok(service) => {
                    if seen.insert(service.id.clone()) {
                        info!("found service {}", service);
                        let _ = self.events.send(SearchEvent::Found(service.clone()));
                        found.push(service);
                    }
                }
                Err(e) => debug!("no service at {}: {}", uri, e),
            }
        }

        let _ = self.events.send(SearchEvent::Stopped(found.len()));
        Ok(found)
    }
}

/// Clears the running flag even when a probe run is cancelled
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Service URIs for every host of the /24 network containing `local`
pub fn subnet_candidates(local: Ipv4Addr, port: u16) -> Vec<String> {
    let [a, b, c, _] = local.octets();
    (0..=255u8)
        .map(|d| format!("http://{}.{}.{}.{}:{}{}", a, b, c, d, port, API_PATH))
        .collect()
}
