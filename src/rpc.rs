use crate::error::{Error, Result};
use crate::protocol::Response;
use log::{trace, warn};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Reply channel for a call awaiting its response
pub type ResponseSender = oneshot::Sender<Result<Value>>;

/// Table of calls awaiting a response, keyed by correlation id.
///
/// Ids come from a strictly increasing counter so rapid calls never
/// collide. Entries leave the table only when their response arrives;
/// a call the remote never answers stays pending until the table is
/// dropped.
#[derive(Debug, Default)]
pub struct PendingCalls {
    last_id: u64,
    handlers: HashMap<u64, ResponseSender>,
}

impl PendingCalls {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next correlation id
    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Record the reply channel for a sent call
    pub fn insert(&mut self, id: u64, handler: ResponseSender) {
        self.handlers.insert(id, handler);
    }

    /// Deliver a response to its caller.
    ///
    /// Returns `false` when no pending call matches the response id.
    pub fn resolve(&mut self, response: Response) -> bool {
        let handler = response
            .call_id()
            .and_then(|id| self.handlers.remove(&id));

        let Some(handler) = handler else {
            warn!("unable to find result handler for response {}", response.id);
            return false;
        };

        let outcome = match response.error {
            Some(error) => Err(Error::Rpc(error)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };

        if handler.send(outcome).is_err() {
            trace!("caller for response {} is gone", response.id);
        }
        true
    }

    /// Whether a call with this id is still pending
    pub fn contains(&self, id: u64) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Number of pending calls
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_are_strictly_increasing() {
        let mut calls = PendingCalls::new();
        let ids: Vec<u64> = (0..100).map(|_| calls.next_id()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_resolve_result_and_error() {
        let mut calls = PendingCalls::new();

        let (tx, rx) = oneshot::channel();
        let ok_id = calls.next_id();
        calls.insert(ok_id, tx);

        let (tx, err_rx) = oneshot::channel();
        let err_id = calls.next_id();
        calls.insert(err_id, tx);

        // Responses may arrive out of order
        assert!(calls.resolve(Response {
            id: json!(err_id),
            result: None,
            error: Some(json!({"message": "boom"})),
        }));
        assert!(calls.resolve(Response {
            id: json!(ok_id.to_string()),
            result: Some(json!(true)),
            error: None,
        }));

        assert_eq!(rx.await.unwrap().unwrap(), json!(true));
        assert!(matches!(err_rx.await.unwrap(), Err(Error::Rpc(_))));
        assert!(calls.is_empty());
    }

    #[test]
    fn test_unmatched_response_is_dropped() {
        let mut calls = PendingCalls::new();
        let (tx, _rx) = oneshot::channel();
        let id = calls.next_id();
        calls.insert(id, tx);

        assert!(!calls.resolve(Response {
            id: json!(999),
            result: Some(json!(1)),
            error: None,
        }));
        assert!(calls.contains(id));
    }
}
