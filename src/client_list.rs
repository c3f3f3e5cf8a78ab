use crate::client::Client;
use std::collections::HashMap;

/// Ordered collection of the clients connected to a channel, unique by id.
///
/// The list is owned by the channel task and only changes in response to
/// roster events from the remote.
#[derive(Debug, Clone, Default)]
pub struct ClientList {
    clients: Vec<Client>,
    index: HashMap<String, usize>,
}

impl ClientList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a client. A record with the same id is replaced in place.
    pub fn push(&mut self, client: Client) {
        match self.index.get(client.id()) {
            Some(&position) => self.clients[position] = client,
            None => {
                self.index.insert(client.id().to_string(), self.clients.len());
                self.clients.push(client);
            }
        }
    }

    /// Remove a client by id, returning the removed record
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        let position = self.index.remove(id)?;
        let removed = self.clients.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Find a client by id
    pub fn get_by_id(&self, id: &str) -> Option<&Client> {
        self.index.get(id).map(|&position| &self.clients[position])
    }

    /// Resolve the local client given the id assigned on connect
    pub fn me(&self, own_id: Option<&str>) -> Option<&Client> {
        own_id.and_then(|id| self.get_by_id(id))
    }

    /// The host client, if one is connected
    pub fn host(&self) -> Option<&Client> {
        self.clients.iter().find(|client| client.is_host())
    }

    /// Remove every client
    pub fn clear(&mut self) {
        self.clients.clear();
        self.index.clear();
    }

    /// Number of connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client is connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterate in connect order
    pub fn iter(&self) -> std::slice::Iter<'_, Client> {
        self.clients.iter()
    }
}

impl<'a> IntoIterator for &'a ClientList {
    type Item = &'a Client;
    type IntoIter = std::slice::Iter<'a, Client>;

    fn into_iter(self) -> Self::IntoIter {
        self.clients.iter()
    }
}
