//! Registry of connected page clients.
//!
//! Pages connect when they load and disconnect when they close. Only
//! controlled clients receive broadcasts; a page that loaded before any
//! controller was active stays uncontrolled until a controller claims it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::protocol::ControllerEvent;

/// Identifier of one connected page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// The page's end of a connection: its id and its event stream.
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ClientId,
    pub events: mpsc::UnboundedReceiver<ControllerEvent>,
}

struct ClientSlot {
    url: String,
    controlled: bool,
    events: mpsc::UnboundedSender<ControllerEvent>,
}

#[derive(Default)]
struct ClientTable {
    next_id: u64,
    clients: BTreeMap<ClientId, ClientSlot>,
}

/// Shared registry of page clients.
///
/// Uses a BTreeMap behind a tokio RwLock; cloning shares the table.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    table: Arc<RwLock<ClientTable>>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry").finish_non_exhaustive()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page and open its event stream.
    ///
    /// `controlled` is evaluated while the table is locked, so a page can
    /// never slip between a controller's promotion and its claim.
    pub async fn connect(&self, url: impl Into<String>, controlled: impl FnOnce() -> bool) -> ClientConnection {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut table = self.table.write().await;
        let controlled = controlled();
        table.next_id += 1;
        let id = ClientId(table.next_id);
        let url = url.into();
        tracing::debug!(client = %id, url = %url, controlled, "client connected");
        table.clients.insert(id, ClientSlot { url, controlled, events: tx });
        ClientConnection { id, events: rx }
    }

    /// Remove a page. Returns whether it was connected.
    pub async fn disconnect(&self, id: ClientId) -> bool {
        let removed = self.table.write().await.clients.remove(&id).is_some();
        if removed {
            tracing::debug!(client = %id, "client disconnected");
        }
        removed
    }

    /// Take control of every connected page. Returns how many changed hands.
    pub async fn claim(&self) -> usize {
        let mut table = self.table.write().await;
        let mut claimed = 0;
        for (id, slot) in table.clients.iter_mut().filter(|(_, slot)| !slot.controlled) {
            tracing::debug!(client = %id, url = %slot.url, "client claimed");
            slot.controlled = true;
            claimed += 1;
        }
        claimed
    }

    pub async fn is_controlled(&self, id: ClientId) -> bool {
        self.table
            .read()
            .await
            .clients
            .get(&id)
            .is_some_and(|slot| slot.controlled)
    }

    #[cfg(test)]
    pub async fn url_of(&self, id: ClientId) -> Option<String> {
        self.table.read().await.clients.get(&id).map(|slot| slot.url.clone())
    }

    /// Push an event to every controlled page, without waiting for anyone.
    ///
    /// Pages whose stream is gone are dropped from the registry. Returns the
    /// number of pages the event was handed to.
    pub async fn broadcast(&self, event: &ControllerEvent) -> usize {
        let mut table = self.table.write().await;
        let mut delivered = 0;
        table.clients.retain(|id, slot| {
            if !slot.controlled {
                return true;
            }
            match slot.events.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    tracing::debug!(client = %id, "dropping closed client");
                    false
                }
            }
        });
        delivered
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    pub async fn controlled_count(&self) -> usize {
        self.table
            .read()
            .await
            .clients
            .values()
            .filter(|slot| slot.controlled)
            .count()
    }
}
