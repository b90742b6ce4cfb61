//! The service host: where controllers register and pages find them.

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use super::ControllerHandle;
use super::clients::{ClientConnection, ClientId, ClientRegistry};
use crate::Error;

struct HostInner {
    clients: ClientRegistry,
    active: watch::Sender<Option<ControllerHandle>>,
    waiting: RwLock<Option<ControllerHandle>>,
}

/// Shared container of the active controller, a waiting controller and
/// the connected pages. Cloning shares the same host.
#[derive(Clone)]
pub struct ServiceHost {
    inner: Arc<HostInner>,
}

impl std::fmt::Debug for ServiceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHost")
            .field("active", &self.active().map(|h| h.version().to_string()))
            .finish_non_exhaustive()
    }
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceHost {
    pub fn new() -> Self {
        let (active, _) = watch::channel(None);
        Self { inner: Arc::new(HostInner { clients: ClientRegistry::new(), active, waiting: RwLock::new(None) }) }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.inner.clients
    }

    /// Connect a page. Pages that load while a controller is active start out
    /// controlled by it.
    pub async fn connect(&self, url: impl Into<String>) -> ClientConnection {
        self.inner.clients.connect(url, || self.active().is_some()).await
    }

    /// The active controller, regardless of which pages it controls.
    pub fn active(&self) -> Option<ControllerHandle> {
        self.inner.active.borrow().clone()
    }

    /// The controller of one page, if that page is controlled.
    pub async fn controller_for(&self, client: ClientId) -> Option<ControllerHandle> {
        let active = self.active()?;
        self.inner.clients.is_controlled(client).await.then_some(active)
    }

    /// Resolve once a controller is active.
    pub async fn ready(&self) -> Result<ControllerHandle, Error> {
        let mut rx = self.inner.active.subscribe();
        let active = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::ControllerGone("service host shut down".into()))?;
        active
            .clone()
            .ok_or_else(|| Error::ControllerGone("service host shut down".into()))
    }

    /// Register an installed controller that has not activated yet.
    pub async fn set_waiting(&self, handle: Option<ControllerHandle>) {
        *self.inner.waiting.write().await = handle;
    }

    pub async fn waiting(&self) -> Option<ControllerHandle> {
        self.inner.waiting.read().await.clone()
    }

    /// Make `handle` the active controller, replacing any previous one.
    pub async fn promote(&self, handle: ControllerHandle) {
        {
            let mut waiting = self.inner.waiting.write().await;
            if waiting.as_ref() == Some(&handle) {
                *waiting = None;
            }
        }
        let version = handle.version().to_string();
        self.inner.active.send_replace(Some(handle));
        tracing::info!(version = %version, "controller promoted to active");
    }
}
