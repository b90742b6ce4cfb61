//! In-process transport between pages and the controller.
//!
//! Pages and the controller never share state. A page reaches the controller
//! through a [`ControllerHandle`] (an mpsc inbox plus a one-shot reply port per
//! call); the controller reaches pages through the [`ClientRegistry`], which
//! owns one event stream per connected page. [`ServiceHost`] ties the two
//! together the way a browser's service worker container does.

pub mod clients;
pub mod host;

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::Error;
use crate::protocol::{ControllerMessage, Reply};

pub use clients::{ClientConnection, ClientId, ClientRegistry};
pub use host::ServiceHost;

/// One-shot channel a reply travels back on.
pub type ReplyPort = oneshot::Sender<Reply>;

/// A message in flight to the controller.
#[derive(Debug)]
pub struct Envelope {
    pub message: ControllerMessage,
    pub reply: Option<ReplyPort>,
}

static NEXT_CONTROLLER_ID: AtomicU64 = AtomicU64::new(1);

/// Cloneable address of one controller instance.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    id: u64,
    version: String,
    inbox: mpsc::Sender<Envelope>,
}

impl ControllerHandle {
    /// Create a handle and the receiving end of its inbox.
    pub fn channel(version: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (inbox, rx) = mpsc::channel(capacity.max(1));
        let handle = Self { id: NEXT_CONTROLLER_ID.fetch_add(1, Ordering::Relaxed), version: version.into(), inbox };
        (handle, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Deliver a message. Fails only if the controller has shut down.
    pub async fn post(&self, message: ControllerMessage, reply: Option<ReplyPort>) -> Result<(), Error> {
        let kind = message.kind();
        self.inbox
            .send(Envelope { message, reply })
            .await
            .map_err(|_| Error::ControllerGone(format!("controller {} closed before {kind}", self.version)))
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

impl PartialEq for ControllerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ControllerHandle {}
