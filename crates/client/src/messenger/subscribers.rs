//! Typed pub/sub for controller events.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use pjhq_core::{ControllerEvent, EventKind};

/// What a subscriber returns; an `Err` is logged and otherwise ignored.
pub type SubscriberResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Callback = Arc<dyn Fn(&ControllerEvent) -> SubscriberResult + Send + Sync>;

/// Identity of one registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscriber lists keyed by event type, each in registration order.
#[derive(Default)]
pub struct Subscribers {
    next_id: AtomicU64,
    table: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Callback)>>>,
}

impl std::fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers").finish_non_exhaustive()
    }
}

impl Subscribers {
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ControllerEvent) -> SubscriberResult + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().entry(kind).or_default().push((id, Arc::new(callback)));
        id
    }

    /// Remove one registration. Returns whether it was present.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut table = self.lock();
        let Some(list) = table.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    #[cfg(test)]
    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every subscriber of the event's type in registration order.
    ///
    /// A subscriber that errors or panics is logged and skipped; the rest still
    /// run. Returns how many completed successfully.
    pub fn dispatch(&self, event: &ControllerEvent) -> usize {
        let kind = event.kind();
        let callbacks: Vec<Callback> = match self.lock().get(&kind) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => tracing::warn!(event = %kind, error = %e, "error in event listener"),
                Err(_) => tracing::warn!(event = %kind, "event listener panicked"),
            }
        }
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(SubscriptionId, Callback)>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
