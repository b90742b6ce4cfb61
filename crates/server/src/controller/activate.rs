//! Activation: generation eviction and client takeover.

use serde::Serialize;

use pjhq_core::{ControllerEvent, Error};

use super::{CacheController, LifecycleState};

/// What an activation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    /// Generations deleted because their name differs from the current one.
    pub evicted: Vec<String>,
    /// Pages that were uncontrolled and are now controlled.
    pub claimed: usize,
}

impl CacheController {
    /// Delete every other generation, take control of all pages and publish
    /// this controller as active. Safe to call again.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.set_state(LifecycleState::Activating);
        self.log("Activating service worker...").await;

        let storage = &self.inner.storage;
        let mut evicted = Vec::new();
        for name in storage.generations().await? {
            if name == self.inner.cache_name {
                continue;
            }
            self.log(format!("Deleting old cache: {name}")).await;
            if storage.delete_generation(&name).await? {
                evicted.push(name);
            }
        }
        storage.open_generation(&self.inner.cache_name).await?;

        // Pages connecting after promotion start controlled; claim covers the rest.
        self.inner.host.promote(self.inner.handle.clone()).await;
        self.log("Taking control of clients").await;
        let claimed = self.inner.host.clients().claim().await;

        self.set_state(LifecycleState::Activated);
        self.log("Service worker activated and in control").await;
        self.broadcast(ControllerEvent::SwReady { version: self.inner.version.clone() }).await;

        Ok(ActivateReport { evicted, claimed })
    }

    /// Leave the install-pending state. A controller blocked in `start`
    /// proceeds to activation.
    pub fn skip_waiting(&self) {
        self.inner.skip_waiting.send_replace(true);
    }
}
