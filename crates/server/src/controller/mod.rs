//! The cache controller.
//!
//! One controller owns one named cache generation. It populates the
//! generation at install, evicts every other generation at activation, serves
//! intercepted GET requests cache-first and answers page messages arriving on
//! its inbox. Storage and network are injected trait objects.

mod activate;
mod install;
mod intercept;
mod messages;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

use pjhq_core::canonical::canonicalize;
use pjhq_core::policy::EligibilityPolicy;
use pjhq_core::{
    AppConfig, CacheErrorRecord, CacheStorage, ControllerEvent, ControllerHandle, Envelope, Error, Network,
    PathRegistry, PolicyKind, ServiceHost,
};

pub use activate::ActivateReport;
pub use intercept::Interception;

/// Where a controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// Outcome of populating the cache with a batch of URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<CacheErrorRecord>,
}

struct ControllerInner {
    cache_name: String,
    version: String,
    origin: Url,
    policy: EligibilityPolicy,
    registry: PathRegistry,
    install_exclude: Vec<String>,
    max_concurrency: usize,
    auto_skip_waiting: bool,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    host: ServiceHost,
    handle: ControllerHandle,
    state: watch::Sender<LifecycleState>,
    skip_waiting: watch::Sender<bool>,
}

/// Cache controller service. Cloning shares the same controller.
#[derive(Clone)]
pub struct CacheController {
    inner: Arc<ControllerInner>,
}

impl std::fmt::Debug for CacheController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheController")
            .field("cache_name", &self.inner.cache_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CacheController {
    /// Build a controller and the receiving end of its inbox.
    ///
    /// Nothing runs until the inbox is handed to [`serve`](Self::serve) and
    /// [`start`](Self::start) (or `install` and `activate`) is called.
    pub fn new(
        config: &AppConfig, registry: PathRegistry, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
        host: ServiceHost,
    ) -> Result<(Self, mpsc::Receiver<Envelope>), Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        let policy = match config.policy {
            PolicyKind::Pattern => EligibilityPolicy::pattern(origin.clone(), &config.runtime_patterns)?,
            PolicyKind::ExactMatch => EligibilityPolicy::exact_match(&origin, &registry),
        };
        let (handle, inbox) = ControllerHandle::channel(config.cache_version.clone(), config.inbox_capacity);
        let (state, _) = watch::channel(LifecycleState::Parsed);
        let (skip_waiting, _) = watch::channel(false);

        let inner = ControllerInner {
            cache_name: config.cache_name(),
            version: config.cache_version.clone(),
            origin,
            policy,
            registry,
            install_exclude: config.install_exclude.clone(),
            max_concurrency: config.max_concurrency.max(1),
            auto_skip_waiting: config.skip_waiting,
            storage,
            network,
            host,
            handle,
            state,
            skip_waiting,
        };
        Ok((Self { inner: Arc::new(inner) }, inbox))
    }

    pub fn cache_name(&self) -> &str {
        &self.inner.cache_name
    }

    pub fn version(&self) -> &str {
        &self.inner.version
    }

    pub fn handle(&self) -> &ControllerHandle {
        &self.inner.handle
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.inner.policy
    }

    /// Canonicalize `input` against this controller's origin.
    pub fn resolve(&self, input: &str) -> Result<Url, Error> {
        Ok(canonicalize(&self.inner.origin, input)?)
    }

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.inner.state.subscribe()
    }

    /// Answer messages from the inbox until every handle is dropped.
    ///
    /// Each message is handled on its own task, so a long batch never holds up
    /// a status query.
    pub fn serve(&self, mut inbox: mpsc::Receiver<Envelope>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let controller = controller.clone();
                tokio::spawn(async move { controller.handle_message(envelope).await });
            }
            tracing::debug!(cache = %controller.inner.cache_name, "controller inbox closed");
        })
    }

    /// Install, then activate.
    ///
    /// With no active controller on the host, activation follows install at
    /// once. Otherwise this controller waits until it is told to skip waiting.
    pub async fn start(&self) -> Result<BatchReport, Error> {
        self.inner.host.set_waiting(Some(self.inner.handle.clone())).await;
        let report = self.install().await?;

        if let Some(active) = self.inner.host.active()
            && active != self.inner.handle
        {
            self.log(format!("Waiting to replace controller {}", active.version())).await;
            let mut skip = self.inner.skip_waiting.subscribe();
            skip.wait_for(|skip| *skip)
                .await
                .map_err(|_| Error::ControllerGone(self.inner.cache_name.clone()))?;
        }

        self.activate().await?;
        Ok(report)
    }

    fn set_state(&self, state: LifecycleState) {
        self.inner.state.send_replace(state);
        tracing::debug!(cache = %self.inner.cache_name, state = ?state, "lifecycle transition");
    }

    async fn broadcast(&self, event: ControllerEvent) -> usize {
        self.inner.host.clients().broadcast(&event).await
    }

    /// Log a line and forward it to pages as `sw-log`.
    async fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(cache = %self.inner.cache_name, "{}", message);
        self.broadcast(ControllerEvent::log(message)).await;
    }

    /// Record one failed URL: logged, then broadcast as `cache-error`.
    async fn report(&self, record: CacheErrorRecord) {
        tracing::warn!(url = %record.url, kind = record.kind.as_str(), "cache error");
        self.log(record.message()).await;
        self.broadcast(ControllerEvent::CacheError(record)).await;
    }
}
