//! Page-side messenger for the cache controller.
//!
//! [`CacheMessenger`] is what page code talks to. It:
//! - Queues requests made before a controller is active and rejects them with `NOT_READY`
//! - Drains that queue once, in order, when the controller becomes ready
//! - Fans controller events out to typed subscribers
//! - Runs request/reply calls over a one-shot channel, each bounded by a timeout

pub mod subscribers;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use pjhq_core::protocol::{CachePathsReply, CacheResourcesReply, CacheStats, CheckCacheReply};
use pjhq_core::{
    AppConfig, ClientId, ControllerEvent, ControllerHandle, ControllerMessage, Error, EventKind, PathRegistry, Reply,
    ServiceHost,
};

pub use subscribers::{SubscriberResult, Subscribers, SubscriptionId};

/// Messenger settings.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    /// Named site sections; everything outside them belongs to `home`.
    pub sections: Vec<String>,

    /// Upper bound on one request/reply call (default: 30s)
    pub request_timeout: Duration,

    /// Delay before a sibling preload starts (default: 2s)
    pub preload_delay: Duration,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            sections: vec!["about".to_string()],
            request_timeout: Duration::from_millis(30000),
            preload_delay: Duration::from_millis(2000),
        }
    }
}

impl From<&AppConfig> for MessengerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            sections: config.preload_sections.clone(),
            request_timeout: config.request_timeout(),
            preload_delay: config.preload_delay(),
        }
    }
}

type Queue = Mutex<Option<VecDeque<ControllerMessage>>>;

struct Inner {
    host: Option<ServiceHost>,
    client: OnceLock<ClientId>,
    /// `None` once drained; never refilled after that.
    queue: Queue,
    subscribers: Arc<Subscribers>,
    registry: PathRegistry,
    config: MessengerConfig,
}

/// Handle to a page's messenger. Cloning shares the same messenger.
#[derive(Clone)]
pub struct CacheMessenger {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CacheMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMessenger")
            .field("client", &self.inner.client.get())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl CacheMessenger {
    /// Create a messenger. It is not ready until [`init`](Self::init) has run
    /// and a controller has become active.
    ///
    /// Pass `None` for `host` where no controller can ever exist; every call is
    /// then queued and rejected.
    pub fn new(host: Option<ServiceHost>, registry: PathRegistry, config: MessengerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                client: OnceLock::new(),
                queue: Mutex::new(Some(VecDeque::new())),
                subscribers: Arc::new(Subscribers::default()),
                registry,
                config,
            }),
        }
    }

    /// Connect to the host as the page at `page_url`.
    ///
    /// Starts the event pump for the page's lifetime and a task that waits for
    /// an active controller, drains the queue and dispatches a local `sw-ready`.
    /// Calling it again is a no-op.
    pub async fn init(&self, page_url: &str) {
        let Some(host) = self.inner.host.clone() else {
            tracing::warn!("no controller host available; messenger stays offline");
            return;
        };
        if self.inner.client.get().is_some() {
            return;
        }

        let connection = host.connect(page_url).await;
        if self.inner.client.set(connection.id).is_err() {
            host.clients().disconnect(connection.id).await;
            return;
        }
        tracing::debug!(client = %connection.id, url = %page_url, "messenger connected");

        let subscribers = Arc::clone(&self.inner.subscribers);
        let mut events = connection.events;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                subscribers.dispatch(&event);
            }
        });

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            match host.ready().await {
                Ok(handle) => on_ready(weak, &handle).await,
                Err(e) => tracing::warn!(error = %e, "controller never became ready"),
            }
        });
    }

    /// Disconnect from the host. The event pump stops.
    pub async fn close(&self) {
        if let (Some(host), Some(id)) = (&self.inner.host, self.inner.client.get()) {
            host.clients().disconnect(*id).await;
        }
    }

    /// Whether the pending queue has been drained.
    pub fn is_ready(&self) -> bool {
        lock(&self.inner.queue).is_none()
    }

    /// Messages queued while no controller was active.
    pub fn pending(&self) -> usize {
        lock(&self.inner.queue).as_ref().map_or(0, VecDeque::len)
    }

    /// Send a request and wait for its reply.
    ///
    /// Without an active controller the message is queued (until the queue is
    /// drained) and `NOT_READY` is returned at once.
    pub async fn send(&self, message: ControllerMessage) -> Result<Reply, Error> {
        if !message.expects_reply() {
            return Err(Error::InvalidInput(format!("{} is never answered", message.kind())));
        }

        let Some(handle) = self.controller().await else {
            self.enqueue(message);
            return Err(Error::NotReady);
        };
        self.flush_queue(&handle).await;

        let timeout = self.inner.config.request_timeout;
        let (tx, rx) = oneshot::channel();
        let call = async {
            handle.post(message, Some(tx)).await?;
            rx.await.map_err(|_| Error::ReplyDropped)
        };
        let reply = tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        reply.into_result()
    }

    /// Tell the waiting (or else the active) controller to activate now.
    pub async fn skip_waiting(&self) -> Result<(), Error> {
        let host = self.inner.host.as_ref().ok_or(Error::NotReady)?;
        let target = match host.waiting().await {
            Some(handle) => handle,
            None => host.active().ok_or(Error::NotReady)?,
        };
        target.post(ControllerMessage::SkipWaiting, None).await
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&ControllerEvent) -> SubscriberResult + Send + Sync + 'static,
    {
        self.inner.subscribers.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(kind, id)
    }

    /// Deliver an event to local subscribers as if the controller had sent it.
    pub fn dispatch(&self, event: &ControllerEvent) -> usize {
        self.inner.subscribers.dispatch(event)
    }

    pub async fn cache_resources(&self, urls: Vec<String>, reason: &str) -> Result<CacheResourcesReply, Error> {
        self.send(ControllerMessage::CacheResources { urls, reason: reason.to_string() })
            .await?
            .into_cache_resources()
    }

    /// Cache everything a page needs. `home` takes the root page plus all
    /// pages, styles and scripts outside the configured sections; any other
    /// name selects the entries that mention it.
    pub async fn preload_page(&self, page: &str) -> Result<CacheResourcesReply, Error> {
        let urls = self.preload_paths(page);
        tracing::debug!(page, count = urls.len(), "preloading page");
        self.cache_resources(urls, &format!("preload_{page}")).await
    }

    pub async fn check_cache_status(&self, url: &str) -> Result<CheckCacheReply, Error> {
        self.send(ControllerMessage::CheckCache { url: url.to_string() })
            .await?
            .into_check_cache()
    }

    pub async fn get_cache_stats(&self) -> Result<CacheStats, Error> {
        self.send(ControllerMessage::GetStats).await?.into_stats()
    }

    pub async fn list_cache_paths(&self) -> Result<CachePathsReply, Error> {
        self.send(ControllerMessage::ListCachePaths).await?.into_cache_paths()
    }

    /// After the preload delay, warm the page a visitor is likely to open
    /// next: the first section from the home page, home from a section page.
    ///
    /// Returns `None` when `current_path` is neither.
    pub fn schedule_sibling_preload(
        &self, current_path: &str,
    ) -> Option<JoinHandle<Result<CacheResourcesReply, Error>>> {
        let target = self.sibling_of(current_path)?;
        let messenger = self.clone();
        let delay = self.inner.config.preload_delay;
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            messenger.preload_page(&target).await
        }))
    }

    fn sibling_of(&self, current_path: &str) -> Option<String> {
        let sections = &self.inner.config.sections;
        if current_path == "/" || current_path == "/index.html" {
            return sections.first().cloned();
        }
        sections
            .iter()
            .any(|section| current_path.contains(section.as_str()))
            .then(|| "home".to_string())
    }

    fn preload_paths(&self, page: &str) -> Vec<String> {
        match page {
            "home" => self.inner.registry.home_paths(&self.inner.config.sections),
            section => self.inner.registry.section_paths(section),
        }
    }

    async fn controller(&self) -> Option<ControllerHandle> {
        let host = self.inner.host.as_ref()?;
        let client = *self.inner.client.get()?;
        host.controller_for(client).await
    }

    fn enqueue(&self, message: ControllerMessage) {
        if let Some(queue) = lock(&self.inner.queue).as_mut() {
            tracing::debug!(kind = message.kind(), "controller not ready; queueing message");
            queue.push_back(message);
        }
    }

    /// Post anything still queued ahead of a direct call, keeping page order.
    async fn flush_queue(&self, handle: &ControllerHandle) {
        if let Some(queued) = take_queue(&self.inner.queue) {
            drain(handle, queued).await;
        }
    }
}

async fn on_ready(inner: Weak<Inner>, handle: &ControllerHandle) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if let Some(queued) = take_queue(&inner.queue) {
        drain(handle, queued).await;
    }
    tracing::info!(version = handle.version(), "controller ready");
    inner
        .subscribers
        .dispatch(&ControllerEvent::SwReady { version: handle.version().to_string() });
}

/// Posts queued messages in order. Their callers were already rejected, so
/// any replies are discarded.
async fn drain(handle: &ControllerHandle, queued: VecDeque<ControllerMessage>) {
    tracing::debug!(count = queued.len(), "draining queued messages");
    for message in queued {
        if let Err(e) = handle.post(message, None).await {
            tracing::warn!(error = %e, "failed to deliver queued message");
        }
    }
}

fn take_queue(queue: &Queue) -> Option<VecDeque<ControllerMessage>> {
    lock(queue).take()
}

fn lock(queue: &Queue) -> std::sync::MutexGuard<'_, Option<VecDeque<ControllerMessage>>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pjhq_core::Envelope;
    use tokio::sync::mpsc;

    fn registry() -> PathRegistry {
        PathRegistry {
            pages: vec!["/".into(), "/index.html".into(), "/about/index.html".into()],
            styles: vec!["/style.css".into(), "/about/about.css".into()],
            scripts: vec!["/src/js/script.js".into(), "/about/about.js".into()],
            images: vec!["/about/team.png".into(), "/assets/logo.png".into()],
            external: vec![],
        }
    }

    fn config() -> MessengerConfig {
        MessengerConfig {
            request_timeout: Duration::from_millis(200),
            preload_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Answer every request from a stand-in controller; also forwards each
    /// message it saw.
    fn spawn_controller(mut inbox: mpsc::Receiver<Envelope>) -> mpsc::UnboundedReceiver<ControllerMessage> {
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = inbox.recv().await {
                let answer = match &message {
                    ControllerMessage::CacheResources { urls, .. } => Reply::CacheResources(CacheResourcesReply {
                        success: true,
                        cached: urls.len(),
                        failed: 0,
                        filtered: None,
                        total: urls.len(),
                    }),
                    ControllerMessage::CheckCache { url } => {
                        Reply::CheckCache(CheckCacheReply { url: url.clone(), cached: false, in_cache_paths: None })
                    }
                    ControllerMessage::GetStats => Reply::Error { error: "stats unavailable".into() },
                    _ => Reply::CachePaths(CachePathsReply { paths: vec![], count: 0 }),
                };
                let _ = seen_tx.send(message);
                if let Some(reply) = reply {
                    let _ = reply.send(answer);
                }
            }
        });
        seen_rx
    }

    async fn ready_messenger() -> (CacheMessenger, mpsc::UnboundedReceiver<ControllerMessage>) {
        let host = ServiceHost::new();
        let (handle, inbox) = ControllerHandle::channel("v3", 8);
        let seen = spawn_controller(inbox);
        host.promote(handle).await;

        let messenger = CacheMessenger::new(Some(host), registry(), config());
        messenger.init("/").await;
        (messenger, seen)
    }

    #[tokio::test]
    async fn test_send_before_ready_queues_then_drains_in_order() {
        let host = ServiceHost::new();
        let messenger = CacheMessenger::new(Some(host.clone()), registry(), config());
        messenger.init("/").await;

        let ready = Arc::new(Mutex::new(Vec::new()));
        let ready_log = Arc::clone(&ready);
        messenger.subscribe(EventKind::SwReady, move |event| {
            if let ControllerEvent::SwReady { version } = event {
                ready_log.lock().unwrap().push(version.clone());
            }
            Ok(())
        });

        let first = messenger.check_cache_status("/a.css").await;
        let second = messenger.get_cache_stats().await;
        assert!(matches!(first, Err(Error::NotReady)));
        assert!(matches!(second, Err(Error::NotReady)));
        assert_eq!(messenger.pending(), 2);

        let (handle, inbox) = ControllerHandle::channel("v3", 8);
        let mut seen = spawn_controller(inbox);
        host.promote(handle).await;
        host.clients().claim().await;

        assert_eq!(seen.recv().await.unwrap(), ControllerMessage::CheckCache { url: "/a.css".into() });
        assert_eq!(seen.recv().await.unwrap(), ControllerMessage::GetStats);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(messenger.is_ready());
        assert_eq!(*ready.lock().unwrap(), vec!["v3".to_string()]);
    }

    #[tokio::test]
    async fn test_send_resolves_with_reply() {
        let (messenger, _seen) = ready_messenger().await;

        let reply = messenger.check_cache_status("/never.css").await.unwrap();
        assert_eq!(reply, CheckCacheReply { url: "/never.css".into(), cached: false, in_cache_paths: None });

        let reply = messenger.cache_resources(vec!["/a.css".into(), "/b.js".into()], "manual").await.unwrap();
        assert_eq!(reply.cached + reply.failed, reply.total);
    }

    #[tokio::test]
    async fn test_controller_error_rejects() {
        let (messenger, _seen) = ready_messenger().await;
        let result = messenger.get_cache_stats().await;
        assert!(matches!(result, Err(Error::Controller(msg)) if msg == "stats unavailable"));
    }

    #[tokio::test]
    async fn test_send_times_out_without_reply() {
        let host = ServiceHost::new();
        let (handle, mut inbox) = ControllerHandle::channel("v3", 8);
        host.promote(handle).await;
        // Holds every reply port without answering.
        let held = tokio::spawn(async move {
            let mut ports = Vec::new();
            while let Some(envelope) = inbox.recv().await {
                ports.push(envelope.reply);
            }
            ports.len()
        });

        let messenger = CacheMessenger::new(Some(host), registry(), config());
        messenger.init("/").await;

        let result = messenger.get_cache_stats().await;
        assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_millis(200)));
        held.abort();
    }

    #[tokio::test]
    async fn test_dropped_reply_port() {
        let host = ServiceHost::new();
        let (handle, mut inbox) = ControllerHandle::channel("v3", 8);
        host.promote(handle).await;
        tokio::spawn(async move { while inbox.recv().await.is_some() {} });

        let messenger = CacheMessenger::new(Some(host), registry(), config());
        messenger.init("/").await;
        assert!(matches!(messenger.list_cache_paths().await, Err(Error::ReplyDropped)));
    }

    #[tokio::test]
    async fn test_without_host_every_call_rejects() {
        let messenger = CacheMessenger::new(None, registry(), config());
        messenger.init("/").await;

        assert!(matches!(messenger.get_cache_stats().await, Err(Error::NotReady)));
        assert!(matches!(messenger.preload_page("about").await, Err(Error::NotReady)));
        assert!(matches!(messenger.skip_waiting().await, Err(Error::NotReady)));
        assert_eq!(messenger.pending(), 2);
        assert!(!messenger.is_ready());
    }

    #[tokio::test]
    async fn test_skip_waiting_is_not_a_request() {
        let (messenger, _seen) = ready_messenger().await;
        let result = messenger.send(ControllerMessage::SkipWaiting).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_skip_waiting_targets_waiting_controller() {
        let host = ServiceHost::new();
        let (handle, mut inbox) = ControllerHandle::channel("v4", 8);
        host.set_waiting(Some(handle)).await;

        let messenger = CacheMessenger::new(Some(host), registry(), config());
        messenger.skip_waiting().await.unwrap();

        let envelope = inbox.recv().await.unwrap();
        assert_eq!(envelope.message, ControllerMessage::SkipWaiting);
        assert!(envelope.reply.is_none());
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let (messenger, _seen) = ready_messenger().await;
        let host = messenger.inner.host.clone().unwrap();

        let urls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&urls);
        messenger.subscribe(EventKind::CacheUpdated, move |event| {
            if let ControllerEvent::CacheUpdated { url } = event {
                sink.lock().unwrap().push(url.clone());
            }
            Ok(())
        });

        host.clients().broadcast(&ControllerEvent::CacheUpdated { url: "/style.css".into() }).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*urls.lock().unwrap(), vec!["/style.css".to_string()]);
    }

    #[test]
    fn test_preload_paths_by_page() {
        let messenger = CacheMessenger::new(None, registry(), config());

        assert_eq!(
            messenger.preload_paths("about"),
            vec!["/about/index.html", "/about/about.css", "/about/about.js", "/about/team.png"]
        );
        assert_eq!(messenger.preload_paths("home"), vec!["/", "/index.html", "/style.css", "/src/js/script.js"]);
        assert!(messenger.preload_paths("store").is_empty());
    }

    #[test]
    fn test_sibling_of() {
        let messenger = CacheMessenger::new(None, registry(), config());
        assert_eq!(messenger.sibling_of("/").as_deref(), Some("about"));
        assert_eq!(messenger.sibling_of("/index.html").as_deref(), Some("about"));
        assert_eq!(messenger.sibling_of("/about/").as_deref(), Some("home"));
        assert_eq!(messenger.sibling_of("/store/"), None);
    }

    #[tokio::test]
    async fn test_scheduled_preload_sends_after_delay() {
        let (messenger, mut seen) = ready_messenger().await;
        let task = messenger.schedule_sibling_preload("/").unwrap();

        let reply = task.await.unwrap().unwrap();
        assert_eq!(reply.total, 4);
        assert!(matches!(
            seen.recv().await.unwrap(),
            ControllerMessage::CacheResources { reason, .. } if reason == "preload_about"
        ));
    }
}
