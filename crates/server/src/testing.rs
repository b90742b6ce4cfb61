//! Test doubles shared by controller and tool tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use pjhq_client::{CacheMessenger, MessengerConfig};
use pjhq_core::canonical::cache_key;
use pjhq_core::{
    AppConfig, CacheDb, CacheEntry, CacheStorage, Error, Network, PathRegistry, PolicyKind, Response, ServiceHost,
};

use crate::controller::CacheController;

/// In-memory network keyed by canonical URL. Unknown URLs fail like a refused
/// connection.
pub(crate) struct FakeNetwork {
    origin: Url,
    responses: HashMap<String, (u16, &'static str)>,
    hits: Mutex<HashMap<String, usize>>,
}

impl Default for FakeNetwork {
    fn default() -> Self {
        Self::new(Url::parse("http://localhost:8080").unwrap())
    }
}

impl FakeNetwork {
    pub(crate) fn new(origin: Url) -> Self {
        Self { origin, responses: HashMap::new(), hits: Mutex::new(HashMap::new()) }
    }

    fn respond(&mut self, url: &str, status: u16, body: &'static str) {
        let key = cache_key(&self.origin, url).unwrap();
        self.responses.insert(key, (status, body));
    }

    /// How many times `url` reached the network.
    pub(crate) fn hits(&self, url: &str) -> usize {
        let key = cache_key(&self.origin, url).unwrap();
        self.hits.lock().unwrap().get(&key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, url: &Url) -> Result<Response, Error> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let (status, body) = self
            .responses
            .get(url.as_str())
            .copied()
            .ok_or_else(|| Error::Network(format!("connection refused: {url}")))?;
        let status_text = match status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        };
        Ok(Response {
            url: url.to_string(),
            status,
            status_text: status_text.to_string(),
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: Bytes::from_static(body.as_bytes()),
        })
    }
}

/// A real in-memory database that can be told to fail reads or writes.
pub(crate) struct FaultyStorage {
    db: CacheDb,
    fail_reads: bool,
    fail_writes: bool,
}

fn fault() -> Error {
    Error::Database(tokio_rusqlite::Error::ConnectionClosed)
}

#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open_generation(&self, name: &str) -> Result<(), Error> {
        self.db.open_generation(name).await
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.db.generations().await
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        self.db.delete_generation(name).await
    }

    async fn put(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        if self.fail_writes {
            return Err(fault());
        }
        self.db.put(generation, entry).await
    }

    async fn get(&self, generation: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        if self.fail_reads {
            return Err(fault());
        }
        self.db.get(generation, key).await
    }

    async fn contains(&self, generation: &str, key: &str) -> Result<bool, Error> {
        if self.fail_reads {
            return Err(fault());
        }
        self.db.contains(generation, key).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        if self.fail_reads {
            return Err(fault());
        }
        self.db.keys(generation).await
    }
}

/// A controller wired to fakes, with its inbox already served.
pub(crate) struct Harness {
    pub config: AppConfig,
    pub registry: PathRegistry,
    pub host: ServiceHost,
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<FakeNetwork>,
    pub controller: CacheController,
}

impl Harness {
    pub(crate) fn builder() -> HarnessBuilder {
        HarnessBuilder {
            registry: PathRegistry::empty(),
            policy: PolicyKind::ExactMatch,
            network: FakeNetwork::default(),
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// A page connected to this harness's host, with short timeouts.
    pub(crate) async fn page(&self, url: &str) -> CacheMessenger {
        let config = MessengerConfig {
            request_timeout: Duration::from_millis(500),
            preload_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let messenger = CacheMessenger::new(Some(self.host.clone()), self.registry.clone(), config);
        messenger.init(url).await;
        messenger
    }
}

pub(crate) struct HarnessBuilder {
    registry: PathRegistry,
    policy: PolicyKind,
    network: FakeNetwork,
    fail_reads: bool,
    fail_writes: bool,
}

fn owned(paths: &[&str]) -> impl Iterator<Item = String> {
    paths.iter().map(|p| p.to_string())
}

impl HarnessBuilder {
    pub(crate) fn pages(mut self, paths: &[&str]) -> Self {
        self.registry.pages.extend(owned(paths));
        self
    }

    pub(crate) fn styles(mut self, paths: &[&str]) -> Self {
        self.registry.styles.extend(owned(paths));
        self
    }

    pub(crate) fn scripts(mut self, paths: &[&str]) -> Self {
        self.registry.scripts.extend(owned(paths));
        self
    }

    pub(crate) fn images(mut self, paths: &[&str]) -> Self {
        self.registry.images.extend(owned(paths));
        self
    }

    pub(crate) fn respond(mut self, url: &str, status: u16, body: &'static str) -> Self {
        self.network.respond(url, status, body);
        self
    }

    pub(crate) fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub(crate) fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub(crate) async fn build(self) -> Harness {
        let config = AppConfig { policy: self.policy, ..Default::default() };
        let db = CacheDb::open_in_memory().await.unwrap();
        let storage: Arc<dyn CacheStorage> =
            Arc::new(FaultyStorage { db, fail_reads: self.fail_reads, fail_writes: self.fail_writes });
        let network = Arc::new(self.network);
        let host = ServiceHost::new();

        let (controller, inbox) =
            CacheController::new(&config, self.registry.clone(), Arc::clone(&storage), network.clone(), host.clone())
                .unwrap();
        controller.serve(inbox);

        Harness { config, registry: self.registry, host, storage, network, controller }
    }
}
