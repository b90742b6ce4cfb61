//! Page message handling.

use pjhq_core::canonical::canonicalize;
use pjhq_core::protocol::{
    CachePathCoverage, CachePathsReply, CacheResourcesReply, CacheStats, CheckCacheReply, TypeBreakdown,
};
use pjhq_core::{ControllerMessage, Envelope, Error, PolicyKind, Reply};

use super::CacheController;

const SAMPLE_SIZE: usize = 5;

impl CacheController {
    /// Handle one message and answer on its reply port, if it has one.
    ///
    /// `SKIP_WAITING` is never answered. Storage failures are answered with an
    /// error reply rather than dropping the port.
    pub async fn handle_message(&self, envelope: Envelope) {
        let Envelope { message, reply } = envelope;
        let kind = message.kind();
        tracing::debug!(kind, "message received");

        let outcome = match message {
            ControllerMessage::CacheResources { urls, reason } => {
                Some(self.cache_resources(urls, &reason).await.map(Reply::CacheResources))
            }
            ControllerMessage::CheckCache { url } => Some(self.check_cache(&url).await.map(Reply::CheckCache)),
            ControllerMessage::GetStats => Some(self.stats().await.map(Reply::Stats)),
            ControllerMessage::ListCachePaths => Some(Ok(Reply::CachePaths(self.cache_paths()))),
            ControllerMessage::SkipWaiting => {
                self.skip_waiting();
                self.log("Skip waiting instruction received").await;
                None
            }
        };

        let (Some(outcome), Some(port)) = (outcome, reply) else {
            return;
        };
        let reply = outcome.unwrap_or_else(|e| {
            tracing::warn!(kind, error = %e, "message failed");
            Reply::error(&e)
        });
        if port.send(reply).is_err() {
            tracing::debug!(kind, "requester stopped waiting for the reply");
        }
    }

    /// Fetch and store a batch of URLs on request.
    ///
    /// URLs the interceptor would never serve are dropped first and reported as
    /// `filtered`; the rest settle individually, so `cached + failed == total`.
    pub async fn cache_resources(&self, urls: Vec<String>, reason: &str) -> Result<CacheResourcesReply, Error> {
        self.log(format!("Received request to cache {} resources ({reason})", urls.len()))
            .await;

        let (kept, filtered) = self.partition(urls);
        if filtered > 0 {
            self.log(format!("Skipping {filtered} URLs outside the cache manifest")).await;
        }

        let total = kept.len();
        let report = self.cache_urls(kept).await;
        let exact = self.inner.policy.kind() == PolicyKind::ExactMatch;

        Ok(CacheResourcesReply {
            success: true,
            cached: report.succeeded,
            failed: report.failed,
            filtered: (exact || filtered > 0).then_some(filtered),
            total,
        })
    }

    /// Whether a URL has an entry in the current generation.
    pub async fn check_cache(&self, url: &str) -> Result<CheckCacheReply, Error> {
        let Ok(canonical) = canonicalize(&self.inner.origin, url) else {
            let in_cache_paths = (self.inner.policy.kind() == PolicyKind::ExactMatch).then_some(false);
            return Ok(CheckCacheReply { url: url.to_string(), cached: false, in_cache_paths });
        };
        let cached = self.inner.storage.contains(&self.inner.cache_name, canonical.as_str()).await?;
        let in_cache_paths = self.inner.policy.in_manifest(&canonical);
        Ok(CheckCacheReply { url: url.to_string(), cached, in_cache_paths })
    }

    /// Entry counts of the current generation.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let keys = self.inner.storage.keys(&self.inner.cache_name).await?;

        let mut by_type = TypeBreakdown::default();
        keys.iter().for_each(|key| by_type.record(key));

        let cache_paths = self.inner.policy.manifest().map(|manifest| CachePathCoverage {
            defined: manifest.len(),
            cached: keys.iter().filter(|key| manifest.contains(key.as_str())).count(),
        });

        Ok(CacheStats {
            total: keys.len(),
            by_type,
            cache_paths,
            sample_urls: keys.iter().take(SAMPLE_SIZE).cloned().collect(),
        })
    }

    /// The flattened manifest.
    pub fn cache_paths(&self) -> CachePathsReply {
        let paths = self.inner.registry.all_paths();
        CachePathsReply { count: paths.len(), paths }
    }
}
