//! Cache population: install and batch fetch-and-store.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use pjhq_core::canonical::canonicalize;
use pjhq_core::{CacheEntry, CacheErrorRecord, ControllerEvent, Error};

use super::{BatchReport, CacheController, LifecycleState};

impl CacheController {
    /// Populate the generation with the install set: pages, styles and
    /// scripts minus the configured exclusions.
    ///
    /// Individual failures are reported and counted, never fatal. Only a
    /// storage failure while opening the generation aborts.
    pub async fn install(&self) -> Result<BatchReport, Error> {
        self.set_state(LifecycleState::Installing);
        self.log("Installing service worker...").await;

        self.inner.storage.open_generation(&self.inner.cache_name).await?;
        let urls = self.inner.registry.install_set(&self.inner.install_exclude);
        let report = self.cache_urls(urls).await;

        self.set_state(LifecycleState::Installed);
        if self.inner.auto_skip_waiting {
            self.log("Initial cache complete, activating immediately").await;
            self.skip_waiting();
        } else {
            self.log("Initial cache complete").await;
        }
        Ok(report)
    }

    /// Split a batch into URLs worth fetching and URLs the interceptor would
    /// never serve. Malformed URLs are kept so they are counted as failures.
    pub(super) fn partition(&self, urls: Vec<String>) -> (Vec<String>, usize) {
        let before = urls.len();
        let kept: Vec<String> = urls
            .into_iter()
            .filter(|url| match canonicalize(&self.inner.origin, url) {
                Ok(canonical) => self.inner.policy.classify(&canonical).intercepts(),
                Err(_) => true,
            })
            .collect();
        let filtered = before - kept.len();
        (kept, filtered)
    }

    /// Fetch and store every URL independently, bounded by the configured
    /// concurrency, and wait for all of them to settle.
    pub(super) async fn cache_urls(&self, urls: Vec<String>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.inner.max_concurrency));
        let mut join_set = JoinSet::new();

        for url in urls {
            let controller = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.ok();
                let outcome = controller.cache_one(&url).await;
                if let Err(record) = &outcome {
                    controller.report(record.clone()).await;
                }
                outcome
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => report.succeeded += 1,
                Ok(Err(record)) => {
                    report.failed += 1;
                    report.errors.push(record);
                }
                Err(e) => {
                    tracing::error!(error = %e, "cache task failed");
                    report.failed += 1;
                }
            }
        }

        self.log(format!("Caching complete: {} succeeded, {} failed", report.succeeded, report.failed))
            .await;
        if !report.errors.is_empty() {
            let failed: Vec<&str> = report.errors.iter().map(|e| e.url.as_str()).collect();
            self.log(format!("Failed URLs: {}", failed.join(", "))).await;
        }
        report
    }

    async fn cache_one(&self, url: &str) -> Result<(), CacheErrorRecord> {
        let target = canonicalize(&self.inner.origin, url).map_err(|e| CacheErrorRecord::network(url, e))?;
        let response = self
            .inner
            .network
            .fetch(&target)
            .await
            .map_err(|e| CacheErrorRecord::network(url, e))?;

        if !response.is_cacheable() {
            return Err(CacheErrorRecord::non_200(url, response.status, response.status_text));
        }

        let entry = CacheEntry::from_response(target.as_str(), &response);
        self.inner
            .storage
            .put(&self.inner.cache_name, &entry)
            .await
            .map_err(|e| CacheErrorRecord::cache_write(url, e))?;

        tracing::debug!(url = %url, bytes = entry.body.len(), "cached");
        self.broadcast(ControllerEvent::CacheUpdated { url: url.to_string() }).await;
        Ok(())
    }
}
