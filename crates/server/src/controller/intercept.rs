//! Fetch interception: cache-first serving of eligible GET requests.

use pjhq_core::canonical::canonicalize;
use pjhq_core::{CacheEntry, CacheErrorRecord, ControllerEvent, Error, Request, Response};

use super::{CacheController, LifecycleState};

/// How the controller dealt with a request.
#[derive(Debug)]
pub enum Interception {
    /// Not intercepted; the request goes to the network as if no controller existed.
    Passthrough,
    /// Served from the current generation.
    Cached(Response),
    /// Intercepted and fetched; the outcome is passed on unchanged.
    Network(Result<Response, Error>),
}

impl Interception {
    pub fn source(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::Cached(_) => "cache",
            Self::Network(_) => "network",
        }
    }

    pub fn is_intercepted(&self) -> bool {
        !matches!(self, Self::Passthrough)
    }
}

impl CacheController {
    /// Decide whether to serve a request and, if so, serve it cache-first.
    ///
    /// Only GET requests seen by an activated controller are considered. A miss
    /// goes to the network; a 200 response is stored when the policy allows,
    /// and non-200 or failed fetches are reported as `cache-error` and still
    /// handed back.
    ///
    /// The store completes before the response is returned, so a repeated
    /// request is always a hit. A failed store never withholds the response.
    pub async fn handle_fetch(&self, request: &Request) -> Interception {
        if !request.is_get() || self.state() != LifecycleState::Activated {
            return Interception::Passthrough;
        }
        let Ok(url) = canonicalize(&self.inner.origin, &request.url) else {
            return Interception::Passthrough;
        };
        let eligibility = self.inner.policy.classify(&url);
        if !eligibility.intercepts() {
            return Interception::Passthrough;
        }

        match self.inner.storage.get(&self.inner.cache_name, url.as_str()).await {
            Ok(Some(entry)) if entry.verify() => {
                tracing::debug!(url = %url, "cache hit");
                return Interception::Cached(entry.to_response());
            }
            Ok(Some(_)) => tracing::warn!(url = %url, "stored body does not match its digest; refetching"),
            Ok(None) => tracing::debug!(url = %url, "cache miss"),
            Err(e) => tracing::warn!(url = %url, error = %e, "cache lookup failed; using network"),
        }

        let response = match self.inner.network.fetch(&url).await {
            Ok(response) => response,
            Err(e) => {
                self.report(CacheErrorRecord::network(&request.url, &e)).await;
                return Interception::Network(Err(e));
            }
        };

        if !response.is_cacheable() {
            self.report(CacheErrorRecord::non_200(&request.url, response.status, &response.status_text))
                .await;
            return Interception::Network(Ok(response));
        }

        if self.inner.policy.may_store(&url) {
            let entry = CacheEntry::from_response(url.as_str(), &response);
            match self.inner.storage.put(&self.inner.cache_name, &entry).await {
                Ok(()) => {
                    self.broadcast(ControllerEvent::CacheUpdated { url: request.url.clone() })
                        .await;
                }
                Err(e) => self.report(CacheErrorRecord::cache_write(&request.url, e)).await,
            }
        }

        Interception::Network(Ok(response))
    }
}
