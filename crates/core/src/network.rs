//! Network seam used by the controller.
//!
//! The controller never talks HTTP directly; it is handed a [`Network`]
//! implementation at construction (reqwest in production, fakes in tests).

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;

/// A request seen by the fetch interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: "GET".into(), url: url.into() }
    }

    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into(), url: url.into() }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A complete, buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The URL that was requested.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// Only exactly-200 responses are ever stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Performs GET requests on behalf of the controller.
///
/// Implementations return `Ok` for any HTTP status, including errors; `Err`
/// is reserved for fetches that failed outright.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Response, Error>;
}
