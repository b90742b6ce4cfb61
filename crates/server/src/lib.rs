//! PJHQ resource cache server.
//!
//! Hosts the cache controller in-process and exposes its page messaging
//! surface as MCP tools.

pub mod controller;
pub mod handler;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{ActivateReport, BatchReport, CacheController, Interception, LifecycleState};
pub use handler::CacheServer;
