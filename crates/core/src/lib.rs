//! Core types and shared functionality for the PJHQ resource cache.
//!
//! This crate provides:
//! - The cacheable-path manifest and eligibility policies
//! - The page/controller message protocol and its in-process transport
//! - Cache generation storage with a SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod bridge;
pub mod cache;
pub mod canonical;
pub mod config;
pub mod error;
pub mod network;
pub mod policy;
pub mod protocol;
pub mod registry;

pub use bridge::{ClientConnection, ClientId, ClientRegistry, ControllerHandle, Envelope, ReplyPort, ServiceHost};
pub use cache::{CacheDb, CacheEntry, CacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use network::{Network, Request, Response};
pub use policy::{Eligibility, EligibilityPolicy, PolicyKind};
pub use protocol::{CacheErrorKind, CacheErrorRecord, ControllerEvent, ControllerMessage, EventKind, RawMessage, Reply};
pub use registry::PathRegistry;
