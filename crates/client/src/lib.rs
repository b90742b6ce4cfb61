//! Client code for the PJHQ resource cache.
//!
//! This crate provides the reqwest-backed network fetcher used by the
//! controller and the page-side messenger that talks to it.

pub mod fetch;
pub mod messenger;

pub use fetch::{FetchConfig, HttpFetcher};
pub use messenger::{CacheMessenger, MessengerConfig, SubscriberResult, Subscribers, SubscriptionId};
