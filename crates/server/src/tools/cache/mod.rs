//! Cache-related MCP tools.
//!
//! This module provides tools for populating and inspecting the current
//! cache generation.

pub mod inspect;
pub mod resources;

pub use inspect::{CheckCacheParams, check_impl, paths_impl, stats_impl};
pub use resources::{CacheResourcesParams, resources_impl};
