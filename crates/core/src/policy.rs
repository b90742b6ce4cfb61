//! Cache eligibility policies.
//!
//! Exactly one policy is active per controller. The pattern policy trusts a
//! fixed set of extension and origin regexes; the exact-match policy trusts
//! only the manifest. Both compare canonical URLs (see [`crate::canonical`]).

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::canonical::{canonicalize, same_origin};
use crate::registry::PathRegistry;

/// Regexes used by the pattern policy unless configured otherwise.
pub const DEFAULT_RUNTIME_PATTERNS: &[&str] = &[
    r"\.(?:png|jpg|jpeg|svg|gif)$",
    r"\.(?:css)$",
    r"\.(?:js)$",
    r"^https://fonts\.googleapis\.com",
    r"^https://fonts\.gstatic\.com",
    r"^https://cdn\.discordapp\.com",
];

/// Which eligibility rule the controller applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Extension / trusted-origin regexes.
    Pattern,
    /// Canonical URL must appear in the manifest.
    #[default]
    ExactMatch,
}

/// Outcome of classifying a request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Serve from cache and populate it on a miss.
    Cacheable,
    /// Serve from cache if present, never write.
    ServeOnly,
    /// Leave the request to the normal network path.
    Bypass,
}

impl Eligibility {
    pub fn intercepts(self) -> bool {
        !matches!(self, Eligibility::Bypass)
    }
}

/// A compiled eligibility policy.
#[derive(Debug, Clone)]
pub enum EligibilityPolicy {
    Pattern { origin: Url, patterns: Vec<Regex> },
    ExactMatch { manifest: HashSet<String> },
}

impl EligibilityPolicy {
    /// Compile the pattern policy.
    pub fn pattern(origin: Url, patterns: &[String]) -> Result<Self, Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).map_err(|e| Error::InvalidInput(format!("bad runtime pattern {p}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Pattern { origin, patterns })
    }

    /// Build the exact-match policy from the manifest.
    ///
    /// Entries that fail to canonicalize are skipped with a warning; they could
    /// never match a request anyway.
    pub fn exact_match(origin: &Url, registry: &PathRegistry) -> Self {
        let manifest = registry
            .all_paths()
            .iter()
            .filter_map(|path| match canonicalize(origin, path) {
                Ok(url) => Some(String::from(url)),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping unparseable manifest entry");
                    None
                }
            })
            .collect();
        Self::ExactMatch { manifest }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Pattern { .. } => PolicyKind::Pattern,
            Self::ExactMatch { .. } => PolicyKind::ExactMatch,
        }
    }

    /// Classify a canonical URL.
    pub fn classify(&self, url: &Url) -> Eligibility {
        match self {
            Self::Pattern { origin, patterns } => {
                if patterns.iter().any(|p| p.is_match(url.as_str())) {
                    Eligibility::Cacheable
                } else if same_origin(origin, url) {
                    Eligibility::ServeOnly
                } else {
                    Eligibility::Bypass
                }
            }
            Self::ExactMatch { manifest } => {
                if manifest.contains(url.as_str()) {
                    Eligibility::Cacheable
                } else {
                    Eligibility::Bypass
                }
            }
        }
    }

    /// Whether a canonical URL may be written to cache.
    pub fn may_store(&self, url: &Url) -> bool {
        self.classify(url) == Eligibility::Cacheable
    }

    /// Distinct canonical manifest URLs. `None` under the pattern policy.
    pub fn manifest(&self) -> Option<&HashSet<String>> {
        match self {
            Self::Pattern { .. } => None,
            Self::ExactMatch { manifest } => Some(manifest),
        }
    }

    /// Whether a canonical URL is a manifest entry. `None` under the pattern policy.
    pub fn in_manifest(&self, url: &Url) -> Option<bool> {
        match self {
            Self::Pattern { .. } => None,
            Self::ExactMatch { manifest } => Some(manifest.contains(url.as_str())),
        }
    }
}
