//! Per-session store of discovered endpoints.
//!
//! Created at session start and dropped at session end. Only successful
//! discoveries are stored, so a failed discovery is retried on the next
//! lookup.

use std::collections::BTreeMap;

use site_lookup_parcel_models::{EndpointConfig, normalize_jurisdiction_name};

/// Discovered [`EndpointConfig`]s keyed by normalized jurisdiction name.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryCache {
    entries: BTreeMap<String, EndpointConfig>,
}

impl DiscoveryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The endpoint discovered for `jurisdiction`, if any.
    #[must_use]
    pub fn get(&self, jurisdiction: &str) -> Option<&EndpointConfig> {
        self.entries.get(&normalize_jurisdiction_name(jurisdiction))
    }

    /// Stores an endpoint under its jurisdiction name, replacing any
    /// earlier entry.
    pub fn insert(&mut self, endpoint: EndpointConfig) {
        let key = normalize_jurisdiction_name(&endpoint.jurisdiction_name);
        log::debug!("Caching discovered endpoint for {key}");
        self.entries.insert(key, endpoint);
    }

    /// Drops the entry for `jurisdiction`.
    pub fn remove(&mut self, jurisdiction: &str) -> Option<EndpointConfig> {
        self.entries.remove(&normalize_jurisdiction_name(jurisdiction))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached endpoints in jurisdiction-key order.
    pub fn iter(&self) -> impl Iterator<Item = &EndpointConfig> {
        self.entries.values()
    }
}
