// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolution cache for one build generation

use crate::module_system::identity::CanonicalLocation;
use crate::module_system::oracle::{OracleError, OracleResolution};
use crate::options::EnvDescriptor;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Cache key: a specifier as seen from one parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    /// Specifier as written
    pub specifier: String,
    /// Parent location (or base directory)
    pub parent: CanonicalLocation,
    /// Environment flags
    pub env: EnvDescriptor,
    /// Whether the parent is a dynamic module
    pub dynamic_parent: bool,
}

/// Cached oracle outcome; failures are memoized too
pub type CachedResolution = Result<OracleResolution, OracleError>;

/// Thread-safe resolution cache
///
/// Entries are never overwritten: concurrent fills of the same key race
/// benignly because the oracle is a pure function within a generation.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    records: DashMap<ResolutionKey, CachedResolution>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResolutionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached outcome or compute, store and return it
    pub fn get_or_resolve<F>(&self, key: ResolutionKey, resolve: F) -> CachedResolution
    where
        F: FnOnce() -> CachedResolution,
    {
        if let Some(record) = self.get(&key) {
            return record;
        }
        self.insert(key, resolve())
    }

    /// Get a cached outcome, counting a hit
    pub fn get(&self, key: &ResolutionKey) -> Option<CachedResolution> {
        let record = self.records.get(key).map(|entry| entry.value().clone());
        if record.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        record
    }

    /// Store a freshly resolved outcome, counting a miss
    ///
    /// An entry stored concurrently for the same key wins and is returned.
    pub fn insert(&self, key: ResolutionKey, outcome: CachedResolution) -> CachedResolution {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.records
            .entry(key)
            .or_insert(outcome)
            .value()
            .clone()
    }

    /// Clear the entire cache and its counters
    pub fn clear(&self) {
        self.records.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that reached the oracle
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get the number of cached records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_system::format::Format;

    fn key(specifier: &str) -> ResolutionKey {
        ResolutionKey {
            specifier: specifier.to_string(),
            parent: CanonicalLocation::new("/app/main.js"),
            env: EnvDescriptor::browser(),
            dynamic_parent: false,
        }
    }

    #[test]
    fn test_second_lookup_skips_resolver() {
        let cache = ResolutionCache::new();
        let first = cache.get_or_resolve(key("./a"), || {
            Ok(OracleResolution::new("/app/a.js", Format::DynamicModule))
        });
        let second = cache.get_or_resolve(key("./a"), || panic!("resolver called twice"));
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_failures_are_memoized() {
        let cache = ResolutionCache::new();
        let outcome = cache.get_or_resolve(key("missing"), || {
            Err(OracleError::NotFound("missing".into()))
        });
        assert!(outcome.is_err());
        assert!(cache.get(&key("missing")).is_some_and(|record| record.is_err()));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.hits(), 0);
    }
}
