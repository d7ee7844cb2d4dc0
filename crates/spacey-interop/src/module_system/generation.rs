// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-generation state

use crate::diagnostics::Diagnostics;
use crate::interop::scanner::ExportCache;
use crate::module_system::cache::ResolutionCache;
use crate::module_system::classifier::ExternalTable;
use crate::module_system::format::FormatRegistry;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;
use tracing::info;

/// Everything owned by one resolve-classify-transform pass
///
/// All caches are discarded by [`BuildGeneration::reset`].
#[derive(Debug, Default)]
pub struct BuildGeneration {
    number: AtomicU64,
    /// Oracle outcomes
    pub resolutions: ResolutionCache,
    /// Format of every classified location
    pub formats: FormatRegistry,
    /// Recovered export names
    pub exports: ExportCache,
    /// Non-fatal diagnostics
    pub diagnostics: Diagnostics,
    externals: RwLock<Arc<OnceCell<Arc<ExternalTable>>>>,
}

impl BuildGeneration {
    /// Create generation zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation number
    pub fn number(&self) -> u64 {
        self.number.load(Ordering::Acquire)
    }

    /// Discard all per-generation state and start a new generation
    pub fn reset(&self) -> u64 {
        self.resolutions.clear();
        self.formats.clear();
        self.exports.clear();
        self.diagnostics.drain();
        *self.externals.write() = Arc::new(OnceCell::new());
        let number = self.number.fetch_add(1, Ordering::AcqRel) + 1;
        info!("Starting build generation {}", number);
        number
    }

    /// Externals for this generation
    ///
    /// The first caller runs `init`; every other caller waits for it to
    /// finish. `init` runs at most once per generation.
    pub async fn externals<F, Fut>(&self, init: F) -> Arc<ExternalTable>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ExternalTable>,
    {
        let cell = self.externals.read().clone();
        cell.get_or_init(|| async move { Arc::new(init().await) })
            .await
            .clone()
    }

    /// Externals, if already resolved
    pub fn externals_ready(&self) -> Option<Arc<ExternalTable>> {
        self.externals.read().get().cloned()
    }
}
