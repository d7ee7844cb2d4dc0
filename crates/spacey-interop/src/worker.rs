// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Worker pool for CPU-bound transforms.
//!
//! Lexing, export scanning and factory emission run on a rayon pool so the
//! async graph driver keeps resolving other modules meanwhile. Each job is
//! independent and its result is returned to exactly the caller that
//! submitted it.

use crate::error::{InteropError, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::error;

/// Thread pool bridged to async callers
#[derive(Clone)]
pub struct WorkerPool {
    /// Thread pool for CPU-bound work
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Creates a pool with the default number of threads.
    pub fn new() -> Result<Self> {
        Self::build(rayon::ThreadPoolBuilder::new())
    }

    /// Creates a pool with a specific number of threads.
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::build(rayon::ThreadPoolBuilder::new().num_threads(num_threads))
    }

    fn build(builder: rayon::ThreadPoolBuilder) -> Result<Self> {
        let pool = builder
            .thread_name(|i| format!("spacey-interop-{}", i))
            .panic_handler(|_| error!("Transform worker panicked"))
            .build()
            .map_err(|e| InteropError::WorkerPool(e.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool and await its result
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let _ = tx.send(job());
        });
        rx.await
            .map_err(|_| InteropError::WorkerPool("worker dropped the job".into()))
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}
