// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source loading

use crate::error::{InteropError, Result};
use crate::module_system::identity::CanonicalLocation;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Reads module source text for a canonical location
#[async_trait]
pub trait SourceFetch: Send + Sync {
    /// Read the source of a module
    async fn read(&self, location: &CanonicalLocation) -> Result<String>;
}

/// Reads sources from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

#[async_trait]
impl SourceFetch for FsSource {
    async fn read(&self, location: &CanonicalLocation) -> Result<String> {
        let path = location
            .to_file_path()
            .ok_or_else(|| InteropError::not_found(location.as_str(), location.as_str()))?;
        debug!("Reading {}", path.display());
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

/// Sources held in memory, keyed by location
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<CanonicalLocation, String>,
}

impl MemorySource {
    /// Create an empty source map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file
    pub fn insert(&mut self, location: impl Into<CanonicalLocation>, source: impl Into<String>) {
        self.files.insert(location.into(), source.into());
    }

    /// Builder form of [`MemorySource::insert`]
    pub fn with(mut self, location: impl Into<CanonicalLocation>, source: impl Into<String>) -> Self {
        self.insert(location, source);
        self
    }
}

#[async_trait]
impl SourceFetch for MemorySource {
    async fn read(&self, location: &CanonicalLocation) -> Result<String> {
        self.files
            .get(location)
            .cloned()
            .ok_or_else(|| InteropError::not_found(location.as_str(), location.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fs_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "module.exports = 1;").unwrap();
        let location = CanonicalLocation::from_path(file.path());
        let source = FsSource.read(&location).await.unwrap();
        assert_eq!(source, "module.exports = 1;");
    }

    #[tokio::test]
    async fn test_fs_source_rejects_urls() {
        let err = FsSource
            .read(&CanonicalLocation::new("https://cdn.example/x.js"))
            .await
            .unwrap_err();
        assert!(matches!(err, InteropError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::new().with("/app/a.js", "exports.a = 1;");
        assert_eq!(
            source.read(&CanonicalLocation::new("/app/a.js")).await.unwrap(),
            "exports.a = 1;"
        );
        assert!(source.read(&CanonicalLocation::new("/app/b.js")).await.is_err());
    }
}
