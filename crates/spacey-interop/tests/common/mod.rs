// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared fixtures: on-disk projects and an oracle that counts its calls

#![allow(dead_code)]

use spacey_interop::module_system::{
    FsOracle, FsSource, OracleError, OracleResolution, ResolutionOracle,
};
use spacey_interop::{CanonicalLocation, EnvDescriptor, GraphDriver, InteropPlugin, ModuleId, Options};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Surface crate logs with `RUST_LOG=spacey_interop=debug`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A project directory on disk
pub struct Project {
    _dir: TempDir,
    root: PathBuf,
}

impl Project {
    /// Create a project from `(relative path, contents)` pairs
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let project = Self { _dir: dir, root };
        for (path, contents) in files {
            project.write(path, contents);
        }
        project
    }

    /// Write (or overwrite) a file
    pub fn write(&self, path: &str, contents: &str) {
        let path = self.root.join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    /// Absolute path of a project file, as a string
    pub fn path(&self, path: &str) -> String {
        CanonicalLocation::from_path(&self.root.join(path)).to_string()
    }

    /// Location of a project file
    pub fn location(&self, path: &str) -> CanonicalLocation {
        CanonicalLocation::from_path(&self.root.join(path))
    }

    /// Wrapped identity of a project file
    pub fn wrapped(&self, path: &str) -> ModuleId {
        ModuleId::wrapped(self.location(path))
    }

    /// Raw identity of a project file
    pub fn raw(&self, path: &str) -> ModuleId {
        ModuleId::raw(self.location(path))
    }

    /// Options rooted at this project
    pub fn options(&self) -> Options {
        Options {
            base_path: Some(self.path("")),
            worker_threads: Some(2),
            ..Options::default()
        }
    }
}

/// Filesystem oracle that counts how often it is consulted
#[derive(Default)]
pub struct CountingOracle {
    inner: FsOracle,
    calls: AtomicUsize,
}

impl CountingOracle {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResolutionOracle for CountingOracle {
    fn resolve(
        &self,
        specifier: &str,
        parent: &CanonicalLocation,
        env: &EnvDescriptor,
        dynamic_parent: bool,
    ) -> Result<OracleResolution, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(specifier, parent, env, dynamic_parent)
    }
}

/// Plugin with a counting filesystem oracle
pub fn plugin(options: Options) -> (Arc<InteropPlugin>, Arc<CountingOracle>) {
    init_tracing();
    let oracle = Arc::new(CountingOracle::default());
    let plugin = InteropPlugin::new(options, oracle.clone(), Arc::new(FsSource)).unwrap();
    (Arc::new(plugin), oracle)
}

/// Graph driver with a counting filesystem oracle
pub fn driver(options: Options) -> (GraphDriver, Arc<CountingOracle>) {
    let (plugin, oracle) = plugin(options);
    (GraphDriver::new(plugin), oracle)
}
