// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Package resolution oracle interface

use crate::module_system::format::Format;
use crate::module_system::identity::CanonicalLocation;
use crate::options::EnvDescriptor;
use thiserror::Error;

/// Location and declared format of a resolved specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResolution {
    /// Canonical location of the target
    pub location: CanonicalLocation,
    /// Declared format of the target
    pub format: Format,
}

impl OracleResolution {
    /// Create a resolution
    pub fn new(location: impl Into<CanonicalLocation>, format: Format) -> Self {
        Self {
            location: location.into(),
            format,
        }
    }
}

/// Failures reported by an oracle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Nothing matches the specifier
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    /// The package exists but declares no entry point
    #[error("No package main defined for '{0}'")]
    NoPackageMain(String),

    /// The target is a URL outside the file-addressable space
    #[error("'{0}' is not a file URL")]
    NotFile(String),

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

impl OracleError {
    /// Not-found style failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, OracleError::NotFound(_) | OracleError::NoPackageMain(_))
    }
}

/// Turns a specifier and parent location into a canonical location and format
///
/// `parent` is either a module location or a directory (ending in `/`) for
/// top-level resolution. `dynamic_parent` is set when the importer is a
/// dynamic module, whose lookups do not distinguish directory requires.
/// A bare specifier ending in `/` resolves to the package root directory.
pub trait ResolutionOracle: Send + Sync {
    /// Resolve a specifier
    fn resolve(
        &self,
        specifier: &str,
        parent: &CanonicalLocation,
        env: &EnvDescriptor,
        dynamic_parent: bool,
    ) -> Result<OracleResolution, OracleError>;
}
