// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module identities
//!
//! A physical file reached through the interop layer has two identities: the
//! static-module facing one (`Role::Wrapped`) and the factory consumed by other
//! dynamic modules (`Role::Raw`). Both share one [`CanonicalLocation`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Suffix marking the raw role in host identity strings
pub const RAW_SUFFIX: &str = "?dew";

/// De-duplication key of a module: an absolute path or URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalLocation(String);

impl CanonicalLocation {
    /// Location of the empty-module sentinel
    pub const EMPTY: &'static str = "@empty";

    /// Wrap a location string
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Location of a filesystem path, with `/` separators
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().replace('\\', "/"))
    }

    /// Directory location, always ending in `/`
    pub fn directory(location: impl Into<String>) -> Self {
        let mut location = location.into();
        if !location.ends_with('/') {
            location.push('/');
        }
        Self(location)
    }

    /// The empty-module sentinel
    pub fn empty_module() -> Self {
        Self(Self::EMPTY.to_string())
    }

    /// Whether this is the empty-module sentinel
    pub fn is_empty_module(&self) -> bool {
        self.0 == Self::EMPTY
    }

    /// The location string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this names a directory boundary
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Final path segment
    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// Remainder of this location below a directory boundary
    pub fn strip_directory<'a>(&'a self, directory: &CanonicalLocation) -> Option<&'a str> {
        if !directory.is_directory() {
            return None;
        }
        self.0.strip_prefix(directory.as_str())
    }

    /// Filesystem path for `file://` URLs and plain absolute paths
    pub fn to_file_path(&self) -> Option<std::path::PathBuf> {
        if self.0.starts_with("file:") {
            return url::Url::parse(&self.0).ok()?.to_file_path().ok();
        }
        if self.0.contains("://") || self.is_empty_module() {
            return None;
        }
        Some(std::path::PathBuf::from(&self.0))
    }
}

impl fmt::Display for CanonicalLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CanonicalLocation {
    fn from(location: String) -> Self {
        Self::new(location)
    }
}

impl From<&str> for CanonicalLocation {
    fn from(location: &str) -> Self {
        Self::new(location)
    }
}

/// Which face of a physical module an identity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Static-module facing identity
    Wrapped,
    /// Factory form consumed by other dynamic modules
    Raw,
}

/// Identity of a module in the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    /// Physical location
    pub location: CanonicalLocation,
    /// Face of the module
    pub role: Role,
}

impl ModuleId {
    /// Static-module facing identity of a location
    pub fn wrapped(location: CanonicalLocation) -> Self {
        Self {
            location,
            role: Role::Wrapped,
        }
    }

    /// Factory identity of a location
    pub fn raw(location: CanonicalLocation) -> Self {
        Self {
            location,
            role: Role::Raw,
        }
    }

    /// Identity of the empty-module sentinel
    pub fn empty_module() -> Self {
        Self::wrapped(CanonicalLocation::empty_module())
    }

    /// Whether this is the factory face
    pub fn is_raw(&self) -> bool {
        self.role == Role::Raw
    }

    /// Identity string handed to a host bundler
    pub fn to_host_id(&self) -> String {
        match self.role {
            Role::Wrapped => self.location.as_str().to_string(),
            Role::Raw => format!("{}{}", self.location, RAW_SUFFIX),
        }
    }

    /// Parse an identity string produced by [`ModuleId::to_host_id`]
    pub fn from_host_id(id: &str) -> Self {
        match id.strip_suffix(RAW_SUFFIX) {
            Some(location) => Self::raw(CanonicalLocation::new(location)),
            None => Self::wrapped(CanonicalLocation::new(id)),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_host_id())
    }
}

/// A module kept out of the graph, referenced by an opaque identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalRef {
    /// Identifier the host resolves at run time
    pub id: String,
}

impl ExternalRef {
    /// Create an external reference
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Outcome of resolving a specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A module that enters the graph
    Module(ModuleId),
    /// A module excluded from the graph
    External(ExternalRef),
}

impl Resolution {
    /// The module identity, if bundled
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            Resolution::Module(id) => Some(id),
            Resolution::External(_) => None,
        }
    }

    /// The external reference, if excluded
    pub fn external(&self) -> Option<&ExternalRef> {
        match self {
            Resolution::Module(_) => None,
            Resolution::External(ext) => Some(ext),
        }
    }
}

/// `./` or `../` specifiers
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Bare package specifiers (not relative, absolute or URL shaped)
pub fn is_bare(specifier: &str) -> bool {
    !is_relative(specifier)
        && !specifier.starts_with('/')
        && !specifier.contains("://")
        && specifier != "."
        && specifier != ".."
}
