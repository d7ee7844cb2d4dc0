// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module formats and the per-generation format registry

use crate::error::{InteropError, Result};
use crate::module_system::identity::CanonicalLocation;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::Path;

/// Native format of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Imports and exports fixed at parse time (ESM)
    StaticModule,
    /// Exports are a mutable object populated during evaluation (CommonJS)
    DynamicModule,
    /// JSON data
    Data,
    /// Native addon (`.node`)
    NativeBinary,
    /// Builtin provided by the host runtime
    HostBuiltin,
}

impl Format {
    /// Short name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::StaticModule => "module",
            Format::DynamicModule => "commonjs",
            Format::Data => "json",
            Format::NativeBinary => "addon",
            Format::HostBuiltin => "builtin",
        }
    }

    /// Formats rewritten by the interop transform
    pub fn needs_interop(&self) -> bool {
        matches!(self, Format::DynamicModule | Format::Data)
    }

    /// Format implied by a file extension alone
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mjs") => Some(Format::StaticModule),
            Some("cjs") => Some(Format::DynamicModule),
            Some("json") => Some(Format::Data),
            Some("node") => Some(Format::NativeBinary),
            _ => None,
        }
    }

    /// Format implied by a package.json `"type"` field
    pub fn from_package_type(type_field: Option<&str>) -> Self {
        match type_field {
            Some("module") => Format::StaticModule,
            _ => Format::DynamicModule,
        }
    }
}

/// Format assigned to each location for one build generation
///
/// A location is classified at most once; re-classification with the same
/// format is a no-op, a different format is an error.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: DashMap<CanonicalLocation, Format>,
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the format of a location
    pub fn classify(&self, location: &CanonicalLocation, format: Format) -> Result<Format> {
        match self.formats.entry(location.clone()) {
            Entry::Occupied(entry) => {
                let existing = *entry.get();
                if existing == format {
                    Ok(existing)
                } else {
                    Err(InteropError::FormatConflict {
                        location: location.to_string(),
                        existing: existing.as_str(),
                        requested: format.as_str(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(format);
                Ok(format)
            }
        }
    }

    /// Format of a location, if classified
    pub fn get(&self, location: &CanonicalLocation) -> Option<Format> {
        self.formats.get(location).map(|entry| *entry.value())
    }

    /// Forget every classification
    pub fn clear(&self) {
        self.formats.clear();
    }

    /// Number of classified locations
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether nothing is classified
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}
