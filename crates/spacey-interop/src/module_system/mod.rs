// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module resolution and classification
//!
//! ## Resolution
//! - Pluggable [`ResolutionOracle`] with a Node.js filesystem implementation
//! - Per-generation memoization of every oracle outcome, failures included
//! - Top-level relative retry, lenient nested lookups
//!
//! ## Classification
//! - One [`Format`] per location per build generation
//! - Browser substitution of host builtins
//! - Externals by exact location or package boundary

mod cache;
mod classifier;
pub mod esm;
mod format;
mod generation;
mod identity;
mod loader;
mod node_resolver;
mod oracle;
mod resolver;

pub use cache::{CachedResolution, ResolutionCache, ResolutionKey};
pub use classifier::{BROWSER_BUILTINS, BuiltinSubstitutions, ExternalTable};
pub use format::{Format, FormatRegistry};
pub use generation::BuildGeneration;
pub use identity::{
    CanonicalLocation, ExternalRef, ModuleId, RAW_SUFFIX, Resolution, Role, is_bare, is_relative,
};
pub use loader::{FsSource, MemorySource, SourceFetch};
pub use node_resolver::{BUILTIN_MODULES, FsOracle, package_name, split_package_specifier};
pub use oracle::{OracleError, OracleResolution, ResolutionOracle};
pub use resolver::{DependencyKind, Resolver};
