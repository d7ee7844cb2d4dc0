// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-interop
//!
//! Module resolution and CommonJS/ESM interop for bundling with Spacey.
//!
//! Given entry specifiers, this crate resolves a deduplicated module graph,
//! classifies the format of every module and rewrites CommonJS and JSON
//! modules so they link into a single ES module graph:
//!
//! - Node.js-style resolution with per-generation memoization
//! - Browser substitution of Node.js builtins
//! - Externals by exact location or package boundary
//! - Named-export recovery for CommonJS modules
//! - Run-once `dew` factories preserving CommonJS evaluation order and cycles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spacey_interop::{GraphDriver, InteropPlugin, Options};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> spacey_interop::Result<()> {
//!     let options = Options::from_json(r#"{ "basePath": "./app", "externals": ["react"] }"#)?;
//!     let driver = GraphDriver::new(Arc::new(InteropPlugin::from_options(options)?));
//!     let graph = driver.build(&["./index.js"]).await?;
//!     for (id, module) in graph.modules() {
//!         println!("{} ({})", id, module.format.as_str());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codegen;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod interop;
pub mod module_system;
pub mod options;
pub mod plugin;
pub mod worker;

// Re-exports
pub use codegen::{Minifier, SyntaxTransformer, WhitespaceMinifier};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{InteropError, Result};
pub use graph::{EmittedModule, GraphDriver, ModuleGraph, ModuleState};
pub use module_system::{
    CanonicalLocation, ExternalRef, Format, ModuleId, Resolution, ResolutionOracle, Role,
};
pub use options::{EnvDescriptor, Options};
pub use plugin::{InteropPlugin, Transformed};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
