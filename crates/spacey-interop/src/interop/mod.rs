// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS to ESM interop transform
//!
//! A dynamic module reached from a static importer is emitted twice:
//!
//! - the wrapped face, a small static module that calls the factory once and
//!   re-exports the result by name ([`shim::dynamic_entry`])
//! - the raw face, the original body moved into a run-once `dew` factory
//!   ([`dew::render_factory`])
//!
//! Data modules get the same pair of faces.

pub mod dew;
pub mod edits;
pub mod lexer;
pub mod require;
pub mod scanner;
pub mod shim;

pub use dew::{Factory, render_factory};
pub use lexer::{LexError, Token, TokenKind, tokenize};
pub use require::{DynamicAnalysis, ImplicitGlobal, RequireCall};
pub use scanner::{ExportCache, ExportNameSet, ScanResult, scan_data_exports, scan_exports};
