// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for module resolution and interop transforms

use crate::diagnostics::SourceFrame;
use crate::module_system::OracleError;
use thiserror::Error;

/// Result type for interop operations
pub type Result<T> = std::result::Result<T, InteropError>;

/// Errors that can abort a build generation
#[derive(Debug, Error)]
pub enum InteropError {
    /// Specifier could not be resolved
    #[error("Cannot find module '{specifier}' from '{parent}'")]
    NotFound {
        /// Specifier as written at the import site
        specifier: String,
        /// Location of the importing module (or the base path)
        parent: String,
    },

    /// A `require()` whose target cannot be determined statically
    #[error(
        "Unsupported dynamic requirement `require({expression})` in {location}:{line}:{column}"
    )]
    UnsupportedDynamicRequirement {
        /// Module containing the call
        location: String,
        /// Source text of the argument list
        expression: String,
        /// 1-based line of the call
        line: usize,
        /// 1-based column of the call
        column: usize,
    },

    /// Native addon reached in a host-class build
    #[error("Unsupported native requirement: {0}")]
    UnsupportedNativeBinary(String),

    /// Source failed to parse
    #[error("SyntaxError: {message} ({location}:{line}:{column})\n{frame}")]
    Syntax {
        /// Module that failed to parse
        location: String,
        /// Parser message
        message: String,
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// Printable source context
        frame: String,
    },

    /// Minification failed
    #[error("Minifier failed: {0}")]
    Minifier(String),

    /// A location was classified twice with different formats
    #[error("Conflicting formats for '{location}': {existing} vs {requested}")]
    FormatConflict {
        /// The location
        location: String,
        /// Format already registered
        existing: &'static str,
        /// Format that was attempted
        requested: &'static str,
    },

    /// A module was loaded or transformed without being resolved first
    #[error("Module '{0}' has not been resolved in this build generation")]
    Unclassified(String),

    /// Unexpected failure reported by the resolution oracle
    #[error("Error resolving module '{specifier}': {reason}")]
    Oracle {
        /// Specifier being resolved
        specifier: String,
        /// Reason reported by the oracle
        reason: String,
    },

    /// Syntax transformer failure
    #[error("Transform of '{location}' failed: {reason}")]
    Transformer {
        /// Module being transformed
        location: String,
        /// Reason reported by the transformer
        reason: String,
    },

    /// Transform worker pool failure
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Blocking resolution task failure
    #[error("Resolution task failed: {0}")]
    Task(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InteropError {
    /// Create a not-found error
    pub fn not_found(specifier: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::NotFound {
            specifier: specifier.into(),
            parent: parent.into(),
        }
    }

    /// Create a syntax error pointing at a byte offset of `source`
    pub fn syntax(location: impl Into<String>, message: impl Into<String>, source: &str, offset: usize) -> Self {
        let frame = SourceFrame::locate(source, offset);
        Self::Syntax {
            location: location.into(),
            message: message.into(),
            line: frame.line,
            column: frame.column,
            frame: frame.frame,
        }
    }

    /// Create a syntax error from a JSON parse failure
    pub fn json_syntax(location: impl Into<String>, source: &str, err: &serde_json::Error) -> Self {
        let frame = SourceFrame::at(source, err.line(), err.column());
        Self::Syntax {
            location: location.into(),
            message: err.to_string(),
            line: frame.line,
            column: frame.column,
            frame: frame.frame,
        }
    }

    /// Convert an oracle failure for `specifier` resolved from `parent`
    pub fn from_oracle(err: OracleError, specifier: &str, parent: &str) -> Self {
        match err {
            OracleError::NotFound(_) | OracleError::NoPackageMain(_) => {
                Self::not_found(specifier, parent)
            }
            other => Self::Oracle {
                specifier: specifier.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Whether this error aborts the build generation
    ///
    /// Minifier failures are the only condition that degrades instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Minifier(_))
    }
}
