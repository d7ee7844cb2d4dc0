// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Non-fatal build diagnostics and source frames

use parking_lot::Mutex;
use std::fmt;
use tracing::warn;

/// Category of a non-fatal diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A nested bare specifier failed to resolve and was left external
    UnresolvedExternal,
    /// A native addon was replaced with an empty module in a browser build
    NativeBinaryStub,
    /// A host builtin has no browser substitution and maps to the empty module
    MissingBuiltinSubstitution,
    /// A configured external could not be resolved at generation start
    UnresolvedExternalBinding,
    /// The minifier failed and the chunk was emitted unminified
    MinifierFallback,
    /// A static import names a binding the dynamic module does not assign
    MissingExport,
}

/// A warning recorded during a build generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category
    pub kind: DiagnosticKind,
    /// Human readable message
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Per-generation diagnostic sink
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic
    pub fn push(&self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic.message);
        self.entries.lock().push(diagnostic);
    }

    /// Record a diagnostic from its parts
    pub fn warn(&self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(kind, message));
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Take everything recorded so far, leaving the sink empty
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Number of recorded diagnostics
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A position in source text with a printable context frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFrame {
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
    /// `"{line}: {text}\n{padding}^"`
    pub frame: String,
}

impl SourceFrame {
    /// Locate a byte offset
    pub fn locate(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = source[..line_start].matches('\n').count() + 1;
        let column = source[line_start..offset].chars().count() + 1;
        Self::build(source, line, column)
    }

    /// Build a frame for a known 1-based line and column
    pub fn at(source: &str, line: usize, column: usize) -> Self {
        Self::build(source, line.max(1), column.max(1))
    }

    fn build(source: &str, line: usize, column: usize) -> Self {
        let text = source
            .lines()
            .nth(line - 1)
            .unwrap_or_default()
            .trim_end_matches('\r');
        let prefix = format!("{}: ", line);
        let padding = " ".repeat(prefix.len() + column - 1);
        Self {
            line,
            column,
            frame: format!("{}{}\n{}^", prefix, text, padding),
        }
    }
}
