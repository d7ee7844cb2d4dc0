// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Named-export recovery for dynamic modules
//!
//! Finds the names a CommonJS module assigns onto its exports object so the
//! wrapped face can offer them as static named exports. Recognized forms:
//!
//! - `exports.name = ...` and `exports['name'] = ...`
//! - `module.exports.name = ...`
//! - `module.exports = { name, other: ..., method() {} }`
//! - `Object.defineProperty(exports, 'name', ...)`
//!
//! `module.exports = require('x')` is recorded as a re-export and not followed.

use crate::interop::lexer::{Token, TokenKind, is_identifier_name};
use crate::module_system::CanonicalLocation;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Export names of one module, sorted
pub type ExportNameSet = BTreeSet<String>;

/// Names never surfaced as named exports
const EXCLUDED_NAMES: &[&str] = &["default", "dew", "__exports", "__esModule"];

/// Words that cannot be used as binding names
const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "public", "return", "static", "super", "switch",
    "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Outcome of scanning one module
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Identifier-safe export names
    pub names: ExportNameSet,
    /// Specifiers whose exports this module re-exports wholesale
    pub reexports: Vec<String>,
}

/// Whether `name` can be bound as a named export
pub fn is_identifier_safe(name: &str) -> bool {
    is_identifier_name(name) && !RESERVED_WORDS.contains(&name) && !EXCLUDED_NAMES.contains(&name)
}

/// Recover export names from a dynamic module's tokens
pub fn scan_exports(tokens: &[Token<'_>]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut found = Vec::new();

    for i in 0..tokens.len() {
        if tokens[i].is_ident("Object") {
            if let Some(name) = define_property_name(tokens, i) {
                found.push(name);
            }
            continue;
        }

        let Some((after, is_module_exports)) = exports_reference(tokens, i) else {
            continue;
        };

        match (tokens.get(after), tokens.get(after + 1)) {
            (Some(dot), Some(name)) if dot.is_punct(".") && name.kind == TokenKind::Ident => {
                if tokens.get(after + 2).is_some_and(|t| t.is_punct("=")) {
                    found.push(name.text.to_string());
                }
            }
            (Some(open), Some(key)) if open.is_punct("[") && key.kind == TokenKind::String => {
                let closes = tokens.get(after + 2).is_some_and(|t| t.is_punct("]"));
                let assigns = tokens.get(after + 3).is_some_and(|t| t.is_punct("="));
                if closes && assigns {
                    found.extend(key.string_value());
                }
            }
            (Some(assign), Some(value)) if is_module_exports && assign.is_punct("=") => {
                if value.is_punct("{") {
                    found.extend(object_literal_keys(tokens, after + 1));
                } else if let Some(specifier) = require_call(tokens, after + 1) {
                    result.reexports.push(specifier);
                }
            }
            _ => {}
        }
    }

    result.names = found.into_iter().filter(|n| is_identifier_safe(n)).collect();
    result
}

/// Top-level keys of a JSON document that can be named exports
pub fn scan_data_exports(value: &serde_json::Value) -> ExportNameSet {
    match value {
        serde_json::Value::Object(map) => map
            .keys()
            .filter(|key| is_identifier_safe(key))
            .cloned()
            .collect(),
        _ => ExportNameSet::new(),
    }
}

/// `exports` or `module.exports` at `i`; returns the index after it
fn exports_reference(tokens: &[Token<'_>], i: usize) -> Option<(usize, bool)> {
    if i > 0 && tokens[i - 1].is_punct(".") {
        return None;
    }
    let token = tokens.get(i)?;
    if token.is_ident("exports") {
        return Some((i + 1, false));
    }
    if token.is_ident("module")
        && tokens.get(i + 1)?.is_punct(".")
        && tokens.get(i + 2)?.is_ident("exports")
    {
        return Some((i + 3, true));
    }
    None
}

/// `Object.defineProperty(exports, 'name'`
fn define_property_name(tokens: &[Token<'_>], i: usize) -> Option<String> {
    if !(tokens.get(i + 1)?.is_punct(".")
        && tokens.get(i + 2)?.is_ident("defineProperty")
        && tokens.get(i + 3)?.is_punct("("))
    {
        return None;
    }
    let (after, _) = exports_reference(tokens, i + 4)?;
    if !tokens.get(after)?.is_punct(",") {
        return None;
    }
    tokens.get(after + 1)?.string_value()
}

/// `require('x')` at `i`
fn require_call(tokens: &[Token<'_>], i: usize) -> Option<String> {
    if tokens.get(i)?.is_ident("require")
        && tokens.get(i + 1)?.is_punct("(")
        && tokens.get(i + 3)?.is_punct(")")
    {
        return tokens.get(i + 2)?.string_value();
    }
    None
}

/// Keys of the object literal opening at `open`, at nesting depth one
fn object_literal_keys(tokens: &[Token<'_>], open: usize) -> Vec<String> {
    let mut keys = Vec::new();
    let mut depth = 0usize;
    let mut expecting_key = false;
    let mut i = open;

    while let Some(token) = tokens.get(i) {
        if depth == 1 && expecting_key {
            expecting_key = false;
            if let Some(key) = property_key(tokens, i) {
                keys.push(key);
            }
        }

        match token.kind {
            TokenKind::TemplateHead => depth += 1,
            TokenKind::TemplateTail => depth = depth.saturating_sub(1),
            TokenKind::Punct => match token.text {
                "{" | "(" | "[" => {
                    depth += 1;
                    if depth == 1 {
                        expecting_key = true;
                    }
                }
                "}" | ")" | "]" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                "," if depth == 1 => expecting_key = true,
                _ => {}
            },
            _ => {}
        }
        i += 1;
    }

    keys
}

/// Property name of an object literal member starting at `i`
fn property_key(tokens: &[Token<'_>], i: usize) -> Option<String> {
    let token = tokens.get(i)?;
    let next = tokens.get(i + 1);

    match token.kind {
        TokenKind::Ident => {
            let next = next?;
            if next.is_punct(":") || next.is_punct(",") || next.is_punct("}") || next.is_punct("(") {
                return Some(token.text.to_string());
            }
            // `get name()`, `set name(v)`, `async name()`
            if matches!(token.text, "get" | "set" | "async") {
                return property_key(tokens, i + 1)
                    .filter(|_| tokens.get(i + 2).is_some_and(|t| t.is_punct("(")));
            }
            None
        }
        TokenKind::String => {
            let next = next?;
            if next.is_punct(":") || next.is_punct("(") {
                return token.string_value();
            }
            None
        }
        // generator method
        TokenKind::Punct if token.text == "*" => property_key(tokens, i + 1),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum ScanState {
    InProgress,
    Done(Arc<ExportNameSet>),
}

/// Export names per location for one build generation
///
/// A scan requested while the same location is still being scanned gets the
/// empty set instead of waiting.
#[derive(Debug, Default)]
pub struct ExportCache {
    entries: DashMap<CanonicalLocation, ScanState>,
}

impl ExportCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached names, or the result of `scan` stored for later callers
    pub fn get_or_scan<F>(&self, location: &CanonicalLocation, scan: F) -> Arc<ExportNameSet>
    where
        F: FnOnce() -> ExportNameSet,
    {
        match self.entries.entry(location.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                ScanState::Done(names) => return names.clone(),
                ScanState::InProgress => return Arc::new(ExportNameSet::new()),
            },
            Entry::Vacant(entry) => {
                entry.insert(ScanState::InProgress);
            }
        }

        let names = Arc::new(scan());
        self.entries
            .insert(location.clone(), ScanState::Done(names.clone()));
        names
    }

    /// Names of a finished scan
    pub fn get(&self, location: &CanonicalLocation) -> Option<Arc<ExportNameSet>> {
        match self.entries.get(location)?.value() {
            ScanState::Done(names) => Some(names.clone()),
            ScanState::InProgress => None,
        }
    }

    /// Forget every scan
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of scanned or in-progress locations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was scanned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
