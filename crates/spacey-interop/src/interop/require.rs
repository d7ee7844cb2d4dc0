// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dependency and free-global discovery in dynamic modules

use crate::diagnostics::SourceFrame;
use crate::error::{InteropError, Result};
use crate::interop::lexer::{Token, TokenKind};
use std::collections::BTreeSet;

/// A `require('x')` call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireCall {
    /// Specifier passed to `require`
    pub specifier: String,
    /// Inside a `try` block
    pub optional: bool,
    /// Start of `require`
    pub start: usize,
    /// End of the closing parenthesis
    pub end: usize,
}

/// Host globals a dynamic module may reference without declaring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImplicitGlobal {
    /// `__filename`
    Filename,
    /// `__dirname`
    Dirname,
    /// `global`
    Global,
    /// `process`
    Process,
    /// `Buffer`
    Buffer,
    /// `require` used other than as a direct call, e.g. `require.resolve`
    Require,
}

impl ImplicitGlobal {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "__filename" => Some(Self::Filename),
            "__dirname" => Some(Self::Dirname),
            "global" => Some(Self::Global),
            "process" => Some(Self::Process),
            "Buffer" => Some(Self::Buffer),
            _ => None,
        }
    }

    /// Identifier as written in source
    pub fn name(&self) -> &'static str {
        match self {
            Self::Filename => "__filename",
            Self::Dirname => "__dirname",
            Self::Global => "global",
            Self::Process => "process",
            Self::Buffer => "Buffer",
            Self::Require => "require",
        }
    }
}

/// Everything the interop transform needs to know about a dynamic module
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DynamicAnalysis {
    /// `require` calls in source order
    pub requires: Vec<RequireCall>,
    /// Free host globals referenced
    pub globals: BTreeSet<ImplicitGlobal>,
    /// Spans of `process.env.NODE_ENV`
    pub node_env: Vec<(usize, usize)>,
}

impl DynamicAnalysis {
    /// Distinct specifiers in first-use order
    pub fn specifiers(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.requires
            .iter()
            .map(|call| call.specifier.as_str())
            .filter(|specifier| seen.insert(*specifier))
            .collect()
    }

    /// Whether every call site of `specifier` is optional
    pub fn is_optional(&self, specifier: &str) -> bool {
        self.requires
            .iter()
            .filter(|call| call.specifier == specifier)
            .all(|call| call.optional)
    }
}

/// Spans of `process.env.NODE_ENV` member chains
pub fn node_env_sites(tokens: &[Token<'_>]) -> Vec<(usize, usize)> {
    let mut sites = Vec::new();
    for i in 0..tokens.len() {
        if !tokens[i].is_ident("process") || follows_dot(tokens, i) {
            continue;
        }
        let chain = tokens.get(i + 1).is_some_and(|t| t.is_punct("."))
            && tokens.get(i + 2).is_some_and(|t| t.is_ident("env"))
            && tokens.get(i + 3).is_some_and(|t| t.is_punct("."))
            && tokens.get(i + 4).is_some_and(|t| t.is_ident("NODE_ENV"));
        if chain {
            sites.push((tokens[i].start, tokens[i + 4].end));
        }
    }
    sites
}

/// Analyze a dynamic module
///
/// A `require` whose argument is not a single string literal cannot be
/// resolved statically and fails the module.
pub fn analyze(tokens: &[Token<'_>], source: &str, location: &str) -> Result<DynamicAnalysis> {
    let node_env = node_env_sites(tokens);
    let mut analysis = DynamicAnalysis {
        node_env,
        ..DynamicAnalysis::default()
    };

    // true for blocks opened by `try`
    let mut blocks: Vec<bool> = Vec::new();
    let mut try_pending = false;

    for i in 0..tokens.len() {
        let token = &tokens[i];

        if token.kind == TokenKind::Punct {
            match token.text {
                "{" => {
                    blocks.push(try_pending);
                    try_pending = false;
                }
                "}" => {
                    blocks.pop();
                }
                _ => {}
            }
            continue;
        }

        if token.kind != TokenKind::Ident {
            continue;
        }
        if token.text == "try" {
            try_pending = tokens.get(i + 1).is_some_and(|t| t.is_punct("{"));
            continue;
        }

        if token.text == "require" {
            match require_call(tokens, i, source, location)? {
                Some(call) => analysis.requires.push(RequireCall {
                    optional: blocks.iter().any(|is_try| *is_try),
                    ..call
                }),
                None if is_free_reference(tokens, i) => {
                    analysis.globals.insert(ImplicitGlobal::Require);
                }
                None => {}
            }
            continue;
        }

        if let Some(global) = ImplicitGlobal::from_name(token.text) {
            let in_node_env = analysis
                .node_env
                .iter()
                .any(|(start, _)| *start == token.start);
            if !in_node_env && is_free_reference(tokens, i) {
                analysis.globals.insert(global);
            }
        }
    }

    Ok(analysis)
}

fn follows_dot(tokens: &[Token<'_>], i: usize) -> bool {
    i > 0 && (tokens[i - 1].is_punct(".") || tokens[i - 1].is_punct("?."))
}

fn is_free_reference(tokens: &[Token<'_>], i: usize) -> bool {
    if follows_dot(tokens, i) {
        return false;
    }
    let prev = i.checked_sub(1).map(|p| &tokens[p]);
    // `function global()` or `class Buffer`
    if prev.is_some_and(|p| p.is_ident("function") || p.is_ident("class")) {
        return false;
    }
    // object literal key
    let is_key = tokens.get(i + 1).is_some_and(|t| t.is_punct(":"))
        && prev.is_some_and(|p| p.is_punct("{") || p.is_punct(","));
    !is_key
}

fn require_call(
    tokens: &[Token<'_>],
    i: usize,
    source: &str,
    location: &str,
) -> Result<Option<RequireCall>> {
    if follows_dot(tokens, i) || (i > 0 && tokens[i - 1].is_ident("function")) {
        return Ok(None);
    }
    if !tokens.get(i + 1).is_some_and(|t| t.is_punct("(")) {
        return Ok(None);
    }

    let literal = tokens.get(i + 2).and_then(Token::string_value);
    let closes = tokens.get(i + 3).is_some_and(|t| t.is_punct(")"));
    if let (Some(specifier), true) = (literal, closes) {
        return Ok(Some(RequireCall {
            specifier,
            optional: false,
            start: tokens[i].start,
            end: tokens[i + 3].end,
        }));
    }

    let close = matching_paren(tokens, i + 1);
    let arg_end = close.map(|c| tokens[c].start).unwrap_or(source.len());
    let arg_start = tokens[i + 1].end;
    let frame = SourceFrame::locate(source, tokens[i].start);
    Err(InteropError::UnsupportedDynamicRequirement {
        location: location.to_string(),
        expression: source[arg_start..arg_end].trim().to_string(),
        line: frame.line,
        column: frame.column,
    })
}

fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, token) in tokens[open..].iter().enumerate() {
        if token.is_punct("(") {
            depth += 1;
        } else if token.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                return Some(open + offset);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interop::lexer::tokenize;

    fn run(source: &str) -> Result<DynamicAnalysis> {
        analyze(&tokenize(source).unwrap(), source, "/app/a.js")
    }

    #[test]
    fn test_finds_requires_in_order() {
        let analysis = run(r#"
            var a = require('./a');
            var b = require("b"), a2 = require('./a');
            obj.require('not-me');
            function require(x) {}
        "#)
        .unwrap();
        assert_eq!(analysis.specifiers(), vec!["./a", "b"]);
        assert_eq!(analysis.requires.len(), 3);
        assert!(analysis.globals.is_empty());
    }

    #[test]
    fn test_require_as_value() {
        let analysis = run("exports.p = typeof require.resolve;\nvar c = require.cache;").unwrap();
        assert!(analysis.requires.is_empty());
        let globals: Vec<_> = analysis.globals.iter().map(ImplicitGlobal::name).collect();
        assert_eq!(globals, vec!["require"]);

        let analysis = run("var r = require;\nvar o = { require: 1 };").unwrap();
        assert!(analysis.globals.contains(&ImplicitGlobal::Require));
        let analysis = run("var o = { require: 1 };").unwrap();
        assert!(analysis.globals.is_empty());
    }

    #[test]
    fn test_optional_inside_try() {
        let analysis = run(r#"
            try { var x = require('maybe'); } catch (e) {}
            var y = require('always');
            try { if (a) { require('nested'); } } finally {}
        "#)
        .unwrap();
        assert!(analysis.is_optional("maybe"));
        assert!(!analysis.is_optional("always"));
        assert!(analysis.is_optional("nested"));
    }

    #[test]
    fn test_computed_require_is_rejected() {
        let err = run("var name = 'x';\nvar m = require('./' + name);").unwrap_err();
        match err {
            InteropError::UnsupportedDynamicRequirement {
                expression,
                line,
                column,
                ..
            } => {
                assert_eq!(expression, "'./' + name");
                assert_eq!(line, 2);
                assert_eq!(column, 9);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(run("require(`./${x}`)").is_err());
    }

    #[test]
    fn test_template_literal_require() {
        let analysis = run("require(`./plain`)").unwrap();
        assert_eq!(analysis.specifiers(), vec!["./plain"]);
    }

    #[test]
    fn test_free_globals() {
        let analysis = run(r#"
            var f = __filename, d = __dirname;
            var o = { process: 1, global: 2 };
            a.Buffer = 3;
            if (process.env.NODE_ENV !== 'production') {}
        "#)
        .unwrap();
        let globals: Vec<_> = analysis.globals.iter().map(ImplicitGlobal::name).collect();
        assert_eq!(globals, vec!["__filename", "__dirname"]);
        assert_eq!(analysis.node_env.len(), 1);

        let analysis = run("Buffer.from('x'); global.x = process.argv;").unwrap();
        assert_eq!(analysis.globals.len(), 3);
    }
}
