// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Code generation collaborators

use crate::interop::lexer::{strip_comments, tokenize};
use crate::module_system::ModuleId;

/// Rewrites emitted static-module syntax for an older target
pub trait SyntaxTransformer: Send + Sync {
    /// Downlevel `code` of module `id` for `target`
    fn downlevel(
        &self,
        code: &str,
        id: &ModuleId,
        target: &serde_json::Value,
    ) -> std::result::Result<String, String>;
}

/// Shrinks rendered chunks
pub trait Minifier: Send + Sync {
    /// Minify a chunk
    fn minify(&self, code: &str) -> std::result::Result<String, String>;
}

/// Minifier that drops comments, indentation and blank lines
///
/// Line structure is kept so automatic semicolon insertion is unaffected.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceMinifier;

impl Minifier for WhitespaceMinifier {
    fn minify(&self, code: &str) -> std::result::Result<String, String> {
        let tokens = tokenize(code).map_err(|e| e.to_string())?;
        let stripped = strip_comments(code, &tokens);

        // Template literals may span lines; leave those lines untouched
        let mut protected = Vec::new();
        for token in &tokens {
            if token.text.contains('\n') {
                let first = code[..token.start].matches('\n').count();
                let last = first + token.text.matches('\n').count();
                protected.push((first, last));
            }
        }
        let is_protected =
            |line: usize| protected.iter().any(|(first, last)| line > *first && line <= *last);

        let mut out = String::with_capacity(stripped.len());
        for (n, line) in stripped.split('\n').enumerate() {
            let line = if is_protected(n) {
                line.trim_end_matches('\r')
            } else {
                line.trim()
            };
            if line.is_empty() && !is_protected(n) {
                continue;
            }
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }
}
