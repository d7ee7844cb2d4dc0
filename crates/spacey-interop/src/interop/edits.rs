// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Span replacements over source text

/// A set of non-overlapping replacements applied in one pass
#[derive(Debug, Default, Clone)]
pub struct TextEdits {
    edits: Vec<(usize, usize, String)>,
}

impl TextEdits {
    /// Create an empty edit set
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `start..end` with `text`
    pub fn replace(&mut self, start: usize, end: usize, text: impl Into<String>) {
        self.edits.push((start, end, text.into()));
    }

    /// Remove `start..end`
    pub fn remove(&mut self, start: usize, end: usize) {
        self.replace(start, end, String::new());
    }

    /// Whether any edit was recorded
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits to `source`
    ///
    /// Edits overlapping an earlier one are dropped.
    pub fn apply(mut self, source: &str) -> String {
        self.edits.sort_by_key(|(start, end, _)| (*start, *end));
        let mut out = String::with_capacity(source.len());
        let mut pos = 0;
        for (start, end, text) in self.edits {
            if start < pos {
                continue;
            }
            out.push_str(&source[pos..start]);
            out.push_str(&text);
            pos = end;
        }
        out.push_str(&source[pos..]);
        out
    }
}
