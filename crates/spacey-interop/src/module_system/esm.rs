// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Import discovery in static modules

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bimport\s+(?:([\w$]+)\s*,?\s*)?(?:\{\s*([^}]*)\s*\})?(?:\*\s*as\s+([\w$]+))?\s*from\s*['"]([^'"]+)['"]"#,
    )
    .expect("valid import pattern")
});

static IMPORT_SIDE_EFFECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*['"]([^'"]+)['"]"#).expect("valid side-effect import pattern")
});

static IMPORT_DYNAMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid dynamic import pattern")
});

static EXPORT_FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bexport\s*(?:\*\s*(?:as\s+([\w$]+)\s*)?|\{\s*([^}]*)\s*\}\s*)from\s*['"]([^'"]+)['"]"#,
    )
    .expect("valid re-export pattern")
});

/// Import specifier types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSpecifier {
    /// `import foo from 'module'`
    Default(String),
    /// `import { foo } from 'module'`
    Named(String, Option<String>), // (imported, local alias)
    /// `import * as foo from 'module'`
    Namespace(String),
}

/// Parsed import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDeclaration {
    /// The module specifier (e.g., './foo.js', 'lodash')
    pub specifier: String,
    /// Import specifiers
    pub imports: Vec<ImportSpecifier>,
    /// Whether this is a side-effect only import (`import 'module'`)
    pub side_effect_only: bool,
    /// Whether this is an `import('module')` expression
    pub dynamic: bool,
    /// Byte offset of the statement
    pub offset: usize,
}

impl ImportDeclaration {
    /// Names imported as static bindings, `default` excluded
    pub fn named_imports(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().filter_map(|spec| match spec {
            ImportSpecifier::Named(name, _) if name != "default" => Some(name.as_str()),
            _ => None,
        })
    }
}

fn parse_bindings(list: &str) -> Vec<(String, Option<String>)> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(" as ") {
            Some((name, alias)) => (name.trim().to_string(), Some(alias.trim().to_string())),
            None => (part.to_string(), None),
        })
        .collect()
}

/// Parse the import-like statements of a static module
///
/// Expects comment-free text (see `strip_comments`). `export ... from`
/// statements are reported as imports of the names they forward.
pub fn parse_imports(source: &str) -> Vec<ImportDeclaration> {
    let mut imports = Vec::new();
    let mut covered = HashSet::new();

    for cap in IMPORT_RE.captures_iter(source) {
        let Some(whole) = cap.get(0) else { continue };
        let specifier = cap.get(4).map(|m| m.as_str().to_string()).unwrap_or_default();
        let mut import_specs = Vec::new();

        if let Some(default) = cap.get(1) {
            import_specs.push(ImportSpecifier::Default(default.as_str().to_string()));
        }
        if let Some(named) = cap.get(2) {
            for (name, alias) in parse_bindings(named.as_str()) {
                import_specs.push(ImportSpecifier::Named(name, alias));
            }
        }
        if let Some(ns) = cap.get(3) {
            import_specs.push(ImportSpecifier::Namespace(ns.as_str().to_string()));
        }

        covered.insert(whole.start());
        imports.push(ImportDeclaration {
            specifier,
            imports: import_specs,
            side_effect_only: false,
            dynamic: false,
            offset: whole.start(),
        });
    }

    for cap in IMPORT_SIDE_EFFECT_RE.captures_iter(source) {
        let Some(whole) = cap.get(0) else { continue };
        if covered.contains(&whole.start()) {
            continue;
        }
        imports.push(ImportDeclaration {
            specifier: cap[1].to_string(),
            imports: Vec::new(),
            side_effect_only: true,
            dynamic: false,
            offset: whole.start(),
        });
    }

    for cap in IMPORT_DYNAMIC_RE.captures_iter(source) {
        let Some(whole) = cap.get(0) else { continue };
        imports.push(ImportDeclaration {
            specifier: cap[1].to_string(),
            imports: Vec::new(),
            side_effect_only: false,
            dynamic: true,
            offset: whole.start(),
        });
    }

    for cap in EXPORT_FROM_RE.captures_iter(source) {
        let Some(whole) = cap.get(0) else { continue };
        let import_specs = match (cap.get(1), cap.get(2)) {
            (Some(ns), _) => vec![ImportSpecifier::Namespace(ns.as_str().to_string())],
            (None, Some(named)) => parse_bindings(named.as_str())
                .into_iter()
                .map(|(name, alias)| ImportSpecifier::Named(name, alias))
                .collect(),
            (None, None) => Vec::new(),
        };
        imports.push(ImportDeclaration {
            specifier: cap[3].to_string(),
            imports: import_specs,
            side_effect_only: false,
            dynamic: false,
            offset: whole.start(),
        });
    }

    imports.sort_by_key(|decl| decl.offset);
    imports
}

/// Distinct specifiers in source order
pub fn dependency_specifiers(imports: &[ImportDeclaration]) -> Vec<String> {
    let mut seen = HashSet::new();
    imports
        .iter()
        .filter(|decl| seen.insert(decl.specifier.as_str()))
        .map(|decl| decl.specifier.clone())
        .collect()
}
