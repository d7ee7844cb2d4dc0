// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Deferred-initialization factory for dynamic modules
//!
//! The module body moves into `export function dew ()`, which runs it at most
//! once and returns `module.exports`. A cyclic re-entry returns the exports
//! object as populated so far, matching CommonJS.
//!
//! ```text
//! import { dew as __dew_dep0 } from "./dep.js";
//! var exports, module, __dew_exec;
//! export function dew () {
//!   if (__dew_exec) return module.exports;
//!   __dew_exec = true;
//!   exports = {};
//!   module = { exports: exports };
//!   (function () {
//! var dep = __dew_dep0();
//!   }).call(exports);
//!   return module.exports;
//! }
//! ```
//!
//! The state variables carry no initializers so that an early call through a
//! hoisted `dew` binding is not undone when the module body evaluates.

use crate::interop::edits::TextEdits;
use crate::interop::lexer::hashbang_len;
use crate::interop::require::{DynamicAnalysis, ImplicitGlobal};
use crate::module_system::DependencyKind;
use crate::options::EnvDescriptor;
use std::collections::HashMap;
use std::fmt::Write;

/// Expression for `__filename` derived from `import.meta.url`
const FILENAME_EXPR: &str = "import.meta.url.startsWith(\"file:\") ? decodeURI(import.meta.url.slice(7 + (typeof process !== \"undefined\" && process.platform === \"win32\"))) : new URL(import.meta.url).pathname";

/// Expression for `__dirname` derived from `import.meta.url`
const DIRNAME_EXPR: &str = "import.meta.url.startsWith(\"file:\") ? decodeURI(import.meta.url.slice(0, import.meta.url.lastIndexOf(\"/\")).slice(7 + (typeof process !== \"undefined\" && process.platform === \"win32\"))) : new URL(import.meta.url.slice(0, import.meta.url.lastIndexOf(\"/\"))).pathname";

/// Emitted factory module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factory {
    /// Module source
    pub code: String,
    /// Specifiers imported by the emitted code, in order
    pub dependencies: Vec<String>,
}

/// JavaScript string literal for `value`
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Value of a namespace import, unwrapped to its default export when present
fn namespace_value(local: &str) -> String {
    format!("(\"default\" in {0} ? {0}.default : {0})", local)
}

fn missing_module(specifier: &str) -> String {
    let message = js_string(&format!("Cannot find module '{}'", specifier));
    format!(
        "(function () {{ var e = new Error({}); e.code = \"MODULE_NOT_FOUND\"; throw e; }})()",
        message
    )
}

/// Local `require` for uses other than a direct call
///
/// Known specifiers return what their call sites would. `require.resolve`
/// resolves relative specifiers against the module URL.
fn require_binding(specifiers: &[&str], call_sites: &HashMap<&str, String>) -> String {
    let mut binding = String::from("  var require = function (id) {\n    switch (id) {\n");
    for specifier in specifiers {
        if let Some(expression) = call_sites.get(specifier) {
            let _ = writeln!(
                binding,
                "      case {}: return {};",
                js_string(specifier),
                expression
            );
        }
    }
    binding.push_str("    }\n");
    binding.push_str(
        "    var e = new Error(\"Cannot find module '\" + id + \"'\"); e.code = \"MODULE_NOT_FOUND\"; throw e;\n",
    );
    binding.push_str("  };\n");
    binding.push_str(
        "  require.resolve = function (id) { return id[0] === \".\" ? new URL(id, import.meta.url).pathname : id; };\n",
    );
    binding.push_str("  require.cache = {};\n");
    binding
}

/// Replacement value for `process.env.NODE_ENV`
pub fn node_env_literal(env: &EnvDescriptor) -> String {
    js_string(env.node_env())
}

/// Rewrite a dynamic module into its factory form
///
/// `kinds` holds the classification of every specifier in `analysis`;
/// specifiers missing from it are treated as namespaces.
pub fn render_factory(
    source: &str,
    analysis: &DynamicAnalysis,
    kinds: &HashMap<String, DependencyKind>,
    env: &EnvDescriptor,
) -> Factory {
    let mut imports = String::new();
    let mut dependencies = Vec::new();
    let mut call_sites: HashMap<&str, String> = HashMap::new();

    for (n, specifier) in analysis.specifiers().into_iter().enumerate() {
        let kind = kinds
            .get(specifier)
            .copied()
            .unwrap_or(DependencyKind::Namespace);
        let expression = match kind {
            DependencyKind::Factory => {
                let local = format!("__dew_dep{}", n);
                let _ = writeln!(
                    imports,
                    "import {{ dew as {} }} from {};",
                    local,
                    js_string(specifier)
                );
                dependencies.push(specifier.to_string());
                format!("{}()", local)
            }
            DependencyKind::Namespace => {
                let local = format!("__dew_ns{}", n);
                let _ = writeln!(imports, "import * as {} from {};", local, js_string(specifier));
                dependencies.push(specifier.to_string());
                namespace_value(&local)
            }
            DependencyKind::Missing => missing_module(specifier),
        };
        call_sites.insert(specifier, expression);
    }

    let mut prelude = String::new();
    for global in &analysis.globals {
        match global {
            ImplicitGlobal::Filename => {
                let _ = writeln!(prelude, "  var __filename = {};", FILENAME_EXPR);
            }
            ImplicitGlobal::Dirname => {
                let _ = writeln!(prelude, "  var __dirname = {};", DIRNAME_EXPR);
            }
            ImplicitGlobal::Global => {
                prelude.push_str("  var global = globalThis;\n");
            }
            ImplicitGlobal::Process if env.is_browser_target() => {
                imports.push_str("import * as __dew_process from \"process\";\n");
                dependencies.push("process".to_string());
                let _ = writeln!(prelude, "  var process = {};", namespace_value("__dew_process"));
            }
            ImplicitGlobal::Buffer if env.is_browser_target() => {
                imports.push_str("import * as __dew_buffer from \"buffer\";\n");
                dependencies.push("buffer".to_string());
                let _ = writeln!(
                    prelude,
                    "  var Buffer = {}.Buffer;",
                    namespace_value("__dew_buffer")
                );
            }
            ImplicitGlobal::Process | ImplicitGlobal::Buffer => {}
            ImplicitGlobal::Require => {
                prelude.push_str(&require_binding(&analysis.specifiers(), &call_sites));
            }
        }
    }

    let mut edits = TextEdits::new();
    let hashbang = hashbang_len(source);
    if hashbang > 0 {
        edits.remove(0, hashbang);
    }
    let node_env = node_env_literal(env);
    for (start, end) in &analysis.node_env {
        edits.replace(*start, *end, node_env.clone());
    }
    for call in &analysis.requires {
        if let Some(expression) = call_sites.get(call.specifier.as_str()) {
            edits.replace(call.start, call.end, expression.clone());
        }
    }
    let body = edits.apply(source);

    let mut code = imports;
    code.push_str("var exports, module, __dew_exec;\n");
    code.push_str("export function dew () {\n");
    code.push_str("  if (__dew_exec) return module.exports;\n");
    code.push_str("  __dew_exec = true;\n");
    code.push_str("  exports = {};\n");
    code.push_str("  module = { exports: exports };\n");
    code.push_str(&prelude);
    code.push_str("  (function () {\n");
    code.push_str(&body);
    if !body.ends_with('\n') {
        code.push('\n');
    }
    code.push_str("  }).call(exports);\n");
    code.push_str("  return module.exports;\n");
    code.push_str("}\n");

    Factory { code, dependencies }
}
