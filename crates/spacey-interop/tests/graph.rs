// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Graph-level integration tests
//!
//! Each test lays out a small project on disk and builds it through
//! `GraphDriver` with the filesystem oracle.

mod common;

use common::{Project, driver};
use spacey_interop::{
    DiagnosticKind, EnvDescriptor, Format, InteropError, ModuleId, Options, Resolution,
};

fn module<'a>(graph: &'a spacey_interop::ModuleGraph, id: &ModuleId) -> &'a spacey_interop::EmittedModule {
    graph
        .module(id)
        .unwrap_or_else(|| panic!("{} missing from graph", id))
}

#[tokio::test]
async fn test_export_fidelity() {
    let project = Project::new(&[
        ("index.mjs", "import lib, { foo, bar } from './lib.js';\nexport default lib;\n"),
        ("lib.js", "exports.foo = 1;\nexports.bar = 2;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    assert_eq!(graph.len(), 3);
    let wrapped = module(&graph, &project.wrapped("lib.js"));
    assert_eq!(wrapped.format, Format::DynamicModule);
    assert!(wrapped.code.contains("var __exports = dew();"));
    assert!(wrapped.code.contains("export default __exports;"));
    assert!(wrapped.code.contains("export var foo = __exports.foo;"));
    assert!(wrapped.code.contains("export var bar = __exports.bar;"));

    let names = driver.plugin().export_names(&project.location("lib.js")).unwrap();
    assert_eq!(
        names.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["bar", "foo"]
    );

    let raw = module(&graph, &project.raw("lib.js"));
    assert!(raw.code.contains("exports.foo = 1;\nexports.bar = 2;"));
    assert!(graph.diagnostics().is_empty());
}

#[tokio::test]
async fn test_factory_shared_by_importers() {
    let project = Project::new(&[
        ("index.mjs", "import './a.mjs';\nimport './b.mjs';\n"),
        ("a.mjs", "import { counter } from './state.js';\n"),
        ("b.mjs", "import state from './state.js';\n"),
        ("state.js", "exports.counter = (global.counter || 0) + 1;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let wrapped = project.wrapped("state.js");
    for importer in ["a.mjs", "b.mjs"] {
        let link = module(&graph, &project.wrapped(importer)).link("./state.js");
        assert_eq!(link, Some(&Resolution::Module(wrapped.clone())));
    }

    // one entry unit, one call into the factory, one guarded body
    let entry = module(&graph, &wrapped);
    assert_eq!(entry.code.matches("dew()").count(), 1);
    let raw = module(&graph, &project.raw("state.js"));
    assert_eq!(raw.code.matches("if (__dew_exec) return module.exports;").count(), 1);
    assert!(raw.code.contains("var global = globalThis;"));
    assert_eq!(
        graph.modules().filter(|(id, _)| id.location == wrapped.location).count(),
        2
    );
}

#[tokio::test]
async fn test_dynamic_cycle() {
    let project = Project::new(&[
        ("index.mjs", "import { a } from './a.js';\n"),
        ("a.js", "var b = require('./b');\nexports.a = 1;\n"),
        ("b.js", "var a = require('./a');\nexports.b = function () { return a.a; };\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    assert_eq!(graph.len(), 4);
    let a = module(&graph, &project.raw("a.js"));
    assert!(a.code.starts_with("import { dew as __dew_dep0 } from \"./b\";\n"));
    assert_eq!(a.link("./b"), Some(&Resolution::Module(project.raw("b.js"))));

    let b = module(&graph, &project.raw("b.js"));
    assert!(b.code.contains("var a = __dew_dep0();"));
    assert_eq!(b.link("./a"), Some(&Resolution::Module(project.raw("a.js"))));
}

#[tokio::test]
async fn test_empty_dynamic_module() {
    let project = Project::new(&[
        ("index.mjs", "import empty from './empty.js';\nexport default empty;\n"),
        ("empty.js", "// nothing to see\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let entry = module(&graph, &project.wrapped("empty.js"));
    assert!(entry.code.contains("export default __exports;"));
    assert!(!entry.code.contains("export var"));
    let raw = module(&graph, &project.raw("empty.js"));
    assert!(raw.code.contains("exports = {};"));
    assert!(raw.code.contains("return module.exports;"));
}

#[tokio::test]
async fn test_wildcard_require_fails_build() {
    let project = Project::new(&[
        ("index.mjs", "import './i18n.js';\n"),
        ("i18n.js", "var lang = 'en';\nmodule.exports = require('./locales/' + lang);\n"),
        ("locales/en.js", "module.exports = {};\n"),
    ]);
    let (driver, _) = driver(project.options());
    let err = driver.build(&["./index.mjs"]).await.unwrap_err();

    match err {
        InteropError::UnsupportedDynamicRequirement {
            expression, line, ..
        } => {
            assert_eq!(expression, "'./locales/' + lang");
            assert_eq!(line, 2);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_optional_dependency() {
    let project = Project::new(&[
        ("index.mjs", "import './opt.js';\n"),
        (
            "opt.js",
            "var fast;\ntry { fast = require('fast-native'); } catch (e) { fast = null; }\nmodule.exports = fast;\n",
        ),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let raw = module(&graph, &project.raw("opt.js"));
    assert!(raw.code.contains("e.code = \"MODULE_NOT_FOUND\""));
    assert!(raw.links.is_empty());
    assert!(graph.externals().is_empty());
    assert!(graph.diagnostics().is_empty());
}

#[tokio::test]
async fn test_missing_relative_dependency_is_fatal() {
    let project = Project::new(&[
        ("index.mjs", "import './lib.js';\n"),
        ("lib.js", "require('./missing');\n"),
    ]);
    let (driver, _) = driver(project.options());
    let err = driver.build(&["./index.mjs"]).await.unwrap_err();
    assert!(matches!(err, InteropError::NotFound { ref specifier, .. } if specifier == "./missing"));
}

#[tokio::test]
async fn test_nested_bare_miss_becomes_external() {
    let project = Project::new(&[
        ("index.mjs", "import './lib.js';\n"),
        ("lib.js", "module.exports = require('peer-dep');\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    assert!(graph.externals().contains("peer-dep"));
    let raw = module(&graph, &project.raw("lib.js"));
    assert!(raw.code.contains("import * as __dew_ns0 from \"peer-dep\";"));
    assert_eq!(graph.diagnostics().len(), 1);
    assert_eq!(graph.diagnostics()[0].kind, DiagnosticKind::UnresolvedExternal);
}

#[tokio::test]
async fn test_top_level_relative_retry() {
    let project = Project::new(&[("main.js", "module.exports = 1;\n")]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["main.js"]).await.unwrap();
    assert_eq!(
        graph.entry("main.js"),
        Some(&Resolution::Module(project.wrapped("main.js")))
    );

    let err = driver.build(&["not-a-package"]).await.unwrap_err();
    assert!(matches!(err, InteropError::NotFound { .. }));
}

#[tokio::test]
async fn test_url_import_is_external() {
    let project = Project::new(&[(
        "index.mjs",
        "import confetti from 'https://cdn.example.com/confetti.mjs';\nconfetti();\n",
    )]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();
    assert!(graph.externals().contains("https://cdn.example.com/confetti.mjs"));
    assert_eq!(graph.len(), 1);
}

#[tokio::test]
async fn test_native_binary() {
    let files = [
        ("index.mjs", "import './binding.js';\n"),
        ("binding.js", "module.exports = require('./addon.node');\n"),
        ("addon.node", "\u{7f}ELF"),
    ];

    let project = Project::new(&files);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();
    let raw = module(&graph, &project.raw("binding.js"));
    assert_eq!(
        raw.link("./addon.node"),
        Some(&Resolution::Module(ModuleId::empty_module()))
    );
    assert_eq!(
        module(&graph, &ModuleId::empty_module()).code,
        "export default {};\n"
    );
    assert_eq!(graph.diagnostics()[0].kind, DiagnosticKind::NativeBinaryStub);

    let (driver, _) = common::driver(Options {
        env: EnvDescriptor::node(),
        ..project.options()
    });
    let err = driver.build(&["./index.mjs"]).await.unwrap_err();
    assert!(matches!(err, InteropError::UnsupportedNativeBinary(_)));
}

#[tokio::test]
async fn test_missing_named_export_diagnostic() {
    let project = Project::new(&[
        ("index.mjs", "import { foo, nope } from './lib.js';\n"),
        ("lib.js", "exports.foo = 1;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let diagnostics = graph.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::MissingExport);
    assert!(diagnostics[0].message.contains("'nope'"));
}

#[tokio::test]
async fn test_json_module_faces() {
    let project = Project::new(&[
        ("index.mjs", "import { version } from './package-info.json';\nimport './reader.js';\n"),
        ("reader.js", "module.exports = require('./package-info.json').version;\n"),
        ("package-info.json", "{ \"version\": \"1.0.0\", \"not-an-identifier\": true }\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let entry = module(&graph, &project.wrapped("package-info.json"));
    assert_eq!(entry.format, Format::Data);
    assert!(entry.code.contains("export var version = __exports.version;"));
    assert!(!entry.code.contains("not-an-identifier ="));

    let factory = module(&graph, &project.raw("package-info.json"));
    assert!(factory.code.starts_with("export function dew () {"));
    let reader = module(&graph, &project.raw("reader.js"));
    assert!(reader.code.contains("__dew_dep0().version"));
}

#[tokio::test]
async fn test_syntax_error_reports_location() {
    let project = Project::new(&[
        ("index.mjs", "import './broken.js';\n"),
        ("broken.js", "var ok = 1;\nvar bad = 'unterminated;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let err = driver.build(&["./index.mjs"]).await.unwrap_err();
    match err {
        InteropError::Syntax {
            location, line, frame, ..
        } => {
            assert_eq!(location, project.path("broken.js"));
            assert_eq!(line, 2);
            assert!(frame.contains("var bad"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_generations_do_not_share_state() {
    let project = Project::new(&[
        ("index.mjs", "import * as lib from './lib.js';\n"),
        ("lib.js", "exports.first = 1;\n"),
    ]);
    let (driver, oracle) = driver(project.options());
    let setup = oracle.calls();

    let graph = driver.build(&["./index.mjs"]).await.unwrap();
    assert!(module(&graph, &project.wrapped("lib.js")).code.contains("export var first"));
    let calls = oracle.calls() - setup;

    project.write("lib.js", "exports.second = 2;\n");
    let graph = driver.build(&["./index.mjs"]).await.unwrap();
    let entry = module(&graph, &project.wrapped("lib.js"));
    assert!(entry.code.contains("export var second"));
    assert!(!entry.code.contains("export var first"));

    assert_eq!(oracle.calls() - setup, 2 * calls);
    assert_eq!(driver.plugin().generation().number(), 2);
}

#[tokio::test]
async fn test_trailing_slash_require() {
    let project = Project::new(&[
        ("index.mjs", "import './lib.js';\n"),
        ("lib.js", "module.exports = require('./helpers/');\n"),
        ("helpers/index.js", "exports.help = true;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let raw = module(&graph, &project.raw("lib.js"));
    assert_eq!(
        raw.link("./helpers/"),
        Some(&Resolution::Module(project.raw("helpers/index.js")))
    );
    assert!(raw.code.contains("import { dew as __dew_dep0 } from \"./helpers/\";"));
}

#[tokio::test]
async fn test_node_env_definition() {
    let project = Project::new(&[
        ("index.mjs", "if (process.env.NODE_ENV !== 'production') console.log('dev');\n"),
    ]);
    let (driver, _) = driver(Options {
        env: EnvDescriptor::browser().production(),
        ..project.options()
    });
    let graph = driver.build(&["./index.mjs"]).await.unwrap();
    let entry = module(&graph, &project.wrapped("index.mjs"));
    assert!(entry.code.starts_with("if (\"production\" !== 'production')"));

    let (driver, _) = common::driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();
    let entry = module(&graph, &project.wrapped("index.mjs"));
    assert!(entry.code.starts_with("if (\"dev\" !== 'production')"));
}

#[tokio::test]
async fn test_regex_after_statement_head() {
    let project = Project::new(&[
        ("index.mjs", "import { ok } from './quote.js';\n"),
        ("quote.js", "var s = \"it's\";\nif (s) /'/.test(s);\nexports.ok = 1;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let wrapped = module(&graph, &project.wrapped("quote.js"));
    assert!(wrapped.code.contains("export var ok = __exports.ok;"));
    assert!(graph.diagnostics().is_empty());
}

#[tokio::test]
async fn test_require_used_as_value() {
    let project = Project::new(&[
        ("index.mjs", "import r from './r.js';\n"),
        (
            "r.js",
            "var dep = require('./dep');\nexports.p = typeof require.resolve;\n",
        ),
        ("dep.js", "module.exports = 1;\n"),
    ]);
    let (driver, _) = driver(project.options());
    let graph = driver.build(&["./index.mjs"]).await.unwrap();

    let raw = module(&graph, &project.raw("r.js"));
    assert!(raw.code.contains("  var require = function (id) {\n"));
    assert!(raw.code.contains("      case \"./dep\": return __dew_dep0();\n"));
    assert!(raw.code.contains("var dep = __dew_dep0();"));
    assert_eq!(
        raw.link("./dep"),
        Some(&Resolution::Module(project.raw("dep.js")))
    );
}
