// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host pipeline hooks
//!
//! [`InteropPlugin`] exposes the lifecycle a bundler drives for each build:
//!
//! 1. [`generation_start`](InteropPlugin::generation_start) resets every
//!    per-generation cache and resolves externals
//! 2. [`resolve`](InteropPlugin::resolve), [`load`](InteropPlugin::load) and
//!    [`transform`](InteropPlugin::transform) for each discovered specifier
//! 3. [`render_chunk`](InteropPlugin::render_chunk) on the output
//! 4. [`generation_end`](InteropPlugin::generation_end) hands back the
//!    diagnostics of the generation

use crate::codegen::{Minifier, SyntaxTransformer, WhitespaceMinifier};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{InteropError, Result};
use crate::interop::dew::{Factory, node_env_literal, render_factory};
use crate::interop::edits::TextEdits;
use crate::interop::lexer::{LexError, check_balance, strip_comments, tokenize};
use crate::interop::require::{analyze, node_env_sites};
use crate::interop::scanner::{ExportNameSet, scan_data_exports, scan_exports};
use crate::interop::shim::{EMPTY_MODULE, data_entry, data_factory, dynamic_entry};
use crate::module_system::esm::{ImportDeclaration, dependency_specifiers, parse_imports};
use crate::module_system::{
    BuildGeneration, CanonicalLocation, DependencyKind, Format, FsOracle, FsSource, ModuleId,
    Resolution, ResolutionOracle, Resolver, Role, SourceFetch,
};
use crate::options::Options;
use crate::worker::WorkerPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Output of the transform hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Emitted module source
    pub code: String,
    /// Specifiers the emitted source imports, to be resolved from this module
    pub dependencies: Vec<String>,
    /// `(specifier, name)` for every named import of a static module
    pub named_imports: Vec<(String, String)>,
}

impl Transformed {
    fn new(code: String, dependencies: Vec<String>) -> Self {
        Self {
            code,
            dependencies,
            named_imports: Vec::new(),
        }
    }
}

fn syntax_error(location: &CanonicalLocation, source: &str, err: LexError) -> InteropError {
    InteropError::syntax(location.as_str(), err.message, source, err.offset)
}

/// Module resolution and interop plugin
pub struct InteropPlugin {
    options: Options,
    generation: Arc<BuildGeneration>,
    resolver: Arc<Resolver>,
    fetch: Arc<dyn SourceFetch>,
    transformer: Option<Arc<dyn SyntaxTransformer>>,
    minifier: Arc<dyn Minifier>,
    pool: WorkerPool,
}

impl InteropPlugin {
    /// Create a plugin with explicit collaborators
    pub fn new(
        options: Options,
        oracle: Arc<dyn ResolutionOracle>,
        fetch: Arc<dyn SourceFetch>,
    ) -> Result<Self> {
        let generation = Arc::new(BuildGeneration::new());
        let resolver = Arc::new(Resolver::new(oracle, generation.clone(), &options)?);
        let pool = match options.worker_threads {
            Some(threads) => WorkerPool::with_threads(threads)?,
            None => WorkerPool::new()?,
        };
        info!(
            "Interop plugin for {} ({} workers)",
            resolver.base(),
            pool.threads()
        );
        Ok(Self {
            options,
            generation,
            resolver,
            fetch,
            transformer: None,
            minifier: Arc::new(WhitespaceMinifier),
            pool,
        })
    }

    /// Create a plugin resolving and reading from the local filesystem
    pub fn from_options(options: Options) -> Result<Self> {
        Self::new(options, Arc::new(FsOracle::new()), Arc::new(FsSource))
    }

    /// Use a syntax transformer for `envTarget` downleveling
    pub fn with_transformer(mut self, transformer: Arc<dyn SyntaxTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Replace the chunk minifier
    pub fn with_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.minifier = minifier;
        self
    }

    /// Options in effect
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// State of the current build generation
    pub fn generation(&self) -> &Arc<BuildGeneration> {
        &self.generation
    }

    /// The resolver
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Start a build generation: drop all caches and resolve externals
    pub async fn generation_start(&self) -> u64 {
        let number = self.generation.reset();
        let externals = self.resolver.externals().await;
        debug!("{} external bindings", externals.len());
        number
    }

    /// Finish a build generation, returning its diagnostics
    pub fn generation_end(&self) -> Vec<Diagnostic> {
        let resolutions = &self.generation.resolutions;
        debug!(
            "Resolution cache: {} entries, {} hits, {} misses, {} external bindings",
            resolutions.len(),
            resolutions.hits(),
            resolutions.misses(),
            self.generation.externals_ready().map_or(0, |table| table.len())
        );
        let diagnostics = self.generation.diagnostics.drain();
        info!(
            "Build generation {} finished with {} warnings",
            self.generation.number(),
            diagnostics.len()
        );
        diagnostics
    }

    /// Resolve a specifier from a parent module (or the base path)
    pub async fn resolve(&self, specifier: &str, parent: Option<&ModuleId>) -> Result<Resolution> {
        self.resolver.resolve(specifier, parent).await
    }

    /// Read the source of a resolved module
    pub async fn load(&self, id: &ModuleId) -> Result<String> {
        if id.location.is_empty_module() {
            return Ok(EMPTY_MODULE.to_string());
        }
        self.fetch.read(&id.location).await
    }

    /// Recovered export names of a dynamic or data module
    pub fn export_names(&self, location: &CanonicalLocation) -> Option<Arc<ExportNameSet>> {
        self.generation.exports.get(location)
    }

    /// Rewrite a loaded module according to its format and role
    #[instrument(skip(self, code, id), fields(id = %id))]
    pub async fn transform(&self, code: String, id: &ModuleId) -> Result<Transformed> {
        let format = self
            .generation
            .formats
            .get(&id.location)
            .ok_or_else(|| InteropError::Unclassified(id.to_host_id()))?;

        match (format, id.role) {
            (Format::StaticModule, _) => self.transform_static(code, id).await,
            (Format::DynamicModule, Role::Wrapped) => self.transform_dynamic_entry(code, id).await,
            (Format::DynamicModule, Role::Raw) => self.transform_dynamic_factory(code, id).await,
            (Format::Data, role) => self.transform_data(code, id, role),
            (Format::NativeBinary | Format::HostBuiltin, _) => {
                Err(InteropError::Unclassified(id.to_host_id()))
            }
        }
    }

    async fn transform_static(&self, code: String, id: &ModuleId) -> Result<Transformed> {
        if id.location.is_empty_module() {
            return Ok(Transformed::new(code, Vec::new()));
        }

        let location = id.location.clone();
        let node_env = node_env_literal(self.resolver.env());
        let (code, imports) = self
            .pool
            .run(move || -> Result<(String, Vec<ImportDeclaration>)> {
                let tokens = tokenize(&code).map_err(|e| syntax_error(&location, &code, e))?;
                check_balance(&tokens).map_err(|e| syntax_error(&location, &code, e))?;
                let imports = parse_imports(&strip_comments(&code, &tokens));

                let mut edits = TextEdits::new();
                for (start, end) in node_env_sites(&tokens) {
                    edits.replace(start, end, node_env.clone());
                }
                let code = if edits.is_empty() {
                    code
                } else {
                    edits.apply(&code)
                };
                Ok((code, imports))
            })
            .await??;

        let code = match (&self.options.env_target, &self.transformer) {
            (Some(target), Some(transformer)) => transformer
                .downlevel(&code, id, target)
                .map_err(|reason| InteropError::Transformer {
                    location: id.location.to_string(),
                    reason,
                })?,
            _ => code,
        };

        let named_imports = imports
            .iter()
            .filter(|decl| !decl.dynamic)
            .flat_map(|decl| {
                decl.named_imports()
                    .map(|name| (decl.specifier.clone(), name.to_string()))
            })
            .collect();

        Ok(Transformed {
            code,
            dependencies: dependency_specifiers(&imports),
            named_imports,
        })
    }

    async fn transform_dynamic_entry(&self, code: String, id: &ModuleId) -> Result<Transformed> {
        let location = id.location.clone();
        let generation = self.generation.clone();
        let names = self
            .pool
            .run(move || -> Result<Arc<ExportNameSet>> {
                if let Some(names) = generation.exports.get(&location) {
                    return Ok(names);
                }
                let tokens = tokenize(&code).map_err(|e| syntax_error(&location, &code, e))?;
                check_balance(&tokens).map_err(|e| syntax_error(&location, &code, e))?;
                Ok(generation.exports.get_or_scan(&location, || {
                    let result = scan_exports(&tokens);
                    for reexport in &result.reexports {
                        debug!("{} re-exports {}, not followed", location, reexport);
                    }
                    result.names
                }))
            })
            .await??;

        let shim = dynamic_entry(&id.location, &names);
        let factory = format!("./{}", id.location.file_name());
        Ok(Transformed::new(shim, vec![factory]))
    }

    async fn transform_dynamic_factory(&self, code: String, id: &ModuleId) -> Result<Transformed> {
        let externals = self.resolver.externals().await;
        let resolver = self.resolver.clone();
        let location = id.location.clone();
        let factory = self
            .pool
            .run(move || -> Result<Factory> {
                let tokens = tokenize(&code).map_err(|e| syntax_error(&location, &code, e))?;
                check_balance(&tokens).map_err(|e| syntax_error(&location, &code, e))?;
                let analysis = analyze(&tokens, &code, location.as_str())?;

                let mut kinds: HashMap<String, DependencyKind> = HashMap::new();
                for specifier in analysis.specifiers() {
                    let optional = analysis.is_optional(specifier);
                    let kind = resolver.dependency_kind(specifier, &location, &externals, optional)?;
                    kinds.insert(specifier.to_string(), kind);
                }
                Ok(render_factory(&code, &analysis, &kinds, resolver.env()))
            })
            .await??;

        Ok(Transformed::new(factory.code, factory.dependencies))
    }

    fn transform_data(&self, code: String, id: &ModuleId, role: Role) -> Result<Transformed> {
        let value: serde_json::Value = serde_json::from_str(&code)
            .map_err(|e| InteropError::json_syntax(id.location.as_str(), &code, &e))?;
        let code = match role {
            Role::Wrapped => {
                let names = self
                    .generation
                    .exports
                    .get_or_scan(&id.location, || scan_data_exports(&value));
                data_entry(&code, &names)
            }
            Role::Raw => data_factory(&code),
        };
        Ok(Transformed::new(code, Vec::new()))
    }

    /// Post-process a rendered chunk
    ///
    /// A failing minifier leaves the chunk as it was and records a
    /// diagnostic.
    pub fn render_chunk(&self, code: String) -> String {
        if !self.options.minify {
            return code;
        }
        match self.minifier.minify(&code) {
            Ok(minified) => minified,
            Err(reason) => {
                let err = InteropError::Minifier(reason);
                debug_assert!(!err.is_fatal());
                self.generation
                    .diagnostics
                    .warn(DiagnosticKind::MinifierFallback, err.to_string());
                code
            }
        }
    }
}

impl std::fmt::Debug for InteropPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteropPlugin")
            .field("options", &self.options)
            .field("generation", &self.generation.number())
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_system::{MemorySource, OracleError, OracleResolution};
    use crate::options::EnvDescriptor;

    struct FixedOracle;

    impl ResolutionOracle for FixedOracle {
        fn resolve(
            &self,
            specifier: &str,
            _parent: &CanonicalLocation,
            _env: &EnvDescriptor,
            _dynamic_parent: bool,
        ) -> std::result::Result<OracleResolution, OracleError> {
            match specifier {
                "./main.js" => Ok(OracleResolution::new("/app/main.js", Format::StaticModule)),
                "./lib.js" => Ok(OracleResolution::new("/app/lib.js", Format::DynamicModule)),
                "./data.json" => Ok(OracleResolution::new("/app/data.json", Format::Data)),
                _ => Err(OracleError::NotFound(specifier.into())),
            }
        }
    }

    fn plugin(options: Options) -> InteropPlugin {
        let source = MemorySource::new()
            .with("/app/main.js", "import { foo } from './lib.js';\nif (process.env.NODE_ENV) foo();")
            .with("/app/lib.js", "exports.foo = function () {};")
            .with("/app/data.json", "{ \"a\": 1 }");
        InteropPlugin::new(
            Options {
                base_path: Some("/app".into()),
                worker_threads: Some(1),
                ..options
            },
            Arc::new(FixedOracle),
            Arc::new(source),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_transform_requires_classification() {
        let plugin = plugin(Options::default());
        plugin.generation_start().await;
        let id = ModuleId::wrapped(CanonicalLocation::new("/app/lib.js"));
        let err = plugin.transform(String::new(), &id).await.unwrap_err();
        assert!(matches!(err, InteropError::Unclassified(_)));
    }

    #[tokio::test]
    async fn test_static_module_transform() {
        let plugin = plugin(Options::default());
        plugin.generation_start().await;
        let id = plugin.resolve("./main.js", None).await.unwrap();
        let id = id.module().unwrap().clone();
        let code = plugin.load(&id).await.unwrap();
        let out = plugin.transform(code, &id).await.unwrap();
        assert_eq!(out.dependencies, vec!["./lib.js"]);
        assert_eq!(out.named_imports, vec![("./lib.js".to_string(), "foo".to_string())]);
        assert!(out.code.contains("if (\"dev\") foo();"));
    }

    #[tokio::test]
    async fn test_data_module_faces() {
        let plugin = plugin(Options::default());
        plugin.generation_start().await;
        let wrapped = plugin.resolve("./data.json", None).await.unwrap();
        let wrapped = wrapped.module().unwrap().clone();
        let code = plugin.load(&wrapped).await.unwrap();
        let out = plugin.transform(code.clone(), &wrapped).await.unwrap();
        assert!(out.code.contains("export var a = __exports.a;"));

        let raw = ModuleId::raw(wrapped.location.clone());
        let out = plugin.transform(code, &raw).await.unwrap();
        assert!(out.code.starts_with("export function dew () {"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_syntax_error() {
        let plugin = plugin(Options::default());
        plugin.generation_start().await;
        let id = plugin.resolve("./data.json", None).await.unwrap();
        let id = id.module().unwrap().clone();
        let err = plugin
            .transform("{\n  \"a\": 1,\n}".to_string(), &id)
            .await
            .unwrap_err();
        assert!(matches!(err, InteropError::Syntax { line: 3, .. }));
    }

    #[tokio::test]
    async fn test_render_chunk_minifies() {
        let plugin = plugin(Options {
            minify: true,
            ..Options::default()
        });
        assert_eq!(plugin.render_chunk("  var a = 1;\n\n".into()), "var a = 1;\n");

        let broken = "var a = 'open".to_string();
        assert_eq!(plugin.render_chunk(broken.clone()), broken);
        let diagnostics = plugin.generation_end();
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MinifierFallback);
    }
}
