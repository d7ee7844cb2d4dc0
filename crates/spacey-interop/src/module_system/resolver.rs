// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module resolver
//!
//! Wraps a [`ResolutionOracle`] with the per-generation cache, the format
//! registry and the builtin/external classifier. The outcome of
//! [`Resolver::resolve`] decides which face of a module a specifier reaches:
//! static importers see the wrapped face of a dynamic module, dynamic
//! importers see its factory.

use crate::diagnostics::DiagnosticKind;
use crate::error::{InteropError, Result};
use crate::module_system::cache::{CachedResolution, ResolutionKey};
use crate::module_system::classifier::{BuiltinSubstitutions, ExternalTable};
use crate::module_system::format::Format;
use crate::module_system::generation::BuildGeneration;
use crate::module_system::identity::{
    CanonicalLocation, ExternalRef, ModuleId, Resolution, is_relative,
};
use crate::module_system::oracle::{OracleError, ResolutionOracle};
use crate::options::{EnvDescriptor, ExternalAlias, Options};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Package directory holding the default builtin substitutions
const NODELIBS: &str = "@jspm/core/nodelibs/";

/// How a dynamic module consumes one of its own dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// Bundled dynamic or data module, consumed through its factory
    Factory,
    /// Static module, builtin or external, consumed through its namespace
    Namespace,
    /// Optional dependency that did not resolve
    Missing,
}

/// Resolver for one plugin instance
pub struct Resolver {
    oracle: Arc<dyn ResolutionOracle>,
    generation: Arc<BuildGeneration>,
    env: EnvDescriptor,
    base: CanonicalLocation,
    builtins: BuiltinSubstitutions,
    bindings: Arc<Vec<(String, ExternalAlias)>>,
    inline_deps: bool,
}

impl Resolver {
    /// Create a resolver from options
    pub fn new(
        oracle: Arc<dyn ResolutionOracle>,
        generation: Arc<BuildGeneration>,
        options: &Options,
    ) -> Result<Self> {
        let base = options.base_location()?;
        let builtins = match options.browser_builtins.as_deref() {
            Some(location) => BuiltinSubstitutions::new(Some(location)),
            None => default_builtins(oracle.as_ref(), &base, &options.env),
        };
        Ok(Self {
            oracle,
            generation,
            env: options.env,
            base,
            builtins,
            bindings: Arc::new(options.external_bindings()),
            inline_deps: options.inline_deps,
        })
    }

    /// Active environment
    pub fn env(&self) -> &EnvDescriptor {
        &self.env
    }

    /// Base location for top-level resolution
    pub fn base(&self) -> &CanonicalLocation {
        &self.base
    }

    /// Externals for the current generation, resolving them on first use
    pub async fn externals(&self) -> Arc<ExternalTable> {
        self.generation
            .externals(|| async {
                let oracle = self.oracle.clone();
                let bindings = self.bindings.clone();
                let base = self.base.clone();
                let env = self.env;
                let generation = self.generation.clone();
                tokio::task::spawn_blocking(move || {
                    ExternalTable::resolve(
                        oracle.as_ref(),
                        &bindings,
                        &base,
                        &env,
                        &generation.diagnostics,
                    )
                })
                .await
                .unwrap_or_else(|err| {
                    error!("Externals resolution failed: {}", err);
                    self.generation.diagnostics.warn(
                        DiagnosticKind::UnresolvedExternalBinding,
                        format!("Externals could not be resolved: {}", err),
                    );
                    ExternalTable::empty()
                })
            })
            .await
    }

    /// Whether requests issued by `parent` use dynamic-module semantics
    pub fn is_dynamic_parent(&self, parent: &ModuleId) -> bool {
        parent.is_raw()
            || self.generation.formats.get(&parent.location) == Some(Format::DynamicModule)
    }

    fn key(&self, specifier: &str, parent: &CanonicalLocation, dynamic_parent: bool) -> ResolutionKey {
        ResolutionKey {
            specifier: specifier.to_string(),
            parent: parent.clone(),
            env: self.env,
            dynamic_parent,
        }
    }

    /// Cached oracle lookup for callers already off the async runtime
    fn lookup(
        &self,
        specifier: &str,
        parent: &CanonicalLocation,
        dynamic_parent: bool,
    ) -> CachedResolution {
        let key = self.key(specifier, parent, dynamic_parent);
        self.generation.resolutions.get_or_resolve(key, || {
            self.oracle
                .resolve(specifier, parent, &self.env, dynamic_parent)
        })
    }

    /// Cached oracle lookup; misses run on the blocking thread pool
    async fn lookup_async(
        &self,
        specifier: &str,
        parent: &CanonicalLocation,
        dynamic_parent: bool,
    ) -> Result<CachedResolution> {
        let key = self.key(specifier, parent, dynamic_parent);
        if let Some(cached) = self.generation.resolutions.get(&key) {
            return Ok(cached);
        }

        let oracle = self.oracle.clone();
        let env = self.env;
        let (specifier, parent) = (key.specifier.clone(), key.parent.clone());
        let outcome = tokio::task::spawn_blocking(move || {
            oracle.resolve(&specifier, &parent, &env, dynamic_parent)
        })
        .await
        .map_err(|e| InteropError::Task(e.to_string()))?;
        Ok(self.generation.resolutions.insert(key, outcome))
    }

    /// Resolve a specifier from a parent module, or from the base location
    #[instrument(skip(self, parent), fields(parent = ?parent.map(ModuleId::to_host_id)))]
    pub async fn resolve(&self, specifier: &str, parent: Option<&ModuleId>) -> Result<Resolution> {
        let top_level = parent.is_none();
        let dynamic_parent = parent.is_some_and(|p| self.is_dynamic_parent(p));
        let parent_location = parent
            .map(|p| p.location.clone())
            .unwrap_or_else(|| self.base.clone());

        let specifier = if dynamic_parent {
            strip_trailing_slash(specifier)
        } else {
            specifier
        };

        let resolved = match self
            .lookup_async(specifier, &parent_location, dynamic_parent)
            .await?
        {
            Ok(resolved) => resolved,
            Err(OracleError::NotFile(_)) => {
                debug!("{} is not a file, treating as external", specifier);
                return Ok(Resolution::External(ExternalRef::new(specifier)));
            }
            Err(err) if err.is_not_found() && !is_relative(specifier) => {
                if !top_level {
                    self.generation.diagnostics.warn(
                        DiagnosticKind::UnresolvedExternal,
                        format!(
                            "Could not find {} from {}, treating as external",
                            specifier, parent_location
                        ),
                    );
                    return Ok(Resolution::External(ExternalRef::new(specifier)));
                }
                let relative = format!("./{}", specifier);
                match self
                    .lookup_async(&relative, &parent_location, dynamic_parent)
                    .await?
                {
                    Ok(resolved) => resolved,
                    Err(_) => {
                        return Err(InteropError::from_oracle(
                            err,
                            specifier,
                            parent_location.as_str(),
                        ));
                    }
                }
            }
            Err(err) => {
                return Err(InteropError::from_oracle(
                    err,
                    specifier,
                    parent_location.as_str(),
                ));
            }
        };

        if resolved.format == Format::HostBuiltin {
            return self.resolve_builtin(specifier, &resolved.location);
        }

        let externals = self.externals().await;
        if let Some(external) = externals.lookup(&resolved.location, specifier, self.inline_deps) {
            debug!("{} is external as {}", resolved.location, external.id);
            return Ok(Resolution::External(external));
        }

        if resolved.location.is_directory() {
            return Err(InteropError::not_found(specifier, parent_location.as_str()));
        }

        let id = match resolved.format {
            Format::NativeBinary => {
                if self.env.is_host_target() {
                    return Err(InteropError::UnsupportedNativeBinary(
                        resolved.location.to_string(),
                    ));
                }
                self.generation.diagnostics.warn(
                    DiagnosticKind::NativeBinaryStub,
                    format!(
                        "Native addon {} is not supported in browser builds, using an empty module",
                        resolved.location
                    ),
                );
                self.empty_module()?
            }
            Format::DynamicModule | Format::Data => {
                self.generation
                    .formats
                    .classify(&resolved.location, resolved.format)?;
                if dynamic_parent {
                    ModuleId::raw(resolved.location)
                } else {
                    ModuleId::wrapped(resolved.location)
                }
            }
            Format::StaticModule | Format::HostBuiltin => {
                self.generation
                    .formats
                    .classify(&resolved.location, Format::StaticModule)?;
                ModuleId::wrapped(resolved.location)
            }
        };

        Ok(Resolution::Module(id))
    }

    fn resolve_builtin(&self, specifier: &str, name: &CanonicalLocation) -> Result<Resolution> {
        if self.env.is_host_target() {
            return Ok(Resolution::External(ExternalRef::new(specifier)));
        }
        match self.builtins.lookup(name.as_str()) {
            Some(substitution) => {
                self.generation
                    .formats
                    .classify(&substitution, Format::StaticModule)?;
                Ok(Resolution::Module(ModuleId::wrapped(substitution)))
            }
            None => {
                self.generation.diagnostics.warn(
                    DiagnosticKind::MissingBuiltinSubstitution,
                    format!("No browser substitution for builtin {}, using an empty module", name),
                );
                Ok(Resolution::Module(self.empty_module()?))
            }
        }
    }

    fn empty_module(&self) -> Result<ModuleId> {
        let id = ModuleId::empty_module();
        self.generation
            .formats
            .classify(&id.location, Format::StaticModule)?;
        Ok(id)
    }

    /// Classify a dependency of the dynamic module at `parent`
    ///
    /// Agrees with what [`Resolver::resolve`] later returns for the same
    /// request: factories for bundled dynamic and data modules, namespaces
    /// for everything else. Only relative mandatory dependencies that fail
    /// to resolve are errors.
    pub fn dependency_kind(
        &self,
        specifier: &str,
        parent: &CanonicalLocation,
        externals: &ExternalTable,
        optional: bool,
    ) -> Result<DependencyKind> {
        let specifier = strip_trailing_slash(specifier);
        match self.lookup(specifier, parent, true) {
            Ok(resolved) => match resolved.format {
                Format::DynamicModule | Format::Data => {
                    if externals
                        .lookup(&resolved.location, specifier, self.inline_deps)
                        .is_some()
                    {
                        Ok(DependencyKind::Namespace)
                    } else {
                        Ok(DependencyKind::Factory)
                    }
                }
                Format::StaticModule | Format::HostBuiltin | Format::NativeBinary => {
                    Ok(DependencyKind::Namespace)
                }
            },
            Err(_) if optional => Ok(DependencyKind::Missing),
            Err(OracleError::NotFile(_)) => Ok(DependencyKind::Namespace),
            Err(err) if err.is_not_found() && !is_relative(specifier) => {
                Ok(DependencyKind::Namespace)
            }
            Err(err) => Err(InteropError::from_oracle(err, specifier, parent.as_str())),
        }
    }
}

/// Substitution set of the `@jspm/core` package installed under `base`
fn default_builtins(
    oracle: &dyn ResolutionOracle,
    base: &CanonicalLocation,
    env: &EnvDescriptor,
) -> BuiltinSubstitutions {
    match oracle.resolve(NODELIBS, base, env, false) {
        Ok(resolved) if resolved.location.is_directory() => {
            debug!("Browser builtins from {}", resolved.location);
            BuiltinSubstitutions::new(Some(resolved.location.as_str()))
        }
        Ok(resolved) => {
            debug!("{} resolved to a file {}, ignoring", NODELIBS, resolved.location);
            BuiltinSubstitutions::default()
        }
        Err(err) => {
            debug!("No browser builtins: {}", err);
            BuiltinSubstitutions::default()
        }
    }
}

fn strip_trailing_slash(specifier: &str) -> &str {
    match specifier.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => specifier,
    }
}
