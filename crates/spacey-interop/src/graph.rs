// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Graph driver
//!
//! Drives [`InteropPlugin`] the way a host bundler would: resolve each
//! discovered specifier, then load and transform every new module, until no
//! request is left. Requests run concurrently and complete in any order.
//!
//! Each request and each module moves through [`ModuleState`]:
//!
//! ```text
//! request: Unresolved -> Resolving -> Classified | External
//! module:  Classified -> NeedsTransform | PassThrough -> Emitted
//! ```
//!
//! Any fatal error abandons the generation and no graph is returned.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{InteropError, Result};
use crate::module_system::{Format, ModuleId, Resolution};
use crate::plugin::{InteropPlugin, Transformed};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace};

/// Lifecycle state of a request or module within one generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    /// Specifier discovered but not yet submitted
    Unresolved,
    /// Resolution in flight
    Resolving,
    /// Resolved to a module with a known format
    Classified,
    /// Dynamic or data module that gets an interop face
    NeedsTransform,
    /// Static module, emitted without format rewriting
    PassThrough,
    /// Emitted source available
    Emitted,
    /// Left out of the graph
    External,
    /// Aborted the generation
    Failed,
}

impl ModuleState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Emitted | Self::External | Self::Failed)
    }

    /// Whether `next` may follow this state
    pub fn can_advance_to(self, next: ModuleState) -> bool {
        use ModuleState::*;
        match (self, next) {
            (state, Failed) => !state.is_terminal(),
            (Unresolved, Resolving) => true,
            (Resolving, Classified | External) => true,
            (Classified, NeedsTransform | PassThrough) => true,
            (NeedsTransform | PassThrough, Emitted) => true,
            _ => false,
        }
    }
}

/// A module of a closed graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedModule {
    /// Format the module was classified with
    pub format: Format,
    /// Emitted source
    pub code: String,
    /// `(specifier, name)` named imports of a static module
    pub named_imports: Vec<(String, String)>,
    /// Resolution of every specifier the emitted source imports
    pub links: Vec<(String, Resolution)>,
}

impl EmittedModule {
    /// Resolution of one of this module's specifiers
    pub fn link(&self, specifier: &str) -> Option<&Resolution> {
        self.links
            .iter()
            .find(|(s, _)| s == specifier)
            .map(|(_, resolution)| resolution)
    }
}

/// Result of a successful build generation
#[derive(Debug, Default)]
pub struct ModuleGraph {
    entries: Vec<(String, Resolution)>,
    modules: BTreeMap<ModuleId, EmittedModule>,
    externals: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ModuleGraph {
    /// Entry specifiers with their resolutions, in request order
    pub fn entries(&self) -> &[(String, Resolution)] {
        &self.entries
    }

    /// Resolution of an entry specifier
    pub fn entry(&self, specifier: &str) -> Option<&Resolution> {
        self.entries
            .iter()
            .find(|(s, _)| s == specifier)
            .map(|(_, resolution)| resolution)
    }

    /// An emitted module
    pub fn module(&self, id: &ModuleId) -> Option<&EmittedModule> {
        self.modules.get(id)
    }

    /// Emitted modules ordered by identity
    pub fn modules(&self) -> impl Iterator<Item = (&ModuleId, &EmittedModule)> {
        self.modules.iter()
    }

    /// External identifiers referenced anywhere in the graph
    pub fn externals(&self) -> &BTreeSet<String> {
        &self.externals
    }

    /// Diagnostics of the generation
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of emitted modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing was emitted
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Node {
    Request {
        parent: Option<ModuleId>,
        specifier: String,
    },
    Module(ModuleId),
}

enum Step {
    Resolved {
        parent: Option<ModuleId>,
        specifier: String,
        result: Result<Resolution>,
    },
    Emitted {
        id: ModuleId,
        result: Result<Transformed>,
    },
}

fn advance(states: &mut HashMap<Node, ModuleState>, node: &Node, next: ModuleState) {
    let state = states.entry(node.clone()).or_insert(ModuleState::Unresolved);
    debug_assert!(
        state.can_advance_to(next),
        "invalid transition {:?} -> {:?} for {:?}",
        state,
        next,
        node
    );
    trace!("{:?}: {:?} -> {:?}", node, state, next);
    *state = next;
}

/// Builds module graphs with an [`InteropPlugin`]
#[derive(Debug, Clone)]
pub struct GraphDriver {
    plugin: Arc<InteropPlugin>,
}

impl GraphDriver {
    /// Create a driver
    pub fn new(plugin: Arc<InteropPlugin>) -> Self {
        Self { plugin }
    }

    /// The driven plugin
    pub fn plugin(&self) -> &InteropPlugin {
        &self.plugin
    }

    /// Run one build generation from `entries` until the graph is closed
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn build<S: AsRef<str>>(&self, entries: &[S]) -> Result<ModuleGraph> {
        let generation = self.plugin.generation_start().await;
        let mut states: HashMap<Node, ModuleState> = HashMap::new();
        let mut pending: FuturesUnordered<BoxFuture<'_, Step>> = FuturesUnordered::new();
        let mut graph = ModuleGraph::default();
        let mut resolved_entries: HashMap<String, Resolution> = HashMap::new();

        for entry in entries {
            self.request(&mut states, &mut pending, None, entry.as_ref().to_string());
        }

        while let Some(step) = pending.next().await {
            let outcome = match step {
                Step::Resolved {
                    parent,
                    specifier,
                    result,
                } => {
                    let node = Node::Request {
                        parent: parent.clone(),
                        specifier: specifier.clone(),
                    };
                    match result {
                        Ok(resolution) => {
                            self.on_resolved(&mut states, &mut pending, &node, &resolution);
                            if let Resolution::External(external) = &resolution {
                                graph.externals.insert(external.id.clone());
                            }
                            match parent.and_then(|p| graph.modules.get_mut(&p)) {
                                Some(module) => module.links.push((specifier, resolution)),
                                None => {
                                    resolved_entries.insert(specifier, resolution);
                                }
                            }
                            Ok(())
                        }
                        Err(err) => Err((node, err)),
                    }
                }
                Step::Emitted { id, result } => {
                    let node = Node::Module(id.clone());
                    match result.and_then(|transformed| {
                        self.on_emitted(&mut states, &mut pending, &mut graph, id, transformed)
                    }) {
                        Ok(()) => Ok(()),
                        Err(err) => Err((node, err)),
                    }
                }
            };

            if let Err((node, err)) = outcome {
                advance(&mut states, &node, ModuleState::Failed);
                error!("Build generation {} failed: {}", generation, err);
                return Err(err);
            }
        }

        graph.entries = entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                resolved_entries
                    .get(entry)
                    .map(|resolution| (entry.to_string(), resolution.clone()))
            })
            .collect();
        for module in graph.modules.values_mut() {
            module.links.sort_by(|a, b| a.0.cmp(&b.0));
        }

        self.check_named_imports(&graph);
        graph.diagnostics = self.plugin.generation_end();
        info!(
            "Generation {}: {} modules, {} externals",
            generation,
            graph.modules.len(),
            graph.externals.len()
        );
        Ok(graph)
    }

    fn request<'a>(
        &'a self,
        states: &mut HashMap<Node, ModuleState>,
        pending: &mut FuturesUnordered<BoxFuture<'a, Step>>,
        parent: Option<ModuleId>,
        specifier: String,
    ) {
        let node = Node::Request {
            parent: parent.clone(),
            specifier: specifier.clone(),
        };
        if states.contains_key(&node) {
            return;
        }
        advance(states, &node, ModuleState::Resolving);

        let plugin = self.plugin.as_ref();
        pending.push(Box::pin(async move {
            let result = plugin.resolve(&specifier, parent.as_ref()).await;
            Step::Resolved {
                parent,
                specifier,
                result,
            }
        }));
    }

    fn on_resolved<'a>(
        &'a self,
        states: &mut HashMap<Node, ModuleState>,
        pending: &mut FuturesUnordered<BoxFuture<'a, Step>>,
        node: &Node,
        resolution: &Resolution,
    ) {
        let id = match resolution {
            Resolution::External(external) => {
                debug!("{:?} is external as {}", node, external.id);
                advance(states, node, ModuleState::External);
                return;
            }
            Resolution::Module(id) => id,
        };
        advance(states, node, ModuleState::Classified);

        let module = Node::Module(id.clone());
        if states.contains_key(&module) {
            return;
        }
        advance(states, &module, ModuleState::Resolving);
        advance(states, &module, ModuleState::Classified);
        let next = match self.plugin.generation().formats.get(&id.location) {
            Some(format) if format.needs_interop() => ModuleState::NeedsTransform,
            _ => ModuleState::PassThrough,
        };
        advance(states, &module, next);

        let plugin = self.plugin.as_ref();
        let id = id.clone();
        pending.push(Box::pin(async move {
            let result = match plugin.load(&id).await {
                Ok(code) => plugin.transform(code, &id).await,
                Err(err) => Err(err),
            };
            Step::Emitted { id, result }
        }));
    }

    fn on_emitted<'a>(
        &'a self,
        states: &mut HashMap<Node, ModuleState>,
        pending: &mut FuturesUnordered<BoxFuture<'a, Step>>,
        graph: &mut ModuleGraph,
        id: ModuleId,
        transformed: Transformed,
    ) -> Result<()> {
        let format = self
            .plugin
            .generation()
            .formats
            .get(&id.location)
            .ok_or_else(|| InteropError::Unclassified(id.to_host_id()))?;
        advance(states, &Node::Module(id.clone()), ModuleState::Emitted);

        for dependency in &transformed.dependencies {
            self.request(states, pending, Some(id.clone()), dependency.clone());
        }
        graph.modules.insert(
            id,
            EmittedModule {
                format,
                code: transformed.code,
                named_imports: transformed.named_imports,
                links: Vec::new(),
            },
        );
        Ok(())
    }

    fn check_named_imports(&self, graph: &ModuleGraph) {
        for (id, module) in &graph.modules {
            for (specifier, name) in &module.named_imports {
                let Some(Resolution::Module(target)) = module.link(specifier) else {
                    continue;
                };
                let Some(names) = self.plugin.export_names(&target.location) else {
                    continue;
                };
                if !names.contains(name) {
                    self.plugin.generation().diagnostics.warn(
                        DiagnosticKind::MissingExport,
                        format!(
                            "'{}' is not exported by {} (imported by {}), use the default export",
                            name, target.location, id.location
                        ),
                    );
                }
            }
        }
    }
}
