// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Build options

use crate::error::Result;
use crate::module_system::CanonicalLocation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Environment flags passed to the resolution oracle
///
/// When neither `node` nor `browser` is given, the environment is a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawEnv")]
pub struct EnvDescriptor {
    /// Targets a host runtime with Node builtins
    pub node: bool,
    /// Targets a browser-like runtime
    pub browser: bool,
    /// Production build
    pub production: bool,
    /// Development build
    pub dev: bool,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct RawEnv {
    node: Option<bool>,
    browser: Option<bool>,
    production: Option<bool>,
    dev: Option<bool>,
}

impl From<RawEnv> for EnvDescriptor {
    fn from(raw: RawEnv) -> Self {
        let browser = raw
            .browser
            .unwrap_or(raw.node.is_none());
        Self {
            node: raw.node.unwrap_or(false),
            browser,
            production: raw.production.unwrap_or(false),
            dev: raw.dev.unwrap_or(false),
        }
    }
}

impl Default for EnvDescriptor {
    fn default() -> Self {
        RawEnv::default().into()
    }
}

impl EnvDescriptor {
    /// Browser environment
    pub fn browser() -> Self {
        Self::default()
    }

    /// Host (Node) environment
    pub fn node() -> Self {
        Self {
            node: true,
            browser: false,
            production: false,
            dev: false,
        }
    }

    /// Same environment with the production flag set
    pub fn production(mut self) -> Self {
        self.production = true;
        self.dev = false;
        self
    }

    /// Whether builtins must be substituted rather than left external
    pub fn is_browser_target(&self) -> bool {
        self.browser
    }

    /// Whether the build targets a host runtime
    pub fn is_host_target(&self) -> bool {
        !self.browser
    }

    /// Value substituted for `process.env.NODE_ENV`
    pub fn node_env(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "dev"
        }
    }
}

/// How an external is referenced in the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalAlias {
    /// Keep the specifier as written (`true` in configuration)
    Specifier,
    /// Replace with an alias identifier
    Alias(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawAlias {
    Flag(bool),
    Alias(String),
}

/// Externals as configured: a list of names or a map of name to alias
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Externals {
    /// `["left-pad", "react"]`
    List(Vec<String>),
    /// `{ "react": "https://cdn/react.js", "left-pad": true }`
    Map(BTreeMap<String, RawAliasValue>),
}

/// Map value of an externals entry
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawAliasValue(RawAlias);

impl RawAliasValue {
    /// `true`
    pub fn specifier() -> Self {
        Self(RawAlias::Flag(true))
    }

    /// An alias string
    pub fn alias(alias: impl Into<String>) -> Self {
        Self(RawAlias::Alias(alias.into()))
    }

    fn into_alias(self) -> Option<ExternalAlias> {
        match self.0 {
            RawAlias::Flag(true) => Some(ExternalAlias::Specifier),
            RawAlias::Flag(false) => None,
            RawAlias::Alias(alias) => Some(ExternalAlias::Alias(alias)),
        }
    }
}

impl Externals {
    /// Normalized `(name, alias)` pairs; `false` entries are dropped
    pub fn bindings(&self) -> Vec<(String, ExternalAlias)> {
        match self {
            Externals::List(names) => names
                .iter()
                .map(|name| (name.clone(), ExternalAlias::Specifier))
                .collect(),
            Externals::Map(map) => map
                .iter()
                .filter_map(|(name, value)| {
                    value.clone().into_alias().map(|alias| (name.clone(), alias))
                })
                .collect(),
        }
    }
}

/// Options recognized by the interop plugin
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Root for top-level resolution (defaults to the working directory)
    #[serde(alias = "baseUrl")]
    pub base_path: Option<String>,

    /// Environment flags
    pub env: EnvDescriptor,

    /// Modules kept out of the graph
    pub externals: Option<Externals>,

    /// Location of the builtin substitution set for browser builds
    pub browser_builtins: Option<String>,

    /// Bundle dependencies of externals instead of propagating external status
    pub inline_deps: bool,

    /// Downlevel target handed to the syntax transformer
    pub env_target: Option<serde_json::Value>,

    /// Minify rendered chunks
    pub minify: bool,

    /// Size of the transform worker pool
    pub worker_threads: Option<usize>,
}

impl Options {
    /// Parse options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Base location for top-level resolution, always ending in `/`
    pub fn base_location(&self) -> Result<CanonicalLocation> {
        let base = match &self.base_path {
            Some(base) => base.clone(),
            None => std::env::current_dir()?.to_string_lossy().replace('\\', "/"),
        };
        Ok(CanonicalLocation::directory(base))
    }

    /// Normalized external bindings
    pub fn external_bindings(&self) -> Vec<(String, ExternalAlias)> {
        self.externals
            .as_ref()
            .map(Externals::bindings)
            .unwrap_or_default()
    }
}
