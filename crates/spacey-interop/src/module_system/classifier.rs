// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Builtin substitution and external classification

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::module_system::format::Format;
use crate::module_system::identity::{CanonicalLocation, ExternalRef, is_relative};
use crate::module_system::oracle::{OracleError, ResolutionOracle};
use crate::options::{EnvDescriptor, ExternalAlias};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Builtins with a browser substitution module
pub const BROWSER_BUILTINS: &[&str] = &[
    "assert",
    "buffer",
    "console",
    "constants",
    "crypto",
    "domain",
    "events",
    "http",
    "https",
    "os",
    "path",
    "process",
    "punycode",
    "querystring",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tty",
    "url",
    "util",
    "vm",
    "zlib",
];

/// Set of substitution modules replacing host builtins in browser builds
#[derive(Debug, Clone, Default)]
pub struct BuiltinSubstitutions {
    base: Option<CanonicalLocation>,
}

impl BuiltinSubstitutions {
    /// Substitutions living under `base` as `<base>/<name>.js`
    pub fn new(base: Option<&str>) -> Self {
        Self {
            base: base.map(CanonicalLocation::directory),
        }
    }

    /// Substitution location for a builtin, if one is registered
    pub fn lookup(&self, name: &str) -> Option<CanonicalLocation> {
        let name = name.strip_prefix("node:").unwrap_or(name);
        let base = self.base.as_ref()?;
        if !BROWSER_BUILTINS.contains(&name) {
            return None;
        }
        Some(CanonicalLocation::new(format!("{}{}.js", base, name)))
    }
}

#[derive(Debug, Clone)]
struct ExternalEntry {
    name: String,
    alias: ExternalAlias,
}

/// Externals resolved to canonical locations for one build generation
#[derive(Debug, Clone, Default)]
pub struct ExternalTable {
    exact: HashMap<CanonicalLocation, ExternalEntry>,
    /// Directory boundaries, longest first
    boundaries: Vec<(CanonicalLocation, ExternalEntry)>,
}

impl ExternalTable {
    /// Table with no externals
    pub fn empty() -> Self {
        Self::default()
    }

    /// Resolve configured bindings against `base`
    ///
    /// Each name is resolved as the package main (exact binding) and as
    /// `name/` (package boundary). Names that are host builtins are skipped.
    #[instrument(skip_all, fields(bindings = bindings.len()))]
    pub fn resolve(
        oracle: &dyn ResolutionOracle,
        bindings: &[(String, ExternalAlias)],
        base: &CanonicalLocation,
        env: &EnvDescriptor,
        diagnostics: &Diagnostics,
    ) -> Self {
        let mut table = Self::empty();

        for (name, alias) in bindings {
            let entry = ExternalEntry {
                name: name.trim_end_matches('/').to_string(),
                alias: alias.clone(),
            };
            let mut bound = false;

            match oracle.resolve(&entry.name, base, env, false) {
                Ok(resolved) if resolved.format == Format::HostBuiltin => continue,
                Ok(resolved) => {
                    debug!("External {} -> {}", entry.name, resolved.location);
                    table.exact.insert(resolved.location, entry.clone());
                    bound = true;
                }
                Err(err) if err.is_not_found() => {}
                Err(OracleError::NotFile(_)) => {}
                Err(err) => {
                    diagnostics.warn(
                        DiagnosticKind::UnresolvedExternalBinding,
                        format!("Could not resolve external {}: {}", entry.name, err),
                    );
                }
            }

            let boundary = format!("{}/", entry.name);
            match oracle.resolve(&boundary, base, env, false) {
                Ok(resolved) if resolved.format == Format::HostBuiltin => continue,
                Ok(resolved) if resolved.location.is_directory() => {
                    debug!("External boundary {} -> {}", boundary, resolved.location);
                    table.boundaries.push((resolved.location, entry));
                    bound = true;
                }
                _ => {}
            }

            if !bound {
                diagnostics.warn(
                    DiagnosticKind::UnresolvedExternalBinding,
                    format!("External {} did not resolve from {}", name, base),
                );
            }
        }

        table
            .boundaries
            .sort_by(|(a, _), (b, _)| b.as_str().len().cmp(&a.as_str().len()));
        table
    }

    /// External reference for a resolved location
    ///
    /// An exact match wins over a package boundary. `inline_deps` turns the
    /// boundary tier off so that dependencies of externals are bundled.
    pub fn lookup(
        &self,
        location: &CanonicalLocation,
        specifier: &str,
        inline_deps: bool,
    ) -> Option<ExternalRef> {
        if let Some(entry) = self.exact.get(location) {
            let id = match &entry.alias {
                ExternalAlias::Alias(alias) => alias.clone(),
                ExternalAlias::Specifier if is_relative(specifier) => entry.name.clone(),
                ExternalAlias::Specifier => specifier.to_string(),
            };
            return Some(ExternalRef::new(id));
        }

        if inline_deps {
            return None;
        }

        self.boundaries.iter().find_map(|(boundary, entry)| {
            let rest = location.strip_directory(boundary)?;
            let id = match &entry.alias {
                ExternalAlias::Alias(alias) => {
                    format!("{}/{}", alias.trim_end_matches('/'), rest)
                }
                ExternalAlias::Specifier => format!("{}/{}", entry.name, rest),
            };
            Some(ExternalRef::new(id))
        })
    }

    /// Number of bound locations
    pub fn len(&self) -> usize {
        self.exact.len() + self.boundaries.len()
    }

    /// Whether no external is bound
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.boundaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_system::oracle::OracleResolution;

    struct PackageOracle;

    impl ResolutionOracle for PackageOracle {
        fn resolve(
            &self,
            specifier: &str,
            _parent: &CanonicalLocation,
            _env: &EnvDescriptor,
            _dynamic_parent: bool,
        ) -> Result<OracleResolution, OracleError> {
            match specifier {
                "left-pad" => Ok(OracleResolution::new(
                    "/app/node_modules/left-pad/index.js",
                    Format::DynamicModule,
                )),
                "left-pad/" => Ok(OracleResolution::new(
                    "/app/node_modules/left-pad/",
                    Format::DynamicModule,
                )),
                "no-main" => Err(OracleError::NoPackageMain(specifier.into())),
                "no-main/" => Ok(OracleResolution::new(
                    "/app/node_modules/no-main/",
                    Format::DynamicModule,
                )),
                "fs" | "fs/" => Ok(OracleResolution::new("fs", Format::HostBuiltin)),
                _ => Err(OracleError::NotFound(specifier.into())),
            }
        }
    }

    fn table(bindings: &[(&str, ExternalAlias)], diagnostics: &Diagnostics) -> ExternalTable {
        let bindings: Vec<_> = bindings
            .iter()
            .map(|(name, alias)| (name.to_string(), alias.clone()))
            .collect();
        ExternalTable::resolve(
            &PackageOracle,
            &bindings,
            &CanonicalLocation::directory("/app"),
            &EnvDescriptor::browser(),
            diagnostics,
        )
    }

    #[test]
    fn test_builtin_substitution_lookup() {
        let subs = BuiltinSubstitutions::new(Some("/nodelibs"));
        assert_eq!(
            subs.lookup("assert"),
            Some(CanonicalLocation::new("/nodelibs/assert.js"))
        );
        assert_eq!(subs.lookup("node:assert"), subs.lookup("assert"));
        assert_eq!(subs.lookup("child_process"), None);
        assert_eq!(BuiltinSubstitutions::new(None).lookup("assert"), None);
    }

    #[test]
    fn test_exact_and_boundary_tiers() {
        let diagnostics = Diagnostics::new();
        let table = table(&[("left-pad", ExternalAlias::Specifier)], &diagnostics);
        assert!(diagnostics.is_empty());

        let main = CanonicalLocation::new("/app/node_modules/left-pad/index.js");
        assert_eq!(
            table.lookup(&main, "left-pad", false),
            Some(ExternalRef::new("left-pad"))
        );
        assert_eq!(
            table.lookup(&main, "./index.js", false),
            Some(ExternalRef::new("left-pad"))
        );

        let sub = CanonicalLocation::new("/app/node_modules/left-pad/lib/pad.js");
        assert_eq!(
            table.lookup(&sub, "left-pad/lib/pad", false),
            Some(ExternalRef::new("left-pad/lib/pad.js"))
        );
        assert_eq!(table.lookup(&sub, "left-pad/lib/pad", true), None);
        assert_eq!(
            table.lookup(&main, "left-pad", true),
            Some(ExternalRef::new("left-pad"))
        );
    }

    #[test]
    fn test_alias_binding() {
        let diagnostics = Diagnostics::new();
        let table = table(
            &[("left-pad", ExternalAlias::Alias("https://cdn/left-pad".into()))],
            &diagnostics,
        );
        let sub = CanonicalLocation::new("/app/node_modules/left-pad/lib/pad.js");
        assert_eq!(
            table.lookup(&sub, "./lib/pad", false),
            Some(ExternalRef::new("https://cdn/left-pad/lib/pad.js"))
        );
    }

    #[test]
    fn test_missing_main_and_builtins() {
        let diagnostics = Diagnostics::new();
        let table = table(
            &[
                ("no-main", ExternalAlias::Specifier),
                ("fs", ExternalAlias::Specifier),
                ("missing", ExternalAlias::Specifier),
            ],
            &diagnostics,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.lookup(&CanonicalLocation::new("/app/node_modules/no-main/x.js"), "no-main/x", false),
            Some(ExternalRef::new("no-main/x.js"))
        );
        let reported = diagnostics.drain();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].kind, DiagnosticKind::UnresolvedExternalBinding);
    }
}
