// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Filesystem resolution oracle (Node.js algorithm)

use crate::module_system::format::Format;
use crate::module_system::identity::{CanonicalLocation, is_bare};
use crate::module_system::oracle::{OracleError, OracleResolution, ResolutionOracle};
use crate::options::EnvDescriptor;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Node.js builtin module names
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Resolution oracle backed by the local filesystem
pub struct FsOracle {
    /// Built-in module names
    builtins: Vec<&'static str>,
    /// File extensions to try
    extensions: Vec<&'static str>,
}

impl FsOracle {
    /// Create a filesystem oracle
    pub fn new() -> Self {
        Self {
            builtins: BUILTIN_MODULES.to_vec(),
            extensions: vec![".js", ".json", ".node", ".mjs", ".cjs"],
        }
    }

    /// Check if a module is a built-in
    pub fn is_builtin(&self, name: &str) -> bool {
        let name = name.strip_prefix("node:").unwrap_or(name);
        let root = name.split('/').next().unwrap_or(name);
        self.builtins.contains(&root)
    }

    /// Resolve a path relative to a directory
    fn resolve_file(
        &self,
        path: &Path,
        specifier: &str,
        env: &EnvDescriptor,
    ) -> Result<OracleResolution, OracleError> {
        if path.is_file() {
            return Ok(self.categorize_file(path));
        }

        for ext in &self.extensions {
            let mut with_ext = path.as_os_str().to_owned();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Ok(self.categorize_file(&with_ext));
            }
        }

        if path.is_dir() {
            return self.resolve_directory(path, specifier, env);
        }

        Err(OracleError::NotFound(specifier.to_string()))
    }

    /// Resolve a directory (package.json main, then index files)
    fn resolve_directory(
        &self,
        dir: &Path,
        specifier: &str,
        env: &EnvDescriptor,
    ) -> Result<OracleResolution, OracleError> {
        let package = read_package_json(dir);

        if let Some(main) = package.as_ref().and_then(|pkg| pkg.entry(env)) {
            let main_path = dir.join(main);
            if main_path.is_file() {
                return Ok(self.categorize_file(&main_path));
            }
            for ext in &self.extensions {
                let mut with_ext = main_path.as_os_str().to_owned();
                with_ext.push(ext);
                let with_ext = PathBuf::from(with_ext);
                if with_ext.is_file() {
                    return Ok(self.categorize_file(&with_ext));
                }
            }
            if main_path.is_dir() {
                if let Some(index) = self.find_index(&main_path) {
                    return Ok(self.categorize_file(&index));
                }
            }
        }

        if let Some(index) = self.find_index(dir) {
            return Ok(self.categorize_file(&index));
        }

        if package.is_some() {
            return Err(OracleError::NoPackageMain(specifier.to_string()));
        }
        Err(OracleError::NotFound(specifier.to_string()))
    }

    fn find_index(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions
            .iter()
            .map(|ext| dir.join(format!("index{}", ext)))
            .find(|index| index.is_file())
    }

    /// Resolve a module from node_modules
    fn resolve_node_modules(
        &self,
        specifier: &str,
        parent_dir: &Path,
        env: &EnvDescriptor,
    ) -> Result<OracleResolution, OracleError> {
        let (package_name, subpath) = split_package_specifier(specifier);

        for dir in parent_dir.ancestors() {
            let package_dir = dir.join("node_modules").join(package_name);
            if !package_dir.is_dir() {
                continue;
            }
            return match subpath {
                // `pkg/` and `pkg/dir/` name directories inside the package
                Some(sub) if sub.is_empty() || sub.ends_with('/') => {
                    let dir = package_dir.join(sub);
                    if !dir.is_dir() {
                        return Err(OracleError::NotFound(specifier.to_string()));
                    }
                    let dir = canonical(&dir);
                    Ok(OracleResolution::new(
                        CanonicalLocation::directory(CanonicalLocation::from_path(&dir).as_str()),
                        package_format(&dir),
                    ))
                }
                Some(sub) => self.resolve_file(&package_dir.join(sub), specifier, env),
                None => self.resolve_directory(&package_dir, specifier, env),
            };
        }

        Err(OracleError::NotFound(specifier.to_string()))
    }

    /// Categorize a file by extension and enclosing package type
    fn categorize_file(&self, path: &Path) -> OracleResolution {
        let path = canonical(path);
        let format = Format::from_extension(&path).unwrap_or_else(|| package_format(&path));
        OracleResolution::new(CanonicalLocation::from_path(&path), format)
    }
}

impl Default for FsOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolutionOracle for FsOracle {
    fn resolve(
        &self,
        specifier: &str,
        parent: &CanonicalLocation,
        env: &EnvDescriptor,
        _dynamic_parent: bool,
    ) -> Result<OracleResolution, OracleError> {
        if self.is_builtin(specifier) && is_bare(specifier) {
            let name = specifier.strip_prefix("node:").unwrap_or(specifier);
            return Ok(OracleResolution::new(name, Format::HostBuiltin));
        }

        if specifier.contains("://") {
            return match url_to_path(specifier) {
                Some(path) => self.resolve_file(&path, specifier, env),
                None => Err(OracleError::NotFile(specifier.to_string())),
            };
        }

        let parent_dir = parent_directory(parent)
            .ok_or_else(|| OracleError::NotFile(specifier.to_string()))?;

        if is_bare(specifier) {
            return self.resolve_node_modules(specifier, &parent_dir, env);
        }

        let path = if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else {
            parent_dir.join(specifier)
        };
        self.resolve_file(&path, specifier, env)
    }
}

/// Split a package specifier into name and optional subpath
///
/// A trailing `/` yields an empty subpath.
pub fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if specifier.starts_with('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        if let Some(slash_pos) = specifier[1..].find('/') {
            let after_scope = &specifier[slash_pos + 2..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = slash_pos + 2 + subpath_pos;
                return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
            }
        }
        (specifier, None)
    } else if let Some(slash_pos) = specifier.find('/') {
        (&specifier[..slash_pos], Some(&specifier[slash_pos + 1..]))
    } else {
        (specifier, None)
    }
}

/// Package name of a bare specifier
pub fn package_name(specifier: &str) -> &str {
    split_package_specifier(specifier).0
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn url_to_path(specifier: &str) -> Option<PathBuf> {
    if !specifier.starts_with("file:") {
        return None;
    }
    url::Url::parse(specifier).ok()?.to_file_path().ok()
}

fn parent_directory(parent: &CanonicalLocation) -> Option<PathBuf> {
    let path = parent.to_file_path()?;
    if parent.is_directory() {
        Some(path)
    } else {
        Some(path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/")))
    }
}

/// Format from the nearest package.json `"type"` field
fn package_format(path: &Path) -> Format {
    let start = if path.is_dir() { Some(path) } else { path.parent() };
    for dir in start.into_iter().flat_map(Path::ancestors) {
        if let Some(pkg) = read_package_json(dir) {
            return Format::from_package_type(pkg.type_field.as_deref());
        }
    }
    Format::DynamicModule
}

fn read_package_json(dir: &Path) -> Option<PackageJson> {
    let content = std::fs::read_to_string(dir.join("package.json")).ok()?;
    serde_json::from_str(&content).ok()
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
    #[serde(default)]
    browser: Option<serde_json::Value>,
    #[serde(rename = "type")]
    type_field: Option<String>,
}

impl PackageJson {
    /// Entry point, preferring a string `browser` field for browser targets
    fn entry(&self, env: &EnvDescriptor) -> Option<&str> {
        if env.is_browser_target() {
            if let Some(serde_json::Value::String(browser)) = &self.browser {
                return Some(browser);
            }
        }
        self.main.as_deref()
    }
}
