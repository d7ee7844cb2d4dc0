// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Static-module faces of dynamic and data modules

use crate::interop::dew::js_string;
use crate::interop::scanner::ExportNameSet;
use crate::module_system::CanonicalLocation;
use std::fmt::Write;

/// Source of the empty-module sentinel
pub const EMPTY_MODULE: &str = "export default {};\n";

fn named_exports(out: &mut String, names: &ExportNameSet) {
    for name in names {
        let _ = writeln!(out, "export var {0} = __exports.{0};", name);
    }
}

/// Entry unit for a dynamic module: invokes the factory once and re-exports
/// the result as the default export and as one binding per recovered name
pub fn dynamic_entry(location: &CanonicalLocation, names: &ExportNameSet) -> String {
    let factory = format!("./{}", location.file_name());
    let mut out = format!(
        "import {{ dew }} from {};\nvar __exports = dew();\nexport default __exports;\n",
        js_string(&factory)
    );
    named_exports(&mut out, names);
    out
}

/// Data module seen from a static importer
pub fn data_entry(json: &str, names: &ExportNameSet) -> String {
    let mut out = format!(
        "var __exports = {};\nexport default __exports;\n",
        json.trim()
    );
    named_exports(&mut out, names);
    out
}

/// Data module seen from a dynamic importer
pub fn data_factory(json: &str) -> String {
    format!(
        "export function dew () {{\n  return exports;\n}}\nvar exports = {};\n",
        json.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> ExportNameSet {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_dynamic_entry_named_exports() {
        let code = dynamic_entry(
            &CanonicalLocation::new("/app/lib/foo.js"),
            &set(&["foo", "bar"]),
        );
        assert_eq!(
            code,
            "import { dew } from \"./foo.js\";\n\
             var __exports = dew();\n\
             export default __exports;\n\
             export var bar = __exports.bar;\n\
             export var foo = __exports.foo;\n"
        );
    }

    #[test]
    fn test_dynamic_entry_without_names_keeps_default() {
        let code = dynamic_entry(&CanonicalLocation::new("/app/side.js"), &ExportNameSet::new());
        assert!(code.ends_with("export default __exports;\n"));
    }

    #[test]
    fn test_data_faces() {
        let json = "{ \"name\": \"pkg\" }\n";
        assert_eq!(
            data_entry(json, &set(&["name"])),
            "var __exports = { \"name\": \"pkg\" };\nexport default __exports;\nexport var name = __exports.name;\n"
        );
        assert_eq!(
            data_factory(json),
            "export function dew () {\n  return exports;\n}\nvar exports = { \"name\": \"pkg\" };\n"
        );
    }
}
