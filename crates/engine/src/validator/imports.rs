//! Level 2: imports
//!
//! Collects imports from changed files and classifies each as stdlib,
//! third-party, or project-internal. Missing third-party imports become
//! errors carrying the package name derived from a static
//! import-to-package map.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use super::issue::{ValidationIssue, ValidationLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportClass {
    Stdlib,
    ThirdParty,
    ProjectInternal,
}

/// A single import statement found in a changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub module: String,
    pub line: u32,
}

/// Extract top-level import module names from Python source. Other
/// languages' import syntax is out of scope for this static map (the
/// original implementation this is grounded on is Python-specific); files
/// of other languages simply report no imports.
pub fn extract_python_imports(content: &str) -> Vec<ImportRef> {
    let import_re = Regex::new(r"^\s*import\s+([A-Za-z_][A-Za-z0-9_\.]*)").unwrap();
    let from_re = Regex::new(r"^\s*from\s+([A-Za-z_][A-Za-z0-9_\.]*)\s+import\s").unwrap();

    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if let Some(caps) = import_re.captures(line) {
            out.push(ImportRef {
                module: caps[1].split('.').next().unwrap().to_string(),
                line: i as u32 + 1,
            });
        } else if let Some(caps) = from_re.captures(line) {
            let module = &caps[1];
            if module.starts_with('.') {
                continue; // relative import, handled as project-internal below
            }
            out.push(ImportRef {
                module: module.split('.').next().unwrap().to_string(),
                line: i as u32 + 1,
            });
        }
    }
    out
}

/// Static stdlib module allowlist (non-exhaustive but covers the common
/// cases a generator agent would import).
const STDLIB_MODULES: &[&str] = &[
    "os", "sys", "re", "json", "logging", "pathlib", "typing", "dataclasses", "enum",
    "datetime", "collections", "itertools", "functools", "subprocess", "asyncio", "time",
    "unittest", "io", "shutil", "tempfile", "socket", "traceback", "uuid", "abc", "copy",
    "math", "random", "hashlib", "base64", "csv", "sqlite3", "threading", "multiprocessing",
];

/// Static import-name → PyPI-package-name map for the common mismatches —
/// grounded on `dependency_manager.py`'s `IMPORT_TO_PACKAGE`.
pub fn import_to_package(import_name: &str) -> &str {
    match import_name {
        "yaml" => "PyYAML",
        "bs4" => "beautifulsoup4",
        "cv2" => "opencv-python",
        "PIL" => "Pillow",
        "sklearn" => "scikit-learn",
        "dotenv" => "python-dotenv",
        "jwt" => "PyJWT",
        "attr" | "attrs" => "attrs",
        "dateutil" => "python-dateutil",
        other => other,
    }
}

pub fn classify_import(
    module: &str,
    installed_packages: &HashSet<String>,
    project_modules: &HashSet<String>,
) -> ImportClass {
    if STDLIB_MODULES.contains(&module) {
        ImportClass::Stdlib
    } else if project_modules.contains(module) {
        ImportClass::ProjectInternal
    } else if installed_packages.contains(module) {
        ImportClass::ThirdParty
    } else {
        ImportClass::ThirdParty // unresolved third-party; caller checks installed set
    }
}

/// Validate imports for one changed Python file.
pub fn validate_imports(
    file: &str,
    content: &str,
    installed_packages: &HashSet<String>,
    project_modules: &HashSet<String>,
) -> Vec<ValidationIssue> {
    if !file.ends_with(".py") {
        return Vec::new();
    }

    let mut issues = Vec::new();
    for import in extract_python_imports(content) {
        let class = classify_import(&import.module, installed_packages, project_modules);
        if class == ImportClass::ThirdParty && !installed_packages.contains(&import.module) {
            let package = import_to_package(&import.module);
            issues.push(
                ValidationIssue::error(
                    ValidationLevel::Imports,
                    file,
                    format!("third-party import '{}' is not installed (pip package: {package})", import.module),
                )
                .with_line(import.line)
                .with_suggestion(format!("install_dependency(import_name=\"{}\")", import.module)),
            );
        }
    }
    issues
}

/// Count imports by class, used by callers that just need a summary.
pub fn summarize(
    imports: &[ImportRef],
    installed_packages: &HashSet<String>,
    project_modules: &HashSet<String>,
) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for import in imports {
        let class = classify_import(&import.module, installed_packages, project_modules);
        let key = match class {
            ImportClass::Stdlib => "stdlib",
            ImportClass::ProjectInternal => "project_internal",
            ImportClass::ThirdParty => "third_party",
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_and_from_imports() {
        let src = "import os\nfrom pathlib import Path\nfrom . import sibling\n";
        let imports = extract_python_imports(src);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "os");
        assert_eq!(imports[1].module, "pathlib");
    }

    #[test]
    fn stdlib_modules_classify_as_stdlib() {
        let installed = HashSet::new();
        let project = HashSet::new();
        assert_eq!(classify_import("os", &installed, &project), ImportClass::Stdlib);
    }

    #[test]
    fn missing_third_party_import_is_an_error_with_pypi_name() {
        let installed = HashSet::new();
        let project = HashSet::new();
        let issues = validate_imports("a.py", "import yaml\n", &installed, &project);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("PyYAML"));
    }

    #[test]
    fn installed_third_party_import_is_fine() {
        let mut installed = HashSet::new();
        installed.insert("requests".to_string());
        let project = HashSet::new();
        let issues = validate_imports("a.py", "import requests\n", &installed, &project);
        assert!(issues.is_empty());
    }

    #[test]
    fn non_python_files_are_skipped() {
        let installed = HashSet::new();
        let project = HashSet::new();
        let issues = validate_imports("a.rs", "use std::io;\n", &installed, &project);
        assert!(issues.is_empty());
    }
}
