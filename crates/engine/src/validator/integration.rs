//! Level 4: integration
//!
//! For each file in `dependents`, re-parse and ensure the symbols it
//! imports from a changed file still exist with a compatible signature:
//! name match at minimum, parameter arity when derivable from the parser.
//! Arity compatibility follows a documented contract (see `check_arity`)
//! rather than being left ad hoc per call site.

use std::collections::HashMap;

use regex::Regex;

use super::issue::{ValidationIssue, ValidationLevel};

/// A symbol defined in a changed file, as seen by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedSymbol {
    pub name: String,
    /// `None` when arity can't be derived (e.g. `*args`/`**kwargs` only, or
    /// a non-function symbol such as a class or module-level constant).
    pub min_args: Option<usize>,
    pub max_args: Option<usize>,
}

/// A symbol a dependent file imports from a changed file, with the call
/// sites' argument counts observed in that dependent (best-effort; a
/// dependent may not call the symbol at all, in which case `call_arities`
/// is empty and only name existence is checked).
#[derive(Debug, Clone)]
pub struct SymbolUse {
    pub name: String,
    pub call_arities: Vec<usize>,
}

/// Arity is compatible when the call's argument count falls within
/// `[min_args, max_args]` as derived from the def; defs whose arity can't
/// be derived (e.g. `*args`) are always considered compatible since the
/// parser has no evidence against them. Name existence is always checked
/// regardless of arity derivability.
pub enum ArityCompat {
    Compatible,
    Incompatible { expected: String, found: usize },
}

pub fn check_arity(symbol: &DefinedSymbol, call_argc: usize) -> ArityCompat {
    let min = symbol.min_args.unwrap_or(0);
    let max = symbol.max_args.unwrap_or(usize::MAX);
    if call_argc >= min && call_argc <= max {
        ArityCompat::Compatible
    } else {
        let expected = match (symbol.min_args, symbol.max_args) {
            (Some(lo), Some(hi)) if lo == hi => format!("{lo}"),
            (Some(lo), Some(hi)) => format!("{lo}..={hi}"),
            (Some(lo), None) => format!(">= {lo}"),
            _ => "unknown".to_string(),
        };
        ArityCompat::Incompatible {
            expected,
            found: call_argc,
        }
    }
}

/// Best-effort Python `def name(args...)` extractor, grounded on the same
/// regex-based approach used by `read_code_chunk`'s block extraction —
/// this level doesn't need a full parse, just defined-symbol signatures.
pub fn extract_python_defs(content: &str) -> HashMap<String, DefinedSymbol> {
    let re = Regex::new(r"^\s*def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)").unwrap();
    let mut out = HashMap::new();
    for line in content.lines() {
        if let Some(caps) = re.captures(line) {
            let name = caps[1].to_string();
            let params = &caps[2];
            let symbol = parse_params(&name, params);
            out.insert(name, symbol);
        }
    }
    out
}

fn parse_params(name: &str, params: &str) -> DefinedSymbol {
    if params.trim().is_empty() {
        return DefinedSymbol {
            name: name.to_string(),
            min_args: Some(0),
            max_args: Some(0),
        };
    }
    let parts: Vec<&str> = params.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    if parts.iter().any(|p| p.starts_with("**") || p.starts_with('*')) {
        return DefinedSymbol {
            name: name.to_string(),
            min_args: None,
            max_args: None,
        };
    }
    let required = parts.iter().filter(|p| !p.contains('=')).count();
    DefinedSymbol {
        name: name.to_string(),
        min_args: Some(required),
        max_args: Some(parts.len()),
    }
}

/// Best-effort extraction of which symbols `content` imports from
/// `changed_module` (by its import name, e.g. `thing` for `thing.py`) and
/// the argument counts of calls to each, scanning for `from <module>
/// import <names>` followed by `<name>(...)` call sites. Nested
/// parentheses in call arguments are not resolved (top-level comma count
/// only) — acceptable for a best-effort signal, not a full parse.
pub fn extract_symbol_uses(content: &str, changed_module: &str) -> Vec<SymbolUse> {
    let from_re = Regex::new(&format!(
        r"(?m)^\s*from\s+(?:\.*){}\s+import\s+(.+)$",
        regex::escape(changed_module)
    ))
    .unwrap();

    let mut names: Vec<String> = Vec::new();
    for caps in from_re.captures_iter(content) {
        for part in caps[1].split(',') {
            let name = part.trim().split(" as ").next().unwrap_or("").trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let call_re = Regex::new(&format!(r"{}\s*\(([^)]*)\)", regex::escape(&name))).unwrap();
            let call_arities = call_re
                .captures_iter(content)
                .map(|c| {
                    let args = c[1].trim();
                    if args.is_empty() {
                        0
                    } else {
                        args.split(',').count()
                    }
                })
                .collect();
            SymbolUse { name, call_arities }
        })
        .collect()
}

/// Validate that every symbol a dependent uses from a changed file still
/// exists, with compatible arity when derivable.
pub fn validate_integration(
    dependent_file: &str,
    uses: &[SymbolUse],
    changed_defs: &HashMap<String, DefinedSymbol>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for use_ in uses {
        match changed_defs.get(&use_.name) {
            None => {
                issues.push(ValidationIssue::error(
                    ValidationLevel::Integration,
                    dependent_file,
                    format!("symbol '{}' no longer exists in the changed module", use_.name),
                ));
            }
            Some(symbol) => {
                for &argc in &use_.call_arities {
                    if let ArityCompat::Incompatible { expected, found } = check_arity(symbol, argc) {
                        issues.push(ValidationIssue::error(
                            ValidationLevel::Integration,
                            dependent_file,
                            format!(
                                "call to '{}' passes {found} argument(s), expected {expected}",
                                use_.name
                            ),
                        ));
                    }
                }
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_required_and_default_params() {
        let defs = extract_python_defs("def foo(a, b, c=1):\n    pass\n");
        let sym = &defs["foo"];
        assert_eq!(sym.min_args, Some(2));
        assert_eq!(sym.max_args, Some(3));
    }

    #[test]
    fn varargs_def_has_no_derivable_arity() {
        let defs = extract_python_defs("def foo(*args, **kwargs):\n    pass\n");
        let sym = &defs["foo"];
        assert_eq!(sym.min_args, None);
        assert_eq!(sym.max_args, None);
    }

    #[test]
    fn missing_symbol_is_an_error() {
        let defs = HashMap::new();
        let uses = vec![SymbolUse {
            name: "gone".into(),
            call_arities: vec![],
        }];
        let issues = validate_integration("b.py", &uses, &defs);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("no longer exists"));
    }

    #[test]
    fn incompatible_arity_is_an_error() {
        let mut defs = HashMap::new();
        defs.insert(
            "foo".to_string(),
            DefinedSymbol {
                name: "foo".into(),
                min_args: Some(2),
                max_args: Some(2),
            },
        );
        let uses = vec![SymbolUse {
            name: "foo".into(),
            call_arities: vec![3],
        }];
        let issues = validate_integration("b.py", &uses, &defs);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("expected 2"));
    }

    #[test]
    fn extract_symbol_uses_finds_import_and_call_arity() {
        let content = "from thing import foo\n\nfoo(1, 2, 3)\n";
        let uses = extract_symbol_uses(content, "thing");
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "foo");
        assert_eq!(uses[0].call_arities, vec![3]);
    }

    #[test]
    fn varargs_symbol_is_always_compatible() {
        let mut defs = HashMap::new();
        defs.insert(
            "foo".to_string(),
            DefinedSymbol {
                name: "foo".into(),
                min_args: None,
                max_args: None,
            },
        );
        let uses = vec![SymbolUse {
            name: "foo".into(),
            call_arities: vec![0, 5, 100],
        }];
        assert!(validate_integration("b.py", &uses, &defs).is_empty());
    }
}
