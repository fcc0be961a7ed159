//! `AffectedFiles` computation.3 "changed is the staged set;
//! dependents are files that import any changed module (resolved via the
//! project index; transitive to one level by default, tunable)."
//!
//! The project index itself (symbol/import graph maintenance) is an
//! external collaborator (Non-goals); this module only defines the
//! read-only boundary the VFS needs and the one-hop expansion rule.

use std::collections::BTreeSet;

/// Read-only view onto the project's import graph. Implemented by whatever
/// external indexer the embedding application maintains; the VFS never
/// mutates it.
pub trait ProjectIndex: Send + Sync {
    /// Paths that import `path`, one hop (direct importers only).
    fn direct_importers(&self, path: &str) -> Vec<String>;
}

/// An index that reports no importers for anything — used when no indexer
/// is wired up; `AffectedFiles` then degrades to `changed` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProjectIndex;

impl ProjectIndex for NullProjectIndex {
    fn direct_importers(&self, _path: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Result of `AffectedFiles`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffectedFiles {
    pub changed: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
}

/// Expand `changed` into dependents by walking the import graph `hops`
/// levels deep (default 1, tunable).
pub fn compute_affected(
    changed: &BTreeSet<String>,
    index: &dyn ProjectIndex,
    hops: usize,
) -> AffectedFiles {
    let mut dependents: BTreeSet<String> = BTreeSet::new();
    let mut frontier: Vec<String> = changed.iter().cloned().collect();

    for _ in 0..hops.max(1) {
        let mut next_frontier = Vec::new();
        for path in &frontier {
            for importer in index.direct_importers(path) {
                if !changed.contains(&importer) && dependents.insert(importer.clone()) {
                    next_frontier.push(importer);
                }
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    AffectedFiles {
        changed: changed.clone(),
        dependents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeIndex(HashMap<String, Vec<String>>);

    impl ProjectIndex for FakeIndex {
        fn direct_importers(&self, path: &str) -> Vec<String> {
            self.0.get(path).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn null_index_yields_no_dependents() {
        let changed: BTreeSet<String> = ["a.py".to_string()].into_iter().collect();
        let result = compute_affected(&changed, &NullProjectIndex, 1);
        assert!(result.dependents.is_empty());
        assert_eq!(result.changed, changed);
    }

    #[test]
    fn one_hop_expansion_finds_direct_importers() {
        let mut map = HashMap::new();
        map.insert("a.py".to_string(), vec!["b.py".to_string(), "c.py".to_string()]);
        let index = FakeIndex(map);
        let changed: BTreeSet<String> = ["a.py".to_string()].into_iter().collect();
        let result = compute_affected(&changed, &index, 1);
        assert_eq!(
            result.dependents,
            ["b.py".to_string(), "c.py".to_string()].into_iter().collect()
        );
    }

    #[test]
    fn two_hop_expansion_is_transitive() {
        let mut map = HashMap::new();
        map.insert("a.py".to_string(), vec!["b.py".to_string()]);
        map.insert("b.py".to_string(), vec!["c.py".to_string()]);
        let index = FakeIndex(map);
        let changed: BTreeSet<String> = ["a.py".to_string()].into_iter().collect();

        let one_hop = compute_affected(&changed, &index, 1);
        assert!(!one_hop.dependents.contains("c.py"));

        let two_hop = compute_affected(&changed, &index, 2);
        assert!(two_hop.dependents.contains("b.py"));
        assert!(two_hop.dependents.contains("c.py"));
    }

    #[test]
    fn dependent_already_in_changed_set_is_not_duplicated() {
        let mut map = HashMap::new();
        map.insert("a.py".to_string(), vec!["b.py".to_string()]);
        map.insert("b.py".to_string(), vec!["a.py".to_string()]);
        let index = FakeIndex(map);
        let changed: BTreeSet<String> = ["a.py".to_string(), "b.py".to_string()]
            .into_iter()
            .collect();
        let result = compute_affected(&changed, &index, 2);
        assert!(result.dependents.is_empty());
    }
}
