use crate::{
    config::SortBy,
    graph::DependencyGraph,
    sequence::{self, Entry},
};
use std::collections::{BTreeMap, BTreeSet};

/// Dependency identifier mapped to the dependents loaded before it.
pub type Violations = BTreeMap<String, BTreeSet<String>>;

/// Ordering violations are only meaningful while the list is displayed in
/// load order.
pub fn detect(entries: &[Entry], sort_by: SortBy) -> Violations {
    if sort_by != SortBy::LoadOrder {
        return Violations::new();
    }
    detect_violations(entries)
}

pub fn detect_violations(entries: &[Entry]) -> Violations {
    let positions = sequence::position_index(entries);
    let graph = DependencyGraph::new(sequence::mods(entries));
    let mut violations = Violations::new();

    for mod_entry in sequence::mods(entries) {
        if mod_entry.required_items.is_empty() {
            continue;
        }
        let Some(&position) = positions.get(mod_entry.identifier.as_str()) else {
            continue;
        };
        for required in &mod_entry.required_items {
            if graph.is_circular(&mod_entry.identifier, required) {
                continue;
            }
            let violated = match positions.get(required.as_str()) {
                Some(&required_position) => position < required_position,
                None => true,
            };
            if violated {
                violations
                    .entry(required.clone())
                    .or_default()
                    .insert(mod_entry.identifier.clone());
            }
        }
    }

    violations
}

/// Dependencies of `identifier` that are loaded after it or missing.
pub fn violations_of<'a>(violations: &'a Violations, identifier: &str) -> Vec<&'a str> {
    violations
        .iter()
        .filter(|(_, dependents)| dependents.contains(identifier))
        .map(|(dependency, _)| dependency.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::tests::{m, sep};

    #[test]
    fn satisfied_chain_has_no_violations() {
        let entries = vec![sep("sep1"), m("a", &[]), m("b", &["a"]), m("c", &["b"])];
        assert!(detect_violations(&entries).is_empty());
    }

    #[test]
    fn reversed_chain_reports_each_dependency() {
        let entries = vec![sep("sep1"), m("c", &["b"]), m("b", &["a"]), m("a", &[])];
        let violations = detect_violations(&entries);
        assert_eq!(violations.len(), 2);
        assert!(violations["a"].contains("b"));
        assert!(violations["b"].contains("c"));
        assert_eq!(violations_of(&violations, "c"), vec!["b"]);
    }

    #[test]
    fn missing_dependency_is_a_violation() {
        let entries = vec![m("a", &["ghost"])];
        let violations = detect_violations(&entries);
        assert!(violations["ghost"].contains("a"));
    }

    #[test]
    fn circular_pairs_are_never_reported() {
        let forward = vec![m("x", &["y"]), m("y", &["x"])];
        let backward = vec![m("y", &["x"]), m("x", &["y"])];
        assert!(detect_violations(&forward).is_empty());
        assert!(detect_violations(&backward).is_empty());
    }

    #[test]
    fn three_way_cycle_is_suppressed() {
        let entries = vec![m("a", &["b"]), m("b", &["c"]), m("c", &["a"])];
        assert!(detect_violations(&entries).is_empty());
    }

    #[test]
    fn other_sort_modes_report_nothing() {
        let entries = vec![m("b", &["a"]), m("a", &[])];
        assert!(detect(&entries, SortBy::Title).is_empty());
        assert_eq!(detect(&entries, SortBy::LoadOrder).len(), 1);
    }
}
