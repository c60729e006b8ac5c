//! "Reset load order": rebuild the sequence from a base order and pull
//! dependencies in front of the mods that need them.

use crate::{
    config::{SeparatorPlacement, DEFAULT_SORT_PASS_LIMIT},
    game::GameFamily,
    graph::DependencyGraph,
    sequence::{self, Entry, ModEntry, OrderRecord},
};
use std::{collections::HashMap, fmt};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct AutoSortOptions {
    pub game: GameFamily,
    pub pass_limit: usize,
    pub separators: SeparatorPlacement,
}

impl AutoSortOptions {
    pub fn new(game: GameFamily) -> Self {
        Self {
            game,
            pass_limit: DEFAULT_SORT_PASS_LIMIT,
            separators: SeparatorPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortNotice {
    /// Mods that require each other were placed next to one another.
    CircularGroups(Vec<Vec<String>>),
    /// The pass limit was reached before the order settled. Not expected in
    /// practice: cycles are condensed into units first, and one pass with
    /// its n² move budget settles any condensed graph.
    NotConverged { passes: usize },
}

impl fmt::Display for SortNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortNotice::CircularGroups(groups) => {
                let listed: Vec<String> = groups.iter().map(|group| group.join(" <-> ")).collect();
                write!(
                    f,
                    "Circular dependencies were kept together: {}",
                    listed.join("; ")
                )
            }
            SortNotice::NotConverged { passes } => write!(
                f,
                "Complex dependency network could not be fully ordered after {passes} passes"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoSortReport {
    pub moved: usize,
    pub circular_groups: usize,
    pub passes: usize,
    pub converged: bool,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct AutoSortResult {
    pub entries: Vec<Entry>,
    pub order: Vec<OrderRecord>,
    pub report: AutoSortReport,
    pub notices: Vec<SortNotice>,
}

/// A mod, or every member of one dependency cycle, moved as a block.
#[derive(Debug)]
struct Unit<'a> {
    members: Vec<&'a ModEntry>,
    requires: Vec<usize>,
}

pub fn reset_load_order(entries: &[Entry], options: &AutoSortOptions) -> AutoSortResult {
    let mut base: Vec<&ModEntry> = sequence::mods(entries).collect();
    base.sort_by(|a, b| options.game.compare_base_order(a, b));

    let graph = DependencyGraph::new(base.iter().copied());
    let groups = graph.circular_groups();
    let mut units = build_units(&base, &groups);
    link_units(&mut units);

    let pass_limit = options.pass_limit.max(1);
    let (order, passes, converged) = resolve(&units, pass_limit);

    let resolved: Vec<&ModEntry> = order
        .iter()
        .flat_map(|unit| units[*unit].members.iter().copied())
        .collect();
    let sorted = place_separators(entries, &resolved, options.separators);

    let mut notices = Vec::new();
    if !groups.is_empty() {
        let listed: Vec<Vec<String>> = groups
            .iter()
            .map(|group| group.iter().map(|id| id.to_string()).collect())
            .collect();
        notices.push(SortNotice::CircularGroups(listed));
    }
    if !converged {
        warn!(passes, "auto-sort stopped before the order settled");
        notices.push(SortNotice::NotConverged { passes });
    }

    let moved = entries
        .iter()
        .zip(sorted.iter())
        .filter(|(a, b)| a.identifier() != b.identifier())
        .count();
    debug!(
        moved,
        passes,
        circular_groups = groups.len(),
        "auto-sort finished"
    );

    let order = sequence::order_records(&sorted);
    AutoSortResult {
        report: AutoSortReport {
            moved,
            circular_groups: groups.len(),
            passes,
            converged,
            total: entries.len(),
        },
        entries: sorted,
        order,
        notices,
    }
}

fn build_units<'a>(base: &[&'a ModEntry], groups: &[Vec<&'a str>]) -> Vec<Unit<'a>> {
    let mut group_of: HashMap<&str, usize> = HashMap::new();
    for (index, group) in groups.iter().enumerate() {
        for member in group {
            group_of.insert(*member, index);
        }
    }
    let by_id: HashMap<&str, &'a ModEntry> = base
        .iter()
        .map(|entry| (entry.identifier.as_str(), *entry))
        .collect();

    let mut placed = vec![false; groups.len()];
    let mut units = Vec::with_capacity(base.len());
    for entry in base {
        match group_of.get(entry.identifier.as_str()) {
            Some(&group) if placed[group] => {}
            Some(&group) => {
                placed[group] = true;
                let members = groups[group]
                    .iter()
                    .filter_map(|id| by_id.get(id).copied())
                    .collect();
                units.push(Unit {
                    members,
                    requires: Vec::new(),
                });
            }
            None => units.push(Unit {
                members: vec![*entry],
                requires: Vec::new(),
            }),
        }
    }
    units
}

fn link_units(units: &mut [Unit<'_>]) {
    let mut unit_of: HashMap<String, usize> = HashMap::new();
    for (index, unit) in units.iter().enumerate() {
        for member in &unit.members {
            unit_of.insert(member.identifier.clone(), index);
        }
    }
    for (index, unit) in units.iter_mut().enumerate() {
        let mut requires = Vec::new();
        for member in &unit.members {
            for required in &member.required_items {
                let Some(&target) = unit_of.get(required) else {
                    continue;
                };
                if target != index && !requires.contains(&target) {
                    requires.push(target);
                }
            }
        }
        unit.requires = requires;
    }
}

/// Repeated passes over the units; a late dependency is spliced in front of
/// its dependent and the scan resumes on the spliced unit.
fn resolve(units: &[Unit<'_>], pass_limit: usize) -> (Vec<usize>, usize, bool) {
    let mut order: Vec<usize> = (0..units.len()).collect();
    let mut position: Vec<usize> = (0..units.len()).collect();
    let mut passes = 0usize;
    let mut converged = false;

    while passes < pass_limit {
        passes += 1;
        let mut changed = false;
        let mut budget = units.len().saturating_mul(units.len()).max(1);
        let mut cursor = 0usize;
        while cursor < order.len() {
            let unit = order[cursor];
            let late = units[unit]
                .requires
                .iter()
                .copied()
                .filter(|dependency| position[*dependency] > cursor)
                .min_by_key(|dependency| position[*dependency]);
            match late {
                Some(dependency) if budget > 0 => {
                    budget -= 1;
                    let from = position[dependency];
                    order.remove(from);
                    order.insert(cursor, dependency);
                    for (index, moved) in order.iter().enumerate().take(from + 1).skip(cursor) {
                        position[*moved] = index;
                    }
                    changed = true;
                }
                _ => cursor += 1,
            }
        }
        if !changed {
            converged = true;
            break;
        }
    }

    if !converged {
        converged = units.iter().enumerate().all(|(unit, data)| {
            data.requires
                .iter()
                .all(|dependency| position[*dependency] < position[unit])
        });
    }

    (order, passes, converged)
}

fn place_separators(
    entries: &[Entry],
    resolved: &[&ModEntry],
    placement: SeparatorPlacement,
) -> Vec<Entry> {
    let mut sorted: Vec<Entry> = Vec::with_capacity(entries.len());
    match placement {
        SeparatorPlacement::Append => {
            sorted.extend(resolved.iter().map(|entry| Entry::Mod((*entry).clone())));
            sorted.extend(entries.iter().filter(|entry| entry.is_separator()).cloned());
        }
        SeparatorPlacement::Anchor => {
            let mut anchored: HashMap<&str, Vec<&Entry>> = HashMap::new();
            let mut trailing: Vec<&Entry> = Vec::new();
            for (index, entry) in entries.iter().enumerate() {
                if !entry.is_separator() {
                    continue;
                }
                let anchor = entries[index + 1..].iter().find_map(Entry::as_mod);
                match anchor {
                    Some(anchor) => anchored
                        .entry(anchor.identifier.as_str())
                        .or_default()
                        .push(entry),
                    None => trailing.push(entry),
                }
            }
            for entry in resolved {
                if let Some(separators) = anchored.get(entry.identifier.as_str()) {
                    sorted.extend(separators.iter().map(|separator| (*separator).clone()));
                }
                sorted.push(Entry::Mod((*entry).clone()));
            }
            sorted.extend(trailing.into_iter().cloned());
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sequence::tests::{ids, sep},
        violations::detect_violations,
    };
    use proptest::prelude::*;

    fn timed(id: &str, created_at: i64, requires: &[&str]) -> Entry {
        Entry::Mod(
            ModEntry::new(id, id)
                .with_required_items(requires)
                .with_created_at(created_at),
        )
    }

    fn options() -> AutoSortOptions {
        AutoSortOptions::new(GameFamily::Bannerlord)
    }

    #[test]
    fn dependencies_are_pulled_before_dependents() {
        let entries = vec![
            timed("c", 1, &["b"]),
            timed("b", 2, &["a"]),
            timed("a", 3, &[]),
            sep("s1"),
        ];
        let result = reset_load_order(&entries, &options());
        assert_eq!(ids(&result.entries), vec!["a", "b", "c", "s1"]);
        assert!(result.report.converged);
        assert!(result.notices.is_empty());
        assert!(detect_violations(&result.entries).is_empty());
        assert_eq!(result.order.last().unwrap().order, 4);
    }

    #[test]
    fn independent_mods_follow_base_order() {
        let entries = vec![timed("late", 9, &[]), timed("early", 1, &[])];
        let result = reset_load_order(&entries, &options());
        assert_eq!(ids(&result.entries), vec!["early", "late"]);
        assert_eq!(result.report.moved, 2);
    }

    #[test]
    fn pack_names_drive_total_war_base_order() {
        let entries = vec![
            Entry::Mod(ModEntry::new("b", "B").with_pack_file("mods/beta.pack")),
            Entry::Mod(ModEntry::new("a", "A").with_pack_file("mods/Alpha.pack")),
        ];
        let result = reset_load_order(&entries, &AutoSortOptions::new(GameFamily::TotalWar));
        assert_eq!(ids(&result.entries), vec!["a", "b"]);
    }

    #[test]
    fn circular_pair_is_clustered_and_reported() {
        let entries = vec![
            timed("x", 1, &["y"]),
            timed("m", 2, &[]),
            timed("y", 3, &["x"]),
            timed("z", 4, &["y"]),
        ];
        let result = reset_load_order(&entries, &options());
        assert_eq!(ids(&result.entries), vec!["x", "y", "m", "z"]);
        assert_eq!(result.report.circular_groups, 1);
        assert!(matches!(
            &result.notices[..],
            [SortNotice::CircularGroups(groups)] if groups == &vec![vec!["x".to_string(), "y".to_string()]]
        ));
        assert!(detect_violations(&result.entries).is_empty());
    }

    #[test]
    fn cycle_cluster_is_pulled_in_front_of_its_dependents() {
        let entries = vec![
            timed("user", 1, &["p"]),
            timed("p", 2, &["q"]),
            timed("q", 3, &["r"]),
            timed("r", 4, &["p"]),
        ];
        let result = reset_load_order(&entries, &options());
        assert_eq!(ids(&result.entries), vec!["p", "q", "r", "user"]);
        assert!(result.report.converged);
    }

    #[test]
    fn anchored_separators_stay_with_their_first_child() {
        let entries = vec![
            sep("core"),
            timed("b", 2, &["a"]),
            sep("extras"),
            timed("a", 1, &[]),
            sep("empty"),
        ];
        let mut options = options();
        options.separators = SeparatorPlacement::Anchor;
        let result = reset_load_order(&entries, &options);
        assert_eq!(ids(&result.entries), vec!["extras", "a", "core", "b", "empty"]);
    }

    #[test]
    fn single_pass_resolves_condensed_graph() {
        let entries = vec![timed("c", 1, &["b"]), timed("b", 2, &["a"]), timed("a", 3, &[])];
        let mut options = options();
        options.pass_limit = 1;
        let result = reset_load_order(&entries, &options);
        assert_eq!(ids(&result.entries), vec!["a", "b", "c"]);
        assert!(result.report.converged);
        assert_eq!(result.report.passes, 1);
        assert!(result.notices.is_empty());
    }

    fn dag_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
        (2usize..30).prop_flat_map(|count| {
            let edges = prop::collection::vec(prop::collection::vec(0..count, 0..4), count);
            let order = Just((0..count).collect::<Vec<usize>>()).prop_shuffle();
            (edges, order)
        })
    }

    proptest! {
        #[test]
        fn acyclic_graphs_sort_without_violations((edges, order) in dag_strategy()) {
            let entries: Vec<Entry> = order
                .iter()
                .map(|index| {
                    let requires: Vec<String> = edges[*index]
                        .iter()
                        .filter(|target| **target < *index)
                        .map(|target| format!("m{target}"))
                        .collect();
                    let requires: Vec<&str> = requires.iter().map(String::as_str).collect();
                    timed(&format!("m{index}"), (*index as i64 * 7) % 5, &requires)
                })
                .collect();
            let result = reset_load_order(&entries, &options());
            prop_assert!(result.report.converged);
            prop_assert!(result.report.passes <= DEFAULT_SORT_PASS_LIMIT);
            prop_assert!(detect_violations(&result.entries).is_empty());
            prop_assert_eq!(result.entries.len(), entries.len());
        }
    }
}
