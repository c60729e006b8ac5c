//! The `requires` relation between mods of one sequence.
//!
//! Edges pointing at identifiers that are not in the sequence are dropped
//! here; callers that care about missing mods look at `required_items`
//! directly.

use crate::sequence::ModEntry;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Mods this mod requires, transitively.
    Dependencies,
    /// Mods that require this mod, transitively.
    Dependents,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph<'a> {
    mods: Vec<&'a ModEntry>,
    index: HashMap<&'a str, usize>,
    edges: Vec<Vec<usize>>,
    reverse: Vec<Vec<usize>>,
    component: Vec<usize>,
    component_sizes: Vec<usize>,
}

impl<'a> DependencyGraph<'a> {
    pub fn new<I>(mods: I) -> Self
    where
        I: IntoIterator<Item = &'a ModEntry>,
    {
        let mods: Vec<&'a ModEntry> = mods.into_iter().collect();
        let index: HashMap<&'a str, usize> = mods
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.identifier.as_str(), position))
            .collect();

        let mut edges = vec![Vec::new(); mods.len()];
        let mut reverse = vec![Vec::new(); mods.len()];
        for (from, entry) in mods.iter().enumerate() {
            for required in &entry.required_items {
                let Some(&to) = index.get(required.as_str()) else {
                    continue;
                };
                if !edges[from].contains(&to) {
                    edges[from].push(to);
                    reverse[to].push(from);
                }
            }
        }

        let component = strongly_connected(&edges);
        let count = component.iter().copied().max().map_or(0, |max| max + 1);
        let mut component_sizes = vec![0usize; count];
        for id in &component {
            component_sizes[*id] += 1;
        }

        Self {
            mods,
            index,
            edges,
            reverse,
            component,
            component_sizes,
        }
    }

    /// True when both mods sit on one dependency cycle, so no linear order can
    /// satisfy them both.
    pub fn is_circular(&self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        match (self.index.get(a), self.index.get(b)) {
            (Some(&a), Some(&b)) => {
                let component = self.component[a];
                component == self.component[b] && self.component_sizes[component] > 1
            }
            _ => false,
        }
    }

    /// Cycle groups with more than one member, members in sequence order,
    /// groups ordered by their first member.
    pub fn circular_groups(&self) -> Vec<Vec<&'a str>> {
        let mut groups: Vec<Vec<&'a str>> = Vec::new();
        let mut slot: HashMap<usize, usize> = HashMap::new();
        for (position, entry) in self.mods.iter().enumerate() {
            let component = self.component[position];
            if self.component_sizes[component] < 2 {
                continue;
            }
            let group = *slot.entry(component).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push(entry.identifier.as_str());
        }
        groups
    }

    /// Transitive closure in one direction, excluding the start mod, in
    /// sequence order. Cycles are walked once.
    pub fn closure(&self, identifier: &str, direction: Direction) -> Vec<&'a ModEntry> {
        let Some(&start) = self.index.get(identifier) else {
            return Vec::new();
        };
        let adjacency = match direction {
            Direction::Dependencies => &self.edges,
            Direction::Dependents => &self.reverse,
        };
        let mut visited: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            for next in &adjacency[current] {
                if visited.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        visited.remove(&start);
        let mut found: Vec<usize> = visited.into_iter().collect();
        found.sort_unstable();
        found.into_iter().map(|position| self.mods[position]).collect()
    }

    /// Mods that list `identifier` in their own `required_items`.
    pub fn direct_dependents(&self, identifier: &str) -> Vec<&'a ModEntry> {
        let Some(&position) = self.index.get(identifier) else {
            return Vec::new();
        };
        let mut found = self.reverse[position].clone();
        found.sort_unstable();
        found.into_iter().map(|position| self.mods[position]).collect()
    }
}

/// Tarjan's algorithm without recursion; returns a component id per node.
fn strongly_connected(edges: &[Vec<usize>]) -> Vec<usize> {
    let count = edges.len();
    let mut next_index = 0usize;
    let mut indices: Vec<Option<usize>> = vec![None; count];
    let mut lowlink = vec![0usize; count];
    let mut on_stack = vec![false; count];
    let mut stack: Vec<usize> = Vec::new();
    let mut component = vec![usize::MAX; count];
    let mut next_component = 0usize;

    for root in 0..count {
        if indices[root].is_some() {
            continue;
        }
        indices[root] = Some(next_index);
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if frame.1 < edges[node].len() {
                let next = edges[node][frame.1];
                frame.1 += 1;
                match indices[next] {
                    None => {
                        indices[next] = Some(next_index);
                        lowlink[next] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        frames.push((next, 0));
                    }
                    Some(index) if on_stack[next] => {
                        lowlink[node] = lowlink[node].min(index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(parent) = frames.last() {
                lowlink[parent.0] = lowlink[parent.0].min(lowlink[node]);
            }
            if Some(lowlink[node]) == indices[node] {
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component[member] = next_component;
                    if member == node {
                        break;
                    }
                }
                next_component += 1;
            }
        }
    }

    component
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mods(layout: &[(&str, &[&str])]) -> Vec<ModEntry> {
        layout.iter()
            .map(|(id, requires)| ModEntry::new(id, id).with_required_items(requires))
            .collect()
    }

    fn names(found: &[&ModEntry]) -> Vec<String> {
        found.iter().map(|entry| entry.identifier.clone()).collect()
    }

    #[test]
    fn mutual_requirement_is_circular() {
        let list = mods(&[("a", &["b"]), ("b", &["a"]), ("c", &["a"])]);
        let graph = DependencyGraph::new(&list);
        assert!(graph.is_circular("a", "b"));
        assert!(graph.is_circular("b", "a"));
        assert!(!graph.is_circular("c", "a"));
        assert_eq!(graph.circular_groups(), vec![vec!["a", "b"]]);
    }

    #[test]
    fn longer_cycles_are_detected() {
        let list = mods(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        let graph = DependencyGraph::new(&list);
        assert!(graph.is_circular("a", "c"));
        assert!(!graph.is_circular("a", "d"));
        assert_eq!(graph.circular_groups(), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn self_requirement_is_not_a_cycle_group() {
        let list = mods(&[("a", &["a"])]);
        let graph = DependencyGraph::new(&list);
        assert!(graph.circular_groups().is_empty());
        assert!(!graph.is_circular("a", "a"));
    }

    #[test]
    fn closures_walk_both_directions() {
        let list = mods(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &["missing"])]);
        let graph = DependencyGraph::new(&list);
        assert_eq!(names(&graph.closure("c", Direction::Dependencies)), vec!["a", "b"]);
        assert_eq!(names(&graph.closure("a", Direction::Dependents)), vec!["b", "c"]);
        assert!(graph.closure("d", Direction::Dependencies).is_empty());
        assert_eq!(names(&graph.direct_dependents("a")), vec!["b"]);
    }

    #[test]
    fn closure_terminates_on_cycles() {
        let list = mods(&[("a", &["b"]), ("b", &["a"])]);
        let graph = DependencyGraph::new(&list);
        assert_eq!(names(&graph.closure("a", Direction::Dependencies)), vec!["b"]);
        assert_eq!(names(&graph.closure("a", Direction::Dependents)), vec!["b"]);
    }
}
