//! Win/lose classification of file conflicts between packs, derived from
//! load order only.

use crate::sequence::OrderRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Pack path to counterpart pack path to the conflicting descriptors.
/// Providers may list a pair in one direction only.
pub type ConflictIndex = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSide {
    /// Descriptors keyed by the title of the counterpart's owner.
    pub cases: BTreeMap<String, Vec<String>>,
    pub total: usize,
}

impl ConflictSide {
    fn add(&mut self, owner: &str, descriptors: &[String]) {
        self.total += descriptors.len();
        self.cases
            .entry(owner.to_string())
            .or_default()
            .extend(descriptors.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub win: ConflictSide,
    pub lose: ConflictSide,
}

pub fn classify(
    pack_file_path: Option<&str>,
    order: &[OrderRecord],
    index: &ConflictIndex,
) -> ConflictSummary {
    let mut summary = ConflictSummary::default();
    let Some(pack_file_path) = pack_file_path else {
        return summary;
    };
    let owners: HashMap<&str, &OrderRecord> = order
        .iter()
        .filter_map(|record| Some((record.pack_file_path.as_deref()?, record)))
        .collect();
    let Some(own) = owners.get(pack_file_path) else {
        return summary;
    };

    for (counterpart, descriptors) in counterparts(pack_file_path, index) {
        if counterpart == pack_file_path {
            continue;
        }
        let Some(owner) = owners.get(counterpart) else {
            continue;
        };
        if owner.order < own.order {
            summary.win.add(&owner.title, &descriptors);
        } else {
            summary.lose.add(&owner.title, &descriptors);
        }
    }
    summary
}

/// Counterparts listed under this pack or listing it, descriptors merged
/// without duplicates.
fn counterparts<'a>(
    pack_file_path: &str,
    index: &'a ConflictIndex,
) -> BTreeMap<&'a str, Vec<String>> {
    let mut merged: BTreeMap<&'a str, Vec<String>> = BTreeMap::new();
    let mut merge = |counterpart: &'a str, descriptors: &[String]| {
        let slot = merged.entry(counterpart).or_default();
        for descriptor in descriptors {
            if !slot.contains(descriptor) {
                slot.push(descriptor.clone());
            }
        }
    };

    if let Some(forward) = index.get(pack_file_path) {
        for (counterpart, descriptors) in forward {
            merge(counterpart.as_str(), descriptors);
        }
    }
    for (other, listed) in index {
        if let Some(descriptors) = listed.get(pack_file_path) {
            merge(other.as_str(), descriptors);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(id: &str, order: u32, pack: &str) -> OrderRecord {
        OrderRecord {
            identifier: id.to_string(),
            order,
            title: id.to_uppercase(),
            pack_file_path: Some(pack.to_string()),
        }
    }

    fn conflict_index(pairs: &[(&str, &str, &[&str])]) -> ConflictIndex {
        let mut index = ConflictIndex::new();
        for (from, to, descriptors) in pairs {
            index.entry(from.to_string()).or_default().insert(
                to.to_string(),
                descriptors.iter().map(|value| value.to_string()).collect(),
            );
        }
        index
    }

    #[test]
    fn earlier_counterpart_is_overridden() {
        let index = conflict_index(&[("A.pack", "B.pack", &["x"])]);
        let order = vec![record("a", 2, "A.pack"), record("b", 5, "B.pack")];

        let a = classify(Some("A.pack"), &order, &index);
        assert_eq!(a.lose.total, 1);
        assert!(a.win.is_empty());
        assert_eq!(a.lose.cases["B"], vec!["x".to_string()]);

        // B has no entry of its own in the index; the reverse listing counts.
        let b = classify(Some("B.pack"), &order, &index);
        assert_eq!(b.win.total, 1);
        assert_eq!(b.win.cases["A"], vec!["x".to_string()]);
    }

    #[test]
    fn unknown_packs_and_owners_contribute_nothing() {
        let index = conflict_index(&[
            ("A.pack", "ghost.pack", &["x"]),
            ("A.pack", "B.pack", &["y", "z"]),
        ]);
        let order = vec![record("a", 9, "A.pack"), record("b", 1, "B.pack")];
        let a = classify(Some("A.pack"), &order, &index);
        assert_eq!(a.win.total, 2);
        assert!(a.lose.is_empty());
        assert_eq!(classify(None, &order, &index), ConflictSummary::default());
        assert_eq!(classify(Some("C.pack"), &order, &index), ConflictSummary::default());
    }

    #[test]
    fn descriptors_listed_both_ways_count_once() {
        let index = conflict_index(&[
            ("A.pack", "B.pack", &["x"]),
            ("B.pack", "A.pack", &["x", "y"]),
        ]);
        let order = vec![record("a", 1, "A.pack"), record("b", 2, "B.pack")];
        let a = classify(Some("A.pack"), &order, &index);
        assert_eq!(a.lose.total, 2);
    }

    proptest! {
        #[test]
        fn exactly_one_side_wins_and_swapping_flips_it(
            first in 1u32..100,
            second in 1u32..100,
            forward in any::<bool>(),
        ) {
            prop_assume!(first != second);
            let index = if forward {
                conflict_index(&[("A.pack", "B.pack", &["x"])])
            } else {
                conflict_index(&[("B.pack", "A.pack", &["x"])])
            };
            let order = vec![record("a", first, "A.pack"), record("b", second, "B.pack")];
            let a = classify(Some("A.pack"), &order, &index);
            let b = classify(Some("B.pack"), &order, &index);
            prop_assert_eq!(a.win.total + b.win.total, 1);
            prop_assert_eq!(a.lose.total + b.lose.total, 1);
            prop_assert_eq!(a.win.total == 1, first > second);

            let swapped = vec![record("a", second, "A.pack"), record("b", first, "B.pack")];
            let flipped = classify(Some("A.pack"), &swapped, &index);
            prop_assert_eq!(flipped.win.total, a.lose.total);
        }
    }
}
