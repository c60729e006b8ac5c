use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub required_items: Vec<String>,
    #[serde(default)]
    pub pack_file_path: Option<String>,
    #[serde(default)]
    pub pack_file_name: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl ModEntry {
    pub fn new(identifier: &str, title: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            required_items: Vec::new(),
            pack_file_path: None,
            pack_file_name: None,
            created_at: 0,
        }
    }

    pub fn with_required_items(mut self, required: &[&str]) -> Self {
        self.required_items = required.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_pack_file(mut self, path: &str) -> Self {
        self.pack_file_path = Some(path.to_string());
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn requires(&self, identifier: &str) -> bool {
        self.required_items.iter().any(|id| id == identifier)
    }

    /// File name used for launcher-style priority sorting.
    pub fn pack_file_name(&self) -> Option<&str> {
        if let Some(name) = self.pack_file_name.as_deref() {
            return Some(name);
        }
        let path = self.pack_file_path.as_deref()?;
        path.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatorEntry {
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub text_color: String,
}

impl SeparatorEntry {
    pub fn new(identifier: &str, title: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            collapsed: false,
            background_color: String::new(),
            text_color: String::new(),
        }
    }

    pub fn collapsed(mut self) -> Self {
        self.collapsed = true;
        self
    }
}

/// One row of the load order: a mod or a grouping separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Mod(ModEntry),
    Separator(SeparatorEntry),
}

impl Entry {
    pub fn identifier(&self) -> &str {
        match self {
            Entry::Mod(entry) => &entry.identifier,
            Entry::Separator(entry) => &entry.identifier,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Entry::Mod(entry) => &entry.title,
            Entry::Separator(entry) => &entry.title,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Entry::Separator(_))
    }

    pub fn is_collapsed_separator(&self) -> bool {
        matches!(self, Entry::Separator(entry) if entry.collapsed)
    }

    pub fn as_mod(&self) -> Option<&ModEntry> {
        match self {
            Entry::Mod(entry) => Some(entry),
            Entry::Separator(_) => None,
        }
    }

    pub fn as_separator(&self) -> Option<&SeparatorEntry> {
        match self {
            Entry::Separator(entry) => Some(entry),
            Entry::Mod(_) => None,
        }
    }

    pub fn pack_file_path(&self) -> Option<&str> {
        self.as_mod()
            .and_then(|entry| entry.pack_file_path.as_deref())
    }
}

impl From<ModEntry> for Entry {
    fn from(entry: ModEntry) -> Self {
        Entry::Mod(entry)
    }
}

impl From<SeparatorEntry> for Entry {
    fn from(entry: SeparatorEntry) -> Self {
        Entry::Separator(entry)
    }
}

/// Persisted `(identifier, order)` pair backing one sequence position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub identifier: String,
    pub order: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_file_path: Option<String>,
}

impl OrderRecord {
    pub fn for_entry(entry: &Entry, order: u32) -> Self {
        Self {
            identifier: entry.identifier().to_string(),
            order,
            title: entry.title().to_string(),
            pack_file_path: entry.pack_file_path().map(str::to_string),
        }
    }
}

/// Order records numbered `1..=N` by sequence position.
pub fn order_records(entries: &[Entry]) -> Vec<OrderRecord> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| OrderRecord::for_entry(entry, index as u32 + 1))
        .collect()
}

/// Stable sort by order value, then renumber to `1..=N`.
pub fn normalize(mut records: Vec<OrderRecord>) -> Vec<OrderRecord> {
    records.sort_by_key(|record| record.order);
    for (index, record) in records.iter_mut().enumerate() {
        record.order = index as u32 + 1;
    }
    records
}

pub fn is_normalized(records: &[OrderRecord]) -> bool {
    records
        .iter()
        .enumerate()
        .all(|(index, record)| record.order == index as u32 + 1)
}

/// Reorders entries to follow `records`; entries without a record keep their
/// relative order after the recorded ones.
pub fn apply_order(entries: Vec<Entry>, records: &[OrderRecord]) -> Vec<Entry> {
    let order_map: HashMap<&str, u32> = records
        .iter()
        .map(|record| (record.identifier.as_str(), record.order))
        .collect();
    let mut keyed: Vec<(u32, Entry)> = entries
        .into_iter()
        .map(|entry| {
            let order = order_map
                .get(entry.identifier())
                .copied()
                .unwrap_or(u32::MAX);
            (order, entry)
        })
        .collect();
    keyed.sort_by_key(|(order, _)| *order);
    keyed.into_iter().map(|(_, entry)| entry).collect()
}

/// Persisted orders kept for known entries, unknown entries appended after
/// the highest known value in catalogue order, then normalized. Without a
/// persisted order the catalogue position is the order. The flag reports
/// whether the result differs from what was stored.
pub fn reconcile_order(
    entries: &[Entry],
    stored: Option<Vec<OrderRecord>>,
) -> (Vec<OrderRecord>, bool) {
    let Some(stored) = stored else {
        return (order_records(entries), true);
    };
    let known: HashMap<&str, u32> = stored
        .iter()
        .map(|record| (record.identifier.as_str(), record.order))
        .collect();
    let mut next = stored.iter().map(|record| record.order).max().unwrap_or(0);
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let order = match known.get(entry.identifier()) {
            Some(&order) => order,
            None => {
                next += 1;
                next
            }
        };
        records.push(OrderRecord::for_entry(entry, order));
    }
    let records = normalize(records);
    let changed = records.len() != stored.len()
        || records
            .iter()
            .zip(&stored)
            .any(|(now, before)| now.identifier != before.identifier || now.order != before.order);
    (records, changed)
}

pub fn position_index(entries: &[Entry]) -> HashMap<&str, usize> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| (entry.identifier(), index))
        .collect()
}

pub fn index_of(entries: &[Entry], identifier: &str) -> Option<usize> {
    entries
        .iter()
        .position(|entry| entry.identifier() == identifier)
}

pub fn find<'a>(entries: &'a [Entry], identifier: &str) -> Option<&'a Entry> {
    entries.iter().find(|entry| entry.identifier() == identifier)
}

pub fn find_mod<'a>(entries: &'a [Entry], identifier: &str) -> Option<&'a ModEntry> {
    find(entries, identifier).and_then(Entry::as_mod)
}

pub fn mods(entries: &[Entry]) -> impl Iterator<Item = &ModEntry> {
    entries.iter().filter_map(Entry::as_mod)
}

pub fn validate_unique(entries: &[Entry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.identifier()) {
            return Err(Error::DuplicateIdentifier(entry.identifier().to_string()));
        }
    }
    Ok(())
}

/// End (exclusive) of the block starting at `start`: the next separator
/// after it, or the end of the sequence.
pub fn section_end(entries: &[Entry], start: usize) -> usize {
    entries
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, entry)| entry.is_separator())
        .map(|(index, _)| index)
        .unwrap_or(entries.len())
}

/// Index range of the mods owned by a separator.
pub fn child_range(entries: &[Entry], separator_id: &str) -> Result<Range<usize>> {
    let index = index_of(entries, separator_id)
        .ok_or_else(|| Error::UnknownEntry(separator_id.to_string()))?;
    if !entries[index].is_separator() {
        return Err(Error::NotASeparator(separator_id.to_string()));
    }
    Ok(index + 1..section_end(entries, index))
}

pub fn child_mods<'a>(entries: &'a [Entry], separator_id: &str) -> Result<Vec<&'a ModEntry>> {
    let range = child_range(entries, separator_id)?;
    Ok(entries[range].iter().filter_map(Entry::as_mod).collect())
}

/// Identifiers hidden behind collapsed separators. Nothing is hidden while a
/// search or activation filter is applied.
pub fn hidden_identifiers(entries: &[Entry], filtering: bool) -> HashSet<String> {
    let mut hidden = HashSet::new();
    if filtering {
        return hidden;
    }
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_collapsed_separator() {
            continue;
        }
        for child in &entries[index + 1..section_end(entries, index)] {
            hidden.insert(child.identifier().to_string());
        }
    }
    hidden
}

pub fn visible_entries(entries: &[Entry], filtering: bool) -> Vec<&Entry> {
    let hidden = hidden_identifiers(entries, filtering);
    entries
        .iter()
        .filter(|entry| !hidden.contains(entry.identifier()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn m(id: &str, requires: &[&str]) -> Entry {
        Entry::Mod(ModEntry::new(id, id).with_required_items(requires))
    }

    pub(crate) fn sep(id: &str) -> Entry {
        Entry::Separator(SeparatorEntry::new(id, id))
    }

    pub(crate) fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(Entry::identifier).collect()
    }

    #[test]
    fn child_range_stops_at_next_separator() {
        let entries = vec![sep("s1"), m("a", &[]), m("b", &[]), sep("s2"), m("c", &[])];
        assert_eq!(child_range(&entries, "s1").unwrap(), 1..3);
        assert_eq!(child_range(&entries, "s2").unwrap(), 4..5);
        assert!(matches!(
            child_range(&entries, "a"),
            Err(Error::NotASeparator(_))
        ));
    }

    #[test]
    fn collapsed_separator_hides_children_unless_filtering() {
        let mut collapsed = SeparatorEntry::new("s1", "Core");
        collapsed.collapsed = true;
        let entries = vec![
            Entry::Separator(collapsed),
            m("a", &[]),
            sep("s2"),
            m("b", &[]),
        ];
        let visible: Vec<&str> = visible_entries(&entries, false)
            .into_iter()
            .map(Entry::identifier)
            .collect();
        assert_eq!(visible, vec!["s1", "s2", "b"]);
        assert!(hidden_identifiers(&entries, true).is_empty());
    }

    #[test]
    fn apply_order_places_unknown_entries_last() {
        let entries = vec![m("a", &[]), m("b", &[]), m("c", &[])];
        let records = vec![
            OrderRecord::for_entry(&entries[2], 1),
            OrderRecord::for_entry(&entries[0], 2),
        ];
        let sorted = apply_order(entries, &records);
        assert_eq!(ids(&sorted), vec!["c", "a", "b"]);
    }

    #[test]
    fn reconcile_appends_new_entries_after_known_ones() {
        let entries = vec![m("new", &[]), m("a", &[]), m("b", &[])];
        let stored = vec![
            OrderRecord::for_entry(&entries[2], 4),
            OrderRecord::for_entry(&entries[1], 9),
            OrderRecord::for_entry(&m("gone", &[]), 12),
        ];
        let (records, changed) = reconcile_order(&entries, Some(stored));
        assert!(changed);
        let order: Vec<(&str, u32)> = records
            .iter()
            .map(|record| (record.identifier.as_str(), record.order))
            .collect();
        assert_eq!(order, vec![("b", 1), ("a", 2), ("new", 3)]);

        let (again, changed) = reconcile_order(&entries, Some(records.clone()));
        assert!(!changed);
        assert_eq!(again, records);

        let (fresh, changed) = reconcile_order(&entries, None);
        assert!(changed);
        assert_eq!(fresh[0].identifier, "new");
    }

    #[test]
    fn pack_file_name_falls_back_to_path() {
        let entry = ModEntry::new("a", "A").with_pack_file("C:\\mods\\data\\!first.pack");
        assert_eq!(entry.pack_file_name(), Some("!first.pack"));
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let entries = vec![m("a", &[]), sep("a")];
        assert!(matches!(
            validate_unique(&entries),
            Err(Error::DuplicateIdentifier(id)) if id == "a"
        ));
    }

    fn record(id: usize, order: u32) -> OrderRecord {
        OrderRecord {
            identifier: format!("m{id}"),
            order,
            title: String::new(),
            pack_file_path: None,
        }
    }

    proptest! {
        #[test]
        fn normalize_is_total_and_idempotent(orders in prop::collection::vec(0u32..50, 0..40)) {
            let records: Vec<OrderRecord> = orders
                .iter()
                .enumerate()
                .map(|(index, order)| record(index, *order))
                .collect();
            let normalized = normalize(records);
            let values: Vec<u32> = normalized.iter().map(|record| record.order).collect();
            let expected: Vec<u32> = (1..=orders.len() as u32).collect();
            prop_assert_eq!(values, expected);
            prop_assert!(is_normalized(&normalized));
            prop_assert_eq!(normalize(normalized.clone()), normalized);
        }
    }
}
