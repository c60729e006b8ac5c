use crate::{
    error::{Error, Result},
    graph::{DependencyGraph, Direction},
    sequence::{self, Entry, ModEntry},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub identifier: String,
    pub is_active: bool,
    #[serde(default)]
    pub title: String,
}

impl ActivationRecord {
    pub fn new(entry: &ModEntry, is_active: bool) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            is_active,
            title: entry.title.clone(),
        }
    }
}

pub fn is_active(activation: &[ActivationRecord], identifier: &str) -> bool {
    activation
        .iter()
        .any(|record| record.identifier == identifier && record.is_active)
}

/// Mods that change state together with `identifier`: its dependencies when
/// activating, its dependents when deactivating.
pub fn cascade<'a>(entries: &'a [Entry], identifier: &str, activate: bool) -> Vec<&'a ModEntry> {
    let direction = if activate {
        Direction::Dependencies
    } else {
        Direction::Dependents
    };
    DependencyGraph::new(sequence::mods(entries)).closure(identifier, direction)
}

/// Sets `identifier` and its cascade to `desired`, as one replacement of the
/// activation collection.
pub fn set_with_cascade(
    entries: &[Entry],
    activation: &[ActivationRecord],
    identifier: &str,
    desired: bool,
) -> Result<Vec<ActivationRecord>> {
    if sequence::find_mod(entries, identifier).is_none() {
        return Err(match sequence::find(entries, identifier) {
            Some(_) => Error::NotAMod(identifier.to_string()),
            None => Error::UnknownEntry(identifier.to_string()),
        });
    }
    let mut affected: HashSet<&str> = cascade(entries, identifier, desired)
        .into_iter()
        .map(|entry| entry.identifier.as_str())
        .collect();
    affected.insert(identifier);
    Ok(apply(activation, |id| affected.contains(id).then_some(desired)))
}

/// True when every mod under the separator is active. A separator without
/// children counts as all active.
pub fn all_children_active(
    entries: &[Entry],
    activation: &[ActivationRecord],
    separator_id: &str,
) -> Result<bool> {
    Ok(sequence::child_mods(entries, separator_id)?
        .iter()
        .all(|entry| is_active(activation, &entry.identifier)))
}

pub fn toggle_separator(
    entries: &[Entry],
    activation: &[ActivationRecord],
    separator_id: &str,
) -> Result<Vec<ActivationRecord>> {
    let desired = !all_children_active(entries, activation, separator_id)?;
    let children: HashSet<&str> = sequence::child_mods(entries, separator_id)?
        .into_iter()
        .map(|entry| entry.identifier.as_str())
        .collect();
    Ok(apply(activation, |id| children.contains(id).then_some(desired)))
}

/// Activates everything unless everything already is active.
pub fn toggle_all(activation: &[ActivationRecord]) -> Vec<ActivationRecord> {
    let desired = activation.iter().any(|record| !record.is_active);
    apply(activation, |_| Some(desired))
}

/// Required mods of an active mod that are missing or switched off.
pub fn inactive_requirements<'a>(
    entries: &[Entry],
    activation: &[ActivationRecord],
    mod_entry: &'a ModEntry,
) -> Vec<&'a str> {
    if !is_active(activation, &mod_entry.identifier) {
        return Vec::new();
    }
    mod_entry
        .required_items
        .iter()
        .filter(|required| {
            sequence::find_mod(entries, required).is_none() || !is_active(activation, required)
        })
        .map(String::as_str)
        .collect()
}

/// Brings a persisted activation collection in line with the catalogue.
/// Returns the records and whether they differ from what was stored.
pub fn reconcile(
    entries: &[Entry],
    stored: Option<Vec<ActivationRecord>>,
) -> (Vec<ActivationRecord>, bool) {
    let Some(stored) = stored else {
        let fresh = sequence::mods(entries)
            .map(|entry| ActivationRecord::new(entry, true))
            .collect();
        return (fresh, true);
    };

    let known: HashMap<&str, bool> = stored
        .iter()
        .map(|record| (record.identifier.as_str(), record.is_active))
        .collect();
    let mut changed = false;
    let records: Vec<ActivationRecord> = sequence::mods(entries)
        .map(|entry| match known.get(entry.identifier.as_str()) {
            Some(&active) => ActivationRecord::new(entry, active),
            None => {
                changed = true;
                ActivationRecord::new(entry, false)
            }
        })
        .collect();
    let changed = changed || records.len() != stored.len();
    (records, changed)
}

fn apply<F>(activation: &[ActivationRecord], mut desired_for: F) -> Vec<ActivationRecord>
where
    F: FnMut(&str) -> Option<bool>,
{
    activation
        .iter()
        .map(|record| match desired_for(&record.identifier) {
            Some(is_active) => ActivationRecord {
                is_active,
                ..record.clone()
            },
            None => record.clone(),
        })
        .collect()
}
