//! Drag-and-drop reordering of the load order.
//!
//! Every function returns `None` when the gesture does not change the
//! sequence, so callers can skip persistence.

use crate::{
    error::{Error, Result},
    sequence::{self, Entry, OrderRecord},
};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reordered {
    pub entries: Vec<Entry>,
    pub order: Vec<OrderRecord>,
}

impl Reordered {
    fn from_entries(entries: Vec<Entry>) -> Self {
        let order = sequence::order_records(&entries);
        Self { entries, order }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Single,
    Group,
    CollapsedSection,
}

/// Picks the move flavour for a finished drag.
pub fn drag_kind(entries: &[Entry], active: &str, selection: &HashSet<String>) -> DragKind {
    if selection.contains(active) && selection.len() > 1 {
        return DragKind::Group;
    }
    match sequence::find(entries, active) {
        Some(entry) if entry.is_collapsed_separator() => DragKind::CollapsedSection,
        _ => DragKind::Single,
    }
}

pub fn drag_end(
    entries: &[Entry],
    active: &str,
    over: Option<&str>,
    selection: &HashSet<String>,
) -> Option<Reordered> {
    let over = over?;
    if active == over {
        return None;
    }
    match drag_kind(entries, active, selection) {
        DragKind::Group => move_group(entries, selection, over),
        DragKind::CollapsedSection => move_collapsed_section(entries, active, over),
        DragKind::Single => move_single(entries, active, over),
    }
}

/// Moves one entry to the index currently held by `target`.
pub fn move_single(entries: &[Entry], active: &str, target: &str) -> Option<Reordered> {
    let from = sequence::index_of(entries, active)?;
    let to = sequence::index_of(entries, target)?;
    move_index(entries, from, to)
}

fn move_index(entries: &[Entry], from: usize, to: usize) -> Option<Reordered> {
    if from == to {
        return None;
    }
    let mut moved = entries.to_vec();
    let entry = moved.remove(from);
    moved.insert(to, entry);
    Some(Reordered::from_entries(moved))
}

/// Moves every selected mod as one contiguous block. Separators in the
/// selection are ignored and the block keeps its existing relative order.
pub fn move_group(
    entries: &[Entry],
    selection: &HashSet<String>,
    target: &str,
) -> Option<Reordered> {
    let selected: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.is_separator() && selection.contains(entry.identifier()))
        .map(|(index, _)| index)
        .collect();
    let last = *selected.last()?;
    let target_index = sequence::index_of(entries, target)?;
    if selected.binary_search(&target_index).is_ok() {
        return None;
    }
    let moving_down = target_index > last;

    let mut block = Vec::with_capacity(selected.len());
    let mut remaining = Vec::with_capacity(entries.len() - selected.len());
    for (index, entry) in entries.iter().enumerate() {
        if selected.binary_search(&index).is_ok() {
            block.push(entry.clone());
        } else {
            remaining.push(entry.clone());
        }
    }

    let mut insert_at = sequence::index_of(&remaining, target)?;
    if moving_down {
        insert_at += 1;
    }
    remaining.splice(insert_at..insert_at, block);

    let unchanged = remaining
        .iter()
        .zip(entries)
        .all(|(a, b)| a.identifier() == b.identifier());
    if unchanged {
        return None;
    }
    Some(Reordered::from_entries(remaining))
}

/// Moves a separator together with all of its children, hidden or not.
pub fn move_collapsed_section(entries: &[Entry], active: &str, target: &str) -> Option<Reordered> {
    let from = sequence::index_of(entries, active)?;
    let to = sequence::index_of(entries, target)?;
    if from == to {
        return None;
    }
    let end = sequence::section_end(entries, from);
    if to > from && to < end {
        return None;
    }
    let size = end - from;

    let mut moved = entries.to_vec();
    let section: Vec<Entry> = moved.drain(from..end).collect();
    let insert_at = if to > from { to - size + 1 } else { to };
    moved.splice(insert_at..insert_at, section);
    Some(Reordered::from_entries(moved))
}

/// Moves an entry to a 1-based position, clamped to the sequence length.
pub fn set_priority(entries: &[Entry], identifier: &str, priority: usize) -> Result<Option<Reordered>> {
    let from = sequence::index_of(entries, identifier)
        .ok_or_else(|| Error::UnknownEntry(identifier.to_string()))?;
    let to = priority.clamp(1, entries.len()) - 1;
    Ok(move_index(entries, from, to))
}

/// Moves a mod to the end of a separator's child range.
///
/// The mod gets the fractional order `next_separator - 0.5` (or one past the
/// last order when the separator is the last one) before everything is
/// renumbered.
pub fn send_to_separator(
    entries: &[Entry],
    mod_id: &str,
    separator_id: &str,
) -> Result<Option<Reordered>> {
    let mod_index = sequence::index_of(entries, mod_id)
        .ok_or_else(|| Error::UnknownEntry(mod_id.to_string()))?;
    if entries[mod_index].is_separator() {
        return Err(Error::NotAMod(mod_id.to_string()));
    }
    let separator_index = sequence::index_of(entries, separator_id)
        .ok_or_else(|| Error::UnknownEntry(separator_id.to_string()))?;
    if !entries[separator_index].is_separator() {
        return Err(Error::NotASeparator(separator_id.to_string()));
    }

    let order_of = |index: usize| (index + 1) as f64;
    let next_separator = entries
        .iter()
        .enumerate()
        .skip(separator_index + 1)
        .find(|(_, entry)| entry.is_separator())
        .map(|(index, _)| index);
    let new_order = match next_separator {
        Some(index) => order_of(index) - 0.5,
        None => order_of(entries.len()) + 1.0,
    };

    let mut keyed: Vec<(f64, &Entry)> = entries
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != mod_index)
        .map(|(index, entry)| (order_of(index), entry))
        .collect();
    keyed.push((new_order, &entries[mod_index]));
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let unchanged = keyed
        .iter()
        .zip(entries)
        .all(|((_, a), b)| a.identifier() == b.identifier());
    if unchanged {
        return Ok(None);
    }
    let moved = keyed.into_iter().map(|(_, entry)| entry.clone()).collect();
    Ok(Some(Reordered::from_entries(moved)))
}
