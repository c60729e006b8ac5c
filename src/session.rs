//! The load-order session: the in-memory collections of one game profile,
//! the gestures that mutate them and the write-back that persists them.

use crate::{
    activation::{self, ActivationRecord},
    auto_sort::{self, AutoSortOptions, AutoSortReport, SortNotice},
    config::{
        GameConfig, SeparatorPlacement, SortBy, DEFAULT_SORT_PASS_LIMIT, DEFAULT_SYNC_DEBOUNCE_MS,
    },
    conflicts::{self, ConflictIndex, ConflictSummary},
    error::{Error, Result},
    game::GameFamily,
    graph::{DependencyGraph, Direction},
    reorder::{self, Reordered},
    sequence::{self, Entry, ModEntry, OrderRecord, SeparatorEntry},
    store::{self, MetaRecord, Record, RecordStore, ScopeKey, SeparatorRecord, Slice},
    sync::{ChangeSync, SyncFailure},
    violations::{self, Violations},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashSet,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

const NOTICE_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub game: GameFamily,
    pub profile: u64,
    pub sort_by: SortBy,
    pub debounce: Duration,
    pub sort_pass_limit: usize,
    pub separator_placement: SeparatorPlacement,
}

impl SessionOptions {
    pub fn new(game: GameFamily, profile: u64) -> Self {
        Self {
            game,
            profile,
            sort_by: SortBy::default(),
            debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            sort_pass_limit: DEFAULT_SORT_PASS_LIMIT,
            separator_placement: SeparatorPlacement::default(),
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            game: config.game,
            profile: config.active_profile,
            sort_by: config.sort_by,
            debounce: Duration::from_millis(config.sync_debounce_ms),
            sort_pass_limit: config.sort_pass_limit,
            separator_placement: config.separator_placement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

/// User-facing message raised by a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ResetOutcome {
    pub report: AutoSortReport,
    pub warnings: Vec<SortNotice>,
}

pub struct Session<S> {
    options: SessionOptions,
    entries: Vec<Entry>,
    order: Vec<OrderRecord>,
    activation: Vec<ActivationRecord>,
    meta: Vec<MetaRecord>,
    conflicts: ConflictIndex,
    selection: HashSet<String>,
    selection_anchor: Option<String>,
    filtering: bool,
    notices: Vec<Notice>,
    sync: ChangeSync<S>,
}

impl<S: RecordStore> Session<S> {
    /// Builds the session from the current mod catalogue and whatever the
    /// store holds for the profile, reconciling the two.
    pub fn load(
        store: S,
        options: SessionOptions,
        mods: Vec<ModEntry>,
        conflicts: ConflictIndex,
    ) -> Result<Self> {
        let mut session = Self {
            options,
            entries: Vec::new(),
            order: Vec::new(),
            activation: Vec::new(),
            meta: Vec::new(),
            conflicts,
            selection: HashSet::new(),
            selection_anchor: None,
            filtering: false,
            notices: Vec::new(),
            sync: ChangeSync::new(store, options.debounce),
        };

        let stored_separators: Option<Vec<SeparatorRecord>> =
            session.load_slice(Slice::Separators)?;
        let separators_missing = stored_separators.is_none();
        let mut separators = stored_separators.unwrap_or_default();
        separators.sort_by_key(|record| record.order);
        let mut entries: Vec<Entry> = mods.iter().cloned().map(Entry::Mod).collect();
        entries.extend(separators.iter().map(|record| Entry::Separator(record.to_entry())));
        sequence::validate_unique(&entries)?;

        let (order, changed) =
            sequence::reconcile_order(&entries, session.load_slice(Slice::Order)?);
        if changed {
            session.persist_now(Slice::Order, &order);
        }
        session.entries = sequence::apply_order(entries, &order);
        session.order = order;

        let stored_activation = session.load_slice(Slice::Activation)?;
        let (activation, changed) = activation::reconcile(&session.entries, stored_activation);
        if changed {
            session.persist_now(Slice::Activation, &activation);
        }
        session.activation = activation;

        let stored_meta = session.load_slice(Slice::Meta)?;
        let meta_missing = stored_meta.is_none();
        let (meta, changed) = store::reconcile_meta(&mods, stored_meta);
        if changed || meta_missing {
            session.persist_now(Slice::Meta, &meta);
        }
        session.meta = meta;

        if separators_missing {
            let rows = store::separator_records(&session.entries);
            session.persist_now(Slice::Separators, &rows);
        }

        info!(
            game = options.game.as_str(),
            profile = options.profile,
            mods = mods.len(),
            separators = separators.len(),
            "session loaded"
        );
        Ok(session)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn order(&self) -> &[OrderRecord] {
        &self.order
    }

    pub fn activation(&self) -> &[ActivationRecord] {
        &self.activation
    }

    pub fn meta(&self) -> &[MetaRecord] {
        &self.meta
    }

    pub fn selection(&self) -> &HashSet<String> {
        &self.selection
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn sync(&self) -> &ChangeSync<S> {
        &self.sync
    }

    pub fn is_active(&self, identifier: &str) -> bool {
        activation::is_active(&self.activation, identifier)
    }

    pub fn set_sort_by(&mut self, sort_by: SortBy) {
        self.options.sort_by = sort_by;
    }

    /// Search or activation filters show collapsed children.
    pub fn set_filtering(&mut self, filtering: bool) {
        self.filtering = filtering;
    }

    pub fn visible_entries(&self) -> Vec<&Entry> {
        sequence::visible_entries(&self.entries, self.filtering)
    }

    pub fn violations(&self) -> Violations {
        violations::detect(&self.entries, self.options.sort_by)
    }

    pub fn conflicts_for(&self, identifier: &str) -> Result<ConflictSummary> {
        let entry = self.require_mod(identifier)?;
        Ok(conflicts::classify(
            entry.pack_file_path.as_deref(),
            &self.order,
            &self.conflicts,
        ))
    }

    /// Applies a finished drag. Returns whether the sequence changed.
    pub fn on_drag_end(&mut self, active: &str, over: Option<&str>) -> bool {
        if self.options.sort_by != SortBy::LoadOrder {
            debug!(active, "drag ignored outside load order view");
            return false;
        }
        match reorder::drag_end(&self.entries, active, over, &self.selection) {
            Some(reordered) => {
                self.apply_reorder(reordered);
                true
            }
            None => false,
        }
    }

    pub fn on_reset_load_order(&mut self) -> ResetOutcome {
        let options = AutoSortOptions {
            game: self.options.game,
            pass_limit: self.options.sort_pass_limit,
            separators: self.options.separator_placement,
        };
        let result = auto_sort::reset_load_order(&self.entries, &options);
        for notice in &result.notices {
            self.push_notice(NoticeLevel::Warn, notice.to_string());
        }
        self.push_notice(
            NoticeLevel::Info,
            format!(
                "Load order reset: {} of {} entries moved",
                result.report.moved, result.report.total
            ),
        );
        let outcome = ResetOutcome {
            report: result.report,
            warnings: result.notices,
        };
        self.apply_reorder(Reordered {
            entries: result.entries,
            order: result.order,
        });
        outcome
    }

    /// Sets a mod and its cascade to `desired`; for a separator, flips all
    /// of its children to the negation of "all active".
    pub fn on_toggle_activation(
        &mut self,
        identifier: &str,
        desired: bool,
    ) -> Result<&[ActivationRecord]> {
        let entry = sequence::find(&self.entries, identifier)
            .ok_or_else(|| Error::UnknownEntry(identifier.to_string()))?;
        let updated = if entry.is_separator() {
            activation::toggle_separator(&self.entries, &self.activation, identifier)?
        } else {
            let cascaded: Vec<String> = activation::cascade(&self.entries, identifier, desired)
                .into_iter()
                .filter(|entry| self.is_active(&entry.identifier) != desired)
                .map(|entry| entry.title.clone())
                .collect();
            if !cascaded.is_empty() {
                let verb = if desired { "enabled" } else { "disabled" };
                self.push_notice(
                    NoticeLevel::Info,
                    format!("Also {verb}: {}", cascaded.join(", ")),
                );
            }
            activation::set_with_cascade(&self.entries, &self.activation, identifier, desired)?
        };
        self.replace_activation(updated);
        Ok(&self.activation)
    }

    pub fn toggle_all(&mut self) -> &[ActivationRecord] {
        let updated = activation::toggle_all(&self.activation);
        self.replace_activation(updated);
        &self.activation
    }

    pub fn on_require_items_query(&self, identifier: &str, direction: Direction) -> Vec<&ModEntry> {
        DependencyGraph::new(sequence::mods(&self.entries)).closure(identifier, direction)
    }

    /// Mods that list `identifier` directly in their requirements.
    pub fn required_by(&self, identifier: &str) -> Result<Vec<&ModEntry>> {
        self.require_mod(identifier)?;
        Ok(DependencyGraph::new(sequence::mods(&self.entries)).direct_dependents(identifier))
    }

    pub fn inactive_requirements(&self, identifier: &str) -> Result<Vec<&str>> {
        let entry = self.require_mod(identifier)?;
        Ok(activation::inactive_requirements(
            &self.entries,
            &self.activation,
            entry,
        ))
    }

    pub fn set_priority(&mut self, identifier: &str, priority: usize) -> Result<bool> {
        let reordered = reorder::set_priority(&self.entries, identifier, priority)?;
        Ok(self.apply_optional(reordered))
    }

    pub fn send_to_separator(&mut self, mod_id: &str, separator_id: &str) -> Result<bool> {
        let reordered = reorder::send_to_separator(&self.entries, mod_id, separator_id)?;
        Ok(self.apply_optional(reordered))
    }

    /// Returns the new collapsed state.
    pub fn toggle_collapse(&mut self, separator_id: &str) -> Result<bool> {
        let index = sequence::index_of(&self.entries, separator_id)
            .ok_or_else(|| Error::UnknownEntry(separator_id.to_string()))?;
        let mut entries = self.entries.clone();
        let Entry::Separator(separator) = &mut entries[index] else {
            return Err(Error::NotASeparator(separator_id.to_string()));
        };
        separator.collapsed = !separator.collapsed;
        let collapsed = separator.collapsed;
        self.entries = entries;
        self.schedule(Slice::Separators, &store::separator_records(&self.entries));
        Ok(collapsed)
    }

    /// Empty values keep the current ones.
    pub fn edit_separator(
        &mut self,
        separator_id: &str,
        title: &str,
        background_color: &str,
        text_color: &str,
    ) -> Result<()> {
        let index = sequence::index_of(&self.entries, separator_id)
            .ok_or_else(|| Error::UnknownEntry(separator_id.to_string()))?;
        let mut entries = self.entries.clone();
        let Entry::Separator(separator) = &mut entries[index] else {
            return Err(Error::NotASeparator(separator_id.to_string()));
        };
        for (field, value) in [
            (&mut separator.title, title),
            (&mut separator.background_color, background_color),
            (&mut separator.text_color, text_color),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                *field = value.to_string();
            }
        }
        self.entries = entries;
        self.schedule(Slice::Separators, &store::separator_records(&self.entries));
        Ok(())
    }

    /// Replaces the user title and categories of one mod.
    pub fn set_meta(&mut self, identifier: &str, title: &str, categories: &str) -> Result<()> {
        let entry = self.require_mod(identifier)?;
        let blank = MetaRecord::blank(entry);
        let title = title.trim().to_string();
        let categories = store::clean_categories(categories);

        let mut meta = self.meta.clone();
        match meta.iter_mut().find(|record| record.identifier == identifier) {
            Some(record) => {
                record.title = title;
                record.categories = categories;
            }
            None => meta.push(MetaRecord {
                title,
                categories,
                ..blank
            }),
        }
        self.replace_meta(meta);
        self.push_notice(NoticeLevel::Info, "Mod meta details changed.".to_string());
        Ok(())
    }

    /// Adds and removes comma separated categories on every selected mod.
    /// Returns how many rows changed.
    pub fn bulk_categories(&mut self, add: &str, remove: &str) -> usize {
        if self.selection.is_empty() {
            return 0;
        }
        let mut changed = 0usize;
        let meta: Vec<MetaRecord> = self
            .meta
            .iter()
            .map(|record| {
                if !self.selection.contains(&record.identifier) {
                    return record.clone();
                }
                let categories = store::apply_category_changes(&record.categories, add, remove);
                if categories != record.categories {
                    changed += 1;
                }
                MetaRecord {
                    categories,
                    ..record.clone()
                }
            })
            .collect();
        if changed > 0 {
            self.replace_meta(meta);
            self.push_notice(NoticeLevel::Info, "Categories are updated.".to_string());
        }
        changed
    }

    /// Appends a new separator and returns its identifier.
    pub fn add_separator(&mut self, title: &str) -> String {
        let taken: HashSet<&str> = self.entries.iter().map(Entry::identifier).collect();
        let identifier = (1..)
            .map(|index| format!("separator-{index}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_default();
        let mut entries = self.entries.clone();
        entries.push(Entry::Separator(SeparatorEntry::new(&identifier, title)));
        self.replace_entries(entries);
        identifier
    }

    pub fn remove_separator(&mut self, separator_id: &str) -> Result<()> {
        let index = sequence::index_of(&self.entries, separator_id)
            .ok_or_else(|| Error::UnknownEntry(separator_id.to_string()))?;
        if !self.entries[index].is_separator() {
            return Err(Error::NotASeparator(separator_id.to_string()));
        }
        let mut entries = self.entries.clone();
        entries.remove(index);
        self.replace_entries(entries);
        Ok(())
    }

    /// Toggles one mod in the selection and makes it the range anchor.
    pub fn toggle_row(&mut self, identifier: &str) -> Result<bool> {
        self.require_mod(identifier)?;
        let selected = if self.selection.remove(identifier) {
            false
        } else {
            self.selection.insert(identifier.to_string());
            true
        };
        self.selection_anchor = Some(identifier.to_string());
        Ok(selected)
    }

    /// Replaces the selection with every visible mod between the anchor and
    /// `identifier`.
    pub fn select_range(&mut self, identifier: &str) -> Result<()> {
        self.require_mod(identifier)?;
        let Some(anchor) = self.selection_anchor.clone() else {
            self.toggle_row(identifier)?;
            return Ok(());
        };
        let visible = self.visible_entries();
        let position = |id: &str| visible.iter().position(|entry| entry.identifier() == id);
        let (Some(from), Some(to)) = (position(&anchor), position(identifier)) else {
            return Ok(());
        };
        let (start, end) = if from <= to { (from, to) } else { (to, from) };
        let picked: Vec<String> = visible[start..=end]
            .iter()
            .filter(|entry| !entry.is_separator())
            .map(|entry| entry.identifier().to_string())
            .collect();
        self.selection = picked.into_iter().collect();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.selection_anchor = None;
    }

    pub fn tick(&mut self) -> Vec<SyncFailure> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Vec<SyncFailure> {
        let failures = self.sync.tick_at(now);
        self.report_failures(&failures);
        failures
    }

    /// Writes every pending slice; used before switching profile or exiting.
    pub fn flush(&mut self) -> Vec<SyncFailure> {
        let failures = self.sync.flush_all();
        self.report_failures(&failures);
        failures
    }

    fn scope(&self, slice: Slice) -> ScopeKey {
        ScopeKey::new(slice, self.options.game, self.options.profile)
    }

    fn load_slice<T: DeserializeOwned>(&mut self, slice: Slice) -> Result<Option<Vec<T>>> {
        let Some(record) = self.sync.retrieve(&self.scope(slice))? else {
            return Ok(None);
        };
        self.sync.mark_loaded(&record);
        Ok(Some(record.decode()?))
    }

    fn require_mod(&self, identifier: &str) -> Result<&ModEntry> {
        match sequence::find(&self.entries, identifier) {
            Some(Entry::Mod(entry)) => Ok(entry),
            Some(Entry::Separator(_)) => Err(Error::NotAMod(identifier.to_string())),
            None => Err(Error::UnknownEntry(identifier.to_string())),
        }
    }

    fn apply_optional(&mut self, reordered: Option<Reordered>) -> bool {
        match reordered {
            Some(reordered) => {
                self.apply_reorder(reordered);
                true
            }
            None => false,
        }
    }

    fn apply_reorder(&mut self, reordered: Reordered) {
        self.entries = reordered.entries;
        self.order = reordered.order;
        self.schedule(Slice::Order, &self.order.clone());
        self.schedule(Slice::Separators, &store::separator_records(&self.entries));
    }

    fn replace_entries(&mut self, entries: Vec<Entry>) {
        self.apply_reorder(Reordered {
            order: sequence::order_records(&entries),
            entries,
        });
    }

    fn replace_activation(&mut self, activation: Vec<ActivationRecord>) {
        self.activation = activation;
        self.schedule(Slice::Activation, &self.activation.clone());
    }

    fn replace_meta(&mut self, meta: Vec<MetaRecord>) {
        self.meta = meta;
        self.schedule(Slice::Meta, &self.meta.clone());
    }

    fn schedule<T: Serialize>(&mut self, slice: Slice, rows: &[T]) {
        let scope = self.scope(slice);
        if let Err(err) = self.sync.schedule(scope, rows, Instant::now()) {
            warn!(%scope, error = %err, "could not schedule write");
            self.push_notice(NoticeLevel::Error, format!("Failed to queue {scope}: {err}"));
        }
    }

    fn persist_now<T: Serialize>(&mut self, slice: Slice, rows: &[T]) {
        let scope = self.scope(slice);
        if let Err(err) = self.sync.save_now(scope, rows) {
            warn!(%scope, error = %err, "initial save failed");
            self.push_notice(NoticeLevel::Error, format!("Failed to save {scope}: {err}"));
        }
    }

    fn report_failures(&mut self, failures: &[SyncFailure]) {
        for failure in failures {
            self.push_notice(NoticeLevel::Error, failure.to_string());
        }
    }

    fn push_notice(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
        if self.notices.len() > NOTICE_CAPACITY {
            let overflow = self.notices.len() - NOTICE_CAPACITY;
            self.notices.drain(0..overflow);
        }
    }
}

/// Loads a record of rows straight from a store, outside any session.
pub fn read_rows<T: DeserializeOwned>(
    store: &impl RecordStore,
    scope: &ScopeKey,
) -> Result<Option<Vec<T>>> {
    store
        .retrieve(scope)?
        .map(|record: Record| record.decode())
        .transpose()
}
