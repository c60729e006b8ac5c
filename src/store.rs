//! Persisted record store: one record of plain JSON rows per slice and scope.

use crate::{
    error::{Error, Result},
    game::GameFamily,
    sequence::{Entry, ModEntry, SeparatorEntry},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// One independently persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slice {
    Order,
    Activation,
    Separators,
    Meta,
}

impl Slice {
    pub fn all() -> [Slice; 4] {
        [Slice::Order, Slice::Activation, Slice::Separators, Slice::Meta]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slice::Order => "order",
            Slice::Activation => "activation",
            Slice::Separators => "separators",
            Slice::Meta => "meta",
        }
    }

    /// Meta rows belong to the game, everything else to a profile.
    pub fn is_profile_scoped(self) -> bool {
        !matches!(self, Slice::Meta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub slice: Slice,
    pub game: GameFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<u64>,
}

impl ScopeKey {
    pub fn new(slice: Slice, game: GameFamily, profile: u64) -> Self {
        Self {
            slice,
            game,
            profile: slice.is_profile_scoped().then_some(profile),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.profile {
            Some(profile) => write!(
                f,
                "{}/profile-{}/{}",
                self.game.as_str(),
                profile,
                self.slice.as_str()
            ),
            None => write!(f, "{}/{}", self.game.as_str(), self.slice.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub scope: ScopeKey,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl Record {
    pub fn encode<T: Serialize>(scope: ScopeKey, rows: &[T]) -> Result<Self> {
        let data = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            scope,
            data,
            saved_at: None,
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.data
            .iter()
            .map(|row| serde_json::from_value(row.clone()).map_err(Error::from))
            .collect()
    }
}

pub trait RecordStore {
    fn retrieve(&self, scope: &ScopeKey) -> Result<Option<Record>>;
    /// Inserts or replaces the record for `record.scope`.
    fn save(&mut self, record: &Record) -> Result<()>;
}

/// Store kept in memory; saves can be made to fail for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<ScopeKey, Record>,
    saves: usize,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }

    pub fn get(&self, scope: &ScopeKey) -> Option<&Record> {
        self.records.get(scope)
    }
}

impl RecordStore for MemoryStore {
    fn retrieve(&self, scope: &ScopeKey) -> Result<Option<Record>> {
        Ok(self.records.get(scope).cloned())
    }

    fn save(&mut self, record: &Record) -> Result<()> {
        if self.failing {
            return Err(Error::Store {
                scope: record.scope.to_string(),
                message: "store is read-only".to_string(),
            });
        }
        self.saves += 1;
        self.records.insert(record.scope, record.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per scope under `root`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, scope: &ScopeKey) -> PathBuf {
        let dir = self.root.join(scope.game.as_str());
        let dir = match scope.profile {
            Some(profile) => dir.join(format!("profile-{profile}")),
            None => dir,
        };
        dir.join(format!("{}.json", scope.slice.as_str()))
    }
}

impl RecordStore for JsonFileStore {
    fn retrieve(&self, scope: &ScopeKey) -> Result<Option<Record>> {
        let path = self.path_for(scope);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path).map_err(file_access(&path))?;
        let mut record: Record = serde_json::from_str(&raw)?;
        record.scope = *scope;
        Ok(Some(record))
    }

    fn save(&mut self, record: &Record) -> Result<()> {
        let mut stamped = record.clone();
        stamped.saved_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let raw = serde_json::to_string_pretty(&stamped)?;
        write_atomic_text(&self.path_for(&record.scope), &raw)
    }
}

fn write_atomic_text(path: &Path, contents: &str) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Err(Error::Store {
            scope: path.display().to_string(),
            message: "record path has no parent".to_string(),
        });
    };
    fs::create_dir_all(parent).map_err(file_access(parent))?;
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = parent.join(temp_name);
    fs::write(&temp_path, contents).map_err(file_access(&temp_path))?;
    fs::rename(&temp_path, path).map_err(file_access(path))?;
    Ok(())
}

fn file_access(path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::FileAccess { path, source }
}

/// Persisted separator row; the sequence position lives in the order slice,
/// `order` here mirrors it for readers of the separators record alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatorRecord {
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub text_color: String,
    #[serde(default)]
    pub collapsed: bool,
}

impl SeparatorRecord {
    pub fn from_entry(entry: &SeparatorEntry, order: u32) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            title: entry.title.clone(),
            order,
            background_color: entry.background_color.clone(),
            text_color: entry.text_color.clone(),
            collapsed: entry.collapsed,
        }
    }

    pub fn to_entry(&self) -> SeparatorEntry {
        SeparatorEntry {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            collapsed: self.collapsed,
            background_color: self.background_color.clone(),
            text_color: self.text_color.clone(),
        }
    }
}

/// Separator rows for the current sequence, `order` taken from position.
pub fn separator_records(entries: &[Entry]) -> Vec<SeparatorRecord> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            entry
                .as_separator()
                .map(|separator| SeparatorRecord::from_entry(separator, index as u32 + 1))
        })
        .collect()
}

/// User metadata attached to a mod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub version: String,
}

impl MetaRecord {
    pub fn blank(entry: &ModEntry) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            title: String::new(),
            categories: String::new(),
            version: String::new(),
        }
    }
}

/// Trims a user typed category list and drops one trailing comma.
pub fn clean_categories(categories: &str) -> String {
    let trimmed = categories.trim();
    trimmed
        .strip_suffix(',')
        .unwrap_or(trimmed)
        .trim_end()
        .to_string()
}

/// Removes the `remove` categories (case-insensitive) from `existing`, then
/// appends `add`. Both lists are comma separated.
pub fn apply_category_changes(existing: &str, add: &str, remove: &str) -> String {
    let removals: Vec<String> = remove
        .split(',')
        .map(|category| category.trim().to_lowercase())
        .filter(|category| !category.is_empty())
        .collect();
    let mut updated = existing.to_string();
    if !removals.is_empty() {
        updated = existing
            .split(',')
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .filter(|category| !removals.contains(&category.to_lowercase()))
            .collect::<Vec<_>>()
            .join(", ");
    }
    let add = clean_categories(add);
    if !add.is_empty() {
        let current = updated.trim();
        updated = if current.is_empty() {
            add
        } else {
            format!("{current}, {add}")
        };
    }
    updated
}

/// Adds blank rows for new mods and drops rows of mods that are gone.
pub fn reconcile_meta(
    mods: &[ModEntry],
    stored: Option<Vec<MetaRecord>>,
) -> (Vec<MetaRecord>, bool) {
    let stored = stored.unwrap_or_default();
    let present: HashSet<&str> = mods.iter().map(|entry| entry.identifier.as_str()).collect();
    let before = stored.len();
    let mut records: Vec<MetaRecord> = stored
        .into_iter()
        .filter(|record| present.contains(record.identifier.as_str()))
        .collect();
    let mut changed = records.len() != before;

    let known: HashSet<String> = records
        .iter()
        .map(|record| record.identifier.clone())
        .collect();
    for entry in mods {
        if !known.contains(&entry.identifier) {
            records.push(MetaRecord::blank(entry));
            changed = true;
        }
    }
    (records, changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::OrderRecord;

    fn order_scope() -> ScopeKey {
        ScopeKey::new(Slice::Order, GameFamily::TotalWar, 2)
    }

    #[test]
    fn meta_scope_ignores_profile() {
        let scope = ScopeKey::new(Slice::Meta, GameFamily::Bannerlord, 7);
        assert_eq!(scope.profile, None);
        assert_eq!(scope.to_string(), "bannerlord/meta");
        assert_eq!(order_scope().to_string(), "totalwar/profile-2/order");
    }

    #[test]
    fn record_rows_round_trip_through_json_values() {
        let rows = vec![OrderRecord {
            identifier: "a".to_string(),
            order: 1,
            title: "A".to_string(),
            pack_file_path: None,
        }];
        let record = Record::encode(order_scope(), &rows).unwrap();
        assert_eq!(record.data[0]["identifier"], "a");
        let decoded: Vec<OrderRecord> = record.decode().unwrap();
        assert_eq!(decoded, rows);
    }

    #[test]
    fn memory_store_upserts_and_can_fail() {
        let mut store = MemoryStore::new();
        assert!(store.retrieve(&order_scope()).unwrap().is_none());
        let record = Record::encode(order_scope(), &[1, 2, 3]).unwrap();
        store.save(&record).unwrap();
        store.save(&record).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.retrieve(&order_scope()).unwrap(), Some(record.clone()));

        store.set_failing(true);
        assert!(matches!(store.save(&record), Err(Error::Store { .. })));
    }

    #[test]
    fn json_file_store_writes_one_file_per_scope() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        let record = Record::encode(order_scope(), &["x"]).unwrap();
        store.save(&record).unwrap();

        let path = dir.path().join("totalwar").join("profile-2").join("order.json");
        assert!(path.exists());
        let loaded = store.retrieve(&order_scope()).unwrap().unwrap();
        assert_eq!(loaded.data, record.data);
        let stamp = loaded.saved_at.unwrap();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());

        let meta = ScopeKey::new(Slice::Meta, GameFamily::TotalWar, 2);
        assert!(store.retrieve(&meta).unwrap().is_none());
    }

    #[test]
    fn meta_rows_follow_the_catalogue() {
        let mods = vec![ModEntry::new("a", "A"), ModEntry::new("b", "B")];
        let mut kept = MetaRecord::blank(&mods[0]);
        kept.categories = "ui".to_string();
        let gone = MetaRecord::blank(&ModEntry::new("gone", "Gone"));
        let (records, changed) = reconcile_meta(&mods, Some(vec![kept.clone(), gone]));
        assert!(changed);
        assert_eq!(records, vec![kept, MetaRecord::blank(&mods[1])]);

        let (again, changed) = reconcile_meta(&mods, Some(records.clone()));
        assert!(!changed);
        assert_eq!(again, records);
    }

    #[test]
    fn category_edits_follow_comma_lists() {
        assert_eq!(clean_categories("  units, maps, "), "units, maps");
        assert_eq!(
            apply_category_changes("Units, Maps,UI", "Overhaul", "maps"),
            "Units, UI, Overhaul"
        );
        assert_eq!(apply_category_changes("", "Graphics", ""), "Graphics");
        assert_eq!(apply_category_changes("Units", "", "units"), "");
        assert_eq!(apply_category_changes("Units", "", ""), "Units");
    }
}
