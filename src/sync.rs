//! Debounced write-back of mutated slices.
//!
//! Every scope keeps its own pending write and deadline, so scheduling one
//! slice never cancels another. State in memory stays authoritative: a failed
//! save is reported and dropped, never rolled back or retried.

use crate::{
    error::{Error, Result},
    store::{Record, RecordStore, ScopeKey},
};
use serde::Serialize;
use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};
use tracing::{debug, error};

#[derive(Debug)]
struct PendingWrite {
    record: Record,
    digest: blake3::Hash,
    due_at: Instant,
}

#[derive(Debug)]
pub struct SyncFailure {
    pub scope: ScopeKey,
    pub error: Error,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to save {}: {}", self.scope, self.error)
    }
}

pub struct ChangeSync<S> {
    store: S,
    debounce: Duration,
    pending: HashMap<ScopeKey, PendingWrite>,
    flushed: HashMap<ScopeKey, blake3::Hash>,
}

impl<S: RecordStore> ChangeSync<S> {
    pub fn new(store: S, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            pending: HashMap::new(),
            flushed: HashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn retrieve(&self, scope: &ScopeKey) -> Result<Option<Record>> {
        self.store.retrieve(scope)
    }

    /// Remembers what was loaded so an unchanged slice is not written back.
    pub fn mark_loaded(&mut self, record: &Record) {
        if let Ok(digest) = digest_of(record) {
            self.flushed.insert(record.scope, digest);
        }
    }

    /// Replaces the pending write of `scope` and restarts its deadline.
    pub fn schedule<T: Serialize>(
        &mut self,
        scope: ScopeKey,
        rows: &[T],
        now: Instant,
    ) -> Result<()> {
        let record = Record::encode(scope, rows)?;
        let digest = digest_of(&record)?;
        debug!(%scope, rows = rows.len(), "sync scheduled");
        self.pending.insert(
            scope,
            PendingWrite {
                record,
                digest,
                due_at: now + self.debounce,
            },
        );
        Ok(())
    }

    /// Writes `rows` right away, bypassing the debounce.
    pub fn save_now<T: Serialize>(&mut self, scope: ScopeKey, rows: &[T]) -> Result<()> {
        let record = Record::encode(scope, rows)?;
        let digest = digest_of(&record)?;
        self.pending.remove(&scope);
        self.store.save(&record)?;
        self.flushed.insert(scope, digest);
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn tick(&mut self) -> Vec<SyncFailure> {
        self.tick_at(Instant::now())
    }

    /// Flushes every pending write whose deadline has passed.
    pub fn tick_at(&mut self, now: Instant) -> Vec<SyncFailure> {
        let mut due: Vec<ScopeKey> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.due_at <= now)
            .map(|(scope, _)| *scope)
            .collect();
        due.sort_by_key(|scope| scope.slice);
        self.flush_scopes(due)
    }

    pub fn flush_all(&mut self) -> Vec<SyncFailure> {
        let mut due: Vec<ScopeKey> = self.pending.keys().copied().collect();
        due.sort_by_key(|scope| scope.slice);
        self.flush_scopes(due)
    }

    fn flush_scopes(&mut self, scopes: Vec<ScopeKey>) -> Vec<SyncFailure> {
        let mut failures = Vec::new();
        for scope in scopes {
            let Some(pending) = self.pending.remove(&scope) else {
                continue;
            };
            if self.flushed.get(&scope) == Some(&pending.digest) {
                debug!(%scope, "sync skipped, slice unchanged");
                continue;
            }
            match self.store.save(&pending.record) {
                Ok(()) => {
                    debug!(%scope, "sync flushed");
                    self.flushed.insert(scope, pending.digest);
                }
                Err(err) => {
                    error!(%scope, error = %err, "sync failed");
                    failures.push(SyncFailure { scope, error: err });
                }
            }
        }
        failures
    }
}

fn digest_of(record: &Record) -> Result<blake3::Hash> {
    let bytes = serde_json::to_vec(&record.data)?;
    Ok(blake3::hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::GameFamily,
        store::{MemoryStore, Slice},
    };

    const DEBOUNCE: Duration = Duration::from_millis(100);

    fn scope(slice: Slice) -> ScopeKey {
        ScopeKey::new(slice, GameFamily::TotalWar, 1)
    }

    fn sync() -> ChangeSync<MemoryStore> {
        ChangeSync::new(MemoryStore::new(), DEBOUNCE)
    }

    impl<S: RecordStore> ChangeSync<S> {
        fn is_pending(&self, scope: &ScopeKey) -> bool {
            self.pending.contains_key(scope)
        }

        fn next_due(&self) -> Option<Instant> {
            self.pending.values().map(|pending| pending.due_at).min()
        }
    }

    #[test]
    fn slices_debounce_independently() {
        let mut sync = sync();
        let start = Instant::now();
        sync.schedule(scope(Slice::Order), &["a", "b"], start).unwrap();
        sync.schedule(scope(Slice::Activation), &[true], start + Duration::from_millis(50))
            .unwrap();

        assert!(sync.tick_at(start + Duration::from_millis(99)).is_empty());
        assert_eq!(sync.store().save_count(), 0);

        sync.tick_at(start + DEBOUNCE);
        assert!(sync.store().get(&scope(Slice::Order)).is_some());
        assert!(sync.is_pending(&scope(Slice::Activation)));

        sync.tick_at(start + Duration::from_millis(150));
        assert!(sync.store().get(&scope(Slice::Activation)).is_some());
        assert_eq!(sync.pending_count(), 0);
    }

    #[test]
    fn rescheduling_replaces_data_and_deadline() {
        let mut sync = sync();
        let start = Instant::now();
        sync.schedule(scope(Slice::Order), &["first"], start).unwrap();
        sync.schedule(scope(Slice::Order), &["second"], start + Duration::from_millis(80))
            .unwrap();
        sync.tick_at(start + DEBOUNCE);
        assert_eq!(sync.store().save_count(), 0);
        assert_eq!(sync.next_due(), Some(start + Duration::from_millis(180)));

        sync.tick_at(start + Duration::from_millis(180));
        let saved = sync.store().get(&scope(Slice::Order)).unwrap();
        assert_eq!(saved.data, vec![serde_json::json!("second")]);
        assert_eq!(sync.store().save_count(), 1);
    }

    #[test]
    fn unchanged_slice_is_not_rewritten() {
        let mut sync = sync();
        let start = Instant::now();
        sync.schedule(scope(Slice::Meta), &[1, 2], start).unwrap();
        sync.flush_all();
        sync.schedule(scope(Slice::Meta), &[1, 2], start).unwrap();
        sync.flush_all();
        assert_eq!(sync.store().save_count(), 1);
    }

    #[test]
    fn failures_are_reported_and_not_retried() {
        let mut sync = sync();
        sync.store_mut().set_failing(true);
        let start = Instant::now();
        sync.schedule(scope(Slice::Separators), &["s1"], start).unwrap();
        let failures = sync.flush_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].scope, scope(Slice::Separators));
        assert!(failures[0].to_string().contains("separators"));
        assert_eq!(sync.pending_count(), 0);

        sync.store_mut().set_failing(false);
        sync.schedule(scope(Slice::Separators), &["s1"], start).unwrap();
        assert!(sync.flush_all().is_empty());
        assert_eq!(sync.store().save_count(), 1);
    }

    #[test]
    fn loaded_records_are_not_echoed_back() {
        let mut sync = sync();
        let record = Record::encode(scope(Slice::Order), &["a"]).unwrap();
        sync.mark_loaded(&record);
        sync.schedule(scope(Slice::Order), &["a"], Instant::now()).unwrap();
        sync.flush_all();
        assert_eq!(sync.store().save_count(), 0);
    }
}
