//! Translation record store: the keyed persistence contract and an in-memory implementation.
//!
//! The SQLite-backed implementation lives in [`crate::db`].

use crate::error::{StoreError, StoreResult};
use crate::model::{RecordFilter, RecordId, TranslationKey, TranslationRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Keyed persistence of translation records.
///
/// Implementations enforce key uniqueness: at most one record per
/// [`TranslationKey`].
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Fetch a record by primary key.
    async fn get(&self, id: RecordId) -> StoreResult<Option<TranslationRecord>>;

    /// Fetch a record by its composite key.
    async fn find(&self, key: &TranslationKey) -> StoreResult<Option<TranslationRecord>>;

    /// Insert (when `id` is `None`) or update a record and return the stored version.
    async fn save(&self, record: TranslationRecord) -> StoreResult<TranslationRecord>;

    /// Save every record or none of them.
    async fn save_all(&self, records: Vec<TranslationRecord>)
        -> StoreResult<Vec<TranslationRecord>>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete(&self, id: RecordId) -> StoreResult<bool>;

    /// Records matching `filter`, ordered by ascending id.
    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<TranslationRecord>>;

    /// Number of records matching `filter`, ignoring paging.
    async fn count(&self, filter: &RecordFilter) -> StoreResult<usize>;
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: RecordId,
    records: BTreeMap<RecordId, TranslationRecord>,
    by_key: HashMap<TranslationKey, RecordId>,
}

impl MemoryState {
    fn save(&mut self, mut record: TranslationRecord) -> StoreResult<TranslationRecord> {
        let existing = self.by_key.get(&record.key).copied();

        match record.id {
            None => {
                if existing.is_some() {
                    return Err(StoreError::DuplicateKey(record.key.to_string()));
                }
                self.next_id += 1;
                record.id = Some(self.next_id);
            }
            Some(id) => {
                let previous = self
                    .records
                    .get(&id)
                    .ok_or(StoreError::MissingRecord(id))?;
                if existing.is_some_and(|other| other != id) {
                    return Err(StoreError::DuplicateKey(record.key.to_string()));
                }
                let previous_key = previous.key.clone();
                self.by_key.remove(&previous_key);
            }
        }

        let id = record.id.unwrap_or(self.next_id);
        self.by_key.insert(record.key.clone(), id);
        self.records.insert(id, record.clone());
        Ok(record)
    }
}

/// In-memory store guarded by a mutex. Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.lock().map(|state| state.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranslationStore for MemoryStore {
    async fn get(&self, id: RecordId) -> StoreResult<Option<TranslationRecord>> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    async fn find(&self, key: &TranslationKey) -> StoreResult<Option<TranslationRecord>> {
        let state = self.lock()?;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn save(&self, record: TranslationRecord) -> StoreResult<TranslationRecord> {
        self.lock()?.save(record)
    }

    async fn save_all(
        &self,
        records: Vec<TranslationRecord>,
    ) -> StoreResult<Vec<TranslationRecord>> {
        let mut state = self.lock()?;
        let mut staged = state.clone();
        let saved = records
            .into_iter()
            .map(|record| staged.save(record))
            .collect::<StoreResult<Vec<_>>>()?;
        *state = staged;
        Ok(saved)
    }

    async fn delete(&self, id: RecordId) -> StoreResult<bool> {
        let mut state = self.lock()?;
        match state.records.remove(&id) {
            Some(record) => {
                state.by_key.remove(&record.key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn query(&self, filter: &RecordFilter) -> StoreResult<Vec<TranslationRecord>> {
        let state = self.lock()?;
        let matching = state.records.values().filter(|record| filter.matches(record));
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    async fn count(&self, filter: &RecordFilter) -> StoreResult<usize> {
        let state = self.lock()?;
        let unpaged = RecordFilter {
            after_id: None,
            limit: None,
            ..filter.clone()
        };
        Ok(state
            .records
            .values()
            .filter(|record| unpaged.matches(record))
            .count())
    }
}
