use crate::{
    DistrictEntry, DistrictQuery, DocKey, DocumentStore, StateEntry, StoreError, StoreErrorCode,
    StoredDocument,
};
use async_trait::async_trait;
use chrono::Utc;
use mgnrega_districts_core::Record;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

struct StoredRow {
    id: Option<String>,
    record: Record,
    created_at: String,
}

#[derive(Default)]
struct Inner {
    next_key: DocKey,
    rows: BTreeMap<DocKey, StoredRow>,
}

/// In-memory document collection with the same contract as `SqliteStore`,
/// including the uniqueness backstop on assigned ids. The test double for
/// everything above the store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// When set, every operation fails with `Unavailable`.
    pub unreachable: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, down: bool) {
        self.unreachable
            .store(down, std::sync::atomic::Ordering::Relaxed);
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(StoreError::unavailable("memory store marked unreachable"));
        }
        Ok(())
    }

    /// Seed a document without an `id`, as legacy rows were stored.
    pub async fn insert_legacy(&self, record: &Record) -> Result<DocKey, StoreError> {
        self.check_reachable()?;
        let mut inner = self.inner.lock().await;
        inner.next_key += 1;
        let key = inner.next_key;
        let mut stripped = record.clone();
        stripped.id = None;
        let created_at = created_at_of(&stripped);
        inner.rows.insert(
            key,
            StoredRow {
                id: None,
                record: stripped,
                created_at,
            },
        );
        Ok(key)
    }

    /// Number of stored documents carrying the given id.
    pub async fn count_with_id(&self, id: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .rows
            .values()
            .filter(|row| row.id.as_deref() == Some(id))
            .count()
    }
}

fn created_at_of(record: &Record) -> String {
    record
        .extra
        .get("created_at")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

fn with_id(row: &StoredRow) -> Record {
    let mut record = row.record.clone();
    record.id = row.id.clone();
    record
}

fn newest_first(mut keys: Vec<(DocKey, String)>) -> Vec<DocKey> {
    keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    keys.into_iter().map(|(k, _)| k).collect()
}

fn eq_ignore_case(a: Option<&str>, b: &str) -> bool {
    a.is_some_and(|v| v.eq_ignore_ascii_case(b))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_missing_id(&self) -> Result<Vec<StoredDocument>, StoreError> {
        self.check_reachable()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .filter(|(_, row)| row.id.is_none())
            .map(|(key, row)| StoredDocument {
                key: *key,
                record: with_id(row),
            })
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.check_reachable()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .find(|(_, row)| row.id.as_deref() == Some(id))
            .map(|(key, row)| StoredDocument {
                key: *key,
                record: with_id(row),
            }))
    }

    async fn upsert_by_id(&self, id: &str, record: &Record) -> Result<(), StoreError> {
        self.check_reachable()?;
        let mut inner = self.inner.lock().await;
        let mut stripped = record.clone();
        stripped.id = None;
        let created_at = created_at_of(&stripped);
        if let Some(row) = inner
            .rows
            .values_mut()
            .find(|row| row.id.as_deref() == Some(id))
        {
            row.record = stripped;
            row.created_at = created_at;
            return Ok(());
        }
        inner.next_key += 1;
        let key = inner.next_key;
        inner.rows.insert(
            key,
            StoredRow {
                id: Some(id.to_string()),
                record: stripped,
                created_at,
            },
        );
        Ok(())
    }

    async fn assign_id(&self, key: DocKey, id: &str) -> Result<bool, StoreError> {
        self.check_reachable()?;
        let mut inner = self.inner.lock().await;
        let taken = inner
            .rows
            .iter()
            .any(|(other, row)| *other != key && row.id.as_deref() == Some(id));
        if taken {
            return Err(StoreError::new(
                StoreErrorCode::UniqueViolation,
                format!("id already assigned: {id}"),
            ));
        }
        match inner.rows.get_mut(&key) {
            Some(row) if row.id.is_none() => {
                row.id = Some(id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn query_district(&self, query: &DistrictQuery) -> Result<Vec<Record>, StoreError> {
        self.check_reachable()?;
        let inner = self.inner.lock().await;
        let keys: Vec<(DocKey, String)> = inner
            .rows
            .iter()
            .filter(|(_, row)| {
                row.record.state_code == Some(query.state_code)
                    && row.record.district_code == Some(query.district_code)
                    && query
                        .month
                        .as_deref()
                        .is_none_or(|m| row.record.month.as_deref() == Some(m))
                    && query
                        .fin_year
                        .as_deref()
                        .is_none_or(|fy| row.record.fin_year.as_deref() == Some(fy))
            })
            .map(|(key, row)| (*key, row.created_at.clone()))
            .collect();
        Ok(newest_first(keys)
            .into_iter()
            .take(query.limit.max(1))
            .filter_map(|key| inner.rows.get(&key).map(with_id))
            .collect())
    }

    async fn list_districts(&self, state_code: i64) -> Result<Vec<DistrictEntry>, StoreError> {
        self.check_reachable()?;
        let inner = self.inner.lock().await;
        let mut entries: Vec<DistrictEntry> = Vec::new();
        for row in inner.rows.values() {
            if row.record.state_code != Some(state_code) {
                continue;
            }
            let entry = DistrictEntry {
                district_code: row.record.district_code,
                district_name: row.record.district_name.clone(),
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.district_name.cmp(&b.district_name));
        Ok(entries)
    }

    async fn list_states(&self) -> Result<Vec<StateEntry>, StoreError> {
        self.check_reachable()?;
        let inner = self.inner.lock().await;
        let mut entries: Vec<StateEntry> = Vec::new();
        for row in inner.rows.values() {
            let entry = StateEntry {
                state_code: row.record.state_code,
                state_name: row.record.state_name.clone(),
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.state_name.cmp(&b.state_name));
        Ok(entries)
    }

    async fn find_by_place(
        &self,
        district_name: Option<&str>,
        state_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        self.check_reachable()?;
        let inner = self.inner.lock().await;
        let keys: Vec<(DocKey, String)> = inner
            .rows
            .iter()
            .filter(|(_, row)| {
                district_name
                    .is_none_or(|d| eq_ignore_case(row.record.district_name.as_deref(), d))
                    && state_name
                        .is_none_or(|s| eq_ignore_case(row.record.state_name.as_deref(), s))
            })
            .map(|(key, row)| (*key, row.created_at.clone()))
            .collect();
        Ok(newest_first(keys)
            .into_iter()
            .take(limit.max(1))
            .filter_map(|key| inner.rows.get(&key).map(with_id))
            .collect())
    }
}
