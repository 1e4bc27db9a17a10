#![forbid(unsafe_code)]

mod memory;
mod sqlite;

use async_trait::async_trait;
use mgnrega_districts_core::Record;
use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "mgnrega-districts-store";

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreErrorCode {
    /// Store unreachable or its location not configured.
    Unavailable,
    /// Write rejected by the partial unique index on `id`.
    UniqueViolation,
    Io,
    Internal,
}

impl StoreErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "store_unavailable",
            Self::UniqueViolation => "unique_constraint_violation",
            Self::Io => "io_error",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
}

impl StoreError {
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorCode::Unavailable, message)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for StoreError {}

/// Storage-assigned key of a document, independent of the derived `id`.
pub type DocKey = i64;

/// A document as it sits in the store: the storage key plus the record,
/// with `record.id` populated from the store's `id` field when assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: DocKey,
    pub record: Record,
}

/// Query parameters for the per-district time series.
#[derive(Debug, Clone, Default)]
pub struct DistrictQuery {
    pub state_code: i64,
    pub district_code: i64,
    pub month: Option<String>,
    pub fin_year: Option<String>,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DistrictEntry {
    pub district_code: Option<i64>,
    pub district_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StateEntry {
    pub state_code: Option<i64>,
    pub state_name: Option<String>,
}

/// Document-collection operations the core and the HTTP layer consume.
///
/// The backend owns two indexes: a partial unique index on `id` (only
/// where `id` is assigned), which is the last line of defense against the
/// reconciler's probe/write race, and a secondary index on
/// (state_code, district_code) for the read paths.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Snapshot of all documents whose `id` is absent or null: the
    /// backfill working set.
    async fn find_missing_id(&self) -> Result<Vec<StoredDocument>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Atomic update-or-insert matched on `id`. The record's own `id`
    /// field is ignored; the `id` argument is authoritative.
    async fn upsert_by_id(&self, id: &str, record: &Record) -> Result<(), StoreError>;

    /// Assign `id` to the single document matched by its storage key.
    /// Returns whether a document was modified. A collision with an
    /// already-assigned id surfaces as `UniqueViolation`.
    async fn assign_id(&self, key: DocKey, id: &str) -> Result<bool, StoreError>;

    /// Newest-first records for one district, optionally narrowed by
    /// month and fiscal year.
    async fn query_district(&self, query: &DistrictQuery) -> Result<Vec<Record>, StoreError>;

    /// Distinct districts of a state, sorted by district name.
    async fn list_districts(&self, state_code: i64) -> Result<Vec<DistrictEntry>, StoreError>;

    /// Distinct states present in the collection, sorted by state name.
    async fn list_states(&self) -> Result<Vec<StateEntry>, StoreError>;

    /// Newest-first records matching the given place names
    /// (case-insensitive exact match; both filters apply when both are
    /// given).
    async fn find_by_place(
        &self,
        district_name: Option<&str>,
        state_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError>;
}
