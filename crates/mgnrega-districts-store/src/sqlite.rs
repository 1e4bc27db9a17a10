// SPDX-License-Identifier: Apache-2.0

use crate::{
    DistrictEntry, DistrictQuery, DocKey, DocumentStore, StateEntry, StoreError, StoreErrorCode,
    StoredDocument,
};
use async_trait::async_trait;
use chrono::Utc;
use mgnrega_districts_core::Record;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
  _id INTEGER PRIMARY KEY AUTOINCREMENT,
  id TEXT,
  state_code INTEGER,
  district_code INTEGER,
  state_name TEXT,
  district_name TEXT,
  fin_year TEXT,
  month TEXT,
  created_at TEXT NOT NULL,
  doc TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_records_id
  ON records(id) WHERE id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_records_state_district
  ON records(state_code, district_code);
";

/// SQLite-backed document collection.
///
/// The full record is stored as JSON in `doc` (without `id`; the `id`
/// column is authoritative) with the filterable fields mirrored into
/// columns. The partial unique index on `id` tolerates any number of
/// legacy rows that have not been assigned an id yet.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::unavailable(format!("open {}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::unavailable(format!("open in-memory store: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(map_sqlite_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a document without an `id`, the shape rows predating the
    /// identity scheme have. Only the backfill reconciler (or a test
    /// fixture) should ever create such rows.
    pub async fn insert_legacy(&self, record: &Record) -> Result<DocKey, StoreError> {
        let doc = doc_json(record)?;
        let created_at = created_at_stamp(record);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO records
               (id, state_code, district_code, state_name, district_name,
                fin_year, month, created_at, doc)
             VALUES (NULL, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.state_code,
                record.district_code,
                record.state_name,
                record.district_name,
                record.fin_year,
                record.month,
                created_at,
                doc
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(conn.last_insert_rowid())
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = e {
        match failure.code {
            rusqlite::ErrorCode::ConstraintViolation => {
                return StoreError::new(StoreErrorCode::UniqueViolation, e.to_string());
            }
            rusqlite::ErrorCode::CannotOpen
            | rusqlite::ErrorCode::DatabaseBusy
            | rusqlite::ErrorCode::DatabaseLocked
            | rusqlite::ErrorCode::NotADatabase => {
                return StoreError::unavailable(e.to_string());
            }
            _ => {}
        }
    }
    StoreError::new(StoreErrorCode::Internal, e.to_string())
}

fn doc_json(record: &Record) -> Result<String, StoreError> {
    let mut stripped = record.clone();
    stripped.id = None;
    serde_json::to_string(&stripped)
        .map_err(|e| StoreError::new(StoreErrorCode::Internal, format!("serialize record: {e}")))
}

fn parse_row(key: DocKey, id: Option<String>, doc: &str) -> Result<StoredDocument, StoreError> {
    let mut record: Record = serde_json::from_str(doc).map_err(|e| {
        StoreError::new(
            StoreErrorCode::Internal,
            format!("corrupt document _id={key}: {e}"),
        )
    })?;
    record.id = id;
    Ok(StoredDocument { key, record })
}

fn created_at_stamp(record: &Record) -> String {
    record
        .extra
        .get("created_at")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn find_missing_id(&self) -> Result<Vec<StoredDocument>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT _id, id, doc FROM records WHERE id IS NULL ORDER BY _id")
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(map_sqlite_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite_err)?;
        rows.into_iter()
            .map(|(key, id, doc)| parse_row(key, id, &doc))
            .collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT _id, id, doc FROM records WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(map_sqlite_err)?;
        row.map(|(key, id, doc)| parse_row(key, id, &doc)).transpose()
    }

    async fn upsert_by_id(&self, id: &str, record: &Record) -> Result<(), StoreError> {
        let doc = doc_json(record)?;
        let created_at = created_at_stamp(record);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO records
               (id, state_code, district_code, state_name, district_name,
                fin_year, month, created_at, doc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) WHERE id IS NOT NULL DO UPDATE SET
               state_code = excluded.state_code,
               district_code = excluded.district_code,
               state_name = excluded.state_name,
               district_name = excluded.district_name,
               fin_year = excluded.fin_year,
               month = excluded.month,
               created_at = excluded.created_at,
               doc = excluded.doc",
            params![
                id,
                record.state_code,
                record.district_code,
                record.state_name,
                record.district_name,
                record.fin_year,
                record.month,
                created_at,
                doc
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    async fn assign_id(&self, key: DocKey, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let modified = conn
            .execute(
                "UPDATE records SET id = ?1 WHERE _id = ?2 AND id IS NULL",
                params![id, key],
            )
            .map_err(map_sqlite_err)?;
        Ok(modified == 1)
    }

    async fn query_district(&self, query: &DistrictQuery) -> Result<Vec<Record>, StoreError> {
        let mut sql = String::from(
            "SELECT _id, id, doc FROM records WHERE state_code = ?1 AND district_code = ?2",
        );
        let mut values: Vec<SqlValue> = vec![
            SqlValue::Integer(query.state_code),
            SqlValue::Integer(query.district_code),
        ];
        if let Some(month) = &query.month {
            values.push(SqlValue::Text(month.clone()));
            sql.push_str(&format!(" AND month = ?{}", values.len()));
        }
        if let Some(fin_year) = &query.fin_year {
            values.push(SqlValue::Text(fin_year.clone()));
            sql.push_str(&format!(" AND fin_year = ?{}", values.len()));
        }
        values.push(SqlValue::Integer(query.limit.max(1) as i64));
        sql.push_str(&format!(
            " ORDER BY created_at DESC, _id DESC LIMIT ?{}",
            values.len()
        ));

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(map_sqlite_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite_err)?;
        rows.into_iter()
            .map(|(key, id, doc)| parse_row(key, id, &doc).map(|d| d.record))
            .collect()
    }

    async fn list_districts(&self, state_code: i64) -> Result<Vec<DistrictEntry>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT district_code, district_name FROM records
                 WHERE state_code = ?1 ORDER BY district_name",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![state_code], |row| {
                Ok(DistrictEntry {
                    district_code: row.get(0)?,
                    district_name: row.get(1)?,
                })
            })
            .map_err(map_sqlite_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite_err)?;
        Ok(rows)
    }

    async fn list_states(&self) -> Result<Vec<StateEntry>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT state_code, state_name FROM records ORDER BY state_name",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StateEntry {
                    state_code: row.get(0)?,
                    state_name: row.get(1)?,
                })
            })
            .map_err(map_sqlite_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite_err)?;
        Ok(rows)
    }

    async fn find_by_place(
        &self,
        district_name: Option<&str>,
        state_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Record>, StoreError> {
        let mut sql = String::from("SELECT _id, id, doc FROM records");
        let mut values: Vec<SqlValue> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();
        if let Some(district) = district_name {
            values.push(SqlValue::Text(district.to_string()));
            clauses.push(format!("LOWER(district_name) = LOWER(?{})", values.len()));
        }
        if let Some(state) = state_name {
            values.push(SqlValue::Text(state.to_string()));
            clauses.push(format!("LOWER(state_name) = LOWER(?{})", values.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        values.push(SqlValue::Integer(limit.max(1) as i64));
        sql.push_str(&format!(
            " ORDER BY created_at DESC, _id DESC LIMIT ?{}",
            values.len()
        ));

        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(values), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(map_sqlite_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite_err)?;
        rows.into_iter()
            .map(|(key, id, doc)| parse_row(key, id, &doc).map(|d| d.record))
            .collect()
    }
}
