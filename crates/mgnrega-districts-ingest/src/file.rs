// SPDX-License-Identifier: Apache-2.0

use crate::upsert::upsert_record;
use crate::IngestError;
use mgnrega_districts_core::Record;
use mgnrega_districts_store::DocumentStore;
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub ingested: u64,
    pub ids: Vec<String>,
}

/// Ingest a JSON file holding one record or an array of records, upserting
/// each independently. Each element is converted and written as its own
/// unit of work: a failure on element *k* surfaces, but elements 1..k-1
/// stay written (no rollback).
pub async fn ingest_file(
    store: &dyn DocumentStore,
    path: &Path,
) -> Result<IngestSummary, IngestError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IngestError::Io(format!("read {}: {e}", path.display())))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| IngestError::Parse(format!("parse {}: {e}", path.display())))?;

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut summary = IngestSummary::default();
    for (index, item) in items.into_iter().enumerate() {
        let record = Record::from_value(item).map_err(|e| {
            IngestError::Parse(format!("record {index} in {}: {e}", path.display()))
        })?;
        let id = upsert_record(store, &record).await?;
        summary.ingested += 1;
        summary.ids.push(id);
    }
    info!(file = %path.display(), ingested = summary.ingested, "ingested file");
    Ok(summary)
}
