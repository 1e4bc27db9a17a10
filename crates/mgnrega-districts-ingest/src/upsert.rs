// SPDX-License-Identifier: Apache-2.0

use mgnrega_districts_core::{effective_id, Record};
use mgnrega_districts_store::{DocumentStore, StoreError};

/// Write one record under its effective id: the explicit `id` when the
/// record carries a non-empty one, the derived id otherwise.
///
/// One atomic update-or-insert per call; retrying with identical input
/// converges on the same stored document. Each record is an independent
/// unit of work, so a failing record in a batch leaves earlier writes in
/// place. Store failures surface to the caller; retry or skip is the
/// caller's policy.
pub async fn upsert_record(
    store: &dyn DocumentStore,
    record: &Record,
) -> Result<String, StoreError> {
    let id = effective_id(record);
    store.upsert_by_id(&id, record).await?;
    Ok(id)
}
