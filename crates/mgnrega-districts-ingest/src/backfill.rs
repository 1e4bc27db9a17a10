// SPDX-License-Identifier: Apache-2.0

use mgnrega_districts_core::derived_id;
use mgnrega_districts_store::{DocKey, DocumentStore, StoreError};
use tracing::{info, warn};

/// One detected collision: the legacy document's storage key and the
/// derived id it would have received. Left for manual review; the
/// reconciler never merges or overwrites.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BackfillConflict {
    pub key: DocKey,
    pub candidate_id: String,
}

/// Outcome of a reconciler run. Partial success is the expected shape:
/// conflicts are counted here, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BackfillReport {
    pub updated: u64,
    pub conflicts: u64,
    pub conflict_details: Vec<BackfillConflict>,
}

/// Assign derived ids to legacy documents stored before the identity
/// scheme existed.
///
/// The working set is a snapshot of documents with no `id`; documents
/// fixed during the run do not re-enter it, so the pass terminates. For
/// each document the candidate id is probed first: a hit means two
/// distinct documents collide on the derived key, which is reported and
/// skipped. The write is matched by storage key, not by the unassigned
/// `id`. A concurrent writer can still take the candidate between probe
/// and write; the store's partial unique index turns that race into a
/// `UniqueViolation`, which surfaces rather than corrupting data. Safe to
/// rerun after an interruption: already-assigned documents are excluded
/// from the next working set.
pub async fn backfill_ids(store: &dyn DocumentStore) -> Result<BackfillReport, StoreError> {
    let working_set = store.find_missing_id().await?;
    info!(documents = working_set.len(), "backfill working set selected");

    let mut report = BackfillReport::default();
    for doc in working_set {
        let candidate = derived_id(&doc.record);
        if store.find_by_id(&candidate).await?.is_some() {
            warn!(
                key = doc.key,
                candidate = %candidate,
                "computed id already exists for a different document; leaving both untouched"
            );
            report.conflicts += 1;
            report.conflict_details.push(BackfillConflict {
                key: doc.key,
                candidate_id: candidate,
            });
            continue;
        }
        if store.assign_id(doc.key, &candidate).await? {
            report.updated += 1;
        }
    }

    info!(
        updated = report.updated,
        conflicts = report.conflicts,
        "backfill complete"
    );
    Ok(report)
}
