use mgnrega_districts_core::Record;
use mgnrega_districts_ingest::{backfill_ids, upsert_record};
use mgnrega_districts_store::{DocumentStore, MemoryStore, SqliteStore};
use serde_json::json;
use tempfile::tempdir;

fn legacy(state: i64, district: i64, fin_year: &str, month: &str) -> Record {
    Record::from_value(json!({
        "state_code": state,
        "district_code": district,
        "fin_year": fin_year,
        "month": month,
    }))
    .expect("record")
}

#[tokio::test]
async fn assigns_missing_ids() {
    let store = MemoryStore::new();
    store.insert_legacy(&legacy(9, 12, "2023-2024", "April")).await.expect("seed");
    store.insert_legacy(&legacy(9, 13, "2023-2024", "April")).await.expect("seed");

    let report = backfill_ids(&store).await.expect("backfill");
    assert_eq!(report.updated, 2);
    assert_eq!(report.conflicts, 0);
    assert!(store
        .find_by_id("9_12_2023-2024_April")
        .await
        .expect("find")
        .is_some());
    assert!(store
        .find_by_id("9_13_2023-2024_April")
        .await
        .expect("find")
        .is_some());
}

#[tokio::test]
async fn placeholder_segments_for_partial_legacy_documents() {
    let store = MemoryStore::new();
    store
        .insert_legacy(&Record::from_value(json!({"state_code": 9})).expect("record"))
        .await
        .expect("seed");

    let report = backfill_ids(&store).await.expect("backfill");
    assert_eq!(report.updated, 1);
    assert!(store
        .find_by_id("9_d_fy_m")
        .await
        .expect("find")
        .is_some());
}

#[tokio::test]
async fn colliding_documents_are_reported_not_merged() {
    let store = MemoryStore::new();
    // distinct legacy documents that collide on the derived key
    let mut a = legacy(9, 12, "2023-2024", "April");
    a.extra.insert("wage_expenditure".to_string(), json!(10));
    let mut b = legacy(9, 12, "2023-2024", "April");
    b.extra.insert("wage_expenditure".to_string(), json!(99));
    let key_a = store.insert_legacy(&a).await.expect("seed a");
    let key_b = store.insert_legacy(&b).await.expect("seed b");

    let report = backfill_ids(&store).await.expect("backfill");
    assert_eq!(report.updated, 1);
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.conflict_details.len(), 1);
    assert_eq!(report.conflict_details[0].candidate_id, "9_12_2023-2024_April");

    // exactly one of the two won the id; the loser kept its payload
    let winner = store
        .find_by_id("9_12_2023-2024_April")
        .await
        .expect("find")
        .expect("one winner");
    let loser_key = if winner.key == key_a { key_b } else { key_a };
    assert_eq!(report.conflict_details[0].key, loser_key);
    let still_missing = store.find_missing_id().await.expect("missing");
    assert_eq!(still_missing.len(), 1);
    assert_eq!(still_missing[0].key, loser_key);
    assert!(still_missing[0].record.extra.contains_key("wage_expenditure"));
}

#[tokio::test]
async fn conflict_against_live_upserted_record() {
    let store = MemoryStore::new();
    upsert_record(&store, &legacy(9, 12, "2023-2024", "April"))
        .await
        .expect("live upsert");
    store.insert_legacy(&legacy(9, 12, "2023-2024", "April")).await.expect("seed");

    let report = backfill_ids(&store).await.expect("backfill");
    assert_eq!(report.updated, 0);
    assert_eq!(report.conflicts, 1);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let store = MemoryStore::new();
    store.insert_legacy(&legacy(9, 12, "2023-2024", "April")).await.expect("seed");
    store.insert_legacy(&legacy(10, 3, "2022-2023", "May")).await.expect("seed");

    let first = backfill_ids(&store).await.expect("first run");
    assert_eq!(first.updated, 2);

    let second = backfill_ids(&store).await.expect("second run");
    assert_eq!(second.updated, 0);
    assert_eq!(second.conflicts, 0);
}

#[tokio::test]
async fn sqlite_backfill_end_to_end() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");

    store.insert_legacy(&legacy(9, 12, "2023-2024", "April")).await.expect("seed");
    store.insert_legacy(&legacy(9, 12, "2023-2024", "April")).await.expect("seed dup");
    store.insert_legacy(&legacy(9, 13, "2023-2024", "April")).await.expect("seed");

    let report = backfill_ids(&store).await.expect("backfill");
    assert_eq!(report.updated, 2);
    assert_eq!(report.conflicts, 1);

    let rerun = backfill_ids(&store).await.expect("rerun");
    assert_eq!(rerun.updated, 0);
    // the colliding document is still unresolved, and still reported
    assert_eq!(rerun.conflicts, 1);
}
