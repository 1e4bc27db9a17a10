use mgnrega_districts_core::Record;
use mgnrega_districts_store::{
    DistrictQuery, DocumentStore, SqliteStore, StoreErrorCode,
};
use serde_json::json;
use tempfile::tempdir;

fn record(state: i64, district: i64, fin_year: &str, month: &str) -> Record {
    Record::from_value(json!({
        "state_code": state,
        "district_code": district,
        "state_name": "Uttar Pradesh",
        "district_name": "Agra",
        "fin_year": fin_year,
        "month": month,
    }))
    .expect("record")
}

#[tokio::test]
async fn upsert_is_update_or_insert_on_id() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");

    let mut r = record(9, 12, "2023-2024", "April");
    store.upsert_by_id("9_12_2023-2024_April", &r).await.expect("insert");

    r.extra.insert("payload".to_string(), json!("x"));
    store.upsert_by_id("9_12_2023-2024_April", &r).await.expect("update");

    let stored = store
        .find_by_id("9_12_2023-2024_April")
        .await
        .expect("find")
        .expect("present");
    assert_eq!(stored.record.extra.get("payload"), Some(&json!("x")));
    assert_eq!(stored.record.id.as_deref(), Some("9_12_2023-2024_April"));

    // still exactly one row for that id
    let hits = store
        .query_district(&DistrictQuery {
            state_code: 9,
            district_code: 12,
            month: None,
            fin_year: None,
            limit: 24,
        })
        .await
        .expect("query");
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn partial_unique_index_allows_many_idless_rows() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");

    store.insert_legacy(&record(9, 12, "2023-2024", "April")).await.expect("legacy 1");
    store.insert_legacy(&record(9, 13, "2023-2024", "April")).await.expect("legacy 2");
    store.insert_legacy(&record(9, 14, "2023-2024", "April")).await.expect("legacy 3");

    let missing = store.find_missing_id().await.expect("working set");
    assert_eq!(missing.len(), 3);
    assert!(missing.iter().all(|d| d.record.id.is_none()));
}

#[tokio::test]
async fn assign_id_hits_unique_index_when_id_taken() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");

    store
        .upsert_by_id("9_12_2023-2024_April", &record(9, 12, "2023-2024", "April"))
        .await
        .expect("upsert");
    let key = store
        .insert_legacy(&record(9, 12, "2023-2024", "April"))
        .await
        .expect("legacy");

    let err = store
        .assign_id(key, "9_12_2023-2024_April")
        .await
        .expect_err("unique index must reject");
    assert_eq!(err.code, StoreErrorCode::UniqueViolation);
}

#[tokio::test]
async fn assign_id_never_overwrites_an_assigned_id() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");

    let key = store
        .insert_legacy(&record(9, 12, "2023-2024", "April"))
        .await
        .expect("legacy");
    assert!(store.assign_id(key, "first").await.expect("assign"));
    assert!(!store.assign_id(key, "second").await.expect("second assign is a no-op"));

    let stored = store.find_by_id("first").await.expect("find").expect("present");
    assert_eq!(stored.key, key);
    assert!(store.find_by_id("second").await.expect("find").is_none());
}

#[tokio::test]
async fn district_query_filters_and_orders_newest_first() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");

    let mut april = record(9, 12, "2023-2024", "April");
    april
        .extra
        .insert("created_at".to_string(), json!("2023-05-01T00:00:00Z"));
    let mut may = record(9, 12, "2023-2024", "May");
    may.extra
        .insert("created_at".to_string(), json!("2023-06-01T00:00:00Z"));
    store.upsert_by_id("9_12_2023-2024_April", &april).await.expect("april");
    store.upsert_by_id("9_12_2023-2024_May", &may).await.expect("may");
    store
        .upsert_by_id("10_3_2023-2024_April", &record(10, 3, "2023-2024", "April"))
        .await
        .expect("other district");

    let all = store
        .query_district(&DistrictQuery {
            state_code: 9,
            district_code: 12,
            month: None,
            fin_year: None,
            limit: 24,
        })
        .await
        .expect("query");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].month.as_deref(), Some("May"));

    let narrowed = store
        .query_district(&DistrictQuery {
            state_code: 9,
            district_code: 12,
            month: Some("April".to_string()),
            fin_year: Some("2023-2024".to_string()),
            limit: 24,
        })
        .await
        .expect("narrowed query");
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].month.as_deref(), Some("April"));
}

#[tokio::test]
async fn place_lookup_is_case_insensitive_exact() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");
    store
        .upsert_by_id("9_12_2023-2024_April", &record(9, 12, "2023-2024", "April"))
        .await
        .expect("upsert");

    let hits = store
        .find_by_place(Some("AGRA"), Some("uttar pradesh"), 200)
        .await
        .expect("place lookup");
    assert_eq!(hits.len(), 1);

    let miss = store
        .find_by_place(Some("Agr"), None, 200)
        .await
        .expect("prefix must not match");
    assert!(miss.is_empty());
}

#[tokio::test]
async fn distinct_listings() {
    let dir = tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("records.db")).expect("open store");
    store
        .upsert_by_id("9_12_2023-2024_April", &record(9, 12, "2023-2024", "April"))
        .await
        .expect("one");
    store
        .upsert_by_id("9_12_2023-2024_May", &record(9, 12, "2023-2024", "May"))
        .await
        .expect("two");

    let districts = store.list_districts(9).await.expect("districts");
    assert_eq!(districts.len(), 1);
    assert_eq!(districts[0].district_code, Some(12));

    let states = store.list_states().await.expect("states");
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].state_name.as_deref(), Some("Uttar Pradesh"));
}
