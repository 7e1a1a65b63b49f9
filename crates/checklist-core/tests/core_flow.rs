use chrono::{Duration, NaiveDate, TimeZone, Utc};
use checklist_core::storage::{FileStorage, KeyValueStore, StorageKey};
use checklist_core::store::TaskStore;
use checklist_core::task::Priority;
use checklist_core::view::{SortKey, ViewFilter, ViewQuery};
use tempfile::tempdir;

#[test]
fn file_slot_roundtrip_and_view() {
    let temp = tempdir().expect("tempdir");
    let key = StorageKey::default();
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).single().expect("valid now");
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date");

    {
        let storage = FileStorage::open(temp.path()).expect("open storage");
        let mut store = TaskStore::open(storage, &key);
        store
            .add_at("Buy milk", NaiveDate::from_ymd_opt(2024, 6, 14), Priority::High, now)
            .expect("add milk");
        let eggs = store
            .add_at("Buy eggs", None, Priority::Low, now + Duration::minutes(1))
            .expect("add eggs");
        store
            .add_at("Write report", NaiveDate::from_ymd_opt(2024, 6, 30), Priority::Medium, now + Duration::minutes(2))
            .expect("add report");
        store.toggle_completed(&eggs.id);
    }

    let storage = FileStorage::open(temp.path()).expect("reopen storage");
    let store = TaskStore::open(storage, &key);
    assert_eq!(store.tasks().len(), 3);

    let active_buys = store.view(&ViewQuery::new(ViewFilter::Active, "BUY", SortKey::CreatedDesc), today);
    let titles: Vec<&str> = active_buys.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Buy milk"]);

    let overdue = store.view(&ViewQuery::new(ViewFilter::Overdue, "", SortKey::DueAsc), today);
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].title, "Buy milk");

    let stats = store.stats(today);
    assert_eq!((stats.total, stats.completed, stats.overdue), (3, 1, 1));
}

#[test]
fn slot_uses_browser_record_layout() {
    let temp = tempdir().expect("tempdir");
    let key = StorageKey::default().with_namespace(Some("alice"));
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).single().expect("valid now");

    let mut storage = FileStorage::open(temp.path()).expect("open storage");
    {
        let mut store = TaskStore::open(&mut storage, &key);
        store.add_at("Call mom", None, Priority::Medium, now).expect("add");
    }

    let raw = storage
        .get("advanced_todo_tasks_v1:alice")
        .expect("read slot")
        .expect("slot present");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let record = &value[0];

    assert_eq!(record["title"], "Call mom");
    assert_eq!(record["due"], serde_json::Value::Null);
    assert_eq!(record["priority"], "medium");
    assert_eq!(record["completed"], false);
    assert_eq!(record["createdAt"], "2024-06-15T09:00:00.000Z");
    assert!(record["id"].is_string());
}

#[test]
fn reads_lists_written_by_the_browser() {
    let temp = tempdir().expect("tempdir");
    let key = StorageKey::default();
    let mut storage = FileStorage::open(temp.path()).expect("open storage");
    storage
        .set(
            &key.as_key(),
            r#"[{"id":"1718442000000","title":"Pay rent","due":"2024-06-01","priority":"high","completed":false,"createdAt":"2024-06-15T09:00:00.000Z"},
                {"id":"1718438400000","title":"Stretch","due":null,"priority":"low","completed":true,"createdAt":"2024-06-15T08:00:00.000Z"}]"#,
        )
        .expect("seed slot");

    let mut store = TaskStore::open(&mut storage, &key);
    assert_eq!(store.tasks().len(), 2);

    let removed = store.clear_completed();
    assert_eq!(removed, 1);
    drop(store);

    let reopened = TaskStore::open(&mut storage, &key);
    let titles: Vec<&str> = reopened.tasks().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Pay rent"]);
}
