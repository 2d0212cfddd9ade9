use std::ffi::OsString;
use std::fs;
use std::path::Path;

use brightday_core::datastore::{BirthdayStore, STORAGE_KEY};
use brightday_core::datetime::LeapDayPolicy;
use brightday_core::entry::EntryDraft;
use brightday_core::filter::{FilterMode, ListQuery, SortMode};
use brightday_core::storage::{FileStore, KeyValueStore};
use brightday_core::tracker::Tracker;
use chrono::NaiveDate;
use tempfile::tempdir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 20).expect("valid date")
}

fn run_in(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let rc = dir.join("test.rc");
    if !rc.exists() {
        fs::write(&rc, "color=off\n").expect("write rc");
    }

    let mut argv: Vec<OsString> = vec![
        "brightday".into(),
        "--brightdayrc".into(),
        rc.into_os_string(),
        "--data".into(),
        dir.join("data").into_os_string(),
        "--today".into(),
        "2024-06-20".into(),
    ];
    argv.extend(args.iter().map(OsString::from));
    brightday_core::run(argv)
}

fn stored_names(dir: &Path) -> Vec<String> {
    let store = FileStore::open(&dir.join("data")).expect("open store");
    BirthdayStore::new(store)
        .load()
        .iter()
        .map(|e| e.name().to_string())
        .collect()
}

#[test]
fn tracker_on_disk_roundtrip_and_listing() {
    let temp = tempdir().expect("tempdir");
    let store = FileStore::open(temp.path()).expect("open store");
    let mut tracker = Tracker::open(store, LeapDayPolicy::default());

    tracker
        .add(EntryDraft {
            name: "Alice".to_string(),
            date: "2024-06-21".to_string(),
            ..EntryDraft::default()
        })
        .expect("add alice");
    tracker
        .add(EntryDraft {
            name: "Bob".to_string(),
            date: "2024-01-01".to_string(),
            note: Some("new year".to_string()),
            ..EntryDraft::default()
        })
        .expect("add bob");
    assert!(tracker.last_save_ok());

    let reopened = Tracker::open(
        FileStore::open(temp.path()).expect("reopen store"),
        LeapDayPolicy::default(),
    );
    assert_eq!(reopened.entries(), tracker.entries());

    let soonest = reopened.view(&ListQuery::default(), today());
    assert_eq!(soonest[0].entry.name(), "Alice");
    assert_eq!(soonest[0].days, 1);

    let wrap_day = NaiveDate::from_ymd_opt(2024, 12, 31).expect("valid date");
    let bob = reopened.view(
        &ListQuery {
            search: "YEAR".to_string(),
            sort: SortMode::Name,
            filter: FilterMode::Today,
        },
        wrap_day,
    );
    assert!(bob.is_empty());
    let bob = reopened.view(
        &ListQuery {
            search: "YEAR".to_string(),
            ..ListQuery::default()
        },
        wrap_day,
    );
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].days, 1);
}

#[test]
fn corrupt_store_file_opens_empty() {
    let temp = tempdir().expect("tempdir");
    let mut store = FileStore::open(temp.path()).expect("open store");
    store
        .set_item(STORAGE_KEY, r#"{"not":"a list"}"#.to_string())
        .expect("seed store");

    let tracker = Tracker::open(store, LeapDayPolicy::default());
    assert!(tracker.entries().is_empty());
}

#[test]
fn cli_add_modify_delete_flow() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path();

    run_in(dir, &["add", "Alice", "Morgan", "date:2024-06-21", "note:Brunch"]).expect("add");
    run_in(dir, &["add", "Bob", "date:2024-01-01"]).expect("add bob");
    assert_eq!(stored_names(dir), vec!["Alice Morgan", "Bob"]);

    let err = run_in(dir, &["add", "date:2024-06-21"]).expect_err("empty name rejected");
    assert!(format!("{err:#}").contains("a name is required"));
    let err = run_in(dir, &["add", "Cy", "date:someday"]).expect_err("bad date rejected");
    assert!(format!("{err:#}").contains("invalid date"));
    assert_eq!(stored_names(dir).len(), 2);

    let store = BirthdayStore::new(FileStore::open(&dir.join("data")).expect("open store"));
    let bob_id = store
        .load()
        .iter()
        .find(|e| e.name() == "Bob")
        .map(|e| e.id().to_string())
        .expect("bob stored");

    run_in(dir, &["mod", bob_id.as_str(), "name:Bob Stone"]).expect("modify");
    assert_eq!(stored_names(dir), vec!["Alice Morgan", "Bob Stone"]);

    run_in(dir, &["list", "filter:this-week", "sort:name"]).expect("list");
    run_in(dir, &["info", bob_id.as_str()]).expect("info");
    run_in(dir, &["stats"]).expect("stats");

    run_in(dir, &["delete", bob_id.as_str(), "--yes"]).expect("delete");
    assert_eq!(stored_names(dir), vec!["Alice Morgan"]);
}

#[test]
fn cli_sample_and_rc_override() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path();

    run_in(dir, &["sample"]).expect("sample");
    assert_eq!(stored_names(dir), vec!["Alice Morgan", "Ben Carter", "Jia Chen"]);

    let err = run_in(dir, &["rc.leapday=sometimes", "list"]).expect_err("bad leapday");
    assert!(format!("{err:#}").contains("invalid leapday"));
}

#[test]
fn ephemeral_runs_leave_no_store() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path();

    run_in(dir, &["--ephemeral", "add", "Alice", "date:2024-06-21"]).expect("add");
    assert!(!dir.join("data").join(FileStore::FILE_NAME).exists());
}

#[test]
fn delete_without_prompt_when_confirmation_is_off() {
    let temp = tempdir().expect("tempdir");
    let dir = temp.path();

    run_in(dir, &["add", "Alice", "date:2024-06-21"]).expect("add alice");
    run_in(dir, &["add", "Bob", "date:2024-01-01"]).expect("add bob");

    let store = BirthdayStore::new(FileStore::open(&dir.join("data")).expect("open store"));
    let bob_id = store
        .load()
        .iter()
        .find(|e| e.name() == "Bob")
        .map(|e| e.id().to_string())
        .expect("bob stored");

    run_in(dir, &["rc.confirmation=off", "delete", bob_id.as_str()]).expect("delete");
    assert_eq!(stored_names(dir), vec!["Alice"]);
}
