use bson::doc;
use mangoseed::errors::{SeedError, StoreError};
use mangoseed::import::{ExistingEntryBehavior, ImportSettings, Importer};
use mangoseed::outcome::Outcome;
use mangoseed::progress::{self, ProgressSink};
use mangoseed::store::MemoryStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const DB: &str = "test";

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

/// Pretty-printed records with integer ids, one comment line up front.
fn records(ids: impl IntoIterator<Item = i32>) -> String {
    let mut out = String::from("// seed data\n");
    for i in ids {
        out.push_str(&format!("{{\n  \"_id\": {i},\n  \"name\": \"animal {i}\"\n}}\n"));
    }
    out
}

fn importer(store: &MemoryStore) -> Importer {
    Importer::new(Arc::new(store.clone()))
}

fn settings(behavior: ExistingEntryBehavior) -> ImportSettings {
    ImportSettings { existing_entry_behavior: behavior, ..ImportSettings::default() }
}

#[tokio::test]
async fn drop_into_empty_collection_reports_totals() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "animals.json", &records(1..=3));
    let store = MemoryStore::new();
    let outcome = importer(&store)
        .import(DB, vec![file], &settings(ExistingEntryBehavior::Drop), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::success("Import complete. Imported 3 records from 1 file"));
    assert_eq!(store.count(DB, "animals"), 3);
    assert_eq!(store.stats().drop_calls, 1);
}

#[tokio::test]
async fn drop_replaces_previous_contents() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "animals.json", &records(1..=2));
    let store = MemoryStore::new();
    store.seed(DB, "animals", (1..=10).map(|i| doc! { "_id": i, "name": "old" }));
    importer(&store)
        .import(DB, vec![file], &settings(ExistingEntryBehavior::Drop), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    let docs = store.documents(DB, "animals");
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.get_str("name").unwrap().starts_with("animal")));
}

#[tokio::test]
async fn well_formed_files_emit_no_failure_events() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "cats.json", &records(1..=4));
    let b = write(dir.path(), "dogs.json", &records(1..=6));
    let store = MemoryStore::new();
    let (sink, mut rx) = progress::channel();
    let outcome = importer(&store)
        .import(DB, vec![a.clone(), b], &ImportSettings::default(), &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Import complete. Imported 10 records from 2 files");
    let events = progress::drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.is_success));
    assert!(events.contains(&Outcome::success(format!("Processing {}...", a.display()))));
}

#[tokio::test]
async fn malformed_records_are_reported_and_skipped() {
    let dir = tempdir().unwrap();
    let body = "{\"_id\": 1}\n{\"_id\": 2, oops}\n{\"_id\": 3}\n{\"_id\": \n}\n{\"_id\": 4}\n{\"_id\": 5}";
    let file = write(dir.path(), "birds.json", body);
    let store = MemoryStore::new();
    let (sink, mut rx) = progress::channel();
    let outcome = importer(&store)
        .import(DB, vec![file.clone()], &ImportSettings::default(), &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Import complete. Imported 4 records from 1 file");
    assert_eq!(store.count(DB, "birds"), 4);

    let failures: Vec<_> = progress::drain(&mut rx).into_iter().filter(|e| !e.is_success).collect();
    assert_eq!(
        failures,
        vec![
            Outcome::failure(format!("Error parsing record on or near line 2 in {}", file.display())),
            Outcome::failure(format!("Error parsing record on or near line 4 in {}", file.display())),
        ]
    );
}

#[tokio::test]
async fn empty_and_comment_only_files_import_nothing() {
    let dir = tempdir().unwrap();
    let empty = write(dir.path(), "empty.json", "");
    let comments = write(dir.path(), "comments.json", "// nothing\n/ here either\n\n");
    let store = MemoryStore::new();
    let outcome = importer(&store)
        .import(DB, vec![empty, comments], &ImportSettings::default(), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Import complete. Imported 0 records from 2 files");
    assert_eq!(store.stats().insert_calls, 0);
}

#[tokio::test]
async fn truncate_is_idempotent() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "fish.json", &records(1..=5));
    let store = MemoryStore::new();
    store.seed(DB, "fish", [doc! { "_id": 100 }]);
    for _ in 0..2 {
        importer(&store)
            .import(DB, vec![file.clone()], &settings(ExistingEntryBehavior::Truncate), &ProgressSink::disabled(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.count(DB, "fish"), 5);
    }
}

#[tokio::test]
async fn ignore_inserts_only_new_ids_and_leaves_existing_untouched() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "animals.json", &records(1..=5));
    let store = MemoryStore::new();
    store.seed(DB, "animals", [doc! { "_id": 2, "name": "kept" }, doc! { "_id": 4, "name": "kept" }]);
    let report = importer(&store)
        .import_report(DB, vec![file], &settings(ExistingEntryBehavior::Ignore), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.records, 5);
    assert_eq!(report.skipped, 2);
    let docs = store.documents(DB, "animals");
    assert_eq!(docs.len(), 5);
    let kept: Vec<_> = docs.iter().filter(|d| d.get_str("name").unwrap() == "kept").map(|d| d.get_i32("_id").unwrap()).collect();
    assert_eq!(kept, vec![2, 4]);
}

#[tokio::test]
async fn replace_overwrites_colliding_documents() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "animals.json", &records(1..=4));
    let store = MemoryStore::new();
    store.seed(DB, "animals", [doc! { "_id": 1, "name": "old" }, doc! { "_id": 3, "name": "old" }]);
    importer(&store)
        .import(DB, vec![file], &settings(ExistingEntryBehavior::Replace), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    let docs = store.documents(DB, "animals");
    assert_eq!(docs.len(), 4);
    assert!(docs.iter().all(|d| d.get_str("name").unwrap() != "old"));
}

#[tokio::test]
async fn collision_with_none_fails_run_but_other_files_finish() {
    let dir = tempdir().unwrap();
    let clash = write(dir.path(), "clash.json", &records(1..=3));
    let clean = write(dir.path(), "clean.json", &records(1..=5));
    let store = MemoryStore::new();
    store.seed(DB, "clash", [doc! { "_id": 2, "name": "existing" }]);
    let s = ImportSettings { max_degree_of_parallelism: 2, ..settings(ExistingEntryBehavior::None) };
    let err = importer(&store)
        .import(DB, vec![clash.clone(), clean], &s, &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap_err();
    let SeedError::Import { failures } = &err else { panic!("unexpected error {err:?}") };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, clash);
    assert!(matches!(failures[0].error, SeedError::Store(StoreError::DuplicateKey(_))));
    assert!(err.is_user_error());
    assert_eq!(store.count(DB, "clean"), 5);
}

#[tokio::test]
async fn batch_size_controls_insert_calls() {
    let dir = tempdir().unwrap();
    let exact = write(dir.path(), "exact.json", &records(1..=3));
    let over = write(dir.path(), "over.json", &records(1..=4));
    let s = ImportSettings { batch_size: 3, ..ImportSettings::default() };

    let store = MemoryStore::new();
    importer(&store).import(DB, vec![exact], &s, &ProgressSink::disabled(), &CancellationToken::new()).await.unwrap();
    assert_eq!(store.stats().insert_calls, 1);

    let store = MemoryStore::new();
    let report = importer(&store)
        .import_report(DB, vec![over], &s, &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.stats().insert_calls, 2);
    assert_eq!(report.per_file[0].batches, 2);
    assert_eq!(store.count(DB, "over"), 4);
}

#[tokio::test]
async fn records_without_id_get_object_ids() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "people.json", "{\"name\": \"a\"}\n{\"name\": \"b\"}\n");
    let store = MemoryStore::new();
    importer(&store)
        .import(DB, vec![file], &ImportSettings::default(), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    let docs = store.documents(DB, "people");
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|d| d.get_object_id("_id").is_ok()));
    assert_ne!(docs[0].get("_id"), docs[1].get("_id"));
}

#[tokio::test]
async fn cancelled_run_reports_aborted_and_touches_nothing() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "animals.json", &records(1..=3));
    let store = MemoryStore::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = importer(&store)
        .import(DB, vec![file], &settings(ExistingEntryBehavior::Drop), &ProgressSink::disabled(), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::aborted());
    assert_eq!(store.stats(), Default::default());
}

#[tokio::test]
async fn missing_file_is_a_file_failure() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new();
    let err = importer(&store)
        .import(DB, vec![dir.path().join("ghost.json")], &ImportSettings::default(), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap_err();
    let SeedError::Import { failures } = err else { panic!("expected import failure") };
    assert!(matches!(failures[0].error, SeedError::Io(_)));
}

#[tokio::test]
async fn zero_batch_size_is_rejected_up_front() {
    let store = MemoryStore::new();
    let s = ImportSettings { batch_size: 0, ..ImportSettings::default() };
    let err = importer(&store)
        .import(DB, Vec::new(), &s, &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SeedError::InvalidSettings(_)));
}

#[tokio::test]
async fn same_named_files_share_a_collection() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("more")).unwrap();
    let a = write(dir.path(), "pets.json", &records(1..=2));
    let b = write(&dir.path().join("more"), "pets.json", &records(3..=5));
    let store = MemoryStore::new();
    let outcome = importer(&store)
        .import(DB, vec![a, b], &ImportSettings::default(), &ProgressSink::disabled(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Import complete. Imported 5 records from 2 files");
    assert_eq!(store.count(DB, "pets"), 5);
}

#[tokio::test]
async fn byte_order_mark_does_not_break_first_record() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "bom.json", "\u{FEFF}{\"_id\": 1}\n{\"_id\": 2}\n");
    let store = MemoryStore::new();
    let (sink, mut rx) = progress::channel();
    let outcome = importer(&store)
        .import(DB, vec![file], &ImportSettings::default(), &sink, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.message, "Import complete. Imported 2 records from 1 file");
    assert_eq!(store.count(DB, "bom"), 2);
    assert!(progress::drain(&mut rx).iter().all(|e| e.is_success));
}
