// Backups and restores end to end, including the file-backed store.

mod common;

use std::sync::Arc;

use serde_json::json;

use bookmark_guardian::bookmarks::{
    flatten, BookmarkNode, BookmarkStore, CreateRequest, FolderNode, JsonFileStore, MemoryStore,
};
use bookmark_guardian::error::ValidationError;
use bookmark_guardian::run::EventBus;
use bookmark_guardian::snapshot::{FileStorage, MemoryStorage, RestoreOutcome, Snapshot, SnapshotManager};
use common::{harness, outline, ScriptedProbe};

fn nested_tree() -> Vec<FolderNode> {
    vec![
        FolderNode::new(
            "Bookmarks bar",
            vec![
                BookmarkNode::folder(
                    "Rust",
                    vec![
                        BookmarkNode::bookmark("Book", "https://doc.rust-lang.org/book/"),
                        BookmarkNode::folder("Empty", Vec::new()),
                        BookmarkNode::folder(
                            "Async",
                            vec![BookmarkNode::bookmark("Tokio", "https://tokio.rs")],
                        ),
                    ],
                ),
                BookmarkNode::bookmark("News", "https://news.example"),
            ],
        ),
        FolderNode::new("Other bookmarks", vec![BookmarkNode::bookmark("Crates", "https://crates.io")]),
    ]
}

fn manager_over(store: Arc<MemoryStore>) -> SnapshotManager {
    SnapshotManager::new(store, Arc::new(MemoryStorage::new()), EventBus::default())
}

#[tokio::test]
async fn restore_onto_empty_store_recreates_single_folder() {
    let store = Arc::new(MemoryStore::new());
    let snapshots = manager_over(store.clone());

    let outcome = snapshots
        .restore_from_data(&json!({
            "version": "1.0",
            "tree": [{ "title": "Bar", "children": [{ "title": "x", "url": "http://x" }] }]
        }))
        .await
        .unwrap();

    assert!(matches!(outcome, RestoreOutcome::Restored(_)));
    assert_eq!(outline(&store.roots()), vec!["Bar/", "  x <http://x>"]);
}

#[tokio::test]
async fn captured_tree_round_trips_through_an_empty_store() {
    let source = Arc::new(MemoryStore::from_roots(nested_tree(), true));
    let snapshot = manager_over(source.clone()).capture().await.unwrap();

    let target = Arc::new(MemoryStore::new());
    let outcome = manager_over(target.clone()).restore(&snapshot).await;

    match outcome {
        RestoreOutcome::Restored(report) => {
            // 5 folders (2 roots, Rust, Empty, Async) + 4 bookmarks
            assert_eq!(report.created, 9);
            assert_eq!(report.create_failed, 0);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(outline(&target.roots()), outline(&source.roots()));
}

#[tokio::test]
async fn capture_twice_gives_identical_roots() {
    let store = Arc::new(MemoryStore::from_roots(nested_tree(), true));
    let snapshots = manager_over(store);
    let first = snapshots.capture().await.unwrap();
    let second = snapshots.capture().await.unwrap();
    assert_eq!(first.roots, second.roots);
}

#[tokio::test]
async fn rejected_backup_never_mutates() {
    let store = Arc::new(MemoryStore::from_roots(nested_tree(), true));
    let snapshots = manager_over(store.clone());

    let no_version = json!({ "tree": [{ "title": "Bar", "children": [] }] });
    let no_tree = json!({ "version": "1.0" });

    assert_eq!(
        snapshots.restore_from_data(&no_version).await.unwrap_err(),
        ValidationError::MissingVersion
    );
    assert_eq!(
        snapshots.restore_from_data(&no_tree).await.unwrap_err(),
        ValidationError::MissingTree
    );
    assert_eq!(store.mutation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn restore_undoes_a_check_run() {
    let store = MemoryStore::from_roots(nested_tree(), true);
    let probe = Arc::new(ScriptedProbe::new(&["https://tokio.rs", "https://crates.io"]));
    let h = harness(store, probe, 3);
    let before = outline(&h.store.roots());

    h.controller.start().await;
    assert_eq!(flatten(&h.store.roots()).count(), 2);

    assert!(matches!(
        h.snapshots.restore_latest().await,
        RestoreOutcome::Restored(_)
    ));
    assert_eq!(outline(&h.store.roots()), before);
}

#[tokio::test]
async fn restore_with_nothing_stored_is_declined() {
    let h = harness(MemoryStore::from_roots(nested_tree(), true), Arc::new(ScriptedProbe::new(&[])), 3);
    assert_eq!(h.snapshots.restore_latest().await, RestoreOutcome::NoSnapshot);
    assert_eq!(h.store.mutation_count(), 0);
}

#[tokio::test]
async fn file_backed_backup_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let bookmarks = dir.path().join("bookmarks.json");
    let state = dir.path().join("state.json");
    std::fs::write(&bookmarks, serde_json::to_string(&json!({ "roots": nested_tree() })).unwrap()).unwrap();

    // First process: back up, then lose a bookmark.
    {
        let store = Arc::new(JsonFileStore::open(&bookmarks).await.unwrap());
        let snapshots = SnapshotManager::new(store.clone(), Arc::new(FileStorage::new(&state)), EventBus::default());
        snapshots.capture().await.unwrap();
        let news = flatten(&store.get_tree().await.unwrap())
            .find(|entry| entry.title == "News")
            .unwrap();
        store.remove(news.id.as_ref().unwrap()).await.unwrap();
    }

    // Second process: the backup is still there and brings News back.
    let store = Arc::new(JsonFileStore::open(&bookmarks).await.unwrap());
    assert_eq!(flatten(&store.get_tree().await.unwrap()).count(), 3);
    let snapshots = SnapshotManager::new(store.clone(), Arc::new(FileStorage::new(&state)), EventBus::default());
    assert!(snapshots.load().await.unwrap().is_some());
    assert!(snapshots.exists().await);

    assert!(matches!(snapshots.restore_latest().await, RestoreOutcome::Restored(_)));
    let reopened = JsonFileStore::open(&bookmarks).await.unwrap();
    let titles: Vec<String> = flatten(&reopened.get_tree().await.unwrap()).map(|e| e.title).collect();
    assert_eq!(titles, vec!["Book", "Tokio", "News", "Crates"]);
}

#[tokio::test]
async fn exported_backup_can_be_restored_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MemoryStore::from_roots(nested_tree(), true));
    let snapshot = manager_over(source.clone()).capture().await.unwrap();
    let path = dir.path().join(snapshot.default_file_name());
    SnapshotManager::export(&snapshot, &path).await.unwrap();

    // A different install with the same two containers, already holding other bookmarks.
    let target = Arc::new(MemoryStore::from_roots(
        vec![
            FolderNode::new("Bookmarks bar", vec![BookmarkNode::bookmark("Old", "https://old.example")]),
            FolderNode::new("Other bookmarks", Vec::new()),
        ],
        true,
    ));
    target
        .create(CreateRequest {
            parent_id: target.roots()[1].id.clone(),
            title: "Stale".to_string(),
            url: None,
        })
        .await
        .unwrap();

    let data: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let outcome = manager_over(target.clone()).restore_from_data(&data).await.unwrap();
    assert!(matches!(outcome, RestoreOutcome::Restored(_)));
    assert_eq!(outline(&target.roots()), outline(&source.roots()));
}

#[tokio::test]
async fn snapshot_file_names_carry_the_date() {
    let snapshot = Snapshot::new(Vec::new());
    let name = snapshot.default_file_name();
    assert!(name.starts_with("bookmark-backup-"));
    assert!(name.ends_with(".json"));
}
