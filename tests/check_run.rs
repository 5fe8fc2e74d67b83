// End-to-end check runs against an in-memory store.

mod common;

use std::sync::Arc;

use bookmark_guardian::bookmarks::{flatten, BookmarkNode, FolderNode, MemoryStore};
use bookmark_guardian::checker::{RunOutcome, Stats};
use bookmark_guardian::run::{Event, StartOutcome};
use common::{flat_store, harness, outline, ScriptedProbe};

#[tokio::test(start_paused = true)]
async fn dead_bookmark_is_removed_from_work_folder() {
    let store = MemoryStore::from_roots(
        vec![FolderNode::new(
            "Bookmarks bar",
            vec![BookmarkNode::folder(
                "Work",
                vec![
                    BookmarkNode::bookmark("a", "https://a.example"),
                    BookmarkNode::bookmark("b", "https://b.example"),
                ],
            )],
        )],
        true,
    );
    let probe = Arc::new(ScriptedProbe::new(&["https://b.example"]));
    let h = harness(store, probe, 2);
    let mut rx = h.events.subscribe();

    let outcome = h.controller.start().await;

    let expected = Stats { total: 2, checked: 2, dead: 1, removed: 1 };
    assert_eq!(
        outcome,
        StartOutcome::Finished {
            outcome: RunOutcome::Completed,
            stats: expected
        }
    );

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert_eq!(last, Some(Event::CheckingComplete { stats: expected }));

    assert_eq!(
        outline(&h.store.roots()),
        vec!["Bookmarks bar/", "  Work/", "    a <https://a.example>"]
    );
}

#[tokio::test(start_paused = true)]
async fn every_bookmark_probed_once_for_any_batch_size() {
    for batch_size in [1, 2, 3, 5, 8] {
        let probe = Arc::new(ScriptedProbe::new(&[]));
        let h = harness(flat_store(8), probe.clone(), batch_size);

        match h.controller.start().await {
            StartOutcome::Finished { outcome, stats } => {
                assert_eq!(outcome, RunOutcome::Completed);
                assert_eq!(stats.checked, 8, "batch size {}", batch_size);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(probe.calls().len(), 8, "batch size {}", batch_size);
    }
}

#[tokio::test(start_paused = true)]
async fn stop_during_first_batch_ends_run_after_it() {
    // 3 batches of 3
    let (probe, mut gate) = ScriptedProbe::gated(&[]);
    let probe = Arc::new(probe);
    let h = harness(flat_store(9), probe.clone(), 3);
    let mut rx = h.events.subscribe();

    let controller = h.controller.clone();
    let run = tokio::spawn(async move { controller.start().await });

    gate.probed.recv().await.unwrap();
    assert!(h.controller.request_stop().await);
    gate.open();

    let outcome = run.await.unwrap();
    match outcome {
        StartOutcome::Finished { outcome, stats } => {
            assert_eq!(outcome, RunOutcome::Stopped);
            assert!(stats.checked <= 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(probe.calls().len(), 3);
    assert!(!probe.calls().contains(&"https://site3.example".to_string()));

    let mut terminal = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if event.is_terminal() {
            terminal.push(event);
        }
    }
    assert_eq!(terminal.len(), 1);
    assert!(matches!(terminal[0], Event::CheckingStopped { .. }));
}

#[tokio::test(start_paused = true)]
async fn second_start_is_declined_while_running() {
    let (probe, mut gate) = ScriptedProbe::gated(&["https://site1.example"]);
    let h = harness(flat_store(4), Arc::new(probe), 2);

    let controller = h.controller.clone();
    let run = tokio::spawn(async move { controller.start().await });
    gate.probed.recv().await.unwrap();

    assert_eq!(h.controller.start().await, StartOutcome::AlreadyRunning);
    let status = h.controller.status().await;
    assert!(status.running);
    assert!(status.snapshot_exists);
    assert_eq!(status.stats.total, 4);

    gate.open();
    let outcome = run.await.unwrap();
    assert_eq!(
        outcome,
        StartOutcome::Finished {
            outcome: RunOutcome::Completed,
            stats: Stats { total: 4, checked: 4, dead: 1, removed: 1 }
        }
    );
    assert!(!h.controller.status().await.running);
}

#[tokio::test(start_paused = true)]
async fn progress_events_are_monotonic() {
    let probe = Arc::new(ScriptedProbe::new(&["https://site0.example", "https://site4.example"]));
    let h = harness(flat_store(7), probe, 3);
    let mut rx = h.events.subscribe();

    h.controller.start().await;

    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::ProgressUpdate { progress: fraction, stats, .. } = event {
            progress.push((fraction, stats));
        }
    }
    assert_eq!(progress.len(), 3);
    for pair in progress.windows(2) {
        assert!(pair[0].0 <= pair[1].0);
        assert!(pair[0].1.checked <= pair[1].1.checked);
        assert!(pair[0].1.dead <= pair[1].1.dead);
    }
    assert_eq!(progress[2].0, 1.0);
}

#[tokio::test(start_paused = true)]
async fn unprobeable_urls_are_left_alone() {
    let store = MemoryStore::from_roots(
        vec![FolderNode::new(
            "Bookmarks bar",
            vec![
                BookmarkNode::bookmark("tool", "javascript:alert(1)"),
                BookmarkNode::bookmark("notes", "file:///home/me/notes.html"),
                BookmarkNode::bookmark("site", "https://site.example"),
            ],
        )],
        true,
    );
    let probe = Arc::new(ScriptedProbe::new(&["javascript:alert(1)"]));
    let h = harness(store, probe.clone(), 3);

    h.controller.start().await;

    assert_eq!(probe.calls(), vec!["https://site.example"]);
    assert_eq!(flatten(&h.store.roots()).count(), 3);
}
