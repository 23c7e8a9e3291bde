//! Import Integration Tests
//!
//! Validation, dedup, unique naming, progress reporting and thumbnail
//! handling for import batches.

mod common;

use std::sync::Arc;

use common::{FailingExtractor, Fixture, RecordingExtractor};
use tokio::sync::broadcast;
use vidshelf::config::paths;
use vidshelf::domain::{ImportProgress, ImportStage, LibraryEvent, SkipReason};

fn drain(rx: &mut broadcast::Receiver<ImportProgress>) -> Vec<ImportProgress> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_import_copies_and_catalogs() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let source = fx.source("holiday.mp4");

    let items = fx.library.import_videos(&[source.clone()]).await;

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.display_name, "holiday");
    assert_eq!(item.original_source_path, source);
    assert_eq!(item.stored_path, fx.media().join("holiday.mp4"));
    assert_eq!(
        std::fs::read(&item.stored_path).unwrap(),
        std::fs::read(&source).unwrap()
    );
    assert!(source.exists(), "source must be left in place");

    let thumb = paths::thumbnail_path(fx.media(), &item.id);
    assert_eq!(item.thumbnail_path.as_deref(), Some(thumb.as_path()));
    assert_eq!(item.thumbnail(), Some(thumb.as_path()));

    let listed = fx.library.list_videos();
    assert_eq!(listed, items);
}

#[tokio::test]
async fn test_duplicate_source_is_skipped() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let source = fx.source("clip.mp4");

    assert_eq!(fx.library.import_videos(&[source.clone()]).await.len(), 1);

    let mut progress = fx.library.subscribe_progress();
    let second = fx.library.import_videos(&[source.clone()]).await;

    assert!(second.is_empty());
    assert_eq!(fx.library.list_videos().len(), 1);
    assert!(!fx.media().join("clip (1).mp4").exists());

    let stages: Vec<ImportStage> = drain(&mut progress).into_iter().map(|p| p.stage).collect();
    assert!(stages.contains(&ImportStage::Skipped(SkipReason::Duplicate)));
}

#[tokio::test]
async fn test_name_collision_gets_numbered_suffix() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let first = fx.source("a/clip.mp4");
    let second = fx.source("b/clip.mp4");
    let third = fx.source("c/clip.mp4");

    let items = fx.library.import_videos(&[first, second, third]).await;

    let stored: Vec<_> = items.iter().map(|i| i.stored_path.clone()).collect();
    assert_eq!(
        stored,
        vec![
            fx.media().join("clip.mp4"),
            fx.media().join("clip (1).mp4"),
            fx.media().join("clip (2).mp4"),
        ]
    );
    assert!(items.iter().all(|i| i.display_name == "clip"));
}

#[tokio::test]
async fn test_invalid_files_are_skipped_without_side_effects() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let text = fx.source("notes.txt");
    let missing = fx.temp.path().join("sources").join("missing.mp4");

    let mut progress = fx.library.subscribe_progress();
    let items = fx.library.import_videos(&[text, missing]).await;

    assert!(items.is_empty());
    assert!(fx.library.list_videos().is_empty());
    assert!(!fx.media().join("notes.txt").exists());

    let skipped = drain(&mut progress)
        .into_iter()
        .filter(|p| p.stage == ImportStage::Skipped(SkipReason::Invalid))
        .count();
    assert_eq!(skipped, 2);

    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message, "No videos were imported (invalid or duplicate)");
}

#[tokio::test]
async fn test_abandoned_thumbnail_still_imports() {
    let extractor = Arc::new(FailingExtractor::default());
    let fx = Fixture::new(extractor.clone());
    let source = fx.source("corrupt.mkv");

    let items = fx.library.import_videos(&[source]).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].thumbnail_path, None);
    assert_eq!(items[0].thumbnail(), None);
    assert_eq!(extractor.calls(), 2);

    let stored = fx.library.get_video(&items[0].id).unwrap();
    assert_eq!(stored.thumbnail_path, None);
    assert!(stored.stored_path.exists());
}

#[tokio::test]
async fn test_progress_sequence() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let good = fx.source("good.webm");
    let bad = fx.source("bad.txt");

    let mut progress = fx.library.subscribe_progress();
    fx.library.import_videos(&[good.clone(), bad.clone()]).await;

    let events = drain(&mut progress);
    let stages: Vec<ImportStage> = events.iter().map(|p| p.stage.clone()).collect();
    assert_eq!(
        stages,
        vec![
            ImportStage::Starting,
            ImportStage::Processing,
            ImportStage::Imported,
            ImportStage::Processing,
            ImportStage::Skipped(SkipReason::Invalid),
            ImportStage::GeneratingThumbnails,
            ImportStage::Completed,
        ]
    );

    assert!(events.iter().all(|p| p.total == 2));
    assert_eq!(events[1].current_path.as_ref(), Some(&good));
    assert_eq!(events[2].processed, 1);
    assert_eq!(events[4].current_path.as_ref(), Some(&bad));
    assert_eq!(events[6].processed, 2);
}

#[tokio::test]
async fn test_empty_batch_emits_nothing() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let mut progress = fx.library.subscribe_progress();

    assert!(fx.library.import_videos(&[]).await.is_empty());
    assert!(drain(&mut progress).is_empty());
}

#[tokio::test]
async fn test_same_path_twice_in_one_batch() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let source = fx.source("a.mp4");

    let mut progress = fx.library.subscribe_progress();
    let items = fx.library.import_videos(&[source.clone(), source]).await;

    assert_eq!(items.len(), 1);
    assert_eq!(fx.library.list_videos().len(), 1);

    let item_stages: Vec<ImportStage> = drain(&mut progress)
        .into_iter()
        .map(|p| p.stage)
        .filter(ImportStage::is_item_terminal)
        .collect();
    assert_eq!(
        item_stages,
        vec![
            ImportStage::Imported,
            ImportStage::Skipped(SkipReason::Duplicate),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_copy_failure_fails_only_that_item() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let blocked = fx.source("blocked.mp4");
    let fine = fx.source("fine.mp4");

    // A dangling link looks free but refuses a no-overwrite create
    std::fs::create_dir_all(fx.media()).unwrap();
    std::os::unix::fs::symlink("/nonexistent/target", fx.media().join("blocked.mp4")).unwrap();

    let mut progress = fx.library.subscribe_progress();
    let items = fx.library.import_videos(&[blocked, fine]).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].display_name, "fine");

    let item_stages: Vec<ImportStage> = drain(&mut progress)
        .into_iter()
        .map(|p| p.stage)
        .filter(ImportStage::is_item_terminal)
        .collect();
    assert_eq!(item_stages.len(), 2);
    assert!(matches!(item_stages[0], ImportStage::Failed(_)));
    assert_eq!(item_stages[1], ImportStage::Imported);
}

#[tokio::test]
async fn test_stale_stored_path_is_not_reused() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));
    let first = fx.library.import_videos(&[fx.source("a/x.mp4")]).await.remove(0);

    // Stored file vanishes while its row is still cataloged
    std::fs::remove_file(&first.stored_path).unwrap();

    let mut events = fx.library.subscribe();
    let items = fx
        .library
        .import_videos(&[fx.source("b/y.mp4"), fx.source("c/x.mp4")])
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[1].stored_path, fx.media().join("x (1).mp4"));
    assert!(items.iter().all(|i| i.thumbnail().is_some()));

    match events.try_recv().unwrap() {
        LibraryEvent::Imported { items: evented } => assert_eq!(evented, items),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(fx.notifier.sent().last().unwrap().message, "Imported 2 video(s)");
}

#[tokio::test]
async fn test_catalog_failure_fails_only_that_item() {
    let fx = Fixture::new(Arc::new(RecordingExtractor::default()));

    // Make the catalog reject one specific row
    let conn = rusqlite::Connection::open(fx.config.database_path()).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_bad BEFORE INSERT ON Media
         WHEN NEW.DisplayName = 'bad'
         BEGIN SELECT RAISE(ABORT, 'row rejected'); END;",
    )
    .unwrap();
    drop(conn);

    let mut progress = fx.library.subscribe_progress();
    let mut events = fx.library.subscribe();
    let items = fx
        .library
        .import_videos(&[fx.source("good.mp4"), fx.source("bad.mp4"), fx.source("later.mp4")])
        .await;

    let names: Vec<&str> = items.iter().map(|i| i.display_name.as_str()).collect();
    assert_eq!(names, vec!["good", "later"]);
    assert!(items.iter().all(|i| i.thumbnail().is_some()));

    // Rejected copy and its thumbnail are cleaned up
    assert!(!fx.media().join("bad.mp4").exists());
    let thumbs = std::fs::read_dir(paths::thumbnails_dir(fx.media())).unwrap().count();
    assert_eq!(thumbs, 2);

    let failed: Vec<ImportStage> = drain(&mut progress)
        .into_iter()
        .map(|p| p.stage)
        .filter(|stage| matches!(stage, ImportStage::Failed(_)))
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(matches!(&failed[0], ImportStage::Failed(msg) if msg.contains("row rejected")));

    match events.try_recv().unwrap() {
        LibraryEvent::Imported { items: evented } => assert_eq!(evented.len(), 2),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(fx.notifier.sent().last().unwrap().message, "Imported 2 video(s)");
}
