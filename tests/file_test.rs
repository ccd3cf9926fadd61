//! Integration tests for the file record store and quota accounting.

mod common;

use bytes::Bytes;

use mycloud_core::error::ErrorKind;
use mycloud_core::types::PageRequest;

#[tokio::test]
async fn test_upload_commits_measured_size() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let file = app
        .files
        .upload(&ctx, "hello.txt", Bytes::from_static(b"hello world"), None)
        .await
        .unwrap();

    assert_eq!(file.size_bytes, 11);
    assert_eq!(file.original_name, "hello.txt");
    assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
    assert_ne!(file.name, "hello.txt");
    assert_eq!(app.used(&ctx).await, 11);
    assert_eq!(app.stored_file_count(), 1);
}

#[tokio::test]
async fn test_upload_over_quota_rejected_without_leftovers() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(100).await;

    app.files
        .upload(&ctx, "a.bin", Bytes::from(common::filler(80)), None)
        .await
        .unwrap();
    let err = app
        .files
        .upload(&ctx, "b.bin", Bytes::from(common::filler(30)), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::QuotaExceeded);
    assert_eq!(app.used(&ctx).await, 80);
    assert_eq!(app.files_in(&ctx, None).await.len(), 1);
    assert_eq!(app.stored_file_count(), 1);
}

#[tokio::test]
async fn test_upload_into_missing_folder_not_found() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let err = app
        .files
        .upload(
            &ctx,
            "a.txt",
            Bytes::from_static(b"a"),
            Some(uuid::Uuid::new_v4()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(app.used(&ctx).await, 0);
}

#[tokio::test]
async fn test_trash_keeps_quota_and_purge_releases_it() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let file = app
        .files
        .upload(&ctx, "doc.txt", Bytes::from(common::filler(40)), None)
        .await
        .unwrap();

    let trashed = app.files.trash(&ctx, file.id).await.unwrap();
    assert!(trashed.is_trashed);
    assert!(trashed.trashed_at.is_some());
    assert_eq!(app.used(&ctx).await, 40);
    assert!(app.files_in(&ctx, None).await.is_empty());
    assert_eq!(app.files.list_trash(&ctx).await.unwrap().len(), 1);

    let restored = app.files.restore(&ctx, file.id).await.unwrap();
    assert!(!restored.is_trashed);
    assert!(restored.trashed_at.is_none());

    app.files.trash(&ctx, file.id).await.unwrap();
    app.files.purge(&ctx, file.id).await.unwrap();
    assert_eq!(app.used(&ctx).await, 0);
    assert_eq!(app.stored_file_count(), 0);

    let err = app.files.get(&ctx, file.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_empty_trash_purges_only_trashed() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let mut ids = Vec::new();
    for name in ["a.txt", "b.txt", "c.txt"] {
        let file = app
            .files
            .upload(&ctx, name, Bytes::from(common::filler(10)), None)
            .await
            .unwrap();
        ids.push(file.id);
    }
    app.files.trash(&ctx, ids[0]).await.unwrap();
    app.files.trash(&ctx, ids[1]).await.unwrap();

    assert_eq!(app.files.empty_trash(&ctx).await.unwrap(), 2);
    assert_eq!(app.used(&ctx).await, 10);
    assert_eq!(app.files_in(&ctx, None).await.len(), 1);
}

#[tokio::test]
async fn test_bulk_delete_counts_successes() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let file = app
        .files
        .upload(&ctx, "a.txt", Bytes::from(common::filler(5)), None)
        .await
        .unwrap();
    let purged = app
        .files
        .bulk_delete(&ctx, &[file.id, uuid::Uuid::new_v4()])
        .await
        .unwrap();

    assert_eq!(purged, 1);
    assert_eq!(app.used(&ctx).await, 0);
}

#[tokio::test]
async fn test_copy_duplicates_bytes_and_quota() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;
    let folder = app.folders.create(&ctx, "dest", None).await.unwrap();

    let file = app
        .files
        .upload(&ctx, "report.pdf", Bytes::from(common::filler(30)), None)
        .await
        .unwrap();
    let copy = app.files.copy(&ctx, file.id, Some(folder.id)).await.unwrap();

    assert_ne!(copy.id, file.id);
    assert_ne!(copy.stored_path, file.stored_path);
    assert_eq!(copy.original_name, "report (copy).pdf");
    assert_eq!(copy.size_bytes, 30);
    assert_eq!(copy.folder_id, Some(folder.id));
    assert_eq!(app.used(&ctx).await, 60);
    assert_eq!(app.stored_file_count(), 2);

    // Purging the copy leaves the original bytes alone.
    app.files.purge(&ctx, copy.id).await.unwrap();
    assert_eq!(app.stored_file_count(), 1);
}

#[tokio::test]
async fn test_copy_over_quota_rejected() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(50).await;

    let file = app
        .files
        .upload(&ctx, "big.bin", Bytes::from(common::filler(40)), None)
        .await
        .unwrap();
    let err = app.files.copy(&ctx, file.id, None).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::QuotaExceeded);
    assert_eq!(app.used(&ctx).await, 40);
    assert_eq!(app.stored_file_count(), 1);
}

#[tokio::test]
async fn test_rename_and_move() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;
    let folder = app.folders.create(&ctx, "docs", None).await.unwrap();

    let file = app
        .files
        .upload(&ctx, "notes.txt", Bytes::from_static(b"n"), None)
        .await
        .unwrap();

    let renamed = app.files.rename(&ctx, file.id, "notes.md").await.unwrap();
    assert_eq!(renamed.original_name, "notes.md");
    assert_eq!(renamed.stored_path, file.stored_path);

    let moved = app.files.move_to(&ctx, file.id, Some(folder.id)).await.unwrap();
    assert_eq!(moved.folder_id, Some(folder.id));
    assert_eq!(app.used(&ctx).await, 1);

    let err = app.files.rename(&ctx, file.id, "bad/name").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_bulk_move_validates_target_once() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;
    let other = app.create_user(1000).await;
    let foreign = app.folders.create(&other, "theirs", None).await.unwrap();
    let mine = app.folders.create(&ctx, "mine", None).await.unwrap();

    let mut ids = Vec::new();
    for name in ["a.txt", "b.txt"] {
        ids.push(
            app.files
                .upload(&ctx, name, Bytes::from_static(b"x"), None)
                .await
                .unwrap()
                .id,
        );
    }

    let err = app
        .files
        .bulk_move(&ctx, &ids, Some(foreign.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(app.files_in(&ctx, None).await.len(), 2);

    let moved = app.files.bulk_move(&ctx, &ids, Some(mine.id)).await.unwrap();
    assert_eq!(moved, 2);
    assert_eq!(app.files_in(&ctx, Some(mine.id)).await.len(), 2);
}

#[tokio::test]
async fn test_other_users_files_are_invisible() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let owner = app.create_user(1000).await;
    let intruder = app.create_user(1000).await;

    let file = app
        .files
        .upload(&owner, "secret.txt", Bytes::from_static(b"s"), None)
        .await
        .unwrap();

    for err in [
        app.files.get(&intruder, file.id).await.unwrap_err(),
        app.files.trash(&intruder, file.id).await.unwrap_err(),
        app.files.purge(&intruder, file.id).await.unwrap_err(),
    ] {
        assert_eq!(err.kind, ErrorKind::NotFound);
    }
    assert_eq!(app.used(&owner).await, 1);
}

#[tokio::test]
async fn test_search_and_favorites() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    for name in ["Budget 2024.xlsx", "budget_notes.txt", "photo.jpg", "100%.txt"] {
        app.files
            .upload(&ctx, name, Bytes::from_static(b"x"), None)
            .await
            .unwrap();
    }

    let page = app
        .files
        .search(&ctx, "budget", PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.total_items, 2);

    let literal = app
        .files
        .search(&ctx, "%", PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(literal.total_items, 1);
    assert_eq!(literal.items[0].original_name, "100%.txt");

    let err = app
        .files
        .search(&ctx, "   ", PageRequest::new(1, 10))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let starred = page.items[0].id;
    app.files.set_favorite(&ctx, starred, true).await.unwrap();
    let favorites = app.files.list_favorites(&ctx).await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id, starred);
}

#[tokio::test]
async fn test_stats() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;
    app.folders.create(&ctx, "f", None).await.unwrap();
    app.files
        .upload(&ctx, "a.txt", Bytes::from(common::filler(250)), None)
        .await
        .unwrap();

    let stats = app.files.stats(&ctx).await.unwrap();
    assert_eq!(stats.quota.used_bytes, 250);
    assert_eq!(stats.quota.total_bytes, 1000);
    assert_eq!(stats.quota.available_bytes, 750);
    assert_eq!(stats.file_count, 1);
    assert_eq!(stats.folder_count, 1);
}
