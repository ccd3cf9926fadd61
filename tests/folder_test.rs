//! Integration tests for the folder tree store.

mod common;

use std::time::Duration;

use bytes::Bytes;

use mycloud_core::error::ErrorKind;
use mycloud_database::repositories::{FileRepository, FolderRepository};

#[tokio::test]
async fn test_create_nested_paths() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let photos = app.folders.create(&ctx, "Photos", None).await.unwrap();
    let year = app
        .folders
        .create(&ctx, "2024", Some(photos.id))
        .await
        .unwrap();

    assert_eq!(photos.path, "/Photos");
    assert_eq!(year.path, "/Photos/2024");
    assert_eq!(year.parent_id, Some(photos.id));
}

#[tokio::test]
async fn test_create_duplicate_path_rejected() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    app.folders.create(&ctx, "Docs", None).await.unwrap();
    let err = app.folders.create(&ctx, "Docs", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicatePath);

    // Another user may use the same path.
    let other = app.create_user(1000).await;
    app.folders.create(&other, "Docs", None).await.unwrap();
}

#[tokio::test]
async fn test_create_under_foreign_parent_not_found() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let owner = app.create_user(1000).await;
    let intruder = app.create_user(1000).await;

    let folder = app.folders.create(&owner, "Private", None).await.unwrap();
    let err = app
        .folders
        .create(&intruder, "Sneaky", Some(folder.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_rename_rewrites_subtree_without_touching_siblings() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let a = app.folders.create(&ctx, "a", None).await.unwrap();
    let b = app.folders.create(&ctx, "b", Some(a.id)).await.unwrap();
    app.folders.create(&ctx, "c", Some(b.id)).await.unwrap();
    let sibling = app.folders.create(&ctx, "ab", None).await.unwrap();

    let renamed = app.folders.rename(&ctx, a.id, "x").await.unwrap();
    assert_eq!(renamed.path, "/x");

    let paths: Vec<String> = app
        .all_folders(&ctx)
        .await
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["/ab", "/x", "/x/b", "/x/b/c"]);

    let untouched = app.folders.get(&ctx, sibling.id).await.unwrap();
    assert_eq!(untouched.path, "/ab");
}

#[tokio::test]
async fn test_rename_to_taken_name_rejected() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let a = app.folders.create(&ctx, "a", None).await.unwrap();
    app.folders.create(&ctx, "b", None).await.unwrap();

    let err = app.folders.rename(&ctx, a.id, "b").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicatePath);
    assert_eq!(app.folders.get(&ctx, a.id).await.unwrap().path, "/a");
}

#[tokio::test]
async fn test_move_into_self_or_descendant_detects_cycle() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let a = app.folders.create(&ctx, "a", None).await.unwrap();
    let b = app.folders.create(&ctx, "b", Some(a.id)).await.unwrap();
    let c = app.folders.create(&ctx, "c", Some(b.id)).await.unwrap();

    for target in [a.id, b.id, c.id] {
        let err = app.folders.move_to(&ctx, a.id, Some(target)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CycleDetected);
    }
    assert_eq!(app.folders.get(&ctx, c.id).await.unwrap().path, "/a/b/c");
}

#[tokio::test]
async fn test_move_rewrites_paths_and_keeps_files() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let a = app.folders.create(&ctx, "a", None).await.unwrap();
    let b = app.folders.create(&ctx, "b", Some(a.id)).await.unwrap();
    let target = app.folders.create(&ctx, "t", None).await.unwrap();
    let file = app
        .files
        .upload(&ctx, "note.txt", Bytes::from_static(b"hello"), Some(b.id))
        .await
        .unwrap();

    let moved = app.folders.move_to(&ctx, a.id, Some(target.id)).await.unwrap();
    assert_eq!(moved.path, "/t/a");
    assert_eq!(moved.parent_id, Some(target.id));
    assert_eq!(app.folders.get(&ctx, b.id).await.unwrap().path, "/t/a/b");

    let files = app.files_in(&ctx, Some(b.id)).await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, file.id);

    let back = app.folders.move_to(&ctx, a.id, None).await.unwrap();
    assert_eq!(back.path, "/a");
    assert_eq!(back.parent_id, None);
}

#[tokio::test]
async fn test_tree_nests_children() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let a = app.folders.create(&ctx, "a", None).await.unwrap();
    let b = app.folders.create(&ctx, "b", Some(a.id)).await.unwrap();
    app.folders.create(&ctx, "c", Some(b.id)).await.unwrap();
    app.folders.create(&ctx, "z", None).await.unwrap();

    let forest = app.folders.tree(&ctx).await.unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].name, "a");
    assert_eq!(forest[0].children.len(), 1);
    assert_eq!(forest[0].children[0].children[0].path, "/a/b/c");
    assert_eq!(forest[1].name, "z");
}

#[tokio::test]
async fn test_delete_releases_quota_for_whole_subtree() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;

    let a = app.folders.create(&ctx, "a", None).await.unwrap();
    let b = app.folders.create(&ctx, "b", Some(a.id)).await.unwrap();
    let keep = app.folders.create(&ctx, "keep", None).await.unwrap();

    app.files
        .upload(&ctx, "one.bin", Bytes::from(common::filler(100)), Some(a.id))
        .await
        .unwrap();
    let trashed = app
        .files
        .upload(&ctx, "two.bin", Bytes::from(common::filler(50)), Some(b.id))
        .await
        .unwrap();
    app.files.trash(&ctx, trashed.id).await.unwrap();
    app.files
        .upload(&ctx, "three.bin", Bytes::from(common::filler(25)), Some(keep.id))
        .await
        .unwrap();
    assert_eq!(app.used(&ctx).await, 175);

    let deletion = app.folders.delete(&ctx, a.id).await.unwrap();
    assert_eq!(deletion.folders_removed, 2);
    assert_eq!(deletion.files_removed, 2);
    assert_eq!(deletion.bytes_released, 150);
    assert_eq!(app.used(&ctx).await, 25);
    assert_eq!(app.stored_file_count(), 1);

    let err = app.folders.get(&ctx, b.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subtree_files_stay_put_while_folder_is_deleted() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1000).await;
    let doomed = app.folders.create(&ctx, "doomed", None).await.unwrap();
    let keep = app.folders.create(&ctx, "keep", None).await.unwrap();
    let file = app
        .files
        .upload(&ctx, "a.txt", Bytes::from_static(b"abc"), Some(doomed.id))
        .await
        .unwrap();

    let mut tx = app.pool.begin().await.unwrap();
    let locked = FileRepository::find_in_subtree_with(&mut *tx, ctx.user_id, &doomed.path)
        .await
        .unwrap();
    assert_eq!(locked.len(), 1);

    let files = app.files.clone();
    let mover_ctx = ctx.clone();
    let keep_id = keep.id;
    let mover =
        tokio::spawn(async move { files.move_to(&mover_ctx, file.id, Some(keep_id)).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!mover.is_finished());

    FolderRepository::delete_with(&mut *tx, ctx.user_id, doomed.id)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let err = mover.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(app.files_in(&ctx, Some(keep.id)).await.is_empty());
}
