//! Integration tests for archive extraction.

mod common;

use bytes::Bytes;

use common::{filler, zip_bytes};
use mycloud_core::config::ArchiveConfig;
use mycloud_core::error::ErrorKind;
use mycloud_database::repositories::FolderRepository;
use mycloud_entity::folder::CreateFolder;
use mycloud_service::archive::folders::FolderCache;

#[tokio::test]
async fn test_extract_builds_nested_tree_and_commits_measured_size() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;

    let archive = zip_bytes(&[
        ("a.txt", filler(10)),
        ("sub/b.txt", filler(20)),
        ("sub/deep/c.txt", filler(30)),
    ]);
    let source = app
        .files
        .upload(&ctx, "bundle.zip", archive, None)
        .await
        .unwrap();
    let before = app.used(&ctx).await;

    let result = app.extraction.extract(&ctx, source.id, None).await.unwrap();
    assert_eq!(result.created_folder_name, "bundle");
    assert_eq!(result.created_files.len(), 3);
    assert_eq!(app.used(&ctx).await - before, 60);

    let root = app.folders.get(&ctx, result.created_folder_id).await.unwrap();
    assert_eq!(root.path, "/bundle");
    assert_eq!(root.parent_id, None);

    let sub = app
        .folder_repo
        .find_by_path(ctx.user_id, "/bundle/sub")
        .await
        .unwrap()
        .unwrap();
    let deep = app
        .folder_repo
        .find_by_path(ctx.user_id, "/bundle/sub/deep")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.parent_id, Some(root.id));
    assert_eq!(deep.parent_id, Some(sub.id));

    let top = app.files_in(&ctx, Some(root.id)).await;
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].original_name, "a.txt");
    assert_eq!(top[0].size_bytes, 10);
    assert_eq!(top[0].mime_type.as_deref(), Some("text/plain"));

    let mid = app.files_in(&ctx, Some(sub.id)).await;
    assert_eq!(mid.len(), 1);
    assert_eq!(mid[0].size_bytes, 20);

    let bottom = app.files_in(&ctx, Some(deep.id)).await;
    assert_eq!(bottom.len(), 1);
    assert_eq!(bottom[0].original_name, "c.txt");

    // The archive itself plus three extracted files.
    assert_eq!(app.stored_file_count(), 4);
}

#[tokio::test]
async fn test_extract_into_existing_name_disambiguates() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;
    let parent = app.folders.create(&ctx, "inbox", None).await.unwrap();
    let existing = app
        .folders
        .create(&ctx, "photos", Some(parent.id))
        .await
        .unwrap();

    let source = app
        .files
        .upload(
            &ctx,
            "photos.zip",
            zip_bytes(&[("x.jpg", filler(5))]),
            Some(parent.id),
        )
        .await
        .unwrap();

    let first = app.extraction.extract(&ctx, source.id, None).await.unwrap();
    let second = app.extraction.extract(&ctx, source.id, None).await.unwrap();

    for result in [&first, &second] {
        assert_ne!(result.created_folder_id, existing.id);
        assert!(result.created_folder_name.starts_with("photos_"));
        let folder = app.folders.get(&ctx, result.created_folder_id).await.unwrap();
        assert_eq!(folder.parent_id, Some(parent.id));
    }
    assert_ne!(first.created_folder_name, second.created_folder_name);

    // Nothing merged into the pre-existing folder.
    assert!(app.files_in(&ctx, Some(existing.id)).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_extractions_with_same_name_both_succeed() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(100_000).await;

    let mut sources = Vec::new();
    for size in [11, 13] {
        let file = app
            .files
            .upload(&ctx, "dup.zip", zip_bytes(&[("d.txt", filler(size))]), None)
            .await
            .unwrap();
        sources.push(file.id);
    }

    let handles: Vec<_> = sources
        .into_iter()
        .map(|id| {
            let engine = app.extraction.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { engine.extract(&ctx, id, None).await })
        })
        .collect();

    let mut names = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.created_files.len(), 1);
        names.push(result.created_folder_name);
    }
    names.sort();

    assert_eq!(names[0], "dup");
    assert!(names[1].starts_with("dup_"));
    let roots: Vec<_> = app
        .all_folders(&ctx)
        .await
        .into_iter()
        .filter(|f| f.parent_id.is_none())
        .map(|f| f.name)
        .collect();
    assert_eq!(roots.len(), 2);
}

#[tokio::test]
async fn test_extract_into_explicit_target() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;
    let target = app.folders.create(&ctx, "unpacked", None).await.unwrap();

    let source = app
        .files
        .upload(&ctx, "Data.ZIP", zip_bytes(&[("d.csv", filler(3))]), None)
        .await
        .unwrap();
    let result = app
        .extraction
        .extract(&ctx, source.id, Some(target.id))
        .await
        .unwrap();

    let folder = app.folders.get(&ctx, result.created_folder_id).await.unwrap();
    assert_eq!(folder.path, "/unpacked/Data");
}

#[tokio::test]
async fn test_concurrent_extraction_of_same_archive_rejected() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;

    let source = app
        .files
        .upload(&ctx, "twice.zip", zip_bytes(&[("t.txt", filler(7))]), None)
        .await
        .unwrap();
    let folders_before = app.all_folders(&ctx).await.len();

    let (first, second) = tokio::join!(
        app.extraction.extract(&ctx, source.id, None),
        app.extraction.extract(&ctx, source.id, None),
    );

    let first = first.unwrap();
    assert_eq!(second.unwrap_err().kind, ErrorKind::ExtractionInProgress);
    assert_eq!(app.all_folders(&ctx).await.len(), folders_before + 1);
    assert_eq!(first.created_files.len(), 1);
    assert!(app.extraction.in_flight().is_empty());

    // Released on completion: a later run succeeds.
    app.extraction.extract(&ctx, source.id, None).await.unwrap();
}

#[tokio::test]
async fn test_extract_over_quota_creates_nothing() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let archive = zip_bytes(&[("a.bin", filler(150)), ("b.bin", filler(150))]);
    let ctx = app.create_user(archive.len() as i64 + 100).await;

    let source = app
        .files
        .upload(&ctx, "huge.zip", archive, None)
        .await
        .unwrap();
    let used = app.used(&ctx).await;
    let stored = app.stored_file_count();

    let err = app.extraction.extract(&ctx, source.id, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::QuotaExceeded);
    assert!(app.all_folders(&ctx).await.is_empty());
    assert_eq!(app.files_in(&ctx, None).await.len(), 1);
    assert_eq!(app.used(&ctx).await, used);
    assert_eq!(app.stored_file_count(), stored);
    assert!(app.extraction.in_flight().is_empty());
}

#[tokio::test]
async fn test_extract_skips_traversal_entries() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;

    let source = app
        .files
        .upload(
            &ctx,
            "evil.zip",
            zip_bytes(&[
                ("../../evil.txt", filler(4)),
                ("safe/ok.txt", filler(6)),
            ]),
            None,
        )
        .await
        .unwrap();

    let result = app.extraction.extract(&ctx, source.id, None).await.unwrap();
    let names: Vec<&str> = result
        .created_files
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert!(!names.contains(&"evil.txt"));
    assert!(names.contains(&"ok.txt"));

    let paths: Vec<String> = app
        .all_folders(&ctx)
        .await
        .into_iter()
        .map(|f| f.path)
        .collect();
    for path in &paths {
        assert!(path.starts_with("/evil"), "unexpected folder {path}");
        assert!(!path.contains(".."));
    }
}

#[tokio::test]
async fn test_extract_empty_archive_creates_empty_folder() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;

    let source = app
        .files
        .upload(&ctx, "empty.zip", zip_bytes(&[]), None)
        .await
        .unwrap();
    let used = app.used(&ctx).await;

    let result = app.extraction.extract(&ctx, source.id, None).await.unwrap();
    assert!(result.created_files.is_empty());
    assert_eq!(result.created_folder_name, "empty");
    assert_eq!(app.used(&ctx).await, used);
}

#[tokio::test]
async fn test_extract_keeps_empty_directories() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;

    let source = app
        .files
        .upload(
            &ctx,
            "dirs.zip",
            zip_bytes(&[("docs/", vec![]), ("docs/drafts/", vec![]), ("readme.md", filler(2))]),
            None,
        )
        .await
        .unwrap();
    app.extraction.extract(&ctx, source.id, None).await.unwrap();

    let paths: Vec<String> = app
        .all_folders(&ctx)
        .await
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["/dirs", "/dirs/docs", "/dirs/docs/drafts"]);
}

#[tokio::test]
async fn test_extract_rejects_non_archives_and_foreign_files() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(10_000).await;
    let other = app.create_user(10_000).await;

    let text = app
        .files
        .upload(&ctx, "notes.txt", Bytes::from_static(b"plain"), None)
        .await
        .unwrap();
    let err = app.extraction.extract(&ctx, text.id, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAnArchive);

    let fake = app
        .files
        .upload(&ctx, "fake.zip", Bytes::from(filler(200)), None)
        .await
        .unwrap();
    let err = app.extraction.extract(&ctx, fake.id, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAnArchive);

    let real = app
        .files
        .upload(&ctx, "real.zip", zip_bytes(&[("r.txt", filler(1))]), None)
        .await
        .unwrap();
    let err = app.extraction.extract(&other, real.id, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert!(app.all_folders(&ctx).await.is_empty());
    assert!(app.extraction.in_flight().is_empty());
}

#[tokio::test]
async fn test_extract_limit_violation_rolls_back() {
    let Some(app) = common::TestApp::with_archive_config(ArchiveConfig {
        max_entries: 2,
        ..ArchiveConfig::default()
    })
    .await
    else {
        return;
    };
    let ctx = app.create_user(10_000).await;

    let source = app
        .files
        .upload(
            &ctx,
            "many.zip",
            zip_bytes(&[("1", filler(1)), ("2", filler(1)), ("3", filler(1))]),
            None,
        )
        .await
        .unwrap();

    let err = app.extraction.extract(&ctx, source.id, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(app.all_folders(&ctx).await.is_empty());
    assert_eq!(app.stored_file_count(), 1);
}

#[tokio::test]
async fn test_folder_cache_reparents_existing_folder() {
    let Some(app) = common::TestApp::new().await else {
        return;
    };
    let ctx = app.create_user(1_000).await;
    let root = app.folders.create(&ctx, "root", None).await.unwrap();
    let elsewhere = app.folders.create(&ctx, "elsewhere", None).await.unwrap();

    // Left over from an earlier run: right path, wrong parent.
    let stray = FolderRepository::create_with(
        &app.pool,
        &CreateFolder {
            name: "x".to_string(),
            parent_id: Some(elsewhere.id),
            user_id: ctx.user_id,
            path: "/root/x".to_string(),
        },
    )
    .await
    .unwrap();

    let segments = vec!["x".to_string(), "y".to_string()];
    let mut cache = FolderCache::new(ctx.user_id, root.id, root.path.clone());
    let mut conn = app.pool.acquire().await.unwrap();
    let y_id = cache.resolve(&mut *conn, &segments).await.unwrap();
    assert_eq!(cache.resolve(&mut *conn, &segments).await.unwrap(), y_id);
    assert_eq!(cache.created(), [y_id].as_slice());
    drop(conn);

    let x = app.folders.get(&ctx, stray.id).await.unwrap();
    assert_eq!(x.parent_id, Some(root.id));
    assert_eq!(x.path, "/root/x");

    let y = app.folders.get(&ctx, y_id).await.unwrap();
    assert_eq!(y.parent_id, Some(stray.id));
    assert_eq!(y.path, "/root/x/y");
}
