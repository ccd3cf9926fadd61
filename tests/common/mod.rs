//! Shared helpers for integration tests.
//!
//! Tests run against the PostgreSQL database named by `DATABASE_URL` and
//! return early when it is not set. Every test works as its own freshly
//! created user, so tests can share one database and run in parallel.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;

use bytes::Bytes;
use sqlx::PgPool;
use tempfile::TempDir;
use uuid::Uuid;
use zip::write::SimpleFileOptions;

use mycloud_core::config::{ArchiveConfig, DatabaseConfig, StorageConfig};
use mycloud_database::DatabasePool;
use mycloud_database::migration::run_migrations;
use mycloud_database::repositories::{
    FileRepository, FolderRepository, ShareRepository, UserRepository,
};
use mycloud_entity::file::File;
use mycloud_entity::folder::Folder;
use mycloud_entity::user::CreateUser;
use mycloud_service::{
    ExtractionEngine, FileService, FolderService, QuotaLedger, RequestContext, ShareService,
};
use mycloud_storage::{BlobStore, LocalStorageProvider};

/// Test application context
pub struct TestApp {
    /// Database pool for direct queries
    pub pool: PgPool,
    /// User repository
    pub users: Arc<UserRepository>,
    /// File repository
    pub file_repo: Arc<FileRepository>,
    /// Folder repository
    pub folder_repo: Arc<FolderRepository>,
    /// Quota ledger
    pub ledger: Arc<QuotaLedger>,
    /// Byte store over a temporary directory
    pub blobs: Arc<BlobStore>,
    /// Folder service
    pub folders: FolderService,
    /// File service
    pub files: FileService,
    /// Share service
    pub shares: ShareService,
    /// Extraction engine
    pub extraction: ExtractionEngine,
    /// Keeps the storage root alive for the test
    storage_root: TempDir,
}

impl TestApp {
    /// Create a test application, or `None` when no database is configured.
    pub async fn new() -> Option<Self> {
        Self::with_archive_config(ArchiveConfig::default()).await
    }

    /// Create a test application with custom extraction limits.
    pub async fn with_archive_config(archive: ArchiveConfig) -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping integration test");
            return None;
        };

        let db = DatabasePool::connect(&DatabaseConfig {
            url,
            max_connections: 5,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 60,
        })
        .await
        .expect("Failed to connect to test database");
        run_migrations(db.pool())
            .await
            .expect("Failed to run migrations");
        let pool = db.into_pool();

        let storage_root = TempDir::new().expect("Failed to create storage root");
        let provider = LocalStorageProvider::new(storage_root.path())
            .await
            .expect("Failed to init storage");
        let blobs = Arc::new(BlobStore::new(Arc::new(provider)));

        let users = Arc::new(UserRepository::new(pool.clone()));
        let file_repo = Arc::new(FileRepository::new(pool.clone()));
        let folder_repo = Arc::new(FolderRepository::new(pool.clone()));
        let share_repo = Arc::new(ShareRepository::new(pool.clone()));
        let ledger = Arc::new(QuotaLedger::new(Arc::clone(&users)));

        let storage = StorageConfig {
            root_path: storage_root.path().display().to_string(),
            max_upload_size_bytes: 1024 * 1024,
            default_quota_bytes: 1000,
        };

        let folders = FolderService::new(Arc::clone(&folder_repo), Arc::clone(&blobs));
        let files = FileService::new(
            Arc::clone(&file_repo),
            Arc::clone(&folder_repo),
            Arc::clone(&ledger),
            Arc::clone(&blobs),
            storage,
        );
        let shares = ShareService::new(
            Arc::clone(&file_repo),
            share_repo,
            Arc::clone(&users),
            Arc::clone(&blobs),
        );
        let extraction = ExtractionEngine::new(
            Arc::clone(&file_repo),
            Arc::clone(&folder_repo),
            Arc::clone(&ledger),
            Arc::clone(&blobs),
            archive,
        );

        Some(Self {
            pool,
            users,
            file_repo,
            folder_repo,
            ledger,
            blobs,
            folders,
            files,
            shares,
            extraction,
            storage_root,
        })
    }

    /// Create a user with a unique name and the given quota.
    pub async fn create_user(&self, quota: i64) -> RequestContext {
        let user = self
            .users
            .create(&CreateUser {
                username: format!("user_{}", Uuid::new_v4().simple()),
                email: None,
                is_admin: false,
                storage_quota: quota,
            })
            .await
            .expect("Failed to create test user");
        RequestContext::new(user.id)
    }

    /// Current `storage_used` for the user.
    pub async fn used(&self, ctx: &RequestContext) -> i64 {
        self.ledger
            .usage(ctx.user_id)
            .await
            .expect("Failed to read usage")
            .used_bytes
    }

    /// Every folder the user owns, ordered by path.
    pub async fn all_folders(&self, ctx: &RequestContext) -> Vec<Folder> {
        self.folder_repo
            .find_all_for_user(ctx.user_id)
            .await
            .expect("Failed to list folders")
    }

    /// Every non-trashed file in `folder_id`.
    pub async fn files_in(&self, ctx: &RequestContext, folder_id: Option<Uuid>) -> Vec<File> {
        self.files
            .list(ctx, folder_id)
            .await
            .expect("Failed to list files")
    }

    /// Number of files stored under the temporary storage root.
    pub fn stored_file_count(&self) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| {
                            let path = e.path();
                            if path.is_dir() { walk(&path) } else { 1 }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(self.storage_root.path())
    }
}

/// Build a zip in memory from `(name, content)` pairs. Names ending in `/`
/// become directory entries.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(*name, SimpleFileOptions::default())
                .expect("Failed to add directory");
        } else {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("Failed to start entry");
            writer.write_all(content).expect("Failed to write entry");
        }
    }
    Bytes::from(writer.finish().expect("Failed to finish zip").into_inner())
}

/// `n` filler bytes.
pub fn filler(n: usize) -> Vec<u8> {
    vec![b'x'; n]
}
