//! Archive extraction: expands a zip the user owns into a new folder subtree.
//!
//! One run moves through
//! `Locked -> Validated -> QuotaChecked -> FolderCreated -> Extracting -> Committed`;
//! any failure after `Locked` rolls the transaction back, removes bytes
//! written so far and releases the in-flight entry.

use std::io::{Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, Postgres, Transaction};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use mycloud_core::config::ArchiveConfig;
use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::result::AppResult;
use mycloud_database::repositories::{FileRepository, FolderRepository};
use mycloud_entity::file::CreateFile;
use mycloud_entity::folder::{CreateFolder, Folder};
use mycloud_storage::BlobStore;

use crate::archive::entry::{self, ArchivePlan, PlannedEntry, zip_error};
use crate::archive::folders::FolderCache;
use crate::archive::guard::InFlightSet;
use crate::context::RequestContext;
use crate::file::mime::{archive_stem, guess_mime, is_archive};
use crate::folder::path::{child_path, validate_name};
use crate::quota::QuotaLedger;
use crate::tx;

/// Name attempts before giving up on a free destination path.
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Upper bound on the buffer reserved up front for one entry.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Fallback destination name when the archive name yields nothing usable.
const FALLBACK_FOLDER_NAME: &str = "archive";

/// A file created by an extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedFile {
    /// New file id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Measured size in bytes.
    pub size: i64,
}

/// Outcome of a committed extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// The new top-level folder.
    pub created_folder_id: Uuid,
    /// Its name, after any disambiguation.
    pub created_folder_name: String,
    /// Every file created beneath it.
    pub created_files: Vec<CreatedFile>,
}

/// Decompressed entry handed from the blocking reader to the async writer.
struct ExtractedEntry {
    planned: PlannedEntry,
    data: Bytes,
}

/// Expands archives into folders and files.
#[derive(Debug, Clone)]
pub struct ExtractionEngine {
    /// File repository.
    file_repo: Arc<FileRepository>,
    /// Folder repository.
    folder_repo: Arc<FolderRepository>,
    /// Quota ledger.
    ledger: Arc<QuotaLedger>,
    /// Backing byte store.
    blobs: Arc<BlobStore>,
    /// Extraction limits.
    config: ArchiveConfig,
    /// Archives currently being extracted.
    in_flight: InFlightSet,
}

impl ExtractionEngine {
    /// Creates a new engine with an empty in-flight set.
    pub fn new(
        file_repo: Arc<FileRepository>,
        folder_repo: Arc<FolderRepository>,
        ledger: Arc<QuotaLedger>,
        blobs: Arc<BlobStore>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            file_repo,
            folder_repo,
            ledger,
            blobs,
            config,
            in_flight: InFlightSet::new(),
        }
    }

    /// The in-flight registry shared by every clone of this engine.
    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Extract archive `file_id` under `target_folder_id`, or next to the
    /// archive when no target is given.
    pub async fn extract(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        target_folder_id: Option<Uuid>,
    ) -> AppResult<ExtractionResult> {
        let _guard = self.in_flight.try_acquire(file_id).inspect_err(|_| {
            info!(user_id = %ctx.user_id, file_id = %file_id, "Extraction rejected: already in flight");
        })?;
        info!(user_id = %ctx.user_id, file_id = %file_id, "Extraction started");

        match self.run(ctx, file_id, target_folder_id).await {
            Ok(result) => {
                info!(
                    user_id = %ctx.user_id,
                    file_id = %file_id,
                    folder_id = %result.created_folder_id,
                    folder = %result.created_folder_name,
                    files = result.created_files.len(),
                    "Extraction committed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, file_id = %file_id, error = %e, "Extraction failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        target_folder_id: Option<Uuid>,
    ) -> AppResult<ExtractionResult> {
        let source = self
            .file_repo
            .find_owned(ctx.user_id, file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;

        if !is_archive(source.mime_type.as_deref(), &source.original_name) {
            return Err(AppError::not_an_archive(format!(
                "'{}' is not a zip archive",
                source.original_name
            )));
        }
        if !self.blobs.exists(&source.stored_path).await? {
            return Err(AppError::not_found(format!(
                "Archive bytes for file {file_id} are missing"
            )));
        }

        let data = self.blobs.read(&source.stored_path).await?;
        let plan = self.scan(data.clone()).await?;
        debug!(
            file_id = %file_id,
            entries = plan.entries.len(),
            files = plan.file_count(),
            skipped = plan.skipped,
            declared = plan.declared_total,
            "Archive scanned"
        );

        let declared = i64::try_from(plan.declared_total).unwrap_or(i64::MAX);
        self.ledger.check_and_reserve(ctx.user_id, declared).await?;

        let parent = match target_folder_id.or(source.folder_id) {
            Some(id) => Some(
                self.folder_repo
                    .find_owned(ctx.user_id, id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?,
            ),
            None => None,
        };
        let base = destination_base(&source.original_name);

        let mut tx = tx::begin(self.file_repo.pool()).await?;
        let destination = create_destination(&mut tx, ctx.user_id, parent.as_ref(), &base).await?;

        let mut written = Vec::new();
        match self
            .commit_run(tx, ctx, &destination, data, plan, &mut written)
            .await
        {
            Ok(created_files) => Ok(ExtractionResult {
                created_folder_id: destination.id,
                created_folder_name: destination.name,
                created_files,
            }),
            Err(e) => {
                let failed = self.blobs.remove_all_quietly(&written).await;
                debug!(removed = written.len() - failed, failed, "Extracted bytes cleaned up");
                Err(e)
            }
        }
    }

    /// Scan the central directory on a blocking thread.
    async fn scan(&self, data: Bytes) -> AppResult<ArchivePlan> {
        let limits = self.config.clone();
        tokio::task::spawn_blocking(move || entry::scan(Cursor::new(data), &limits))
            .await
            .map_err(|e| AppError::internal(format!("Archive scan task failed: {e}")))?
    }

    /// Materialize every entry and commit rows plus quota in `tx`.
    async fn commit_run(
        &self,
        mut tx: Transaction<'static, Postgres>,
        ctx: &RequestContext,
        destination: &Folder,
        data: Bytes,
        plan: ArchivePlan,
        written: &mut Vec<String>,
    ) -> AppResult<Vec<CreatedFile>> {
        let created = self
            .materialize(&mut tx, ctx, destination, data, plan, written)
            .await?;

        let measured: i64 = created.iter().map(|f| f.size).sum();
        if measured > 0 {
            QuotaLedger::try_commit_with(&mut *tx, ctx.user_id, measured).await?;
        }
        tx::commit(tx).await?;
        Ok(created)
    }

    /// Stream entries from a blocking decompressor and write each one.
    async fn materialize(
        &self,
        conn: &mut PgConnection,
        ctx: &RequestContext,
        destination: &Folder,
        data: Bytes,
        plan: ArchivePlan,
        written: &mut Vec<String>,
    ) -> AppResult<Vec<CreatedFile>> {
        let mut folders = FolderCache::new(ctx.user_id, destination.id, destination.path.clone());
        let (sender, mut receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let budget = self.config.max_extracted_bytes;
        let reader = tokio::task::spawn_blocking(move || decompress(data, plan.entries, budget, sender));

        let mut created = Vec::new();
        while let Some(item) = receiver.recv().await {
            let ExtractedEntry { planned, data } = item?;
            let folder_id = folders.resolve(&mut *conn, planned.directories()).await?;
            let Some(name) = planned.file_name() else {
                continue;
            };

            let blob = self.blobs.put(ctx.user_id, name, data).await?;
            written.push(blob.path.clone());

            let file = FileRepository::create_with(
                &mut *conn,
                &CreateFile {
                    name: blob.name,
                    original_name: name.to_string(),
                    stored_path: blob.path,
                    size_bytes: blob.size_bytes,
                    mime_type: guess_mime(name),
                    folder_id: Some(folder_id),
                    user_id: ctx.user_id,
                },
            )
            .await?;

            if file.size_bytes as u64 != planned.declared_size {
                debug!(
                    entry = %planned.segments.join("/"),
                    declared = planned.declared_size,
                    measured = file.size_bytes,
                    "Entry size differs from its header"
                );
            }
            created.push(CreatedFile {
                id: file.id,
                name: file.original_name,
                size: file.size_bytes,
            });
        }

        reader
            .await
            .map_err(|e| AppError::internal(format!("Archive reader task failed: {e}")))?;

        debug!(
            folder_id = %destination.id,
            folders = folders.created().len(),
            files = created.len(),
            "Archive materialized"
        );
        Ok(created)
    }
}

/// Decompress planned entries in order, sending each over `sender`.
///
/// Stops at the first error (which is sent) or when the receiver is gone.
fn decompress(
    data: Bytes,
    entries: Vec<PlannedEntry>,
    budget: u64,
    sender: mpsc::Sender<AppResult<ExtractedEntry>>,
) {
    let mut archive = match ZipArchive::new(Cursor::new(data)) {
        Ok(archive) => archive,
        Err(e) => {
            let _ = sender.blocking_send(Err(zip_error(e)));
            return;
        }
    };

    let mut remaining = budget;
    for planned in entries {
        let result = read_entry(&mut archive, &planned, budget, &mut remaining)
            .map(|data| ExtractedEntry { planned, data });
        let failed = result.is_err();
        if sender.blocking_send(result).is_err() || failed {
            return;
        }
    }
}

/// Read one entry, never buffering more than the remaining budget plus one byte.
fn read_entry(
    archive: &mut ZipArchive<Cursor<Bytes>>,
    planned: &PlannedEntry,
    budget: u64,
    remaining: &mut u64,
) -> AppResult<Bytes> {
    if planned.is_dir {
        return Ok(Bytes::new());
    }

    let file = archive.by_index(planned.index).map_err(zip_error)?;
    let reserve = planned.declared_size.min(*remaining).min(MAX_PREALLOCATION);
    let mut buf = Vec::with_capacity(reserve as usize);
    file.take(remaining.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::NotAnArchive,
                format!("Corrupt archive entry '{}'", planned.segments.join("/")),
                e,
            )
        })?;

    let read = buf.len() as u64;
    if read > *remaining {
        return Err(AppError::validation(format!(
            "Archive expands beyond the {budget} byte limit"
        )));
    }
    *remaining -= read;
    Ok(Bytes::from(buf))
}

/// Folder name for an archive: its display name without `.zip`.
fn destination_base(original_name: &str) -> String {
    let stem = archive_stem(original_name).unwrap_or(original_name);
    validate_name(stem)
        .map(str::to_string)
        .unwrap_or_else(|_| FALLBACK_FOLDER_NAME.to_string())
}

/// Candidate names: `base`, then `base_<timestamp>`, then `base_<timestamp>_<n>`.
fn destination_name(base: &str, stamp: &str, attempt: u32) -> String {
    match attempt {
        0 => base.to_string(),
        1 => format!("{base}_{stamp}"),
        n => format!("{base}_{stamp}_{n}"),
    }
}

/// Create the destination folder at the first free path. Never merges.
///
/// Each candidate is inserted under its own savepoint, so a path taken by a
/// concurrent run only moves on to the next candidate.
async fn create_destination(
    conn: &mut PgConnection,
    user_id: Uuid,
    parent: Option<&Folder>,
    base: &str,
) -> AppResult<Folder> {
    let parent_path = parent.map(|p| p.path.as_str());
    let stamp = Utc::now().format("%Y%m%d%H%M%S").to_string();

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = destination_name(base, &stamp, attempt);
        let path = child_path(parent_path, &name);
        if FolderRepository::find_by_path_with(&mut *conn, user_id, &path)
            .await?
            .is_some()
        {
            continue;
        }

        let mut savepoint = tx::savepoint(&mut *conn).await?;
        let created = FolderRepository::create_with(
            &mut *savepoint,
            &CreateFolder {
                name: name.clone(),
                parent_id: parent.map(|p| p.id),
                user_id,
                path,
            },
        )
        .await;

        match created {
            Ok(folder) => {
                tx::commit(savepoint).await?;
                if attempt > 0 {
                    debug!(base = %base, name = %name, "Destination folder name disambiguated");
                }
                return Ok(folder);
            }
            Err(e) if e.kind == ErrorKind::DuplicatePath => {
                tx::rollback(savepoint).await?;
                debug!(name = %name, "Destination name taken concurrently");
            }
            Err(e) => return Err(e),
        }
    }

    Err(AppError::duplicate_path(format!(
        "No free folder name for '{base}' after {MAX_NAME_ATTEMPTS} attempts"
    )))
}
