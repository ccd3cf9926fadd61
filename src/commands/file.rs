//! File management CLI commands.

use std::path::PathBuf;

use bytes::Bytes;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat, human_bytes};
use mycloud_core::config::AppConfig;
use mycloud_core::error::{AppError, ErrorKind};
use mycloud_core::types::PageRequest;
use mycloud_entity::file::File;
use mycloud_service::RequestContext;

use super::Services;

/// Arguments for file commands
#[derive(Debug, Args)]
pub struct FileArgs {
    /// File subcommand
    #[command(subcommand)]
    pub command: FileCommand,
}

/// File subcommands
#[derive(Debug, Subcommand)]
pub enum FileCommand {
    /// Upload a local file
    Upload {
        /// Local path to read
        path: PathBuf,
        /// Target folder ID (omit for root)
        #[arg(long)]
        folder: Option<Uuid>,
        /// Display name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// List files in a folder (or the root)
    List {
        /// Folder ID (omit for root)
        #[arg(long)]
        folder: Option<Uuid>,
        /// List the trash instead
        #[arg(long, conflicts_with = "folder")]
        trash: bool,
        /// List favorites instead
        #[arg(long, conflicts_with_all = ["folder", "trash"])]
        favorites: bool,
    },
    /// Search file names
    Search {
        /// Substring to look for
        query: String,
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u64,
        /// Page size
        #[arg(long, default_value = "50")]
        page_size: u64,
    },
    /// Move a file to the trash
    Trash {
        /// File ID
        id: Uuid,
    },
    /// Restore a file from the trash
    Restore {
        /// File ID
        id: Uuid,
    },
    /// Mark or unmark a file as favorite
    Favorite {
        /// File ID
        id: Uuid,
        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
    /// Delete a file permanently and release its bytes
    Purge {
        /// File IDs
        #[arg(required = true)]
        ids: Vec<Uuid>,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Permanently delete everything in the trash
    EmptyTrash {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Copy a file into a folder (or the root)
    Copy {
        /// File ID
        id: Uuid,
        /// Target folder ID (omit for root)
        #[arg(long)]
        folder: Option<Uuid>,
    },
    /// Move files into a folder (or the root)
    Move {
        /// File IDs
        #[arg(required = true)]
        ids: Vec<Uuid>,
        /// Target folder ID (omit for root)
        #[arg(long)]
        folder: Option<Uuid>,
    },
    /// Rename a file
    Rename {
        /// File ID
        id: Uuid,
        /// New name
        name: String,
    },
}

/// File display row
#[derive(Debug, Serialize, Tabled)]
struct FileRow {
    /// File ID
    id: Uuid,
    /// Name
    name: String,
    /// Size
    size: String,
    /// MIME type
    mime: String,
    /// Flags
    flags: String,
    /// Updated at
    updated_at: String,
}

impl From<&File> for FileRow {
    fn from(f: &File) -> Self {
        let mut flags = String::new();
        if f.is_favorite {
            flags.push('★');
        }
        if f.is_public {
            flags.push('P');
        }
        if f.is_trashed {
            flags.push('T');
        }
        Self {
            id: f.id,
            name: f.original_name.clone(),
            size: human_bytes(f.size_bytes),
            mime: f.mime_type.clone().unwrap_or_default(),
            flags,
            updated_at: f.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute file commands
pub async fn execute(
    args: &FileArgs,
    config: &AppConfig,
    ctx: RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let files = &services.files;

    match &args.command {
        FileCommand::Upload { path, folder, name } => {
            let display_name = match name {
                Some(name) => name.clone(),
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        AppError::validation(format!("'{}' has no file name", path.display()))
                    })?,
            };
            let data = tokio::fs::read(path).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read '{}'", path.display()),
                    e,
                )
            })?;

            let file = files
                .upload(&ctx, &display_name, Bytes::from(data), *folder)
                .await?;
            print_file(&file, "uploaded", format);
        }
        FileCommand::List {
            folder,
            trash,
            favorites,
        } => {
            let listed = if *trash {
                files.list_trash(&ctx).await?
            } else if *favorites {
                files.list_favorites(&ctx).await?
            } else {
                files.list(&ctx, *folder).await?
            };
            let rows: Vec<FileRow> = listed.iter().map(FileRow::from).collect();
            output::print_list(&rows, format);
        }
        FileCommand::Search {
            query,
            page,
            page_size,
        } => {
            let result = files
                .search(&ctx, query, PageRequest::new(*page, *page_size))
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&result),
                OutputFormat::Table => {
                    let rows: Vec<FileRow> = result.items.iter().map(FileRow::from).collect();
                    output::print_list(&rows, format);
                    println!(
                        "Page {}/{} ({} matches)",
                        result.page, result.total_pages, result.total_items
                    );
                }
            }
        }
        FileCommand::Trash { id } => {
            let file = files.trash(&ctx, *id).await?;
            print_file(&file, "moved to trash", format);
        }
        FileCommand::Restore { id } => {
            let file = files.restore(&ctx, *id).await?;
            print_file(&file, "restored", format);
        }
        FileCommand::Favorite { id, off } => {
            let file = files.set_favorite(&ctx, *id, !off).await?;
            print_file(&file, if *off { "unmarked" } else { "marked favorite" }, format);
        }
        FileCommand::Purge { ids, force } => {
            if !confirm(*force, &format!("Permanently delete {} file(s)?", ids.len()))? {
                return Ok(());
            }
            if let [id] = ids.as_slice() {
                let file = files.purge(&ctx, *id).await?;
                print_file(&file, "deleted", format);
            } else {
                let deleted = files.bulk_delete(&ctx, ids).await?;
                output::print_success(&format!("{deleted} of {} file(s) deleted", ids.len()));
            }
        }
        FileCommand::EmptyTrash { force } => {
            if !confirm(*force, "Permanently delete everything in the trash?")? {
                return Ok(());
            }
            let deleted = files.empty_trash(&ctx).await?;
            output::print_success(&format!("{deleted} file(s) deleted from trash"));
        }
        FileCommand::Copy { id, folder } => {
            let file = files.copy(&ctx, *id, *folder).await?;
            print_file(&file, "copied", format);
        }
        FileCommand::Move { ids, folder } => {
            if let [id] = ids.as_slice() {
                let file = files.move_to(&ctx, *id, *folder).await?;
                print_file(&file, "moved", format);
            } else {
                let moved = files.bulk_move(&ctx, ids, *folder).await?;
                output::print_success(&format!("{moved} of {} file(s) moved", ids.len()));
            }
        }
        FileCommand::Rename { id, name } => {
            let file = files.rename(&ctx, *id, name).await?;
            print_file(&file, "renamed", format);
        }
    }

    Ok(())
}

fn confirm(force: bool, prompt: &str) -> Result<bool, AppError> {
    if force {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))?;
    if !confirmed {
        println!("Cancelled.");
    }
    Ok(confirmed)
}

fn print_file(file: &File, action: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => output::print_json(file),
        OutputFormat::Table => {
            output::print_success(&format!("'{}' {action}", file.original_name));
            output::print_kv("ID", &file.id.to_string());
            output::print_kv("Size", &human_bytes(file.size_bytes));
        }
    }
}
