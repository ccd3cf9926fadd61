//! Sharing commands: per-user shares, public links and downloads.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use tabled::Tabled;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::output::{self, OutputFormat, human_bytes};
use mycloud_core::config::AppConfig;
use mycloud_core::error::{AppError, ErrorKind};
use mycloud_entity::file::File;
use mycloud_entity::share::SharePermission;
use mycloud_service::{OpenedFile, RequestContext};

use super::Services;

/// Arguments for share commands
#[derive(Debug, Args)]
pub struct ShareArgs {
    /// Share subcommand
    #[command(subcommand)]
    pub command: ShareCommand,
}

/// Share subcommands
#[derive(Debug, Subcommand)]
pub enum ShareCommand {
    /// Make a file public and print its token
    Public {
        /// File ID
        file_id: Uuid,
    },
    /// Withdraw public access
    Revoke {
        /// File ID
        file_id: Uuid,
    },
    /// Share a file with another user
    With {
        /// File ID
        file_id: Uuid,
        /// Username to share with
        #[arg(long)]
        to: String,
        /// Permission: read or write
        #[arg(long, default_value = "read")]
        permission: String,
    },
    /// Remove a per-user share
    Unshare {
        /// File ID
        file_id: Uuid,
        /// Username to remove
        #[arg(long)]
        from: String,
    },
    /// List files shared with the acting user
    Incoming,
    /// Download an accessible file, or a public file by token
    Get {
        /// File ID (owned or shared with the acting user)
        #[arg(required_unless_present = "token", conflicts_with = "token")]
        file_id: Option<Uuid>,
        /// Public share token
        #[arg(long)]
        token: Option<String>,
        /// Output path
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Shared file row
#[derive(Debug, Serialize, Tabled)]
struct SharedRow {
    /// File ID
    id: Uuid,
    /// Name
    name: String,
    /// Size
    size: String,
    /// Owner
    owner: Uuid,
}

impl From<&File> for SharedRow {
    fn from(f: &File) -> Self {
        Self {
            id: f.id,
            name: f.original_name.clone(),
            size: human_bytes(f.size_bytes),
            owner: f.user_id,
        }
    }
}

/// Execute share commands
pub async fn execute(
    args: &ShareArgs,
    config: &AppConfig,
    ctx: RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let shares = &services.shares;

    match &args.command {
        ShareCommand::Public { file_id } => {
            let token = shares.share_public(&ctx, *file_id).await?;
            match format {
                OutputFormat::Json => {
                    output::print_json(&serde_json::json!({ "file_id": file_id, "token": token }))
                }
                OutputFormat::Table => {
                    output::print_success("File is now public");
                    output::print_kv("Token", &token);
                }
            }
        }
        ShareCommand::Revoke { file_id } => {
            let file = shares.revoke_public(&ctx, *file_id).await?;
            output::print_success(&format!("Public access to '{}' revoked", file.original_name));
        }
        ShareCommand::With {
            file_id,
            to,
            permission,
        } => {
            let permission: SharePermission = permission.parse().map_err(AppError::validation)?;
            let target = user_id_for(&services, to).await?;
            let share = shares
                .share_with_user(&ctx, *file_id, target, permission)
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&share),
                OutputFormat::Table => {
                    output::print_success(&format!("Shared with '{to}'"));
                    output::print_kv("Permission", &format!("{:?}", share.permission));
                }
            }
        }
        ShareCommand::Unshare { file_id, from } => {
            let target = user_id_for(&services, from).await?;
            if shares.unshare(&ctx, *file_id, target).await? {
                output::print_success(&format!("Share with '{from}' removed"));
            } else {
                output::print_warning(&format!("File was not shared with '{from}'"));
            }
        }
        ShareCommand::Incoming => {
            let files = shares.shared_with_me(&ctx).await?;
            let rows: Vec<SharedRow> = files.iter().map(SharedRow::from).collect();
            output::print_list(&rows, format);
        }
        ShareCommand::Get {
            file_id,
            token,
            out,
        } => {
            let opened = match (file_id, token) {
                (_, Some(token)) => shares.open_public(token).await?,
                (Some(id), None) => shares.open(&ctx, *id).await?,
                (None, None) => return Err(AppError::validation("Give a file ID or --token")),
            };
            let name = opened.file.original_name.clone();
            let written = save(opened, out).await?;
            output::print_success(&format!(
                "Saved '{name}' to {} ({})",
                out.display(),
                human_bytes(written)
            ));
        }
    }

    Ok(())
}

async fn user_id_for(services: &Services, username: &str) -> Result<Uuid, AppError> {
    services
        .users
        .find_by_username(username)
        .await?
        .map(|u| u.id)
        .ok_or_else(|| AppError::not_found(format!("User '{username}' not found")))
}

async fn save(opened: OpenedFile, out: &Path) -> Result<i64, AppError> {
    let write_error = |e: std::io::Error| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to write '{}'", out.display()),
            e,
        )
    };

    let mut file = tokio::fs::File::create(out).await.map_err(write_error)?;
    let mut stream = opened.stream;
    let mut written = 0i64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to read stored file", e)
        })?;
        file.write_all(&chunk).await.map_err(write_error)?;
        written += chunk.len() as i64;
    }
    file.flush().await.map_err(write_error)?;
    Ok(written)
}
