//! Folder management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat, human_bytes};
use mycloud_core::config::AppConfig;
use mycloud_core::error::AppError;
use mycloud_entity::folder::{Folder, FolderNode};
use mycloud_service::RequestContext;

use super::Services;

/// Arguments for folder commands
#[derive(Debug, Args)]
pub struct FolderArgs {
    /// Folder subcommand
    #[command(subcommand)]
    pub command: FolderCommand,
}

/// Folder subcommands
#[derive(Debug, Subcommand)]
pub enum FolderCommand {
    /// Create a new folder
    Create {
        /// Folder name
        #[arg(short, long)]
        name: String,
        /// Parent folder ID (omit for root)
        #[arg(short, long)]
        parent: Option<Uuid>,
    },
    /// List direct children of a folder (or the root)
    List {
        /// Parent folder ID (omit for root)
        #[arg(short, long)]
        parent: Option<Uuid>,
    },
    /// Show the whole folder tree
    Tree,
    /// Rename a folder
    Rename {
        /// Folder ID
        id: Uuid,
        /// New name
        name: String,
    },
    /// Move a folder under another folder (or to the root)
    Move {
        /// Folder ID
        id: Uuid,
        /// New parent folder ID (omit for root)
        #[arg(short, long)]
        parent: Option<Uuid>,
    },
    /// Delete a folder with all of its descendants and files
    Delete {
        /// Folder ID
        id: Uuid,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Folder display row
#[derive(Debug, Serialize, Tabled)]
struct FolderRow {
    /// Folder ID
    id: Uuid,
    /// Name
    name: String,
    /// Path
    path: String,
    /// Created at
    created_at: String,
}

impl From<&Folder> for FolderRow {
    fn from(f: &Folder) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
            path: f.path.clone(),
            created_at: f.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute folder commands
pub async fn execute(
    args: &FolderArgs,
    config: &AppConfig,
    ctx: RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let folders = &services.folders;

    match &args.command {
        FolderCommand::Create { name, parent } => {
            let folder = folders.create(&ctx, name, *parent).await?;
            print_folder(&folder, "created", format);
        }
        FolderCommand::List { parent } => {
            let children = folders.list_children(&ctx, *parent).await?;
            let rows: Vec<FolderRow> = children.iter().map(FolderRow::from).collect();
            output::print_list(&rows, format);
        }
        FolderCommand::Tree => {
            let forest = folders.tree(&ctx).await?;
            match format {
                OutputFormat::Json => output::print_json(&forest),
                OutputFormat::Table => {
                    if forest.is_empty() {
                        println!("No folders.");
                    }
                    for root in &forest {
                        print_node(root, 0);
                    }
                }
            }
        }
        FolderCommand::Rename { id, name } => {
            let folder = folders.rename(&ctx, *id, name).await?;
            print_folder(&folder, "renamed", format);
        }
        FolderCommand::Move { id, parent } => {
            let folder = folders.move_to(&ctx, *id, *parent).await?;
            print_folder(&folder, "moved", format);
        }
        FolderCommand::Delete { id, force } => {
            let folder = folders.get(&ctx, *id).await?;
            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Delete '{}' and everything inside it?",
                        folder.path
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deletion = folders.delete(&ctx, folder.id).await?;
            match format {
                OutputFormat::Json => output::print_json(&deletion),
                OutputFormat::Table => {
                    output::print_success(&format!("Folder '{}' deleted", folder.path));
                    output::print_kv("Folders removed", &deletion.folders_removed.to_string());
                    output::print_kv("Files removed", &deletion.files_removed.to_string());
                    output::print_kv("Bytes released", &human_bytes(deletion.bytes_released));
                }
            }
        }
    }

    Ok(())
}

fn print_folder(folder: &Folder, action: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => output::print_json(folder),
        OutputFormat::Table => {
            output::print_success(&format!("Folder {action}: {}", folder.path));
            output::print_kv("ID", &folder.id.to_string());
        }
    }
}

fn print_node(node: &FolderNode, depth: usize) {
    println!("{}{}/  ({})", "  ".repeat(depth), node.name, node.id);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}
