//! User account and storage usage commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat, human_bytes};
use mycloud_core::config::AppConfig;
use mycloud_core::error::AppError;
use mycloud_entity::user::{CreateUser, User};
use mycloud_service::RequestContext;

use super::{Services, require_user};

/// Arguments for user commands
#[derive(Debug, Args)]
pub struct UserArgs {
    /// User subcommand
    #[command(subcommand)]
    pub command: UserCommand,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user
    Create {
        /// Username (unique, case-insensitive)
        #[arg(long)]
        username: String,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Storage quota in bytes (defaults to storage.default_quota_bytes)
        #[arg(long)]
        quota: Option<i64>,
        /// Grant administrator rights
        #[arg(long)]
        admin: bool,
    },
    /// List all users
    List,
    /// Show quota and object counts for the acting user
    Usage,
}

/// User display row for table output
#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    /// User ID
    id: Uuid,
    /// Username
    username: String,
    /// Email
    email: String,
    /// Admin
    admin: bool,
    /// Used
    used: String,
    /// Quota
    quota: String,
    /// Created at
    created_at: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone().unwrap_or_default(),
            admin: u.is_admin,
            used: human_bytes(u.storage_used),
            quota: human_bytes(u.storage_quota),
            created_at: u.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute user commands
pub async fn execute(
    args: &UserArgs,
    config: &AppConfig,
    user: Option<Uuid>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;

    match &args.command {
        UserCommand::Create {
            username,
            email,
            quota,
            admin,
        } => {
            let storage_quota = quota.unwrap_or(config.storage.default_quota_bytes);
            if storage_quota < 0 {
                return Err(AppError::validation("Quota cannot be negative"));
            }

            let created = services
                .users
                .create(&CreateUser {
                    username: username.trim().to_string(),
                    email: email.clone(),
                    is_admin: *admin,
                    storage_quota,
                })
                .await?;

            match format {
                OutputFormat::Json => output::print_json(&created),
                OutputFormat::Table => {
                    output::print_success(&format!("User '{}' created", created.username));
                    output::print_kv("ID", &created.id.to_string());
                    output::print_kv("Quota", &human_bytes(created.storage_quota));
                }
            }
        }
        UserCommand::List => {
            let users = services.users.find_all().await?;
            let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
            output::print_list(&rows, format);
        }
        UserCommand::Usage => {
            let ctx = RequestContext::new(require_user(user)?);
            let stats = services.files.stats(&ctx).await?;

            match format {
                OutputFormat::Json => output::print_json(&stats),
                OutputFormat::Table => {
                    output::print_kv("Used", &human_bytes(stats.quota.used_bytes));
                    output::print_kv("Quota", &human_bytes(stats.quota.total_bytes));
                    output::print_kv("Available", &human_bytes(stats.quota.available_bytes));
                    output::print_kv("Usage", &format!("{:.1}%", stats.quota.usage_percent));
                    output::print_kv("Files", &stats.file_count.to_string());
                    output::print_kv("Folders", &stats.folder_count.to_string());
                    if stats.quota.usage_percent >= 90.0 {
                        output::print_warning("Storage is almost full");
                    }
                }
            }
        }
    }

    Ok(())
}
