//! CLI command definitions and dispatch.

pub mod extract;
pub mod file;
pub mod folder;
pub mod migrate;
pub mod share;
pub mod user;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::output::OutputFormat;
use mycloud_core::config::AppConfig;
use mycloud_core::error::AppError;
use mycloud_database::DatabasePool;
use mycloud_database::repositories::{
    FileRepository, FolderRepository, ShareRepository, UserRepository,
};
use mycloud_service::{
    ExtractionEngine, FileService, FolderService, QuotaLedger, RequestContext, ShareService,
};
use mycloud_storage::{BlobStore, LocalStorageProvider};

/// MyCloud: self-hosted personal cloud storage
#[derive(Debug, Parser)]
#[command(name = "mycloud", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (defaults to config/default.toml plus the MYCLOUD_ENV overlay)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Acting user id
    #[arg(short, long, global = true)]
    pub user: Option<Uuid>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// User accounts and storage usage
    User(user::UserArgs),
    /// Folder management
    Folder(folder::FolderArgs),
    /// File management
    File(file::FileArgs),
    /// Extract a zip archive into a new folder
    Extract(extract::ExtractArgs),
    /// File sharing
    Share(share::ShareArgs),
}

impl Cli {
    /// Load configuration from `--config`, or from the default layout.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        match &self.config {
            Some(path) => AppConfig::load_file(path),
            None => {
                let env =
                    std::env::var("MYCLOUD_ENV").unwrap_or_else(|_| "development".to_string());
                AppConfig::load(&env)
            }
        }
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::User(args) => user::execute(args, &config, self.user, self.format).await,
            Commands::Folder(args) => {
                folder::execute(args, &config, self.context()?, self.format).await
            }
            Commands::File(args) => file::execute(args, &config, self.context()?, self.format).await,
            Commands::Extract(args) => {
                extract::execute(args, &config, self.context()?, self.format).await
            }
            Commands::Share(args) => share::execute(args, &config, self.context()?, self.format).await,
        }
    }

    /// Request context for the acting user; fails when `--user` is missing.
    fn context(&self) -> Result<RequestContext, AppError> {
        require_user(self.user).map(RequestContext::new)
    }
}

/// The `--user` value, or a validation error naming the flag.
pub fn require_user(user: Option<Uuid>) -> Result<Uuid, AppError> {
    user.ok_or_else(|| AppError::validation("This command requires --user <uuid>"))
}

/// Connection pool, repositories and services wired from configuration.
pub struct Services {
    /// User repository.
    pub users: Arc<UserRepository>,
    /// Folder tree store.
    pub folders: FolderService,
    /// File record store.
    pub files: FileService,
    /// Sharing.
    pub shares: ShareService,
    /// Archive extraction.
    pub extraction: ExtractionEngine,
}

impl Services {
    /// Connect to the database and the byte store and build every service.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let db = DatabasePool::connect(&config.database).await?;
        let provider = LocalStorageProvider::new(&config.storage.root_path).await?;
        let blobs = Arc::new(BlobStore::new(Arc::new(provider)));

        let users = Arc::new(UserRepository::new(db.pool().clone()));
        let folder_repo = Arc::new(FolderRepository::new(db.pool().clone()));
        let file_repo = Arc::new(FileRepository::new(db.pool().clone()));
        let share_repo = Arc::new(ShareRepository::new(db.pool().clone()));
        let ledger = Arc::new(QuotaLedger::new(Arc::clone(&users)));

        let folders = FolderService::new(Arc::clone(&folder_repo), Arc::clone(&blobs));
        let files = FileService::new(
            Arc::clone(&file_repo),
            Arc::clone(&folder_repo),
            Arc::clone(&ledger),
            Arc::clone(&blobs),
            config.storage.clone(),
        );
        let shares = ShareService::new(
            Arc::clone(&file_repo),
            share_repo,
            Arc::clone(&users),
            Arc::clone(&blobs),
        );
        let extraction = ExtractionEngine::new(
            file_repo,
            folder_repo,
            ledger,
            blobs,
            config.archive.clone(),
        );

        Ok(Self {
            users,
            folders,
            files,
            shares,
            extraction,
        })
    }
}
