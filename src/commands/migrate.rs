//! Database migration management commands.

use clap::{Args, Subcommand};

use crate::output;
use mycloud_core::config::AppConfig;
use mycloud_core::error::AppError;
use mycloud_database::DatabasePool;
use mycloud_database::migration::{embedded_migrations, run_migrations};

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Run all pending migrations
    Run {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// List migrations embedded in this binary
    List,
}

/// Execute migration commands
pub async fn execute(args: &MigrateArgs, config: &AppConfig) -> Result<(), AppError> {
    match &args.command {
        MigrateCommand::Run { force } => {
            if !force {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt("Apply pending migrations to the configured database?")
                    .default(true)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let db = DatabasePool::connect(&config.database).await?;
            println!("Running database migrations...");
            run_migrations(db.pool()).await?;
            db.close().await;
            output::print_success("All migrations applied successfully.");
        }
        MigrateCommand::List => {
            for migration in embedded_migrations() {
                println!("  {migration}");
            }
        }
    }

    Ok(())
}
