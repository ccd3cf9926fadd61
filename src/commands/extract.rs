//! Archive extraction command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use uuid::Uuid;

use crate::output::{self, OutputFormat, human_bytes};
use mycloud_core::config::AppConfig;
use mycloud_core::error::AppError;
use mycloud_service::RequestContext;
use mycloud_service::archive::CreatedFile;

use super::Services;

/// Arguments for the extract command
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Archive file ID
    pub file_id: Uuid,
    /// Folder to extract into (defaults to the archive's folder)
    #[arg(short, long)]
    pub target: Option<Uuid>,
}

/// Extracted file row
#[derive(Debug, Serialize, Tabled)]
struct ExtractedRow {
    /// File ID
    id: Uuid,
    /// Name
    name: String,
    /// Size
    size: String,
}

impl From<&CreatedFile> for ExtractedRow {
    fn from(f: &CreatedFile) -> Self {
        Self {
            id: f.id,
            name: f.name.clone(),
            size: human_bytes(f.size),
        }
    }
}

/// Execute the extract command
pub async fn execute(
    args: &ExtractArgs,
    config: &AppConfig,
    ctx: RequestContext,
    format: OutputFormat,
) -> Result<(), AppError> {
    let services = Services::connect(config).await?;
    let result = services
        .extraction
        .extract(&ctx, args.file_id, args.target)
        .await?;

    match format {
        OutputFormat::Json => output::print_json(&result),
        OutputFormat::Table => {
            let total: i64 = result.created_files.iter().map(|f| f.size).sum();
            output::print_success(&format!(
                "Extracted {} file(s) into '{}'",
                result.created_files.len(),
                result.created_folder_name
            ));
            output::print_kv("Folder ID", &result.created_folder_id.to_string());
            output::print_kv("Total size", &human_bytes(total));
            let rows: Vec<ExtractedRow> =
                result.created_files.iter().map(ExtractedRow::from).collect();
            output::print_list(&rows, format);
        }
    }

    Ok(())
}
