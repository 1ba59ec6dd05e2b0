//! `sheetsync export`: dump the target table to an xlsx file

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use std::path::{Path, PathBuf};

use crate::cli::output::print_preview;
use crate::config::load_config;
use crate::db::ConnectionProvider;
use crate::error::Outcome;
use crate::sync::excel::build_export_file;
use crate::sync::export_table;

const PREVIEW_ROWS: usize = 5;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Directory the workbook is written to
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,
}

pub async fn handle_export_command(
    args: ExportArgs,
    config_path: Option<&Path>,
) -> Result<Outcome> {
    let config = load_config(config_path)?;

    if !args.output_dir.is_dir() {
        anyhow::bail!("Output directory does not exist: {}", args.output_dir.display());
    }

    let provider = ConnectionProvider::from_config(&config.database);
    let dataset = export_table(&provider, &config.target_table).await?;
    print_preview(&dataset, PREVIEW_ROWS);

    let now = chrono::Local::now().naive_local();
    let file = build_export_file(&dataset, config.target_table.name(), now)?;
    let path = args.output_dir.join(&file.file_name);

    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write export to: {}", path.display()))?;

    println!("File: {}", path.display().to_string().bright_green());
    println!("Type: {}", file.mime_type.dimmed());

    Ok(Outcome::success(format!(
        "Exported {} rows from {} to {}",
        dataset.row_count(),
        config.target_table,
        path.display()
    )))
}
