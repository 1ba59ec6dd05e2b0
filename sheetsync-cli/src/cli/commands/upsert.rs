//! `sheetsync upsert`: load a spreadsheet into the target table

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use dialoguer::Confirm;
use is_terminal::IsTerminal;
use sqlx::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cli::output::print_preview;
use crate::config::load_config;
use crate::db::{ConnectionProvider, Dialect};
use crate::error::Outcome;
use crate::sync::excel::read_dataset_path;
use crate::sync::{plan_upsert, upsert, validate_dataset};

#[derive(Args, Debug)]
pub struct UpsertArgs {
    /// Spreadsheet to load (xlsx, xlsm, xlsb, xls or ods); the first sheet is used
    pub file: PathBuf,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show the preview and the generated statements without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Number of rows to preview
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub preview: usize,
}

pub async fn handle_upsert_command(
    args: UpsertArgs,
    config_path: Option<&Path>,
) -> Result<Outcome> {
    let config = load_config(config_path)?;

    if !args.file.exists() {
        anyhow::bail!("Spreadsheet does not exist: {}", args.file.display());
    }

    let dataset = read_dataset_path(&args.file)?;
    validate_dataset(&dataset, &config.key_column)?;

    println!(
        "Loaded {} rows x {} columns from {}",
        dataset.row_count().to_string().bold(),
        dataset.columns().len().to_string().bold(),
        args.file.display().to_string().cyan()
    );
    print_preview(&dataset, args.preview);

    if args.dry_run {
        // a dry run never connects, so destination column types are unknown here
        let plan = plan_upsert(
            &dataset,
            &config.target_table,
            &config.key_column,
            config.database.dialect,
            &HashMap::new(),
        )?;
        println!("{}", "Staging table:".bold());
        println!("{}", plan.create_sql.dimmed());
        println!("{}", "Merge statement:".bold());
        println!("{}", plan.merge_sql.dimmed());
        if plan.dialect == Dialect::Postgres {
            println!(
                "{}",
                "Staged values are cast to the destination column types when run.".dimmed()
            );
        }
        println!();
        return Ok(Outcome::success(format!(
            "Dry run: {} rows would be upserted into {}; no changes made",
            dataset.row_count(),
            config.target_table
        )));
    }

    if !args.yes {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!(
                "Refusing to upsert without confirmation; pass --yes when not running on a terminal"
            );
        }

        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Upsert {} rows into {} on '{}'?",
                dataset.row_count(),
                config.target_table,
                config.key_column
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            return Ok(Outcome::failure("Upsert cancelled; no changes made"));
        }
    }

    let provider = ConnectionProvider::from_config(&config.database);
    let mut conn = provider.open().await?;
    let result = upsert(&dataset, &config.target_table, &config.key_column, &mut conn).await;

    if let Err(e) = conn.close().await {
        log::warn!("Failed to close connection: {}", e);
    }

    Ok(Outcome::success(result?.message()))
}
