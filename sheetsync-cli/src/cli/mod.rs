//! Command-line surface

pub mod commands;
pub mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::error::Outcome;

/// Synchronize a spreadsheet with a database table
#[derive(Parser, Debug)]
#[command(name = "sheetsync", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./sheetsync.toml, then the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// How the final outcome is printed
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upsert the first sheet of a spreadsheet into the target table
    Upsert(commands::upsert::UpsertArgs),
    /// Export the target table to an xlsx file
    Export(commands::export::ExportArgs),
    /// Validate the configuration and test the database connection
    Check(commands::check::CheckArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Run the selected command; every failure ends up as a failed outcome
pub async fn run(cli: Cli) -> Outcome {
    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Upsert(args) => commands::upsert::handle_upsert_command(args, config_path).await,
        Commands::Export(args) => commands::export::handle_export_command(args, config_path).await,
        Commands::Check(args) => commands::check::handle_check_command(args, config_path).await,
    };

    result.unwrap_or_else(|err| {
        log::debug!("Command failed: {:?}", err);
        Outcome::failure(format!("{:#}", err))
    })
}
