mod cli;
mod config;
mod db;
mod error;
mod sync;

use clap::Parser;
use std::process::ExitCode;

use cli::Cli;
use cli::output::print_outcome;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dotenv {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Failed to load .env: {}", e),
    }

    if cli.no_color {
        colored::control::set_override(false);
    }

    let format = cli.format;
    let outcome = cli::run(cli).await;
    print_outcome(&outcome, format);

    if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// `RUST_LOG` wins over the verbosity flags
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
