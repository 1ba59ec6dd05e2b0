//! `sheetsync check`: validate configuration and reach the database

use anyhow::Result;
use clap::Args;
use sqlx::Connection;
use std::path::Path;

use crate::config::load_config;
use crate::db::ConnectionProvider;
use crate::error::Outcome;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Test this connection URL (`postgres://...` or `sqlite://...`) instead of the configured one
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

pub async fn handle_check_command(
    args: CheckArgs,
    config_path: Option<&Path>,
) -> Result<Outcome> {
    let provider = match &args.url {
        Some(url) => ConnectionProvider::from_url(url)?,
        None => {
            let config = load_config(config_path)?;
            log::info!("Configuration: {:?}", config);
            ConnectionProvider::from_config(&config.database)
        }
    };

    let conn = provider.open().await?;
    conn.close().await?;

    Ok(Outcome::success(format!(
        "Connected to {} ({})",
        provider.display_url(),
        provider.dialect()
    )))
}
