//! Configuration for sheetsync
//!
//! Settings come from a TOML file with a `[database]` and a `[sync]` section,
//! overridden field by field by `SHEETSYNC_*` environment variables. The
//! result is resolved once and handed to whatever needs it.

pub mod loader;

use serde::Deserialize;

use crate::db::{Dialect, TableRef, is_valid_identifier};
use crate::error::{SyncError, SyncResult};

pub use loader::load_config;

/// Environment variables, in the order the settings are documented
pub mod env_vars {
    pub const DRIVER: &str = "SHEETSYNC_DB_DRIVER";
    pub const SERVER: &str = "SHEETSYNC_DB_SERVER";
    pub const USER: &str = "SHEETSYNC_DB_USER";
    pub const PASSWORD: &str = "SHEETSYNC_DB_PASSWORD";
    pub const DATABASE: &str = "SHEETSYNC_DB_NAME";
    pub const TARGET_TABLE: &str = "SHEETSYNC_TARGET_TABLE";
    pub const KEY_COLUMN: &str = "SHEETSYNC_KEY_COLUMN";
}

/// Settings as written in the file; every field may still be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub database: RawDatabaseSection,
    #[serde(default)]
    pub sync: RawSyncSection,
}

#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDatabaseSection {
    pub driver: Option<String>,
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl std::fmt::Debug for RawDatabaseSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDatabaseSection")
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSyncSection {
    pub target_table: Option<String>,
    pub key_column: Option<String>,
}

/// Validated connection settings
#[derive(Clone)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    pub server: String,
    pub user: String,
    pub password: String,
    /// Database name, or the file path for SQLite
    pub database: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// Everything an upsert or export needs, resolved once at startup
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub target_table: TableRef,
    pub key_column: String,
}

impl RawConfig {
    /// Parse the TOML form
    pub fn from_toml_str(content: &str) -> SyncResult<Self> {
        toml::from_str(content)
            .map_err(|e| SyncError::Configuration(format!("Invalid configuration file: {}", e)))
    }

    /// Override fields with whatever `lookup` returns for the `SHEETSYNC_*` variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = [
            (env_vars::DRIVER, &mut self.database.driver),
            (env_vars::SERVER, &mut self.database.server),
            (env_vars::USER, &mut self.database.user),
            (env_vars::PASSWORD, &mut self.database.password),
            (env_vars::DATABASE, &mut self.database.database),
            (env_vars::TARGET_TABLE, &mut self.sync.target_table),
            (env_vars::KEY_COLUMN, &mut self.sync.key_column),
        ];

        for (var, field) in overrides {
            if let Some(value) = lookup(var) {
                *field = Some(value);
            }
        }
    }

    /// Check every required setting and build the typed configuration
    ///
    /// Missing or blank settings are reported together, before any
    /// connection is attempted.
    pub fn resolve(self) -> SyncResult<SyncConfig> {
        let driver = present(&self.database.driver);
        let dialect = match driver {
            Some(d) => Some(d.parse::<Dialect>()?),
            None => None,
        };

        let mut missing = Vec::new();
        if dialect.is_none() {
            missing.push("database.driver");
        }

        // SQLite has no server or credentials
        let networked = dialect.is_none_or(|d| d.is_networked());
        let fields = [
            ("database.server", &self.database.server, networked),
            ("database.user", &self.database.user, networked),
            ("database.password", &self.database.password, networked),
            ("database.database", &self.database.database, true),
            ("sync.target_table", &self.sync.target_table, true),
            ("sync.key_column", &self.sync.key_column, true),
        ];
        for (name, value, required) in fields {
            if required && present(value).is_none() {
                missing.push(name);
            }
        }

        if !missing.is_empty() {
            return Err(SyncError::Configuration(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        let text = |value: &Option<String>| present(value).unwrap_or_default().to_string();

        let key_column = text(&self.sync.key_column);
        if !is_valid_identifier(&key_column) {
            return Err(SyncError::Configuration(format!(
                "Key column '{}' is not a valid identifier",
                key_column
            )));
        }

        Ok(SyncConfig {
            database: DatabaseConfig {
                dialect: dialect.unwrap_or(Dialect::Sqlite),
                server: text(&self.database.server),
                user: text(&self.database.user),
                // passwords are taken verbatim
                password: self.database.password.clone().unwrap_or_default(),
                database: text(&self.database.database),
            },
            target_table: text(&self.sync.target_table).parse()?,
            key_column,
        })
    }
}

/// Trimmed value when set and not blank
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
