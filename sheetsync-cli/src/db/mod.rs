//! Store access: connections, identifiers and per-store SQL

pub mod catalog;
pub mod dialect;
pub mod identifier;
pub mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::describe_columns;
pub use dialect::Dialect;
pub use identifier::{TableRef, is_valid_identifier, validate_column_name};
pub use provider::ConnectionProvider;
