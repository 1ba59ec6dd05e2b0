//! Spreadsheet to table synchronization
//!
//! The upsert engine merges a parsed spreadsheet into the destination table;
//! the exporter reads the table back out for serialization.

pub mod excel;
pub mod export;
pub mod types;
pub mod upsert;

pub use export::export_table;
pub use types::*;
pub use upsert::{plan_upsert, upsert, validate_dataset};
