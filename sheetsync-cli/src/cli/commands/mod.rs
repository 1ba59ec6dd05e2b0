//! Command handlers

pub mod check;
pub mod export;
pub mod upsert;
