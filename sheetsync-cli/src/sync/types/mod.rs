//! Core types for sync

mod dataset;
mod value;

pub use dataset::*;
pub use value::*;
