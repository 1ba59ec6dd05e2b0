//! Spreadsheet import/export for datasets

mod reader;
mod writer;

pub use reader::read_dataset_path;
pub use writer::build_export_file;

#[cfg(test)]
pub use reader::read_dataset_bytes;
#[cfg(test)]
pub use writer::write_dataset_xlsx;
