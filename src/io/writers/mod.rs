//! Output writers. Extraction results are flattened into delimited text.
pub mod delimited;

pub use delimited::append_result;
