//! I/O layer for reading scientific product files and writing tabular output.
//! Provides the `ScienceFile` abstraction, its GDAL-backed (`gdal`) and in-memory
//! (`memory`) implementations, and the delimited text `writers`.
pub mod science;
pub use science::{SampleType, ScienceFile, Variable};

pub mod gdal;
pub use gdal::{GdalError, GdalScienceFile};

pub mod memory;
pub use memory::InMemoryFile;

pub mod writers;
