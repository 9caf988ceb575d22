// Pipeline ingestion: locating quarter folders and source files on the extracted tree

pub mod discovery;

pub use discovery::{discover_quarters, list_source_files, select_quarters, QuarterFolder, QuarterSelection};
