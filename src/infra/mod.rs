// Filesystem adapters for the application ports

pub mod artifact_store;
pub mod registry_source;
pub mod source_files;

pub use artifact_store::FsArtifactStore;
pub use registry_source::FileRegistrySource;
pub use source_files::FsSourceFiles;
