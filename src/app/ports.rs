use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::pipeline::ingestion::{QuarterFolder, QuarterSelection};

/// A source file belonging to one quarter folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub folder: QuarterFolder,
    pub path: PathBuf,
}

/// Where quarterly source extracts come from
#[async_trait]
pub trait SourceFilesPort: Send + Sync {
    /// Quarter folders matching the selection, oldest first
    async fn quarters(&self, selection: &QuarterSelection) -> Result<Vec<QuarterFolder>>;

    /// Supported source files inside one quarter folder
    async fn files(&self, folder: &QuarterFolder) -> Result<Vec<SourceFile>>;

    async fn read(&self, file: &SourceFile) -> Result<Vec<u8>>;
}

/// Operator registry reference file
#[async_trait]
pub trait RegistrySourcePort: Send + Sync {
    async fn load(&self) -> Result<Vec<u8>>;

    fn describe(&self) -> String;
}

/// A published artifact and the digest of its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDigest {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Output directory holding the pipeline's artifacts
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    fn path_of(&self, name: &str) -> PathBuf;

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Write `content` as `csv_name` plus a zip `archive_name` holding it.
    /// The archive is put in place last.
    async fn publish_tabular(&self, csv_name: &str, archive_name: &str, content: &[u8]) -> Result<PathBuf>;

    /// Read one entry out of a previously published archive
    async fn read_archive_entry(&self, archive_name: &str, entry: &str) -> Result<Vec<u8>>;

    /// Atomically replace a single file
    async fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf>;

    async fn remove(&self, name: &str) -> Result<bool>;

    async fn digest(&self, path: &Path) -> Result<ArtifactDigest>;
}
