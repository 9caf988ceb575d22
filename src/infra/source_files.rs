use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::app::ports::{SourceFile, SourceFilesPort};
use crate::pipeline::ingestion::{
    discover_quarters, list_source_files, select_quarters, QuarterFolder, QuarterSelection,
};

/// Source extracts laid out as `<root>/YYYY_QT/**` on the local filesystem
pub struct FsSourceFiles {
    root: PathBuf,
}

impl FsSourceFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceFilesPort for FsSourceFiles {
    async fn quarters(&self, selection: &QuarterSelection) -> Result<Vec<QuarterFolder>> {
        let discovered = discover_quarters(&self.root)
            .with_context(|| format!("scanning {}", self.root.display()))?;
        Ok(select_quarters(&discovered, selection))
    }

    async fn files(&self, folder: &QuarterFolder) -> Result<Vec<SourceFile>> {
        let paths = list_source_files(&folder.path)
            .with_context(|| format!("listing {}", folder.path.display()))?;
        Ok(paths
            .into_iter()
            .map(|path| SourceFile {
                folder: folder.clone(),
                path,
            })
            .collect())
    }

    async fn read(&self, file: &SourceFile) -> Result<Vec<u8>> {
        fs::read(&file.path).with_context(|| format!("reading {}", file.path.display()))
    }
}
