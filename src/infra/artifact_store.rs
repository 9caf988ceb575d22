use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::app::ports::{ArtifactDigest, ArtifactStorePort};

/// Artifact store rooted at an output directory on the local filesystem.
///
/// Every write lands in a hidden temporary sibling first and is renamed into
/// place, so readers never observe a partially written artifact.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating output directory {}", self.root.display()))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{}.tmp", name))
    }

    fn stage(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let tmp = self.temp_path(name);
        fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        Ok(tmp)
    }

    fn commit(&self, tmp: &Path, name: &str) -> Result<PathBuf> {
        let target = self.path_of(name);
        fs::rename(tmp, &target)
            .with_context(|| format!("moving {} into place", target.display()))?;
        Ok(target)
    }
}

/// Build an in-memory deflated zip with a single entry.
pub fn build_archive(entry: &str, content: &[u8]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(entry, options)?;
    zip.write_all(content)?;
    Ok(zip.finish()?.into_inner())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ArtifactStorePort for FsArtifactStore {
    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path_of(name).is_file())
    }

    async fn publish_tabular(&self, csv_name: &str, archive_name: &str, content: &[u8]) -> Result<PathBuf> {
        self.ensure_root()?;
        let archive = build_archive(csv_name, content)?;

        let csv_tmp = self.stage(csv_name, content)?;
        let archive_tmp = self.stage(archive_name, &archive)?;

        let csv_path = self.commit(&csv_tmp, csv_name)?;
        let archive_path = self.commit(&archive_tmp, archive_name)?;

        info!(
            "Published {} ({} bytes) and {} ({} bytes)",
            csv_path.display(),
            content.len(),
            archive_path.display(),
            archive.len()
        );
        Ok(archive_path)
    }

    async fn read_archive_entry(&self, archive_name: &str, entry: &str) -> Result<Vec<u8>> {
        let path = self.path_of(archive_name);
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .with_context(|| format!("opening archive {}", path.display()))?;
        let mut file = archive
            .by_name(entry)
            .with_context(|| format!("archive {} has no entry {}", path.display(), entry))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        debug!("Read {} bytes of {} from {}", content.len(), entry, path.display());
        Ok(content)
    }

    async fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        self.ensure_root()?;
        let tmp = self.stage(name, content)?;
        self.commit(&tmp, name)
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        info!("Removed {}", path.display());
        Ok(true)
    }

    async fn digest(&self, path: &Path) -> Result<ArtifactDigest> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Ok(ArtifactDigest {
            path: path.to_path_buf(),
            sha256: sha256_hex(&bytes),
            bytes: bytes.len() as u64,
        })
    }
}
