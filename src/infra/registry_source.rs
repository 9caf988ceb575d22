use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::app::ports::RegistrySourcePort;

/// Operator registry read from a local `;`-delimited file
pub struct FileRegistrySource {
    path: PathBuf,
}

impl FileRegistrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RegistrySourcePort for FileRegistrySource {
    async fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("reading operator registry {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
