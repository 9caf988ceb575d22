use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::QuarterKey;
use crate::error::Result;
use crate::pipeline::processing::normalize::SourceFormat;

static QUARTER_FOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})_([1-4])T$").expect("static regex"));

/// A `YYYY_QT` folder under the extracted-data root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterFolder {
    pub period: QuarterKey,
    pub path: PathBuf,
}

/// Which quarters a run processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuarterSelection {
    /// The most recent `n` quarters present on disk
    Latest(usize),
    /// Explicit folder labels such as `2025_1T`
    Labels(Vec<String>),
}

impl Default for QuarterSelection {
    fn default() -> Self {
        QuarterSelection::Latest(3)
    }
}

/// Parse a folder label (`2025_1T`) into its period.
pub fn parse_quarter_label(label: &str) -> Option<QuarterKey> {
    let caps = QUARTER_FOLDER.captures(label.trim())?;
    let year = caps[1].parse().ok()?;
    let quarter = caps[2].parse().ok()?;
    QuarterKey::new(year, quarter)
}

/// List quarter folders under `root`, oldest first.
pub fn discover_quarters(root: &Path) -> Result<Vec<QuarterFolder>> {
    if !root.is_dir() {
        warn!("Extracted data root {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let mut folders = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        match parse_quarter_label(&name.to_string_lossy()) {
            Some(period) => folders.push(QuarterFolder {
                period,
                path: entry.path(),
            }),
            None => debug!("Ignoring folder {:?}", name),
        }
    }

    folders.sort_by_key(|f| f.period);
    Ok(folders)
}

/// Narrow discovered folders to the requested selection.
///
/// Requested labels with no folder on disk are reported and left out.
pub fn select_quarters(folders: &[QuarterFolder], selection: &QuarterSelection) -> Vec<QuarterFolder> {
    match selection {
        QuarterSelection::Latest(n) => {
            let skip = folders.len().saturating_sub(*n);
            folders[skip..].to_vec()
        }
        QuarterSelection::Labels(labels) => {
            let mut selected = Vec::new();
            for label in labels {
                let Some(period) = parse_quarter_label(label) else {
                    warn!("Ignoring malformed quarter label '{}'", label);
                    continue;
                };
                match folders.iter().find(|f| f.period == period) {
                    Some(folder) if !selected.contains(folder) => selected.push(folder.clone()),
                    Some(_) => {}
                    None => warn!("Quarter folder {} not found", period.label()),
                }
            }
            selected.sort_by_key(|f| f.period);
            selected
        }
    }
}

/// Recursively list supported source files under a quarter folder, sorted by path.
pub fn list_source_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        warn!("Quarter folder {} does not exist", folder.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_files(folder, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if SourceFormat::from_path(&path).is_some() {
            out.push(path);
        }
    }
    Ok(())
}
