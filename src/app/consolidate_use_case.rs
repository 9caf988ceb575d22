use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app::ports::ArtifactStorePort;
use crate::constants::{CONSOLIDATED_ARCHIVE, CONSOLIDATED_CSV};
use crate::domain::ExpenseRecord;
use crate::observability::metrics;
use crate::pipeline::processing::consolidate::{
    consolidate, parse_consolidated_csv, render_consolidated_csv, ConsolidatedDataset,
};

/// What the consolidation stage did this run
#[derive(Debug, Clone)]
pub enum ConsolidationResult {
    /// A fresh consolidated artifact was written
    Written { path: PathBuf, dataset: ConsolidatedDataset },
    /// The archive already existed; the dataset was reloaded from it.
    /// The plain CSV copy may have been removed since it was written.
    Reused {
        path: PathBuf,
        dataset: ConsolidatedDataset,
        csv_present: bool,
    },
    /// No input records; nothing was written
    NothingToConsolidate,
}

impl ConsolidationResult {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConsolidationResult::Written { path, .. } | ConsolidationResult::Reused { path, .. } => Some(path),
            ConsolidationResult::NothingToConsolidate => None,
        }
    }

    pub fn dataset(&self) -> Option<&ConsolidatedDataset> {
        match self {
            ConsolidationResult::Written { dataset, .. } | ConsolidationResult::Reused { dataset, .. } => {
                Some(dataset)
            }
            ConsolidationResult::NothingToConsolidate => None,
        }
    }

    pub fn into_dataset(self) -> Option<ConsolidatedDataset> {
        match self {
            ConsolidationResult::Written { dataset, .. } | ConsolidationResult::Reused { dataset, .. } => {
                Some(dataset)
            }
            ConsolidationResult::NothingToConsolidate => None,
        }
    }

    pub fn reused(&self) -> bool {
        matches!(self, ConsolidationResult::Reused { .. })
    }

    /// Path of the plain CSV next to the archive, when it is on disk
    pub fn csv_path(&self) -> Option<PathBuf> {
        match self {
            ConsolidationResult::Written { path, .. }
            | ConsolidationResult::Reused {
                path,
                csv_present: true,
                ..
            } => Some(path.with_file_name(CONSOLIDATED_CSV)),
            _ => None,
        }
    }
}

/// Use case for merging normalized quarters into the persisted consolidated
/// artifact. The archive's presence is the idempotency marker.
pub struct ConsolidateUseCase {
    store: Arc<dyn ArtifactStorePort>,
}

impl ConsolidateUseCase {
    pub fn new(store: Arc<dyn ArtifactStorePort>) -> Self {
        Self { store }
    }

    pub async fn consolidate(&self, records: &[ExpenseRecord]) -> Result<ConsolidationResult> {
        if self.store.exists(CONSOLIDATED_ARCHIVE).await? {
            let path = self.store.path_of(CONSOLIDATED_ARCHIVE);
            info!("Consolidated archive {} already exists, reusing it", path.display());

            let bytes = self
                .store
                .read_archive_entry(CONSOLIDATED_ARCHIVE, CONSOLIDATED_CSV)
                .await?;
            let reloaded = parse_consolidated_csv(&bytes)
                .with_context(|| format!("parsing existing {}", path.display()))?;
            let dataset = consolidate(&reloaded);

            let csv_present = self.store.exists(CONSOLIDATED_CSV).await?;
            if !csv_present {
                warn!("{} is missing next to the reused archive", CONSOLIDATED_CSV);
            }

            metrics::consolidate::artifact_reused();
            metrics::consolidate::report(&dataset.report);
            return Ok(ConsolidationResult::Reused {
                path,
                dataset,
                csv_present,
            });
        }

        if records.is_empty() {
            warn!("No normalized records to consolidate");
            return Ok(ConsolidationResult::NothingToConsolidate);
        }

        let dataset = consolidate(records);
        log_report(&dataset);

        let content = render_consolidated_csv(&dataset)?;
        let path = self
            .store
            .publish_tabular(CONSOLIDATED_CSV, CONSOLIDATED_ARCHIVE, &content)
            .await?;

        metrics::consolidate::report(&dataset.report);
        Ok(ConsolidationResult::Written { path, dataset })
    }
}

fn log_report(dataset: &ConsolidatedDataset) {
    let report = &dataset.report;
    info!(
        "Consolidated {} records: {} zero-valued, {} negative, {} multi-quarter operators, {} without tax id",
        report.total_records,
        report.zero_valued,
        report.negative_valued,
        report.multi_quarter_operators,
        report.empty_tax_id
    );
    for (quarter, count) in &report.records_per_quarter {
        info!("  {}: {} records", quarter, count);
    }
}
