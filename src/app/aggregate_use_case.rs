use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::app::ports::ArtifactStorePort;
use crate::constants::{AGGREGATED_ARCHIVE, AGGREGATED_CSV};
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::{aggregate, render_aggregated_csv, AggregateRow};
use crate::pipeline::processing::enrich::EnrichedRecord;

#[derive(Debug, Clone)]
pub struct AggregationResult {
    pub path: PathBuf,
    pub rows: Vec<AggregateRow>,
}

/// Use case for computing per-operator statistics and publishing the final
/// artifact. Each run replaces the previous aggregate.
pub struct AggregateUseCase {
    store: Arc<dyn ArtifactStorePort>,
}

impl AggregateUseCase {
    pub fn new(store: Arc<dyn ArtifactStorePort>) -> Self {
        Self { store }
    }

    pub async fn aggregate(&self, records: &[EnrichedRecord]) -> Result<AggregationResult> {
        let outcome = aggregate(records);
        let content = render_aggregated_csv(&outcome.rows)?;
        let path = self
            .store
            .publish_tabular(AGGREGATED_CSV, AGGREGATED_ARCHIVE, &content)
            .await?;

        metrics::aggregate::groups(outcome.rows.len());
        info!(
            "Aggregated {} records into {} operator/region rows",
            outcome.input_records,
            outcome.rows.len()
        );
        Ok(AggregationResult {
            path,
            rows: outcome.rows,
        })
    }
}
