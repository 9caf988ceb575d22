use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::app::aggregate_use_case::AggregationResult;
use crate::app::normalize_use_case::NormalizeSummary;
use crate::pipeline::ingestion::QuarterSelection;
use crate::pipeline::processing::consolidate::ConsolidatedDataset;
use crate::pipeline::processing::enrich::EnrichedRecord;

/// Common trait for all pipeline steps
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Execute this step against the run's intermediate state
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult>;

    fn step_name(&self) -> &'static str;

    /// Steps that must have run before this one
    fn dependencies(&self) -> Vec<&'static str>;
}

/// Datasets handed from one step to the next during a run
#[derive(Debug, Default)]
pub struct RunContext {
    pub selection: QuarterSelection,
    pub normalized: Option<NormalizeSummary>,
    pub consolidated: Option<ConsolidatedDataset>,
    pub enriched: Option<Vec<EnrichedRecord>>,
    pub validated: Option<Vec<EnrichedRecord>>,
    pub aggregated: Option<AggregationResult>,
    /// Files written or reused by this run, in the order they were produced
    pub artifacts: Vec<PathBuf>,
}

impl RunContext {
    pub fn new(selection: QuarterSelection) -> Self {
        Self {
            selection,
            ..Default::default()
        }
    }
}

/// Result of executing a pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub success: bool,
    pub processed_count: usize,
    pub dropped_count: usize,
    /// The step ran but left nothing for later steps
    pub nothing_to_process: bool,
    pub message: String,
    pub metadata: BTreeMap<String, String>,
}

impl StepResult {
    pub fn success(processed: usize, message: String) -> Self {
        Self {
            success: true,
            processed_count: processed,
            dropped_count: 0,
            nothing_to_process: false,
            message,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_dropped(processed: usize, dropped: usize, message: String) -> Self {
        Self {
            dropped_count: dropped,
            ..Self::success(processed, message)
        }
    }

    pub fn nothing_to_process(dropped: usize, message: String) -> Self {
        Self {
            nothing_to_process: true,
            ..Self::with_dropped(0, dropped, message)
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Error for a step whose input was never produced
pub(crate) fn missing_input(step: &str, input: &str) -> anyhow::Error {
    anyhow::anyhow!("step '{}' needs {} from an earlier step", step, input)
}

pub mod aggregate;
pub mod consolidate;
pub mod enrich;
pub mod normalize;
pub mod validate;

pub use aggregate::AggregateStep;
pub use consolidate::ConsolidateStep;
pub use enrich::EnrichStep;
pub use normalize::NormalizeStep;
pub use validate::ValidateStep;
