use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::ingestion::QuarterSelection;
use super::pipeline_config::{PipelineConfig, PipelineStepConfig};
use super::steps::{
    AggregateStep, ConsolidateStep, EnrichStep, NormalizeStep, PipelineStep, RunContext, StepResult,
    ValidateStep,
};
use crate::app::aggregate_use_case::AggregateUseCase;
use crate::app::consolidate_use_case::ConsolidateUseCase;
use crate::app::enrich_use_case::EnrichUseCase;
use crate::app::normalize_use_case::NormalizeUseCase;
use crate::app::ports::{ArtifactDigest, ArtifactStorePort, RegistrySourcePort, SourceFilesPort};
use crate::app::validate_use_case::ValidateUseCase;
use crate::constants::{CONSOLIDATED_ARCHIVE, CONSOLIDATED_CSV, RUN_REPORT_FILE};
use crate::observability::metrics;

/// How a run ended when no step failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// A stage produced no data; later stages were not run
    NothingToProcess { stage: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    pub duration_ms: u128,
    #[serde(flatten)]
    pub result: StepResult,
}

/// Audit record written next to the artifacts after every run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub selection: QuarterSelection,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub steps: Vec<StepReport>,
    pub artifacts: Vec<ArtifactDigest>,
}

/// Result of executing a complete pipeline
#[derive(Debug)]
pub struct PipelineExecutionResult {
    pub report: RunReport,
    pub report_path: PathBuf,
    /// Final intermediate state, including the aggregated rows
    pub context: RunContext,
}

impl PipelineExecutionResult {
    pub fn outcome(&self) -> &RunOutcome {
        &self.report.outcome
    }

    pub fn duration(&self) -> chrono::Duration {
        self.report.completed_at - self.report.started_at
    }
}

/// Runs declarative pipelines over the configured ports
pub struct PipelineOrchestrator {
    sources: Arc<dyn SourceFilesPort>,
    registry: Arc<dyn RegistrySourcePort>,
    store: Arc<dyn ArtifactStorePort>,
}

impl PipelineOrchestrator {
    pub fn new(
        sources: Arc<dyn SourceFilesPort>,
        registry: Arc<dyn RegistrySourcePort>,
        store: Arc<dyn ArtifactStorePort>,
    ) -> Self {
        Self {
            sources,
            registry,
            store,
        }
    }

    /// Delete the consolidated artifact so the next run rebuilds it.
    pub async fn clear_consolidated(&self) -> Result<()> {
        let archive_removed = self.store.remove(CONSOLIDATED_ARCHIVE).await?;
        let csv_removed = self.store.remove(CONSOLIDATED_CSV).await?;
        if !archive_removed && !csv_removed {
            info!("No consolidated artifact to clear");
        }
        Ok(())
    }

    /// Run every configured step in order.
    ///
    /// A step error aborts the run and is returned. A step reporting nothing
    /// to process ends the run early with [`RunOutcome::NothingToProcess`].
    pub async fn run_pipeline(
        &self,
        config: &PipelineConfig,
        selection: QuarterSelection,
    ) -> Result<PipelineExecutionResult> {
        config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting pipeline '{}' (run {})", config.name, run_id);

        let mut ctx = RunContext::new(selection.clone());
        let mut steps = Vec::with_capacity(config.steps.len());
        let mut outcome = RunOutcome::Completed;

        for (index, step_config) in config.steps.iter().enumerate() {
            let step = self.create_step(*step_config);
            let name = step.step_name();
            info!("Executing step {}/{}: {}", index + 1, config.steps.len(), name);

            let started = Instant::now();
            let result = step
                .execute(&mut ctx)
                .await
                .with_context(|| format!("step '{}' failed", name))?;
            let elapsed = started.elapsed();
            metrics::run::step_duration(name, elapsed.as_secs_f64());

            info!("Step '{}' finished: {}", name, result.message);
            let stop = result.nothing_to_process;
            steps.push(StepReport {
                step: name.to_string(),
                duration_ms: elapsed.as_millis(),
                result,
            });

            if stop {
                warn!("Nothing to process after step '{}', stopping", name);
                outcome = RunOutcome::NothingToProcess {
                    stage: name.to_string(),
                };
                break;
            }
        }

        match &outcome {
            RunOutcome::Completed => metrics::run::completed(),
            RunOutcome::NothingToProcess { stage } => metrics::run::nothing_to_process(stage),
        }

        let mut artifacts = Vec::with_capacity(ctx.artifacts.len());
        for path in &ctx.artifacts {
            match self.store.digest(path).await {
                Ok(digest) => artifacts.push(digest),
                Err(e) => warn!("Could not digest {}: {:#}", path.display(), e),
            }
        }

        let report = RunReport {
            run_id,
            pipeline: config.name.clone(),
            selection,
            started_at,
            completed_at: Utc::now(),
            outcome,
            steps,
            artifacts,
        };
        let report_path = self
            .store
            .write_file(RUN_REPORT_FILE, &serde_json::to_vec_pretty(&report)?)
            .await?;
        info!("Run report written to {}", report_path.display());

        Ok(PipelineExecutionResult {
            report,
            report_path,
            context: ctx,
        })
    }

    fn create_step(&self, step_config: PipelineStepConfig) -> Box<dyn PipelineStep> {
        match step_config {
            PipelineStepConfig::Normalize => Box::new(NormalizeStep::new(
                NormalizeUseCase::with_default_normalizer(self.sources.clone()),
            )),
            PipelineStepConfig::Consolidate => {
                Box::new(ConsolidateStep::new(ConsolidateUseCase::new(self.store.clone())))
            }
            PipelineStepConfig::Enrich => Box::new(EnrichStep::new(EnrichUseCase::new(self.registry.clone()))),
            PipelineStepConfig::Validate => Box::new(ValidateStep::new(ValidateUseCase::default())),
            PipelineStepConfig::Aggregate => {
                Box::new(AggregateStep::new(AggregateUseCase::new(self.store.clone())))
            }
        }
    }
}
