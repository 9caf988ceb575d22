use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{missing_input, PipelineStep, RunContext, StepResult};
use crate::app::consolidate_use_case::{ConsolidateUseCase, ConsolidationResult};

/// Pipeline step for building (or reusing) the consolidated artifact
pub struct ConsolidateStep {
    use_case: ConsolidateUseCase,
}

impl ConsolidateStep {
    pub fn new(use_case: ConsolidateUseCase) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl PipelineStep for ConsolidateStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        let normalized = ctx
            .normalized
            .as_ref()
            .ok_or_else(|| missing_input(self.step_name(), "normalized records"))?;

        let result = self.use_case.consolidate(&normalized.records).await?;
        let reused = result.reused();
        let csv_path = result.csv_path();

        let (path, dataset) = match result {
            ConsolidationResult::NothingToConsolidate => {
                return Ok(StepResult::nothing_to_process(
                    0,
                    "no qualifying records to consolidate".to_string(),
                ));
            }
            ConsolidationResult::Written { path, dataset }
            | ConsolidationResult::Reused { path, dataset, .. } => (path, dataset),
        };

        info!("Consolidated dataset at {} ({} records)", path.display(), dataset.records.len());
        let report = &dataset.report;
        let mut step_result = StepResult::success(
            report.total_records,
            format!("{} records consolidated into {}", report.total_records, path.display()),
        )
        .with_metadata("reused_existing", reused)
        .with_metadata("zero_valued", report.zero_valued)
        .with_metadata("negative_valued", report.negative_valued)
        .with_metadata("multi_quarter_operators", report.multi_quarter_operators)
        .with_metadata("empty_tax_id", report.empty_tax_id);
        for (quarter, count) in &report.records_per_quarter {
            step_result = step_result.with_metadata(&format!("records_{}", quarter), count);
        }

        ctx.artifacts.extend(csv_path);
        ctx.artifacts.push(path);
        ctx.consolidated = Some(dataset);
        Ok(step_result)
    }

    fn step_name(&self) -> &'static str {
        "consolidate"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["normalize"]
    }
}
