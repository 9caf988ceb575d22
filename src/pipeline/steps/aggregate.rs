use anyhow::Result;
use async_trait::async_trait;

use super::{missing_input, PipelineStep, RunContext, StepResult};
use crate::app::aggregate_use_case::AggregateUseCase;
use crate::constants::AGGREGATED_CSV;

/// Pipeline step for writing the per-operator aggregate
pub struct AggregateStep {
    use_case: AggregateUseCase,
}

impl AggregateStep {
    pub fn new(use_case: AggregateUseCase) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl PipelineStep for AggregateStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        let validated = ctx
            .validated
            .as_ref()
            .ok_or_else(|| missing_input(self.step_name(), "validated records"))?;

        let aggregation = self.use_case.aggregate(validated).await?;
        let result = StepResult::success(
            aggregation.rows.len(),
            format!("{} rows written to {}", aggregation.rows.len(), aggregation.path.display()),
        )
        .with_metadata("input_records", validated.len());

        ctx.artifacts.push(aggregation.path.with_file_name(AGGREGATED_CSV));
        ctx.artifacts.push(aggregation.path.clone());
        ctx.aggregated = Some(aggregation);
        Ok(result)
    }

    fn step_name(&self) -> &'static str {
        "aggregate"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["validate"]
    }
}
