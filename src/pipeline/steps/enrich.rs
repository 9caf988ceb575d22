use anyhow::Result;
use async_trait::async_trait;

use super::{missing_input, PipelineStep, RunContext, StepResult};
use crate::app::enrich_use_case::EnrichUseCase;

/// Pipeline step for attaching registry identity to consolidated records
pub struct EnrichStep {
    use_case: EnrichUseCase,
}

impl EnrichStep {
    pub fn new(use_case: EnrichUseCase) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl PipelineStep for EnrichStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        let dataset = ctx
            .consolidated
            .as_ref()
            .ok_or_else(|| missing_input(self.step_name(), "the consolidated dataset"))?;

        let outcome = self.use_case.enrich(dataset).await?;
        let kept = outcome.records.len();

        let result = if kept == 0 {
            StepResult::nothing_to_process(outcome.dropped, "no records matched the operator registry".to_string())
        } else {
            StepResult::with_dropped(
                kept,
                outcome.dropped,
                format!("{} records enriched, {} without registry match", kept, outcome.dropped),
            )
        }
        .with_metadata("skipped", outcome.skipped);

        ctx.enriched = Some(outcome.records);
        Ok(result)
    }

    fn step_name(&self) -> &'static str {
        "enrich"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["consolidate"]
    }
}
