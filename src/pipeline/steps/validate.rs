use anyhow::Result;
use async_trait::async_trait;

use super::{missing_input, PipelineStep, RunContext, StepResult};
use crate::app::validate_use_case::ValidateUseCase;
use crate::pipeline::processing::quality_gate::ValidationRule;

/// Pipeline step for discarding records that break a validation rule
pub struct ValidateStep {
    use_case: ValidateUseCase,
}

impl ValidateStep {
    pub fn new(use_case: ValidateUseCase) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl PipelineStep for ValidateStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        let enriched = ctx
            .enriched
            .as_ref()
            .ok_or_else(|| missing_input(self.step_name(), "enriched records"))?;

        let outcome = self.use_case.validate(enriched);
        let report = &outcome.report;

        let mut result = if report.retained == 0 {
            StepResult::nothing_to_process(report.rejected, "no records passed validation".to_string())
        } else {
            StepResult::with_dropped(
                report.retained,
                report.rejected,
                format!("{} of {} records passed validation", report.retained, report.input_records),
            )
        };
        for rule in ValidationRule::ALL {
            result = result.with_metadata(&format!("rejected_{}", rule.as_str()), report.count_for(rule));
        }

        ctx.validated = Some(outcome.records);
        Ok(result)
    }

    fn step_name(&self) -> &'static str {
        "validate"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["enrich"]
    }
}
