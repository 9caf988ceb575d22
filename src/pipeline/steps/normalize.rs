use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{PipelineStep, RunContext, StepResult};
use crate::app::normalize_use_case::NormalizeUseCase;

/// Pipeline step for reading every source file of the selected quarters
pub struct NormalizeStep {
    use_case: NormalizeUseCase,
}

impl NormalizeStep {
    pub fn new(use_case: NormalizeUseCase) -> Self {
        Self { use_case }
    }
}

#[async_trait]
impl PipelineStep for NormalizeStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        info!("Running normalize step for {:?}", ctx.selection);
        let summary = self.use_case.normalize_selection(&ctx.selection).await?;

        let quarters: Vec<String> = summary.quarters.iter().map(|q| q.label()).collect();
        let result = StepResult::with_dropped(
            summary.records.len(),
            summary.rows_skipped,
            format!(
                "{} records from {} files ({} discarded)",
                summary.records.len(),
                summary.files_read,
                summary.files_discarded
            ),
        )
        .with_metadata("quarters", quarters.join(","))
        .with_metadata("files_read", summary.files_read)
        .with_metadata("files_discarded", summary.files_discarded);

        ctx.normalized = Some(summary);
        Ok(result)
    }

    fn step_name(&self) -> &'static str {
        "normalize"
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }
}
