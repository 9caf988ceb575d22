use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for a complete pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub steps: Vec<PipelineStepConfig>,
}

/// Configuration for individual pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStepConfig {
    Normalize,
    Consolidate,
    Enrich,
    Validate,
    Aggregate,
}

impl PipelineConfig {
    /// Normalize through aggregate, the only layout a production run uses
    pub fn default_full_pipeline() -> Self {
        Self {
            name: "expense_pipeline".to_string(),
            description: "Normalize, consolidate, enrich, validate and aggregate operator expenses"
                .to_string(),
            steps: vec![
                PipelineStepConfig::Normalize,
                PipelineStepConfig::Consolidate,
                PipelineStepConfig::Enrich,
                PipelineStepConfig::Validate,
                PipelineStepConfig::Aggregate,
            ],
        }
    }

    /// Stop after the consolidated artifact has been written
    pub fn consolidate_only() -> Self {
        Self {
            name: "consolidate_only".to_string(),
            description: "Normalize the selected quarters and persist the consolidated artifact"
                .to_string(),
            steps: vec![PipelineStepConfig::Normalize, PipelineStepConfig::Consolidate],
        }
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(anyhow::anyhow!("Pipeline must have at least one step"));
        }

        let mut seen_steps = HashSet::new();
        for step in &self.steps {
            let step_name = step.step_name();
            for dep in step.dependencies() {
                if !seen_steps.contains(dep) {
                    return Err(anyhow::anyhow!(
                        "Step '{}' depends on '{}' which does not run before it",
                        step_name,
                        dep
                    ));
                }
            }
            if !seen_steps.insert(step_name) {
                return Err(anyhow::anyhow!("Step '{}' appears more than once", step_name));
            }
        }

        Ok(())
    }
}

impl PipelineStepConfig {
    pub fn step_name(&self) -> &'static str {
        match self {
            PipelineStepConfig::Normalize => "normalize",
            PipelineStepConfig::Consolidate => "consolidate",
            PipelineStepConfig::Enrich => "enrich",
            PipelineStepConfig::Validate => "validate",
            PipelineStepConfig::Aggregate => "aggregate",
        }
    }

    pub fn dependencies(&self) -> Vec<&'static str> {
        match self {
            PipelineStepConfig::Normalize => vec![],
            PipelineStepConfig::Consolidate => vec!["normalize"],
            PipelineStepConfig::Enrich => vec!["consolidate"],
            PipelineStepConfig::Validate => vec!["enrich"],
            PipelineStepConfig::Aggregate => vec!["validate"],
        }
    }
}
