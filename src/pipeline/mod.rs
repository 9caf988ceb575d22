// Expense pipeline: source discovery, processing stages, steps and orchestration

pub mod ingestion;
pub mod orchestrator;
pub mod pipeline_config;
pub mod processing;
pub mod steps;

pub use orchestrator::{PipelineExecutionResult, PipelineOrchestrator, RunOutcome};
pub use pipeline_config::{PipelineConfig, PipelineStepConfig};
