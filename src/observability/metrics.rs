//! Metrics for the expense pipeline
//!
//! Stage code records through the small per-stage modules below; names live
//! in [`MetricName`] so nothing spells a metric string twice.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Every metric the pipeline emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Run
    RunsCompleted,
    RunsNothingToProcess,
    StepDuration,

    // Normalize
    NormalizeFilesRead,
    NormalizeFilesDiscarded,
    NormalizeRecordsEmitted,
    NormalizeRowsSkipped,

    // Consolidate
    ConsolidateRecords,
    ConsolidateZeroValued,
    ConsolidateNegativeValued,
    ConsolidateMultiQuarterOperators,
    ConsolidateEmptyTaxId,
    ConsolidateArtifactReused,

    // Enrich
    EnrichRecordsMatched,
    EnrichRecordsDropped,
    EnrichSkipped,

    // Validate
    ValidateRecordsRejected,
    ValidateRecordsRetained,

    // Aggregate
    AggregateGroups,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsCompleted => "ans_runs_completed_total",
            MetricName::RunsNothingToProcess => "ans_runs_nothing_to_process_total",
            MetricName::StepDuration => "ans_step_duration_seconds",

            MetricName::NormalizeFilesRead => "ans_normalize_files_read_total",
            MetricName::NormalizeFilesDiscarded => "ans_normalize_files_discarded_total",
            MetricName::NormalizeRecordsEmitted => "ans_normalize_records_emitted_total",
            MetricName::NormalizeRowsSkipped => "ans_normalize_rows_skipped_total",

            MetricName::ConsolidateRecords => "ans_consolidate_records",
            MetricName::ConsolidateZeroValued => "ans_consolidate_zero_valued",
            MetricName::ConsolidateNegativeValued => "ans_consolidate_negative_valued",
            MetricName::ConsolidateMultiQuarterOperators => "ans_consolidate_multi_quarter_operators",
            MetricName::ConsolidateEmptyTaxId => "ans_consolidate_empty_tax_id",
            MetricName::ConsolidateArtifactReused => "ans_consolidate_artifact_reused_total",

            MetricName::EnrichRecordsMatched => "ans_enrich_records_matched_total",
            MetricName::EnrichRecordsDropped => "ans_enrich_records_dropped_total",
            MetricName::EnrichSkipped => "ans_enrich_skipped_total",

            MetricName::ValidateRecordsRejected => "ans_validate_records_rejected_total",
            MetricName::ValidateRecordsRetained => "ans_validate_records_retained_total",

            MetricName::AggregateGroups => "ans_aggregate_groups",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RunsCompleted,
            RunsNothingToProcess,
            StepDuration,
            NormalizeFilesRead,
            NormalizeFilesDiscarded,
            NormalizeRecordsEmitted,
            NormalizeRowsSkipped,
            ConsolidateRecords,
            ConsolidateZeroValued,
            ConsolidateNegativeValued,
            ConsolidateMultiQuarterOperators,
            ConsolidateEmptyTaxId,
            ConsolidateArtifactReused,
            EnrichRecordsMatched,
            EnrichRecordsDropped,
            EnrichSkipped,
            ValidateRecordsRejected,
            ValidateRecordsRetained,
            AggregateGroups,
        ]
        .into_iter()
    }

    /// (stage, description, unit)
    pub fn metadata(&self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            MetricName::RunsCompleted => ("run", "Pipeline runs that produced an aggregate", None),
            MetricName::RunsNothingToProcess => ("run", "Pipeline runs that found no qualifying data", None),
            MetricName::StepDuration => ("run", "Wall time per pipeline step", Some("seconds")),

            MetricName::NormalizeFilesRead => ("normalize", "Source files read", None),
            MetricName::NormalizeFilesDiscarded => ("normalize", "Source files discarded, by reason", None),
            MetricName::NormalizeRecordsEmitted => ("normalize", "Expense records emitted", None),
            MetricName::NormalizeRowsSkipped => ("normalize", "Rows skipped for an unparseable value", None),

            MetricName::ConsolidateRecords => ("consolidate", "Records in the consolidated dataset", None),
            MetricName::ConsolidateZeroValued => ("consolidate", "Consolidated records with a zero expense", None),
            MetricName::ConsolidateNegativeValued => ("consolidate", "Consolidated records with a negative expense", None),
            MetricName::ConsolidateMultiQuarterOperators => ("consolidate", "Operators reporting in several quarters", None),
            MetricName::ConsolidateEmptyTaxId => ("consolidate", "Consolidated records without a tax id", None),
            MetricName::ConsolidateArtifactReused => ("consolidate", "Runs that reused an existing consolidated archive", None),

            MetricName::EnrichRecordsMatched => ("enrich", "Records matched in the operator registry", None),
            MetricName::EnrichRecordsDropped => ("enrich", "Records with no registry match", None),
            MetricName::EnrichSkipped => ("enrich", "Runs where the registry had no id column", None),

            MetricName::ValidateRecordsRejected => ("validate", "Rule failures, by rule", None),
            MetricName::ValidateRecordsRetained => ("validate", "Records passing every rule", None),

            MetricName::AggregateGroups => ("aggregate", "Rows in the aggregated artifact", None),
        }
    }
}

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;

    for metric in MetricName::all_metrics() {
        let (_, description, _) = metric.metadata();
        let name = metric.as_str();
        if name.ends_with("_total") {
            ::metrics::describe_counter!(name, description);
        } else if name.ends_with("_seconds") {
            ::metrics::describe_histogram!(name, description);
        } else {
            ::metrics::describe_gauge!(name, description);
        }
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        warn!("Prometheus recorder handle was already set");
    }
    info!("Metrics recorder installed");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub mod run {
    use super::MetricName;

    pub fn completed() {
        ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
    }

    pub fn nothing_to_process(stage: &str) {
        ::metrics::counter!(MetricName::RunsNothingToProcess.as_str(), "stage" => stage.to_string())
            .increment(1);
    }

    pub fn step_duration(step: &str, secs: f64) {
        ::metrics::histogram!(MetricName::StepDuration.as_str(), "step" => step.to_string()).record(secs);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn file_read() {
        ::metrics::counter!(MetricName::NormalizeFilesRead.as_str()).increment(1);
    }

    pub fn file_discarded(reason: &str) {
        ::metrics::counter!(MetricName::NormalizeFilesDiscarded.as_str(), "reason" => reason.to_string())
            .increment(1);
    }

    pub fn records_emitted(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRecordsEmitted.as_str()).increment(count as u64);
    }

    pub fn rows_skipped(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsSkipped.as_str()).increment(count as u64);
    }
}

pub mod consolidate {
    use super::MetricName;
    use crate::pipeline::processing::consolidate::ConsolidationReport;

    pub fn report(report: &ConsolidationReport) {
        ::metrics::gauge!(MetricName::ConsolidateRecords.as_str()).set(report.total_records as f64);
        ::metrics::gauge!(MetricName::ConsolidateZeroValued.as_str()).set(report.zero_valued as f64);
        ::metrics::gauge!(MetricName::ConsolidateNegativeValued.as_str()).set(report.negative_valued as f64);
        ::metrics::gauge!(MetricName::ConsolidateMultiQuarterOperators.as_str())
            .set(report.multi_quarter_operators as f64);
        ::metrics::gauge!(MetricName::ConsolidateEmptyTaxId.as_str()).set(report.empty_tax_id as f64);
    }

    pub fn artifact_reused() {
        ::metrics::counter!(MetricName::ConsolidateArtifactReused.as_str()).increment(1);
    }
}

pub mod enrich {
    use super::MetricName;

    pub fn matched(count: usize) {
        ::metrics::counter!(MetricName::EnrichRecordsMatched.as_str()).increment(count as u64);
    }

    pub fn dropped(count: usize) {
        ::metrics::counter!(MetricName::EnrichRecordsDropped.as_str()).increment(count as u64);
    }

    pub fn skipped() {
        ::metrics::counter!(MetricName::EnrichSkipped.as_str()).increment(1);
    }
}

pub mod validate {
    use super::MetricName;

    pub fn rejected(rule: &str, count: usize) {
        ::metrics::counter!(MetricName::ValidateRecordsRejected.as_str(), "rule" => rule.to_string())
            .increment(count as u64);
    }

    pub fn retained(count: usize) {
        ::metrics::counter!(MetricName::ValidateRecordsRetained.as_str()).increment(count as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn groups(count: usize) {
        ::metrics::gauge!(MetricName::AggregateGroups.as_str()).set(count as f64);
    }
}
