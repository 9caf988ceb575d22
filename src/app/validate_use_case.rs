use tracing::{info, warn};

use crate::observability::metrics;
use crate::pipeline::processing::enrich::EnrichedRecord;
use crate::pipeline::processing::quality_gate::{DefaultQualityGate, ValidationOutcome, ValidationRule};

/// Use case for filtering enriched records through the validation rules
#[derive(Default)]
pub struct ValidateUseCase {
    quality_gate: DefaultQualityGate,
}

impl ValidateUseCase {
    pub fn new(quality_gate: DefaultQualityGate) -> Self {
        Self { quality_gate }
    }

    pub fn validate(&self, records: &[EnrichedRecord]) -> ValidationOutcome {
        let outcome = self.quality_gate.validate(records);
        let report = &outcome.report;

        for rule in ValidationRule::ALL {
            let count = report.count_for(rule);
            if count > 0 {
                warn!("{} records failed {}", count, rule.as_str());
            }
            metrics::validate::rejected(rule.as_str(), count);
        }
        metrics::validate::retained(report.retained);

        info!(
            "Validation retained {} of {} records ({} rejected)",
            report.retained, report.input_records, report.rejected
        );
        outcome
    }
}
