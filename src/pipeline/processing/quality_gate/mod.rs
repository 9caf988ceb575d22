use serde::Serialize;

use crate::pipeline::processing::enrich::EnrichedRecord;

pub mod cnpj;

pub use cnpj::is_valid_cnpj;

/// Validation rules, in the order they are evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationRule {
    /// Expense must be a finite number strictly greater than zero
    PositiveExpense,
    /// Trimmed legal name must not be empty
    LegalNamePresent,
    /// Tax id must pass the CNPJ checksum
    ValidTaxId,
}

impl ValidationRule {
    pub const ALL: [ValidationRule; 3] = [
        ValidationRule::PositiveExpense,
        ValidationRule::LegalNamePresent,
        ValidationRule::ValidTaxId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationRule::PositiveExpense => "positive_expense",
            ValidationRule::LegalNamePresent => "legal_name_present",
            ValidationRule::ValidTaxId => "valid_tax_id",
        }
    }

    pub fn passes(&self, record: &EnrichedRecord) -> bool {
        match self {
            ValidationRule::PositiveExpense => {
                let value = record.record.expense_value;
                value.is_finite() && value > 0.0
            }
            ValidationRule::LegalNamePresent => !record.record.legal_name.trim().is_empty(),
            ValidationRule::ValidTaxId => is_valid_cnpj(&record.record.tax_id),
        }
    }
}

/// Every rule a single record failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordAssessment {
    pub failed_rules: Vec<ValidationRule>,
}

impl RecordAssessment {
    pub fn accepted(&self) -> bool {
        self.failed_rules.is_empty()
    }
}

/// Per-rule rejection counts. A record failing several rules is counted
/// under each of them, so the counts may sum to more than `rejected`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub input_records: usize,
    pub rejected_non_positive_value: usize,
    pub rejected_empty_legal_name: usize,
    pub rejected_invalid_tax_id: usize,
    pub rejected: usize,
    pub retained: usize,
}

impl ValidationReport {
    pub fn count_for(&self, rule: ValidationRule) -> usize {
        match rule {
            ValidationRule::PositiveExpense => self.rejected_non_positive_value,
            ValidationRule::LegalNamePresent => self.rejected_empty_legal_name,
            ValidationRule::ValidTaxId => self.rejected_invalid_tax_id,
        }
    }

    fn record_failure(&mut self, rule: ValidationRule) {
        match rule {
            ValidationRule::PositiveExpense => self.rejected_non_positive_value += 1,
            ValidationRule::LegalNamePresent => self.rejected_empty_legal_name += 1,
            ValidationRule::ValidTaxId => self.rejected_invalid_tax_id += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub records: Vec<EnrichedRecord>,
    pub report: ValidationReport,
}

/// Trait for the record-level quality checkpoint
pub trait QualityGate {
    fn assess(&self, record: &EnrichedRecord) -> RecordAssessment;
}

/// Applies every [`ValidationRule`]; records are dropped, never repaired.
#[derive(Debug, Clone, Default)]
pub struct DefaultQualityGate;

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, records: &[EnrichedRecord]) -> ValidationOutcome {
        let mut report = ValidationReport {
            input_records: records.len(),
            ..Default::default()
        };
        let mut retained = Vec::with_capacity(records.len());

        for record in records {
            let assessment = self.assess(record);
            for rule in &assessment.failed_rules {
                report.record_failure(*rule);
            }
            if assessment.accepted() {
                retained.push(record.clone());
            } else {
                report.rejected += 1;
            }
        }
        report.retained = retained.len();

        ValidationOutcome {
            records: retained,
            report,
        }
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess(&self, record: &EnrichedRecord) -> RecordAssessment {
        RecordAssessment {
            failed_rules: ValidationRule::ALL
                .iter()
                .copied()
                .filter(|rule| !rule.passes(record))
                .collect(),
        }
    }
}
