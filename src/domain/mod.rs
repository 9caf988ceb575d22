use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(year, quarter)` reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuarterKey {
    pub year: i32,
    pub quarter: u8,
}

impl QuarterKey {
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(Self { year, quarter })
    }

    /// Folder label used by the extraction tree, e.g. `2025_1T`
    pub fn label(&self) -> String {
        format!("{}_{}T", self.year, self.quarter)
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T/{}", self.quarter, self.year)
    }
}

/// Canonical expense line emitted by normalization.
///
/// `tax_id` and `legal_name` are not present in the regulator's extracts and
/// stay empty until the registry join fills them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub operator_registry_id: String,
    pub year: i32,
    pub quarter: u8,
    pub expense_value: f64,
    pub legal_name: String,
    pub tax_id: String,
}

impl ExpenseRecord {
    pub fn period(&self) -> QuarterKey {
        QuarterKey {
            year: self.year,
            quarter: self.quarter,
        }
    }
}

/// One operator from the registry reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRegistryEntry {
    pub registry_id: String,
    pub tax_id: String,
    pub legal_name: String,
    pub modality: String,
    pub region: String,
}
