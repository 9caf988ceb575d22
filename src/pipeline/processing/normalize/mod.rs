use serde::Serialize;
use tracing::{debug, warn};

use crate::constants::{CATEGORY_COLUMN, FINAL_BALANCE_COLUMN, REGISTRY_ID_COLUMN, TARGET_CATEGORY};
use crate::domain::{ExpenseRecord, QuarterKey};

pub mod readers;

pub use readers::{read_table, RawTable, SourceFormat};

/// Why a whole source file produced no records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DiscardReason {
    /// The bytes could not be read as delimited text or spreadsheet
    Unreadable(String),
    /// One or more required columns are absent
    MissingColumns(Vec<String>),
    /// No row carries the qualifying category
    NoTargetCategory,
}

impl DiscardReason {
    pub fn label(&self) -> &'static str {
        match self {
            DiscardReason::Unreadable(_) => "unreadable",
            DiscardReason::MissingColumns(_) => "missing_columns",
            DiscardReason::NoTargetCategory => "no_target_category",
        }
    }
}

/// Result of normalizing one source file
#[derive(Debug, Clone, Default)]
pub struct NormalizationOutcome {
    pub records: Vec<ExpenseRecord>,
    pub rows_read: usize,
    /// Rows dropped individually because the value did not parse
    pub rows_skipped: usize,
    pub discarded: Option<DiscardReason>,
}

impl NormalizationOutcome {
    fn discarded(reason: DiscardReason, rows_read: usize) -> Self {
        Self {
            records: Vec::new(),
            rows_read,
            rows_skipped: 0,
            discarded: Some(reason),
        }
    }
}

/// Trait for turning a raw source table into canonical expense records
pub trait Normalizer {
    fn normalize_table(&self, table: &RawTable, period: QuarterKey) -> NormalizationOutcome;
}

/// Normalizer for the regulator's accounting extracts.
///
/// Qualification is decided per file: when any row carries the target
/// category every row of the file is emitted, otherwise the file yields
/// nothing. A file lacking a required column is discarded outright.
#[derive(Debug, Clone)]
pub struct ExpenseNormalizer {
    pub target_category: String,
}

impl Default for ExpenseNormalizer {
    fn default() -> Self {
        Self {
            target_category: TARGET_CATEGORY.to_string(),
        }
    }
}

impl ExpenseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and normalize one file. Never fails: unreadable input is logged
    /// and reported through `discarded`.
    pub fn normalize(&self, content: &[u8], format: SourceFormat, period: QuarterKey) -> NormalizationOutcome {
        let table = match read_table(content, format) {
            Ok(table) => table,
            Err(e) => {
                warn!("Unreadable source for {} ({:?}): {}", period, format, e);
                return NormalizationOutcome::discarded(DiscardReason::Unreadable(e.to_string()), 0);
            }
        };

        let outcome = self.normalize_table(&table, period);
        match &outcome.discarded {
            Some(DiscardReason::MissingColumns(missing)) => {
                warn!("Source for {} discarded, missing columns: {}", period, missing.join(", "));
            }
            Some(DiscardReason::NoTargetCategory) => {
                debug!("Source for {} has no '{}' rows, discarded", period, self.target_category);
            }
            _ => {}
        }
        outcome
    }
}

impl Normalizer for ExpenseNormalizer {
    fn normalize_table(&self, table: &RawTable, period: QuarterKey) -> NormalizationOutcome {
        let rows_read = table.len();

        let (Some(category_idx), Some(registry_idx), Some(value_idx)) = (
            table.column_index(CATEGORY_COLUMN),
            table.column_index(REGISTRY_ID_COLUMN),
            table.column_index(FINAL_BALANCE_COLUMN),
        ) else {
            let missing = [CATEGORY_COLUMN, REGISTRY_ID_COLUMN, FINAL_BALANCE_COLUMN]
                .iter()
                .filter(|c| table.column_index(c).is_none())
                .map(|c| c.to_string())
                .collect();
            return NormalizationOutcome::discarded(DiscardReason::MissingColumns(missing), rows_read);
        };

        let qualifies = table
            .rows()
            .any(|row| RawTable::cell(row, category_idx) == self.target_category);
        if !qualifies {
            return NormalizationOutcome::discarded(DiscardReason::NoTargetCategory, rows_read);
        }

        let mut records = Vec::with_capacity(rows_read);
        let mut rows_skipped = 0;
        for row in table.rows() {
            let Some(expense_value) = parse_locale_decimal(RawTable::cell(row, value_idx)) else {
                rows_skipped += 1;
                continue;
            };

            records.push(ExpenseRecord {
                operator_registry_id: RawTable::cell(row, registry_idx).trim().to_string(),
                year: period.year,
                quarter: period.quarter,
                expense_value,
                legal_name: String::new(),
                tax_id: String::new(),
            });
        }

        NormalizationOutcome {
            records,
            rows_read,
            rows_skipped,
            discarded: None,
        }
    }
}

/// Parse a Brazilian-formatted amount: `.` groups thousands, `,` marks decimals.
///
/// Returns `None` for anything that does not yield a finite number.
pub fn parse_locale_decimal(raw: &str) -> Option<f64> {
    let canonical = raw.replace('.', "").replace(',', ".");
    canonical
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
