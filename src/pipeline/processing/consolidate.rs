use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::constants::CONSOLIDATED_HEADER;
use crate::domain::{ExpenseRecord, QuarterKey};
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::normalize::readers::{read_delimited, RawTable};
use crate::pipeline::processing::tabular::{format_amount, write_delimited};

/// An expense record carrying its consolidation audit flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedRecord {
    pub record: ExpenseRecord,
    /// Expense is zero or negative
    pub suspicious_value: bool,
    /// The operator reports in more than one distinct quarter of the run
    pub multi_quarter_operator: bool,
}

/// Anomaly counts reported by consolidation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub total_records: usize,
    pub zero_valued: usize,
    pub negative_valued: usize,
    /// Distinct operators flagged as multi-quarter
    pub multi_quarter_operators: usize,
    pub empty_tax_id: usize,
    /// Record counts keyed by quarter label (`2025_1T`)
    pub records_per_quarter: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsolidatedDataset {
    pub records: Vec<ConsolidatedRecord>,
    pub report: ConsolidationReport,
}

impl ConsolidatedDataset {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn expense_records(&self) -> impl Iterator<Item = &ExpenseRecord> {
        self.records.iter().map(|r| &r.record)
    }
}

/// Merge every quarter's records into one flagged, deterministically ordered
/// dataset.
pub fn consolidate(records: &[ExpenseRecord]) -> ConsolidatedDataset {
    let mut periods_by_operator: HashMap<&str, HashSet<QuarterKey>> = HashMap::new();
    for record in records {
        periods_by_operator
            .entry(record.operator_registry_id.as_str())
            .or_default()
            .insert(record.period());
    }

    let multi_quarter: HashSet<&str> = periods_by_operator
        .iter()
        .filter(|(_, periods)| periods.len() > 1)
        .map(|(operator, _)| *operator)
        .collect();

    let mut consolidated: Vec<ConsolidatedRecord> = records
        .iter()
        .map(|record| ConsolidatedRecord {
            suspicious_value: record.expense_value <= 0.0,
            multi_quarter_operator: multi_quarter.contains(record.operator_registry_id.as_str()),
            record: record.clone(),
        })
        .collect();

    // Stable, so ties keep the order the files were read in
    consolidated.sort_by(|a, b| {
        (a.record.year, a.record.quarter, &a.record.operator_registry_id).cmp(&(
            b.record.year,
            b.record.quarter,
            &b.record.operator_registry_id,
        ))
    });

    let mut report = ConsolidationReport {
        total_records: consolidated.len(),
        multi_quarter_operators: multi_quarter.len(),
        ..Default::default()
    };
    for entry in &consolidated {
        let value = entry.record.expense_value;
        if value == 0.0 {
            report.zero_valued += 1;
        } else if value < 0.0 {
            report.negative_valued += 1;
        }
        if entry.record.tax_id.is_empty() {
            report.empty_tax_id += 1;
        }
        *report
            .records_per_quarter
            .entry(entry.record.period().label())
            .or_default() += 1;
    }

    ConsolidatedDataset {
        records: consolidated,
        report,
    }
}

/// Render the canonical consolidated artifact. Audit flags are not persisted.
pub fn render_consolidated_csv(dataset: &ConsolidatedDataset) -> Result<Vec<u8>> {
    let rows = dataset.expense_records().map(|r| {
        vec![
            r.tax_id.clone(),
            r.legal_name.clone(),
            r.operator_registry_id.clone(),
            r.quarter.to_string(),
            r.year.to_string(),
            format_amount(r.expense_value),
        ]
    });
    write_delimited(&CONSOLIDATED_HEADER, rows)
}

/// Read a previously persisted consolidated artifact back into records.
pub fn parse_consolidated_csv(bytes: &[u8]) -> Result<Vec<ExpenseRecord>> {
    let table = read_delimited(bytes)?;

    let column = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    };
    let [tax_idx, name_idx, registry_idx, quarter_idx, year_idx, value_idx] = [
        column(CONSOLIDATED_HEADER[0])?,
        column(CONSOLIDATED_HEADER[1])?,
        column(CONSOLIDATED_HEADER[2])?,
        column(CONSOLIDATED_HEADER[3])?,
        column(CONSOLIDATED_HEADER[4])?,
        column(CONSOLIDATED_HEADER[5])?,
    ];

    table
        .rows()
        .map(|row| {
            let parse_err = |field: &str, value: &str| PipelineError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            };
            let quarter_raw = RawTable::cell(row, quarter_idx);
            let year_raw = RawTable::cell(row, year_idx);
            let value_raw = RawTable::cell(row, value_idx);

            Ok(ExpenseRecord {
                operator_registry_id: RawTable::cell(row, registry_idx).to_string(),
                year: year_raw.parse().map_err(|_| parse_err("Ano", year_raw))?,
                quarter: quarter_raw.parse().map_err(|_| parse_err("Trimestre", quarter_raw))?,
                expense_value: value_raw
                    .parse()
                    .map_err(|_| parse_err("ValorDespesas", value_raw))?,
                legal_name: RawTable::cell(row, name_idx).to_string(),
                tax_id: RawTable::cell(row, tax_idx).to_string(),
            })
        })
        .collect()
}
