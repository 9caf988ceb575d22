use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use statrs::statistics::Statistics;

use crate::constants::AGGREGATED_HEADER;
use crate::error::Result;
use crate::pipeline::processing::enrich::EnrichedRecord;
use crate::pipeline::processing::tabular::{format_amount, write_delimited};

/// One row of the final artifact, per `(legal_name, region)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub tax_id: String,
    pub legal_name: String,
    pub quarter: u8,
    pub year: i32,
    pub total_expense: f64,
    pub mean_expense: f64,
    /// Sample standard deviation; undefined for single-member groups
    pub std_dev_expense: Option<f64>,
    pub registry_id: String,
    pub modality: String,
    pub region: String,
    pub member_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AggregationOutcome {
    pub rows: Vec<AggregateRow>,
    pub input_records: usize,
}

struct Group<'a> {
    first: &'a EnrichedRecord,
    values: Vec<f64>,
}

/// Group validated records by `(legal_name, region)` and sort by total
/// expense descending. Representative fields come from each group's first
/// member in input order.
pub fn aggregate(records: &[EnrichedRecord]) -> AggregationOutcome {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();

    for record in records {
        let key = (record.record.legal_name.as_str(), record.region.as_str());
        match index.get(&key) {
            Some(&slot) => groups[slot].values.push(record.record.expense_value),
            None => {
                index.insert(key, groups.len());
                groups.push(Group {
                    first: record,
                    values: vec![record.record.expense_value],
                });
            }
        }
    }

    let mut rows: Vec<AggregateRow> = groups.into_iter().map(summarize).collect();
    rows.sort_by(|a, b| {
        b.total_expense
            .partial_cmp(&a.total_expense)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.legal_name.cmp(&b.legal_name))
            .then_with(|| a.region.cmp(&b.region))
    });

    AggregationOutcome {
        rows,
        input_records: records.len(),
    }
}

fn summarize(group: Group<'_>) -> AggregateRow {
    let first = group.first;
    let total: f64 = group.values.iter().sum();
    let std_dev = if group.values.len() > 1 {
        Some(group.values.iter().std_dev())
    } else {
        None
    };

    AggregateRow {
        tax_id: first.record.tax_id.clone(),
        legal_name: first.record.legal_name.clone(),
        quarter: first.record.quarter,
        year: first.record.year,
        total_expense: total,
        mean_expense: group.values.iter().mean(),
        std_dev_expense: std_dev,
        registry_id: first.record.operator_registry_id.clone(),
        modality: first.modality.clone(),
        region: first.region.clone(),
        member_count: group.values.len(),
    }
}

/// Render the aggregated artifact; an undefined std-dev is an empty cell.
pub fn render_aggregated_csv(rows: &[AggregateRow]) -> Result<Vec<u8>> {
    let lines = rows.iter().map(|row| {
        vec![
            row.tax_id.clone(),
            row.legal_name.clone(),
            row.quarter.to_string(),
            row.year.to_string(),
            format_amount(row.total_expense),
            format_amount(row.mean_expense),
            row.std_dev_expense.map(format_amount).unwrap_or_default(),
            row.registry_id.clone(),
            row.modality.clone(),
            row.region.clone(),
        ]
    });
    write_delimited(&AGGREGATED_HEADER, lines)
}
