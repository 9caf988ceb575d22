use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::constants::{
    LEGAL_NAME_ALIASES, MODALITY_ALIASES, REGION_ALIASES, REGISTRY_ID_ALIASES, TAX_ID_ALIASES,
};
use crate::domain::{ExpenseRecord, OperatorRegistryEntry};
use crate::error::Result;
use crate::pipeline::processing::consolidate::ConsolidatedDataset;
use crate::pipeline::processing::normalize::readers::{read_delimited, RawTable};

/// An expense record joined with its operator's registry identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub record: ExpenseRecord,
    pub modality: String,
    pub region: String,
}

/// Operator registry keyed by registry id, first occurrence wins
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    entries: HashMap<String, OperatorRegistryEntry>,
    /// Whether the source carried a registry-id column at all
    has_registry_id: bool,
    rows_read: usize,
}

impl OperatorRegistry {
    pub fn from_entries(entries: impl IntoIterator<Item = OperatorRegistryEntry>) -> Self {
        let mut registry = Self {
            has_registry_id: true,
            ..Default::default()
        };
        for entry in entries {
            registry.rows_read += 1;
            registry.entries.entry(entry.registry_id.clone()).or_insert(entry);
        }
        registry
    }

    /// Parse the registry reference file. Column names are matched
    /// case-insensitively and quote characters wrapped around values are
    /// stripped.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let table = read_delimited(bytes)?.map_headers(|h| strip_quotes(h).trim().to_lowercase());

        let Some(registry_idx) = table.column_index_any(REGISTRY_ID_ALIASES) else {
            return Ok(Self {
                rows_read: table.len(),
                ..Default::default()
            });
        };
        let tax_idx = table.column_index_any(TAX_ID_ALIASES);
        let name_idx = table.column_index_any(LEGAL_NAME_ALIASES);
        let modality_idx = table.column_index_any(MODALITY_ALIASES);
        let region_idx = table.column_index_any(REGION_ALIASES);

        let value = |row: &[String], idx: Option<usize>| {
            idx.map(|i| strip_quotes(RawTable::cell(row, i)).to_string())
                .unwrap_or_default()
        };

        Ok(Self::from_entries(table.rows().map(|row| OperatorRegistryEntry {
            registry_id: value(row, Some(registry_idx)).trim().to_string(),
            tax_id: value(row, tax_idx),
            legal_name: value(row, name_idx),
            modality: value(row, modality_idx),
            region: value(row, region_idx),
        })))
    }

    pub fn get(&self, registry_id: &str) -> Option<&OperatorRegistryEntry> {
        self.entries.get(registry_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_registry_id(&self) -> bool {
        self.has_registry_id
    }

    /// Rows dropped by first-occurrence deduplication
    pub fn duplicate_rows(&self) -> usize {
        self.rows_read.saturating_sub(self.entries.len())
    }
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

/// Result of the registry join
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub records: Vec<EnrichedRecord>,
    /// Consolidated records with no registry match
    pub dropped: usize,
    /// The registry had no registry-id column; records passed through unchanged
    pub skipped: bool,
}

/// Trait for attaching operator identity to consolidated records
pub trait Enricher {
    fn enrich(&self, dataset: &ConsolidatedDataset) -> EnrichmentOutcome;
}

/// Inner join of consolidated records against the operator registry
pub struct RegistryEnricher {
    registry: OperatorRegistry,
}

impl RegistryEnricher {
    pub fn new(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }
}

impl Enricher for RegistryEnricher {
    fn enrich(&self, dataset: &ConsolidatedDataset) -> EnrichmentOutcome {
        if !self.registry.has_registry_id() {
            warn!("Registry has no registry-id column; records are passed through without identity");
            return EnrichmentOutcome {
                records: dataset
                    .expense_records()
                    .map(|record| EnrichedRecord {
                        record: record.clone(),
                        modality: String::new(),
                        region: String::new(),
                    })
                    .collect(),
                dropped: 0,
                skipped: true,
            };
        }

        let mut records = Vec::with_capacity(dataset.records.len());
        let mut dropped = 0;
        for record in dataset.expense_records() {
            let Some(entry) = self.registry.get(record.operator_registry_id.trim()) else {
                dropped += 1;
                continue;
            };

            records.push(EnrichedRecord {
                record: ExpenseRecord {
                    tax_id: entry.tax_id.clone(),
                    legal_name: entry.legal_name.clone(),
                    ..record.clone()
                },
                modality: entry.modality.clone(),
                region: entry.region.clone(),
            });
        }

        if dropped > 0 {
            warn!("{} records discarded with no registry match", dropped);
        }

        EnrichmentOutcome {
            records,
            dropped,
            skipped: false,
        }
    }
}
