use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::app::ports::RegistrySourcePort;
use crate::observability::metrics;
use crate::pipeline::processing::consolidate::ConsolidatedDataset;
use crate::pipeline::processing::enrich::{Enricher, EnrichmentOutcome, OperatorRegistry, RegistryEnricher};

/// Use case for joining the consolidated dataset with the operator registry
pub struct EnrichUseCase {
    registry_source: Arc<dyn RegistrySourcePort>,
}

impl EnrichUseCase {
    pub fn new(registry_source: Arc<dyn RegistrySourcePort>) -> Self {
        Self { registry_source }
    }

    pub async fn load_registry(&self) -> Result<OperatorRegistry> {
        let bytes = self.registry_source.load().await?;
        let registry = OperatorRegistry::parse(&bytes)
            .with_context(|| format!("parsing operator registry {}", self.registry_source.describe()))?;

        info!(
            "Loaded {} operators from {} ({} duplicate rows ignored)",
            registry.len(),
            self.registry_source.describe(),
            registry.duplicate_rows()
        );
        Ok(registry)
    }

    pub async fn enrich(&self, dataset: &ConsolidatedDataset) -> Result<EnrichmentOutcome> {
        let registry = self.load_registry().await?;
        let outcome = RegistryEnricher::new(registry).enrich(dataset);

        if outcome.skipped {
            metrics::enrich::skipped();
        } else {
            metrics::enrich::matched(outcome.records.len());
            metrics::enrich::dropped(outcome.dropped);
        }
        info!(
            "Enrichment kept {} of {} records",
            outcome.records.len(),
            dataset.records.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExpenseRecord;
    use crate::pipeline::processing::consolidate::consolidate;
    use async_trait::async_trait;

    struct StaticRegistry(&'static str);

    #[async_trait]
    impl RegistrySourcePort for StaticRegistry {
        async fn load(&self) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn record(operator: &str) -> ExpenseRecord {
        ExpenseRecord {
            operator_registry_id: operator.to_string(),
            year: 2025,
            quarter: 2,
            expense_value: 1.0,
            legal_name: String::new(),
            tax_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_enrich_drops_unmatched_operator() -> Result<()> {
        let use_case = EnrichUseCase::new(Arc::new(StaticRegistry(
            "registro_operadora;cnpj;razao_social;modalidade;uf\nA;11444777000161;ALFA;Autogestão;SP\n",
        )));
        let dataset = consolidate(&[record("A"), record("B")]);

        let outcome = use_case.enrich(&dataset).await?;

        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].record.legal_name, "ALFA");
        Ok(())
    }
}
