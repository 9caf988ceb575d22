use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::app::ports::{SourceFile, SourceFilesPort};
use crate::domain::{ExpenseRecord, QuarterKey};
use crate::observability::metrics;
use crate::pipeline::ingestion::QuarterSelection;
use crate::pipeline::processing::normalize::{DiscardReason, ExpenseNormalizer, NormalizationOutcome, SourceFormat};

/// Everything normalization produced for the selected quarters
#[derive(Debug, Clone, Default)]
pub struct NormalizeSummary {
    pub records: Vec<ExpenseRecord>,
    pub quarters: Vec<QuarterKey>,
    pub files_read: usize,
    pub files_discarded: usize,
    pub rows_skipped: usize,
}

/// Use case for turning every source file of the selected quarters into
/// canonical expense records
pub struct NormalizeUseCase {
    normalizer: ExpenseNormalizer,
    sources: Arc<dyn SourceFilesPort>,
}

impl NormalizeUseCase {
    pub fn new(normalizer: ExpenseNormalizer, sources: Arc<dyn SourceFilesPort>) -> Self {
        Self { normalizer, sources }
    }

    pub fn with_default_normalizer(sources: Arc<dyn SourceFilesPort>) -> Self {
        Self::new(ExpenseNormalizer::new(), sources)
    }

    /// Normalize one file. Read failures are reported as an unreadable
    /// discard rather than an error.
    pub async fn normalize_file(&self, file: &SourceFile) -> NormalizationOutcome {
        let Some(format) = SourceFormat::from_path(&file.path) else {
            return NormalizationOutcome {
                discarded: Some(DiscardReason::Unreadable("unsupported extension".to_string())),
                ..Default::default()
            };
        };

        let outcome = match self.sources.read(file).await {
            Ok(bytes) => self.normalizer.normalize(&bytes, format, file.folder.period),
            Err(e) => {
                warn!("Could not read {}: {:#}", file.path.display(), e);
                NormalizationOutcome {
                    discarded: Some(DiscardReason::Unreadable(e.to_string())),
                    ..Default::default()
                }
            }
        };

        metrics::normalize::file_read();
        match &outcome.discarded {
            Some(reason) => metrics::normalize::file_discarded(reason.label()),
            None => {
                metrics::normalize::records_emitted(outcome.records.len());
                metrics::normalize::rows_skipped(outcome.rows_skipped);
            }
        }
        outcome
    }

    /// Normalize every source file in the selected quarters, in quarter then
    /// path order.
    pub async fn normalize_selection(&self, selection: &QuarterSelection) -> Result<NormalizeSummary> {
        let quarters = self.sources.quarters(selection).await?;
        if quarters.is_empty() {
            warn!("No quarter folders selected for {:?}", selection);
        }

        let mut summary = NormalizeSummary::default();
        for folder in &quarters {
            summary.quarters.push(folder.period);
            let files = self.sources.files(folder).await?;
            let before = summary.records.len();

            for file in &files {
                let outcome = self.normalize_file(file).await;
                summary.files_read += 1;
                summary.rows_skipped += outcome.rows_skipped;
                if outcome.discarded.is_some() {
                    summary.files_discarded += 1;
                }
                summary.records.extend(outcome.records);
            }

            info!(
                "Quarter {}: {} files, {} records",
                folder.period,
                files.len(),
                summary.records.len() - before
            );
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::QuarterFolder;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct InMemorySources {
        folders: Vec<QuarterFolder>,
        files: HashMap<PathBuf, Vec<u8>>,
    }

    #[async_trait]
    impl SourceFilesPort for InMemorySources {
        async fn quarters(&self, _selection: &QuarterSelection) -> Result<Vec<QuarterFolder>> {
            Ok(self.folders.clone())
        }

        async fn files(&self, folder: &QuarterFolder) -> Result<Vec<SourceFile>> {
            let mut paths: Vec<&PathBuf> = self.files.keys().filter(|p| p.starts_with(&folder.path)).collect();
            paths.sort();
            Ok(paths
                .into_iter()
                .map(|p| SourceFile {
                    folder: folder.clone(),
                    path: p.clone(),
                })
                .collect())
        }

        async fn read(&self, file: &SourceFile) -> Result<Vec<u8>> {
            self.files
                .get(&file.path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such file {}", file.path.display()))
        }
    }

    fn folder(year: i32, quarter: u8) -> QuarterFolder {
        QuarterFolder {
            period: QuarterKey::new(year, quarter).unwrap(),
            path: PathBuf::from(format!("{}_{}T", year, quarter)),
        }
    }

    #[tokio::test]
    async fn test_normalize_selection_collects_every_quarter() -> Result<()> {
        let qualifying = "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_INICIAL;VL_SALDO_FINAL\n\
            2025-01-01;100;41;Despesas com Eventos / Sinistros;0;1.234,56\n\
            2025-01-01;200;31;Outras;0;abc\n";
        let other = "REG_ANS;DESCRICAO;VL_SALDO_FINAL\n300;Outras;10,00\n";

        let mut files = HashMap::new();
        files.insert(PathBuf::from("2025_1T/a.csv"), qualifying.as_bytes().to_vec());
        files.insert(PathBuf::from("2025_1T/b.csv"), other.as_bytes().to_vec());
        files.insert(PathBuf::from("2025_2T/a.csv"), qualifying.as_bytes().to_vec());

        let sources = Arc::new(InMemorySources {
            folders: vec![folder(2025, 1), folder(2025, 2)],
            files,
        });
        let use_case = NormalizeUseCase::with_default_normalizer(sources);

        let summary = use_case.normalize_selection(&QuarterSelection::default()).await?;

        assert_eq!(summary.files_read, 3);
        assert_eq!(summary.files_discarded, 1);
        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.records[0].quarter, 1);
        assert_eq!(summary.records[0].expense_value, 1234.56);
        assert_eq!(summary.records[1].quarter, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_file_is_discarded_not_fatal() {
        let sources = Arc::new(InMemorySources {
            folders: vec![folder(2025, 1)],
            files: HashMap::new(),
        });
        let use_case = NormalizeUseCase::with_default_normalizer(sources);

        let outcome = use_case
            .normalize_file(&SourceFile {
                folder: folder(2025, 1),
                path: PathBuf::from("2025_1T/missing.csv"),
            })
            .await;

        assert!(matches!(outcome.discarded, Some(DiscardReason::Unreadable(_))));
        assert!(outcome.records.is_empty());
    }
}
