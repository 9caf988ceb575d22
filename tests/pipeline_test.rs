use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;

use ans_expenses::app::consolidate_use_case::{ConsolidateUseCase, ConsolidationResult};
use ans_expenses::domain::ExpenseRecord;
use ans_expenses::infra::{FileRegistrySource, FsArtifactStore, FsSourceFiles};
use ans_expenses::pipeline::ingestion::QuarterSelection;
use ans_expenses::pipeline::{PipelineConfig, PipelineOrchestrator, RunOutcome};

const HEADER: &str = "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_INICIAL;VL_SALDO_FINAL\n";
const TARGET: &str = "Despesas com Eventos / Sinistros";

fn extract_line(operator: &str, value: &str) -> String {
    format!("2025-01-01;{};411;{};0;{}\n", operator, TARGET, value)
}

fn write_extract(root: &Path, quarter: &str, file: &str, lines: &[String]) {
    let dir = root.join("extracted").join(quarter);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), format!("{}{}", HEADER, lines.concat())).unwrap();
}

fn write_registry(root: &Path) {
    let mut bytes = b"Registro_Operadora;CNPJ;Razao_Social;Modalidade;UF\n".to_vec();
    bytes.extend_from_slice(b"\"100\";\"11444777000161\";\"ALFA SAUDE\";\"Medicina de Grupo\";\"SP\"\n");
    bytes.extend_from_slice(b"200;11444777000162;BRAVO PLANOS;Cooperativa;RJ\n");
    // Latin-1 encoded, as the regulator publishes it
    bytes.extend_from_slice(b"300;11222333000181;CHARLIE;Autogest\xe3o;MG\n");
    fs::write(root.join("registry.csv"), bytes).unwrap();
}

fn three_quarter_tree(root: &Path) {
    write_extract(
        root,
        "2025_1T",
        "1T2025.csv",
        &[extract_line("100", "1.000,00"), extract_line("200", "500,00")],
    );
    write_extract(root, "2025_2T", "2T2025.csv", &[extract_line("100", "3.000,00")]);
    fs::write(
        root.join("extracted/2025_2T/balancete.csv"),
        "REG_ANS;DESCRICAO;VL_SALDO_FINAL\n100;Outras receitas;9,99\n",
    )
    .unwrap();
    write_extract(
        root,
        "2025_3T",
        "3T2025.txt",
        &[extract_line("300", "250,50"), extract_line("999", "10,00")],
    );
    write_registry(root);
}

fn orchestrator(root: &Path) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        Arc::new(FsSourceFiles::new(root.join("extracted"))),
        Arc::new(FileRegistrySource::new(root.join("registry.csv"))),
        Arc::new(FsArtifactStore::new(root.join("out"))),
    )
}

#[tokio::test]
async fn test_three_quarters_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    three_quarter_tree(dir.path());

    let result = orchestrator(dir.path())
        .run_pipeline(&PipelineConfig::default_full_pipeline(), QuarterSelection::Latest(3))
        .await?;

    assert_eq!(result.outcome(), &RunOutcome::Completed);
    assert_eq!(result.report.steps.len(), 5);

    let consolidated = result.context.consolidated.as_ref().unwrap();
    assert_eq!(consolidated.records.len(), 5);
    for entry in &consolidated.records {
        let expected = entry.record.operator_registry_id == "100";
        assert_eq!(entry.multi_quarter_operator, expected, "{:?}", entry.record);
    }

    let rows = &result.context.aggregated.as_ref().unwrap().rows;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].legal_name, "ALFA SAUDE");
    assert_eq!(rows[0].total_expense, 4000.0);
    assert_eq!(rows[0].mean_expense, 2000.0);
    assert_eq!(rows[0].quarter, 1);
    assert_eq!(rows[1].legal_name, "CHARLIE");
    assert_eq!(rows[1].modality, "Autogestão");
    assert_eq!(rows[1].std_dev_expense, None);
    assert!(rows.iter().all(|r| r.registry_id != "200"));

    let out = dir.path().join("out");
    let aggregated = fs::read_to_string(out.join("despesas_agregadas.csv"))?;
    assert!(aggregated.starts_with(
        "CNPJ;RazaoSocial;Trimestre;Ano;ValorDespesas;MediaTrimestral;DesvPadrao;RegistroANS;Modalidade;UF\n"
    ));
    assert!(!aggregated.contains("BRAVO"));
    assert!(aggregated.contains("11222333000181;CHARLIE;3;2025;250.5;250.5;;300;Autogestão;MG\n"));
    assert!(out.join("despesas_agregadas.zip").is_file());
    assert!(out.join("consolidado_despesas.zip").is_file());

    let report: serde_json::Value = serde_json::from_slice(&fs::read(out.join("run_report.json"))?)?;
    assert_eq!(report["outcome"]["status"], "completed");
    assert_eq!(report["artifacts"].as_array().map(Vec::len), Some(4));
    assert_eq!(report["steps"][2]["dropped_count"], 1);
    Ok(())
}

#[tokio::test]
async fn test_consolidation_is_idempotent_by_presence() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(FsArtifactStore::new(dir.path().join("out")));
    let use_case = ConsolidateUseCase::new(store);

    let record = |operator: &str, quarter: u8, value: f64| ExpenseRecord {
        operator_registry_id: operator.to_string(),
        year: 2025,
        quarter,
        expense_value: value,
        legal_name: String::new(),
        tax_id: String::new(),
    };

    let first = use_case.consolidate(&[record("1", 1, 10.0), record("1", 2, 0.0)]).await?;
    assert!(matches!(first, ConsolidationResult::Written { .. }));
    let path = first.path().unwrap().to_path_buf();
    let content = fs::read(&path)?;
    let modified = fs::metadata(&path)?.modified()?;

    let second = use_case.consolidate(&[record("9", 4, 99.0)]).await?;
    assert!(second.reused());
    assert_eq!(second.path(), Some(path.as_path()));
    assert_eq!(fs::read(&path)?, content);
    assert_eq!(fs::metadata(&path)?.modified()?, modified);

    // The reloaded dataset is the persisted one, with flags recomputed
    let dataset = second.dataset().unwrap();
    assert_eq!(dataset.records.len(), 2);
    assert!(dataset.records.iter().all(|r| r.multi_quarter_operator));
    assert_eq!(dataset.report.zero_valued, 1);

    // Even with no input the existing archive wins
    assert!(use_case.consolidate(&[]).await?.reused());
    Ok(())
}

#[tokio::test]
async fn test_rerun_reuses_consolidated_until_forced() -> Result<()> {
    let dir = tempdir()?;
    three_quarter_tree(dir.path());
    let orchestrator = orchestrator(dir.path());
    let config = PipelineConfig::default_full_pipeline();

    orchestrator.run_pipeline(&config, QuarterSelection::Latest(3)).await?;

    write_extract(dir.path(), "2025_3T", "extra.csv", &[extract_line("300", "100,00")]);
    let rerun = orchestrator.run_pipeline(&config, QuarterSelection::Latest(3)).await?;
    assert_eq!(rerun.report.steps[1].result.metadata["reused_existing"], "true");
    assert_eq!(rerun.context.consolidated.as_ref().unwrap().records.len(), 5);

    orchestrator.clear_consolidated().await?;
    let forced = orchestrator.run_pipeline(&config, QuarterSelection::Latest(3)).await?;
    assert_eq!(forced.report.steps[1].result.metadata["reused_existing"], "false");
    assert_eq!(forced.context.consolidated.as_ref().unwrap().records.len(), 6);
    Ok(())
}

#[tokio::test]
async fn test_rerun_succeeds_when_consolidated_csv_was_removed() -> Result<()> {
    let dir = tempdir()?;
    three_quarter_tree(dir.path());
    let orchestrator = orchestrator(dir.path());
    let config = PipelineConfig::default_full_pipeline();
    let out = dir.path().join("out");

    orchestrator.run_pipeline(&config, QuarterSelection::Latest(3)).await?;
    fs::remove_file(out.join("consolidado_despesas.csv"))?;
    fs::remove_file(out.join("run_report.json"))?;

    let rerun = orchestrator.run_pipeline(&config, QuarterSelection::Latest(3)).await?;

    assert_eq!(rerun.outcome(), &RunOutcome::Completed);
    assert_eq!(rerun.report.steps[1].result.metadata["reused_existing"], "true");
    assert_eq!(rerun.context.aggregated.as_ref().unwrap().rows.len(), 2);
    assert!(!out.join("consolidado_despesas.csv").exists());
    assert!(out.join("run_report.json").is_file());

    let digested: Vec<String> = rerun
        .report
        .artifacts
        .iter()
        .filter_map(|a| a.path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    assert_eq!(
        digested,
        vec!["consolidado_despesas.zip", "despesas_agregadas.csv", "despesas_agregadas.zip"]
    );
    Ok(())
}

#[tokio::test]
async fn test_nothing_to_process_when_no_file_qualifies()-> Result<()> {
    let dir = tempdir()?;
    let quarter = dir.path().join("extracted/2025_1T");
    fs::create_dir_all(&quarter)?;
    fs::write(quarter.join("a.csv"), "REG_ANS;DESCRICAO;VL_SALDO_FINAL\n1;Outras;1,00\n")?;
    fs::write(quarter.join("b.csv"), "REG_ANS;VL_SALDO_FINAL\n1;1,00\n")?;
    write_registry(dir.path());

    let result = orchestrator(dir.path())
        .run_pipeline(&PipelineConfig::default_full_pipeline(), QuarterSelection::Latest(3))
        .await?;

    assert_eq!(
        result.outcome(),
        &RunOutcome::NothingToProcess {
            stage: "consolidate".to_string()
        }
    );
    assert!(!dir.path().join("out/consolidado_despesas.zip").exists());
    assert!(!dir.path().join("out/despesas_agregadas.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_nothing_to_process_when_registry_matches_nothing() -> Result<()> {
    let dir = tempdir()?;
    write_extract(dir.path(), "2025_1T", "a.csv", &[extract_line("555", "10,00")]);
    write_registry(dir.path());

    let result = orchestrator(dir.path())
        .run_pipeline(&PipelineConfig::default_full_pipeline(), QuarterSelection::Latest(3))
        .await?;

    assert_eq!(
        result.outcome(),
        &RunOutcome::NothingToProcess {
            stage: "enrich".to_string()
        }
    );
    // The consolidated artifact is still persisted
    assert!(dir.path().join("out/consolidado_despesas.zip").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_registry_aborts_run() -> Result<()> {
    let dir = tempdir()?;
    write_extract(dir.path(), "2025_1T", "a.csv", &[extract_line("100", "10,00")]);

    let result = orchestrator(dir.path())
        .run_pipeline(&PipelineConfig::default_full_pipeline(), QuarterSelection::Latest(3))
        .await;

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("step 'enrich' failed"));
    Ok(())
}
