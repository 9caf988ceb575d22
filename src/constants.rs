/// Column and artifact name constants shared by the pipeline stages.
///
/// Source extracts and the operator registry are published by the regulator
/// with Portuguese column names; the output artifacts keep the same convention.

// Source extract columns (matched verbatim)
pub const CATEGORY_COLUMN: &str = "DESCRICAO";
pub const REGISTRY_ID_COLUMN: &str = "REG_ANS";
pub const FINAL_BALANCE_COLUMN: &str = "VL_SALDO_FINAL";

/// Category label that qualifies a whole source file for processing
pub const TARGET_CATEGORY: &str = "Despesas com Eventos / Sinistros";

// Registry columns (lower-cased before matching, first alias present wins)
pub const REGISTRY_ID_ALIASES: &[&str] = &["registro_operadora", "registro_ans", "reg_ans"];
pub const TAX_ID_ALIASES: &[&str] = &["cnpj"];
pub const LEGAL_NAME_ALIASES: &[&str] = &["razao_social"];
pub const MODALITY_ALIASES: &[&str] = &["modalidade"];
pub const REGION_ALIASES: &[&str] = &["uf"];

pub const FIELD_DELIMITER: u8 = b';';

// Output artifacts
pub const CONSOLIDATED_CSV: &str = "consolidado_despesas.csv";
pub const CONSOLIDATED_ARCHIVE: &str = "consolidado_despesas.zip";
pub const AGGREGATED_CSV: &str = "despesas_agregadas.csv";
pub const AGGREGATED_ARCHIVE: &str = "despesas_agregadas.zip";
pub const RUN_REPORT_FILE: &str = "run_report.json";
pub const METRICS_SNAPSHOT_FILE: &str = "metrics.prom";

pub const CONSOLIDATED_HEADER: [&str; 6] =
    ["CNPJ", "RazaoSocial", "REG_ANS", "Trimestre", "Ano", "ValorDespesas"];

pub const AGGREGATED_HEADER: [&str; 10] = [
    "CNPJ",
    "RazaoSocial",
    "Trimestre",
    "Ano",
    "ValorDespesas",
    "MediaTrimestral",
    "DesvPadrao",
    "RegistroANS",
    "Modalidade",
    "UF",
];

/// Source file extensions handled by discovery (lower-case)
pub const DELIMITED_EXTENSIONS: &[&str] = &["csv", "txt"];
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls", "ods"];
