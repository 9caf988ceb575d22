use std::io::{Cursor, Write};

use anyhow::Result;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use ans_expenses::domain::QuarterKey;
use ans_expenses::pipeline::processing::normalize::{DiscardReason, ExpenseNormalizer, SourceFormat};

const TARGET: &str = "Despesas com Eventos / Sinistros";

enum Cell<'a> {
    Text(&'a str),
    Number(f64),
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Balancete" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

fn sheet_xml(rows: &[Vec<Cell>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_letter(c), r + 1);
            match cell {
                Cell::Text(text) => xml.push_str(&format!(
                    r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference, text
                )),
                Cell::Number(n) => xml.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n)),
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Minimal single-sheet `.xlsx` package
fn workbook(rows: &[Vec<Cell>]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let sheet = sheet_xml(rows);
    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", ROOT_RELS),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/worksheets/sheet1.xml", sheet.as_str()),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

fn header() -> Vec<Cell<'static>> {
    vec![
        Cell::Text("DATA"),
        Cell::Text("REG_ANS"),
        Cell::Text("DESCRICAO"),
        Cell::Text("VL_SALDO_FINAL"),
    ]
}

fn period() -> QuarterKey {
    QuarterKey::new(2024, 4).unwrap()
}

#[test]
fn test_workbook_rows_are_normalized() -> Result<()> {
    let bytes = workbook(&[
        header(),
        vec![
            Cell::Text("2024-10-01"),
            Cell::Number(419761.0),
            Cell::Text(TARGET),
            Cell::Number(1234.56),
        ],
        vec![
            Cell::Text("2024-10-01"),
            Cell::Text("326305"),
            Cell::Text("Contraprestações Efetivas"),
            Cell::Text("2.000,50"),
        ],
        vec![
            Cell::Text("2024-10-01"),
            Cell::Number(5711.0),
            Cell::Text(TARGET),
            Cell::Text("n/d"),
        ],
    ])?;

    let outcome = ExpenseNormalizer::new().normalize(&bytes, SourceFormat::Spreadsheet, period());

    assert!(outcome.discarded.is_none(), "{:?}", outcome.discarded);
    assert_eq!(outcome.rows_read, 3);
    assert_eq!(outcome.rows_skipped, 1);
    assert_eq!(outcome.records.len(), 2);

    let first = &outcome.records[0];
    assert_eq!(first.operator_registry_id, "419761");
    assert!((first.expense_value - 1234.56).abs() < 1e-9);
    assert_eq!((first.year, first.quarter), (2024, 4));

    // Qualified at file level, so the non-target row is kept too
    assert_eq!(outcome.records[1].operator_registry_id, "326305");
    assert_eq!(outcome.records[1].expense_value, 2000.5);
    Ok(())
}

#[test]
fn test_workbook_without_target_category_is_discarded() -> Result<()> {
    let bytes = workbook(&[
        header(),
        vec![
            Cell::Text("2024-10-01"),
            Cell::Number(419761.0),
            Cell::Text("Outras Receitas"),
            Cell::Number(10.0),
        ],
    ])?;

    let outcome = ExpenseNormalizer::new().normalize(&bytes, SourceFormat::Spreadsheet, period());

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.discarded, Some(DiscardReason::NoTargetCategory));
    Ok(())
}

#[test]
fn test_workbook_missing_value_column_is_discarded() -> Result<()> {
    let bytes = workbook(&[
        vec![Cell::Text("REG_ANS"), Cell::Text("DESCRICAO")],
        vec![Cell::Number(419761.0), Cell::Text(TARGET)],
    ])?;

    let outcome = ExpenseNormalizer::new().normalize(&bytes, SourceFormat::Spreadsheet, period());

    assert_eq!(
        outcome.discarded,
        Some(DiscardReason::MissingColumns(vec!["VL_SALDO_FINAL".to_string()]))
    );
    Ok(())
}
