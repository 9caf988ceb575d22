use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::constants::{DELIMITED_EXTENSIONS, FIELD_DELIMITER, SPREADSHEET_EXTENSIONS};
use crate::error::{PipelineError, Result};

/// Physical layout of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// `;`-separated text, UTF-8 or Latin-1
    Delimited,
    /// Workbook; only the first worksheet is read
    Spreadsheet,
}

impl SourceFormat {
    /// Pick the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Delimited)
        } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Some(SourceFormat::Spreadsheet)
        } else {
            None
        }
    }
}

/// Untyped rows of a source file addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact-name column lookup
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First alias present among the headers
    pub fn column_index_any(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.column_index(alias))
    }

    /// Cell value; short rows read as empty
    pub fn cell<'a>(row: &'a [String], index: usize) -> &'a str {
        row.get(index).map(String::as_str).unwrap_or("")
    }

    /// Rewrite header names in place (used for case-insensitive registries).
    pub fn map_headers<F: Fn(&str) -> String>(mut self, f: F) -> Self {
        self.headers = self.headers.iter().map(|h| f(h)).collect();
        self
    }
}

pub fn read_table(bytes: &[u8], format: SourceFormat) -> Result<RawTable> {
    match format {
        SourceFormat::Delimited => read_delimited(bytes),
        SourceFormat::Spreadsheet => read_spreadsheet(bytes),
    }
}

/// Decode extract bytes: UTF-8 when valid, otherwise Latin-1 byte-for-byte.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub fn read_delimited(bytes: &[u8]) -> Result<RawTable> {
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable::new(headers, rows))
}

pub fn read_spreadsheet(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::InvalidValue {
            field: "workbook".to_string(),
            value: "no worksheets".to_string(),
        })??;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_text).collect(),
        None => return Ok(RawTable::default()),
    };
    let rows = rows.map(|row| row.iter().map(cell_text).collect()).collect();

    Ok(RawTable::new(headers, rows))
}

/// Render a workbook cell the way the text extracts spell values, so one
/// locale parser serves both formats.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string().replace('.', ","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_path(Path::new("a/1T2025.CSV")), Some(SourceFormat::Delimited));
        assert_eq!(SourceFormat::from_path(Path::new("a/b.txt")), Some(SourceFormat::Delimited));
        assert_eq!(SourceFormat::from_path(Path::new("b.xlsx")), Some(SourceFormat::Spreadsheet));
        assert_eq!(SourceFormat::from_path(Path::new("b.pdf")), None);
        assert_eq!(SourceFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_latin1_fallback() {
        // "Saúde" in Latin-1
        let bytes = b"NOME\nSa\xFAde\n";
        let table = read_delimited(bytes).unwrap();
        let row: Vec<&[String]> = table.rows().collect();
        assert_eq!(row[0][0], "Saúde");
    }

    #[test]
    fn test_bom_is_ignored() {
        let bytes = b"\xEF\xBB\xBFREG_ANS;VL_SALDO_FINAL\n123;1,00\n";
        let table = read_delimited(bytes).unwrap();
        assert_eq!(table.column_index("REG_ANS"), Some(0));
    }

    #[test]
    fn test_short_rows_read_as_empty() {
        let table = read_delimited(b"A;B;C\n1;2\n").unwrap();
        let row = table.rows().next().unwrap();
        assert_eq!(RawTable::cell(row, 2), "");
    }

    #[test]
    fn test_garbage_spreadsheet_is_error() {
        assert!(read_spreadsheet(b"definitely not a workbook").is_err());
    }

    #[test]
    fn test_cell_text_uses_locale_convention() {
        assert_eq!(cell_text(&Data::Float(1234.56)), "1234,56");
        assert_eq!(cell_text(&Data::Float(419761.0)), "419761");
        assert_eq!(cell_text(&Data::Int(42)), "42");
        assert_eq!(cell_text(&Data::Empty), "");
    }
}
