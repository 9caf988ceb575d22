use crate::constants::FIELD_DELIMITER;
use crate::error::Result;

/// Serialize rows as `;`-delimited text with a header line.
pub fn write_delimited<I, R>(header: &[&str], rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .from_writer(Vec::new());

    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row.into_iter().collect::<Vec<_>>())?;
    }

    writer
        .into_inner()
        .map_err(|e| crate::error::PipelineError::Io(e.into_error()))
}

/// Output amounts always use `.` as decimal point, shortest round-trip form.
pub fn format_amount(value: f64) -> String {
    value.to_string()
}
