use meter_client::domain::MeterReading;
use time::format_description::well_known::Rfc3339;

/// Rows per export, newest first.
pub const MAX_EXPORT_ROWS: i64 = 10_000;

pub const CSV_HEADERS: [&str; 16] = [
    "Meter ID",
    "Timestamp",
    "V1 (V)",
    "V2 (V)",
    "V3 (V)",
    "I1 (A)",
    "I2 (A)",
    "I3 (A)",
    "PF1",
    "PF2",
    "PF3",
    "KW1",
    "KW2",
    "KW3",
    "KWT",
    "KWH",
];

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timestamp format failed: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("csv output was not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Missing values become empty cells.
fn cell(value: Option<f64>, places: usize) -> String {
    value.map(|v| format!("{v:.places$}")).unwrap_or_default()
}

fn reading_record(r: &MeterReading) -> Result<[String; 16], ExportError> {
    Ok([
        r.meter_id.clone(),
        r.ts.format(&Rfc3339)?,
        cell(r.v1, 2),
        cell(r.v2, 2),
        cell(r.v3, 2),
        cell(r.i1, 2),
        cell(r.i2, 2),
        cell(r.i3, 2),
        cell(r.pf1, 3),
        cell(r.pf2, 3),
        cell(r.pf3, 3),
        cell(r.kw1, 2),
        cell(r.kw2, 2),
        cell(r.kw3, 2),
        cell(r.kwt, 2),
        cell(r.kwh, 2),
    ])
}

/// Render readings as CSV: a fixed header row, then one row per reading in
/// the order given.
pub fn readings_to_csv(readings: &[MeterReading]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for r in readings {
        writer.write_record(reading_record(r)?)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    metrics::counter!("csv_export_rows_total").increment(readings.len() as u64);
    Ok(String::from_utf8(bytes)?)
}
