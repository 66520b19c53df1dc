//! Data loading for date-indexed tables.
//!
//! The engines consume an in-memory [`Frame`]; this module builds one from a
//! CSV file whose first column is a calendar date and whose remaining columns
//! are named numeric series (macro aggregates, asset closes, precomputed
//! returns). Acquisition from external providers is a caller concern.

use crate::error::{BacktestError, Result};
use crate::frame::Frame;
use chrono::NaiveDate;
use std::path::Path;
use tracing::info;

/// Configuration for CSV data loading.
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Explicit date format (chrono syntax). When unset, common formats are
    /// attempted in order.
    pub date_format: Option<String>,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            delimiter: b',',
        }
    }
}

/// Parse a date string with multiple format attempts.
fn parse_date(s: &str, config: &DataConfig) -> Result<NaiveDate> {
    if let Some(fmt) = &config.date_format {
        return Ok(NaiveDate::parse_from_str(s, fmt)?);
    }

    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(BacktestError::DataError(format!(
        "unparseable date: {}",
        s
    )))
}

fn parse_cell(s: &str, column: &str, date: NaiveDate) -> Result<Option<f64>> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed.eq_ignore_ascii_case("na")
    {
        return Ok(None);
    }
    trimmed.parse::<f64>().map(Some).map_err(|_| {
        BacktestError::DataError(format!(
            "invalid numeric value {:?} in column {} at {}",
            trimmed, column, date
        ))
    })
}

/// Load a date-indexed table from a CSV file.
///
/// The first column is the date index; every other header names a numeric
/// column. Empty and `NaN`/`NA` cells become missing values. Rows are sorted
/// by date; duplicate dates are rejected.
pub fn load_csv(path: impl AsRef<Path>, config: &DataConfig) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(BacktestError::DataError(
            "CSV needs a date column and at least one value column".to_string(),
        ));
    }
    let columns: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date_field = record.get(0).unwrap_or_default();
        let date = parse_date(date_field, config)?;

        let mut row = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let cell = record.get(i + 1).unwrap_or_default();
            row.push(parse_cell(cell, column, date)?);
        }
        rows.push((date, row));
    }

    rows.sort_by_key(|(date, _)| *date);
    for pair in rows.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(BacktestError::InvalidIndex(format!(
                "duplicate date in CSV: {}",
                pair[0].0
            )));
        }
    }

    let dates: Vec<NaiveDate> = rows.iter().map(|(date, _)| *date).collect();
    let mut values = vec![Vec::with_capacity(dates.len()); columns.len()];
    for (_, row) in &rows {
        for (col, cell) in row.iter().enumerate() {
            values[col].push(*cell);
        }
    }

    let frame = Frame::new(dates, columns, values)?;
    info!(
        rows = frame.len(),
        columns = frame.columns().len(),
        path = %path.as_ref().display(),
        "loaded data table"
    );
    Ok(frame)
}
