//! Triaxial accelerometer CSV reading
//!
//! Accelerometer exports arrive as CSV with a header row naming the axis
//! columns, sometimes preceded by device metadata rows that must be skipped.
//! This reader resolves the three axis columns by name and yields
//! equal-length sample vectors.

use std::io::BufRead;

use crate::error::ConvertError;

/// Three equal-length axis sample vectors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriaxialSeries {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl TriaxialSeries {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Recording duration in hours at the given sample rate
    pub fn duration_hours(&self, sample_rate_hz: u32) -> f64 {
        self.len() as f64 / sample_rate_hz as f64 / 3600.0
    }
}

/// Read axis columns by header name, skipping `skip_rows` metadata lines
pub fn read_triaxial_csv<R: BufRead>(
    reader: R,
    x_col: &str,
    y_col: &str,
    z_col: &str,
    skip_rows: usize,
) -> Result<TriaxialSeries, ConvertError> {
    let mut lines = reader.lines().skip(skip_rows);

    let header_line = lines
        .next()
        .ok_or_else(|| ConvertError::Decode("no header row after skipped lines".to_string()))??;
    let header: Vec<&str> = header_line.split(',').map(str::trim).collect();

    let x_idx = column_index(&header, x_col)?;
    let y_idx = column_index(&header, y_col)?;
    let z_idx = column_index(&header, z_col)?;

    let mut series = TriaxialSeries::default();

    for (offset, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let row = skip_rows + offset + 2; // 1-based, counting header and skips

        series.x.push(parse_field(&fields, x_idx, row)?);
        series.y.push(parse_field(&fields, y_idx, row)?);
        series.z.push(parse_field(&fields, z_idx, row)?);
    }

    Ok(series)
}

fn column_index(header: &[&str], name: &str) -> Result<usize, ConvertError> {
    header.iter().position(|&h| h == name).ok_or_else(|| {
        ConvertError::Decode(format!(
            "column '{name}' not found; available: {}",
            header.join(", ")
        ))
    })
}

fn parse_field(fields: &[&str], idx: usize, row: usize) -> Result<f64, ConvertError> {
    let raw = fields
        .get(idx)
        .ok_or_else(|| ConvertError::Decode(format!("row {row} has only {} fields", fields.len())))?;
    raw.parse::<f64>()
        .map_err(|_| ConvertError::Decode(format!("row {row}: '{raw}' is not a number")))
}
