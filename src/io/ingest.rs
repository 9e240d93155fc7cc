//! Read `merged.csv` back for offline analysis.
//!
//! The header must carry every merged column (any order, case-insensitive,
//! BOM tolerated). Bad rows are skipped and reported with their line number;
//! an empty value cell is an absent value, not an error.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::warn;

use crate::domain::MergedRow;
use crate::error::AppError;
use crate::io::export::MERGED_COLUMNS;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedRows {
    pub rows: Vec<MergedRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load a merged state-year table.
pub fn read_merged_csv(path: &Path) -> Result<IngestedRows, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::io(format!("Failed to read CSV headers of '{}': {e}", path.display())))?
        .clone();
    let header_map = build_header_map(&headers);

    let missing: Vec<&str> = MERGED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::io(format!(
            "'{}' is missing required column(s): {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &header_map));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        warn!(path = %path.display(), skipped = row_errors.len(), "skipped invalid rows");
    }

    if rows.is_empty() {
        return Err(AppError::io(format!("No valid rows in '{}'.", path.display())));
    }

    Ok(IngestedRows {
        rows,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<MergedRow, String> {
    let state = get_required(record, header_map, "state")?.to_ascii_uppercase();
    let year_raw = get_required(record, header_map, "year")?;
    let year = year_raw
        .parse::<i32>()
        .map_err(|_| format!("Invalid `year` '{year_raw}'."))?;

    Ok(MergedRow {
        state,
        year,
        corn_yield: parse_opt_f64(record, header_map, "corn_yield")?,
        wheat_yield: parse_opt_f64(record, header_map, "wheat_yield")?,
        avg_temp_annual: parse_opt_f64(record, header_map, "avg_temp_annual")?,
        total_precip_annual: parse_opt_f64(record, header_map, "total_precip_annual")?,
    })
}

fn get_required<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<&'a str, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<Option<f64>, String> {
    let Some(s) = get_optional(record, header_map, name) else {
        return Ok(None);
    };
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("Invalid `{name}` '{s}'.")),
    }
}
