//! CSV exports for the data and results directories.
//!
//! Every table is written with an explicit header row, so an empty table still
//! produces a readable file. Absent values serialize as empty cells.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::analysis::AnalysisReport;
use crate::data::DataGap;
use crate::domain::{Crop, MergedRow};
use crate::error::AppError;
use crate::merge::MergedDataset;

pub const CLIMATE_MONTHLY_FILE: &str = "climate_monthly.csv";
pub const CLIMATE_ANNUAL_FILE: &str = "climate_annual.csv";
pub const MERGED_FILE: &str = "merged.csv";
pub const GAPS_FILE: &str = "data_gaps.csv";
pub const TRENDS_FILE: &str = "trends.csv";
pub const CORRELATIONS_FILE: &str = "correlations.csv";
pub const REGRESSIONS_FILE: &str = "regressions.csv";

pub const YIELD_COLUMNS: [&str; 4] = ["state", "crop", "year", "yield_value"];
pub const CLIMATE_MONTHLY_COLUMNS: [&str; 6] = ["state", "station_id", "year", "month", "avg_temp", "total_precip"];
pub const CLIMATE_ANNUAL_COLUMNS: [&str; 4] = ["state", "year", "avg_temp_annual", "total_precip_annual"];
pub const MERGED_COLUMNS: [&str; 6] = [
    "state",
    "year",
    "corn_yield",
    "wheat_yield",
    "avg_temp_annual",
    "total_precip_annual",
];
const GAP_COLUMNS: [&str; 6] = ["source", "state", "subject", "start_year", "end_year", "error"];
const TREND_COLUMNS: [&str; 8] = [
    "state",
    "metric",
    "n",
    "slope_per_year",
    "intercept",
    "r_squared",
    "slope_std_err",
    "p_value",
];
const CORRELATION_COLUMNS: [&str; 6] = ["state", "x", "y", "n", "r", "p_value"];
const REGRESSION_COLUMNS: [&str; 9] = [
    "state",
    "response",
    "predictor",
    "n",
    "slope",
    "intercept",
    "r_squared",
    "slope_std_err",
    "p_value",
];

#[derive(Debug, Serialize)]
struct TrendRow<'a> {
    state: &'a str,
    metric: &'static str,
    n: usize,
    slope: f64,
    intercept: f64,
    r_squared: Option<f64>,
    slope_std_err: Option<f64>,
    p_value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CorrelationRow<'a> {
    state: &'a str,
    x: &'static str,
    y: &'static str,
    n: usize,
    r: f64,
    p_value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RegressionRow<'a> {
    state: &'a str,
    response: &'static str,
    predictor: &'static str,
    n: usize,
    slope: f64,
    intercept: f64,
    r_squared: Option<f64>,
    slope_std_err: Option<f64>,
    p_value: Option<f64>,
}

/// Write `rows` to `path` under an explicit header.
pub fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: impl IntoIterator<Item = T>) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create CSV '{}': {e}", path.display())))?;

    writer
        .write_record(header)
        .map_err(|e| AppError::io(format!("Failed to write header of '{}': {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::io(format!("Failed to write row of '{}': {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to flush '{}': {e}", path.display())))?;
    Ok(())
}

pub fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    fs::create_dir_all(dir).map_err(|e| AppError::io(format!("Failed to create directory '{}': {e}", dir.display())))
}

/// Write the fetched and merged tables into `dir`. Returns the written paths.
pub fn write_dataset(dir: &Path, dataset: &MergedDataset, crops: &[Crop]) -> Result<Vec<PathBuf>, AppError> {
    ensure_dir(dir)?;
    let mut written = Vec::new();

    for &crop in crops {
        let path = dir.join(format!("{}.csv", crop.file_stem()));
        write_table(&path, &YIELD_COLUMNS, dataset.yields.iter().filter(|y| y.crop == crop))?;
        written.push(path);
    }

    let path = dir.join(CLIMATE_MONTHLY_FILE);
    write_table(&path, &CLIMATE_MONTHLY_COLUMNS, &dataset.climate_months)?;
    written.push(path);

    let path = dir.join(CLIMATE_ANNUAL_FILE);
    write_table(&path, &CLIMATE_ANNUAL_COLUMNS, &dataset.climate_years)?;
    written.push(path);

    let path = dir.join(MERGED_FILE);
    write_merged(&path, &dataset.rows)?;
    written.push(path);

    let path = dir.join(GAPS_FILE);
    write_gaps(&path, &dataset.gaps)?;
    written.push(path);

    info!(dir = %dir.display(), files = written.len(), "wrote data files");
    Ok(written)
}

pub fn write_merged(path: &Path, rows: &[MergedRow]) -> Result<(), AppError> {
    write_table(path, &MERGED_COLUMNS, rows)
}

pub fn write_gaps(path: &Path, gaps: &[DataGap]) -> Result<(), AppError> {
    write_table(path, &GAP_COLUMNS, gaps)
}

/// Write trend, correlation and regression tables into `dir`.
pub fn write_analysis(dir: &Path, report: &AnalysisReport) -> Result<Vec<PathBuf>, AppError> {
    ensure_dir(dir)?;

    let trends = dir.join(TRENDS_FILE);
    write_table(
        &trends,
        &TREND_COLUMNS,
        report.trends.iter().map(|t| TrendRow {
            state: &t.state,
            metric: t.metric.column(),
            n: t.fit.n,
            slope: t.fit.slope,
            intercept: t.fit.intercept,
            r_squared: t.fit.r_squared,
            slope_std_err: t.fit.slope_std_err,
            p_value: t.fit.p_value,
        }),
    )?;

    let correlations = dir.join(CORRELATIONS_FILE);
    write_table(
        &correlations,
        &CORRELATION_COLUMNS,
        report.correlations.iter().map(|c| CorrelationRow {
            state: &c.state,
            x: c.x.column(),
            y: c.y.column(),
            n: c.correlation.n,
            r: c.correlation.r,
            p_value: c.correlation.p_value,
        }),
    )?;

    let regressions = dir.join(REGRESSIONS_FILE);
    write_table(
        &regressions,
        &REGRESSION_COLUMNS,
        report.regressions.iter().map(|r| RegressionRow {
            state: &r.state,
            response: r.response.column(),
            predictor: r.predictor.column(),
            n: r.fit.n,
            slope: r.fit.slope,
            intercept: r.fit.intercept,
            r_squared: r.fit.r_squared,
            slope_std_err: r.fit.slope_std_err,
            p_value: r.fit.p_value,
        }),
    )?;

    info!(dir = %dir.display(), "wrote analysis tables");
    Ok(vec![trends, correlations, regressions])
}
